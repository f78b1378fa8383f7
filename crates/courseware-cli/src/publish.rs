//! Publish command implementation.

use std::path::Path;
use std::time::Instant;

use courseware_core::{PublishOptions, Publisher};

use crate::colors;
use crate::course::Course;

/// Execute the publish command.
pub fn execute(
    workspace_root: &Path,
    config_path: &Path,
    target: Option<&str>,
    testing: bool,
    debugging: bool,
) -> anyhow::Result<()> {
    let course = Course::open(workspace_root, config_path)?;
    let start = Instant::now();

    println!(
        "\n{}Publishing{} {} v{}",
        colors::BOLD,
        colors::RESET,
        course.config.name,
        course.config.version
    );
    println!("{}", "─".repeat(50));

    let mut publisher =
        Publisher::new(course.config.clone(), &course.workspace)?.with_resources(&course.resources);
    if let Some(target) = target {
        publisher = publisher.with_target_dir(target);
    }

    publisher.validate();
    let report = publisher.publish_notebooks(PublishOptions { testing, debugging })?;

    for notebook in &report.published {
        println!("  {}✓{} {}", colors::GREEN, colors::RESET, notebook.path);
        if let Some(solution) = &notebook.solution_path {
            println!("    {}{}{}", colors::DIM, solution, colors::RESET);
        }
    }

    for (path, warnings) in report.warnings() {
        println!("\n{}Warnings{} for {}", colors::YELLOW, colors::RESET, path);
        for warning in warnings {
            println!("  {}", warning);
        }
    }

    if report.restored_version_info {
        println!(
            "\n{}Kept{} the previously published Version Info",
            colors::CYAN,
            colors::RESET
        );
    }

    println!(
        "\n{}Published{} {} notebook(s) to {} ({:.2}s)",
        colors::GREEN,
        colors::RESET,
        report.published.len(),
        report.target_dir,
        start.elapsed().as_secs_f64()
    );

    if !course.config.is_build_version() {
        println!("\n{}", publisher.published_message());
    }

    Ok(())
}
