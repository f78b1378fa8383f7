//! Resources command implementation.
//!
//! Writes the markdown of every notebook as the English bundle translators
//! work from.

use std::path::Path;

use courseware_core::Publisher;

use crate::colors;
use crate::course::Course;

/// Execute the resources command.
pub fn execute(
    workspace_root: &Path,
    config_path: &Path,
    folder: Option<&str>,
    target: Option<&str>,
) -> anyhow::Result<()> {
    let course = Course::open(workspace_root, config_path)?;
    let publisher = Publisher::new(course.config.clone(), &course.workspace)?;

    let written = publisher.create_resource_bundle(&course.resources, folder, target)?;
    if written.is_empty() {
        println!(
            "{}Skipped{} resource bundle: nothing to write for {}",
            colors::YELLOW,
            colors::RESET,
            publisher.common_language()
        );
        return Ok(());
    }

    for file in &written {
        println!("  {}✓{} {}", colors::GREEN, colors::RESET, file.display());
    }
    println!(
        "\n{}Wrote{} {} resource file(s)",
        colors::GREEN,
        colors::RESET,
        written.len()
    );

    Ok(())
}
