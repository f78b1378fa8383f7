//! Translate command implementation.

use std::path::Path;

use courseware_core::Translator;

use crate::colors;
use crate::course::Course;

/// Execute the translate command.
pub fn execute(
    workspace_root: &Path,
    config_path: &Path,
    language: &str,
    source: &str,
    target: &str,
) -> anyhow::Result<()> {
    let course = Course::open(workspace_root, config_path)?;
    let mut translator = Translator::new(course.config.clone(), &course.workspace, &course.resources)?;

    let selected = translator.select_language(language)?;
    println!(
        "\n{}Translating{} into {} (v{})",
        colors::BOLD,
        colors::RESET,
        selected.common_language,
        selected.version
    );
    println!("{}", "─".repeat(50));

    translator.use_directories(source, target)?;
    let published = translator.publish_notebooks()?;

    for path in &published {
        println!("  {}✓{} {}", colors::GREEN, colors::RESET, path);
    }
    println!(
        "\n{}Translated{} {} notebook(s) to {}",
        colors::GREEN,
        colors::RESET,
        published.len(),
        target
    );

    Ok(())
}
