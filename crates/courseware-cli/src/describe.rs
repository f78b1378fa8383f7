//! Describe command implementation.

use std::path::Path;

use crate::course::Course;

/// Execute the describe command.
pub fn execute(workspace_root: &Path, config_path: &Path) -> anyhow::Result<()> {
    let course = Course::open(workspace_root, config_path)?;
    print!("{}", course.config.describe());
    Ok(())
}
