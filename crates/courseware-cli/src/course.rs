//! Loading a course from the local workspace.

use std::path::Path;

use anyhow::Context;
use courseware_core::{BuildConfig, LocalWorkspace, ResourceStore};

/// A build configuration together with the workspace it was indexed from.
pub struct Course {
    pub workspace: LocalWorkspace,
    pub resources: ResourceStore,
    pub config: BuildConfig,
}

impl Course {
    pub fn open(workspace_root: &Path, config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            anyhow::bail!("Build configuration not found: {}", config_path.display());
        }

        let workspace = LocalWorkspace::new(workspace_root);
        let config = BuildConfig::load(config_path, &workspace)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        Ok(Self {
            resources: ResourceStore::new(workspace_root),
            workspace,
            config,
        })
    }
}
