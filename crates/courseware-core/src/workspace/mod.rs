//! Workspace collaborators.
//!
//! The publisher never touches storage directly: notebooks are read and
//! written through a [`WorkspaceClient`], and git checkouts are reset through
//! a [`RepoClient`]. Paths are absolute workspace paths (`/Repos/...`).

mod local;
mod memory;

pub use local::LocalWorkspace;
pub use memory::MemoryWorkspace;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::language::Language;

/// Kind of a workspace object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Notebook,
    Directory,
    File,
}

/// Metadata of a workspace object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    pub object_type: ObjectType,
    /// Set for notebooks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl ObjectInfo {
    pub fn notebook(path: impl Into<String>, language: Language) -> Self {
        Self {
            path: path.into(),
            object_type: ObjectType::Notebook,
            language: Some(language),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            object_type: ObjectType::Directory,
            language: None,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            object_type: ObjectType::File,
            language: None,
        }
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn is_notebook(&self) -> bool {
        self.object_type == ObjectType::Notebook
    }
}

/// Notebook storage.
pub trait WorkspaceClient: Send + Sync {
    /// Metadata of the object at `path`, `None` if it does not exist.
    fn get_status(&self, path: &str) -> Result<Option<ObjectInfo>>;

    /// Source of the notebook at `path`.
    fn export_notebook(&self, path: &str) -> Result<String>;

    /// Create or overwrite the notebook at `path`. The parent directory must
    /// already exist.
    fn import_notebook(&self, language: Language, path: &str, content: &str) -> Result<()>;

    /// Create `path` and any missing parents.
    fn mkdirs(&self, path: &str) -> Result<()>;

    /// Delete the object at `path`, recursively for directories.
    fn delete_path(&self, path: &str) -> Result<()>;

    /// Children of the directory at `path`, `None` if it does not exist.
    ///
    /// A recursive listing descends into sub-directories and returns only
    /// notebooks and files.
    fn ls(&self, path: &str, recursive: bool) -> Result<Option<Vec<ObjectInfo>>>;
}

/// Git checkouts inside the workspace.
pub trait RepoClient: Send + Sync {
    /// Delete any checkout at `directory` and clone `repo_url` at `branch`.
    fn reset(&self, directory: &str, repo_url: &str, branch: &str) -> Result<()>;
}

/// Join a workspace directory and a relative path.
pub(crate) fn join(directory: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        directory.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

/// Parent directory of a workspace path.
pub(crate) fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("/Repos/course/", "/Source/A"), "/Repos/course/Source/A");
        assert_eq!(parent("/Repos/course/Source/A"), "/Repos/course/Source");
        assert_eq!(parent("/Top"), "/");
        assert_eq!(parent("relative"), "");
    }

    #[test]
    fn test_object_info_name() {
        let info = ObjectInfo::notebook("/Repos/x/Module 1/Lesson 1.1", Language::Sql);
        assert_eq!(info.name(), "Lesson 1.1");
        assert!(info.is_notebook());
        assert!(!ObjectInfo::directory("/Repos").is_notebook());
    }
}
