//! Translation resources on the filesystem.
//!
//! Resource directories are workspace paths (`<source_repo>/Resources/...`)
//! mirrored below a local root, with one `<notebook path>.md` file per
//! notebook.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::i18n::normalize_resource;

/// Reads and writes translation resources below `root`.
#[derive(Debug, Clone)]
pub struct ResourceStore {
    root: PathBuf,
}

impl ResourceStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Local file of the resource for `notebook_path` inside `resources_dir`.
    pub fn file_for(&self, resources_dir: &str, notebook_path: &str) -> PathBuf {
        let base = self
            .root
            .join(resources_dir.trim_start_matches('/'))
            .join(notebook_path.trim_start_matches('/'));
        let mut name: OsString = base.into_os_string();
        name.push(".md");
        PathBuf::from(name)
    }

    /// Load and normalize a resource, `None` if there is none.
    pub fn load(&self, resources_dir: &str, notebook_path: &str) -> Result<Option<String>> {
        let file = self.file_for(resources_dir, notebook_path);
        if !file.is_file() {
            return Ok(None);
        }
        let source = fs::read_to_string(&file)?;
        Ok(Some(normalize_resource(&source)))
    }

    /// Write a resource, replacing any previous version.
    pub fn write(&self, resources_dir: &str, notebook_path: &str, content: &str) -> Result<PathBuf> {
        let file = self.file_for(resources_dir, notebook_path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        if file.exists() {
            fs::remove_file(&file)?;
        }
        debug!("Writing resource {}", file.display());
        fs::write(&file, content)?;
        Ok(file)
    }

    /// Names of the entries directly inside `resources_dir`, sorted.
    pub fn list(&self, resources_dir: &str) -> Result<Vec<String>> {
        let dir = self.root.join(resources_dir.trim_start_matches('/'));
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_load_normalizes() {
        let temp = TempDir::new().unwrap();
        let store = ResourceStore::new(temp.path());

        let written = store
            .write("/Repos/c/Resources/french-v1.0", "Module 1/1.1 Intro", "# /Module 1/1.1 Intro\n<hr />\n--i18n-a\nBonjour\n")
            .unwrap();
        assert!(written.ends_with("Resources/french-v1.0/Module 1/1.1 Intro.md"));

        let loaded = store
            .load("/Repos/c/Resources/french-v1.0", "Module 1/1.1 Intro")
            .unwrap()
            .unwrap();
        assert_eq!(loaded, "# /Module 1/1.1 Intro\n<hr>--i18n-a\nBonjour\n");
    }

    #[test]
    fn test_missing_resource() {
        let temp = TempDir::new().unwrap();
        let store = ResourceStore::new(temp.path());
        assert!(store.load("/Resources/x", "Lesson").unwrap().is_none());
    }

    #[test]
    fn test_list() {
        let temp = TempDir::new().unwrap();
        let store = ResourceStore::new(temp.path());
        assert!(store.list("/Repos/c/Resources").unwrap().is_empty());

        store.write("/Repos/c/Resources/japanese-v1.0", "Lesson", "# /Lesson\n").unwrap();
        store.write("/Repos/c/Resources/english-v1.0", "Lesson", "# /Lesson\n").unwrap();
        assert_eq!(store.list("/Repos/c/Resources").unwrap(), vec!["english-v1.0", "japanese-v1.0"]);
    }
}
