//! Workspace backed by a directory tree.
//!
//! Notebooks are stored as `<path>.py`, `<path>.sql`, `<path>.scala` or
//! `<path>.r` and addressed without the extension; any other file is a plain
//! workspace file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ObjectInfo, WorkspaceClient, join};
use crate::error::{Error, Result};
use crate::language::Language;

const LANGUAGES: [Language; 4] = [Language::Python, Language::Sql, Language::Scala, Language::R];

/// A [`WorkspaceClient`] over the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    /// Workspace paths are resolved below `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn notebook_file(&self, path: &str) -> Option<(PathBuf, Language)> {
        let base = self.resolve(path);
        LANGUAGES
            .iter()
            .map(|&language| (with_extension(&base, language.file_extension()), language))
            .find(|(file, _)| file.is_file())
    }

    fn list_into(&self, path: &str, recursive: bool, out: &mut Vec<ObjectInfo>) -> Result<()> {
        let dir = self.resolve(path);
        let mut entries = fs::read_dir(&dir)
            .map_err(|e| Error::workspace(path, e))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| Error::workspace(path, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child = join(path, &name);
            let file_type = entry.file_type().map_err(|e| Error::workspace(&child, e))?;

            if file_type.is_dir() {
                if recursive {
                    self.list_into(&child, true, out)?;
                } else {
                    out.push(ObjectInfo::directory(child));
                }
                continue;
            }

            let notebook = name.rsplit_once('.').and_then(|(stem, ext)| {
                Language::from_extension(ext).map(|language| (stem.to_string(), language))
            });

            match notebook {
                Some((stem, language)) => out.push(ObjectInfo::notebook(join(path, &stem), language)),
                None => out.push(ObjectInfo::file(child)),
            }
        }

        Ok(())
    }
}

/// Append `.ext` without touching dots already in the file name.
fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

impl WorkspaceClient for LocalWorkspace {
    fn get_status(&self, path: &str) -> Result<Option<ObjectInfo>> {
        if let Some((_, language)) = self.notebook_file(path) {
            return Ok(Some(ObjectInfo::notebook(path, language)));
        }

        let resolved = self.resolve(path);
        if resolved.is_dir() {
            Ok(Some(ObjectInfo::directory(path)))
        } else if resolved.is_file() {
            Ok(Some(ObjectInfo::file(path)))
        } else {
            Ok(None)
        }
    }

    fn export_notebook(&self, path: &str) -> Result<String> {
        let (file, _) = self
            .notebook_file(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        fs::read_to_string(&file).map_err(|e| Error::workspace(path, e))
    }

    fn import_notebook(&self, language: Language, path: &str, content: &str) -> Result<()> {
        let base = self.resolve(path);

        let parent_exists = base.parent().map(Path::is_dir).unwrap_or(false);
        if !parent_exists {
            return Err(Error::workspace(path, "the parent directory does not exist"));
        }

        // A notebook keeps a single language; drop copies under other extensions.
        for other in LANGUAGES.iter().filter(|&&l| l != language) {
            let stale = with_extension(&base, other.file_extension());
            if stale.is_file() {
                fs::remove_file(&stale).map_err(|e| Error::workspace(path, e))?;
            }
        }

        let file = with_extension(&base, language.file_extension());
        debug!("Writing {}", file.display());
        fs::write(&file, content).map_err(|e| Error::workspace(path, e))
    }

    fn mkdirs(&self, path: &str) -> Result<()> {
        fs::create_dir_all(self.resolve(path)).map_err(|e| Error::workspace(path, e))
    }

    fn delete_path(&self, path: &str) -> Result<()> {
        if let Some((file, _)) = self.notebook_file(path) {
            return fs::remove_file(&file).map_err(|e| Error::workspace(path, e));
        }

        let resolved = self.resolve(path);
        if resolved.is_dir() {
            fs::remove_dir_all(&resolved).map_err(|e| Error::workspace(path, e))
        } else if resolved.is_file() {
            fs::remove_file(&resolved).map_err(|e| Error::workspace(path, e))
        } else {
            Ok(())
        }
    }

    fn ls(&self, path: &str, recursive: bool) -> Result<Option<Vec<ObjectInfo>>> {
        if !self.resolve(path).is_dir() {
            return Ok(None);
        }

        let mut objects = Vec::new();
        self.list_into(path, recursive, &mut objects)?;
        Ok(Some(objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::ObjectType;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, LocalWorkspace) {
        let temp = TempDir::new().unwrap();
        let workspace = LocalWorkspace::new(temp.path());
        (temp, workspace)
    }

    #[test]
    fn test_import_and_export() {
        let (_temp, ws) = workspace();
        ws.mkdirs("/Repos/course/Module 1").unwrap();
        ws.import_notebook(Language::Sql, "/Repos/course/Module 1/1.1 Intro", "-- Databricks notebook source\nSELECT 1")
            .unwrap();

        let status = ws.get_status("/Repos/course/Module 1/1.1 Intro").unwrap().unwrap();
        assert_eq!(status.language, Some(Language::Sql));
        assert_eq!(
            ws.export_notebook("/Repos/course/Module 1/1.1 Intro").unwrap(),
            "-- Databricks notebook source\nSELECT 1"
        );
        assert!(ws.get_status("/Repos/course/Missing").unwrap().is_none());
    }

    #[test]
    fn test_import_requires_parent() {
        let (_temp, ws) = workspace();
        let err = ws.import_notebook(Language::Python, "/nowhere/nb", "x").unwrap_err();
        assert!(matches!(err, Error::Workspace { .. }));
    }

    #[test]
    fn test_reimport_replaces_language() {
        let (temp, ws) = workspace();
        ws.mkdirs("/d").unwrap();
        ws.import_notebook(Language::Python, "/d/nb", "a").unwrap();
        ws.import_notebook(Language::Scala, "/d/nb", "b").unwrap();

        assert!(!temp.path().join("d/nb.py").exists());
        assert!(temp.path().join("d/nb.scala").exists());
    }

    #[test]
    fn test_ls() {
        let (temp, ws) = workspace();
        ws.mkdirs("/c/Includes").unwrap();
        ws.import_notebook(Language::Python, "/c/Lesson", "x").unwrap();
        ws.import_notebook(Language::Python, "/c/Includes/Setup", "y").unwrap();
        fs::write(temp.path().join("c/README.md"), "readme").unwrap();

        let flat = ws.ls("/c", false).unwrap().unwrap();
        let names: Vec<_> = flat.iter().map(|o| (o.path.as_str(), o.object_type)).collect();
        assert_eq!(
            names,
            vec![
                ("/c/Includes", ObjectType::Directory),
                ("/c/Lesson", ObjectType::Notebook),
                ("/c/README.md", ObjectType::File),
            ]
        );

        let deep = ws.ls("/c", true).unwrap().unwrap();
        let notebooks: Vec<_> = deep.iter().filter(|o| o.is_notebook()).map(|o| o.path.as_str()).collect();
        assert_eq!(notebooks, vec!["/c/Includes/Setup", "/c/Lesson"]);

        assert!(ws.ls("/missing", true).unwrap().is_none());
    }

    #[test]
    fn test_delete_path() {
        let (_temp, ws) = workspace();
        ws.mkdirs("/c/sub").unwrap();
        ws.import_notebook(Language::R, "/c/sub/nb", "x").unwrap();
        ws.import_notebook(Language::R, "/c/top", "x").unwrap();

        ws.delete_path("/c/top").unwrap();
        assert!(ws.get_status("/c/top").unwrap().is_none());

        ws.delete_path("/c/sub").unwrap();
        assert!(ws.get_status("/c/sub/nb").unwrap().is_none());

        ws.delete_path("/c/never-existed").unwrap();
    }
}
