//! In-memory workspace.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ObjectInfo, WorkspaceClient, parent};
use crate::error::{Error, Result};
use crate::language::Language;

#[derive(Debug, Clone)]
enum Entry {
    Directory,
    Notebook { language: Language, content: String },
    File,
}

/// A [`WorkspaceClient`] holding everything in a map.
///
/// Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    entries: Mutex<BTreeMap<String, Entry>>,
}

fn lock_error<T>(e: PoisonError<T>) -> Error {
    Error::workspace("<memory>", format!("Workspace lock poisoned (thread panicked): {}", e))
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, Entry>>> {
        self.entries.lock().map_err(lock_error)
    }

    /// Add a notebook, creating its parent directories.
    pub fn insert_notebook(&self, path: &str, language: Language, content: &str) -> Result<()> {
        self.mkdirs(parent(path))?;
        self.entries()?.insert(
            normalize(path),
            Entry::Notebook {
                language,
                content: content.to_string(),
            },
        );
        Ok(())
    }

    /// Add a plain file, creating its parent directories.
    pub fn insert_file(&self, path: &str) -> Result<()> {
        self.mkdirs(parent(path))?;
        self.entries()?.insert(normalize(path), Entry::File);
        Ok(())
    }

    /// Paths of every notebook, sorted.
    pub fn notebook_paths(&self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Notebook { .. }))
            .map(|(path, _)| path.clone())
            .collect())
    }
}

fn info(path: &str, entry: &Entry) -> ObjectInfo {
    match entry {
        Entry::Directory => ObjectInfo::directory(path),
        Entry::Notebook { language, .. } => ObjectInfo::notebook(path, *language),
        Entry::File => ObjectInfo::file(path),
    }
}

impl WorkspaceClient for MemoryWorkspace {
    fn get_status(&self, path: &str) -> Result<Option<ObjectInfo>> {
        let path = normalize(path);
        Ok(self.entries()?.get(&path).map(|entry| info(&path, entry)))
    }

    fn export_notebook(&self, path: &str) -> Result<String> {
        match self.entries()?.get(&normalize(path)) {
            Some(Entry::Notebook { content, .. }) => Ok(content.clone()),
            _ => Err(Error::NotFound(path.to_string())),
        }
    }

    fn import_notebook(&self, language: Language, path: &str, content: &str) -> Result<()> {
        let path = normalize(path);
        let mut entries = self.entries()?;

        let parent_dir = parent(&path);
        if parent_dir != "/" && !matches!(entries.get(parent_dir), Some(Entry::Directory)) {
            return Err(Error::workspace(path, "the parent directory does not exist"));
        }

        entries.insert(
            path,
            Entry::Notebook {
                language,
                content: content.to_string(),
            },
        );
        Ok(())
    }

    fn mkdirs(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut entries = self.entries()?;

        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            match entries.get(&current) {
                Some(Entry::Directory) => {}
                Some(_) => {
                    return Err(Error::workspace(current, "a non-directory object exists at this path"));
                }
                None => {
                    entries.insert(current.clone(), Entry::Directory);
                }
            }
        }
        Ok(())
    }

    fn delete_path(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let prefix = format!("{}/", path);
        self.entries()?
            .retain(|key, _| *key != path && !key.starts_with(&prefix));
        Ok(())
    }

    fn ls(&self, path: &str, recursive: bool) -> Result<Option<Vec<ObjectInfo>>> {
        let path = normalize(path);
        let entries = self.entries()?;

        if path != "/" && !matches!(entries.get(&path), Some(Entry::Directory)) {
            return Ok(None);
        }

        let prefix = if path == "/" { "/".to_string() } else { format!("{}/", path) };

        let objects = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, entry)| {
                if recursive {
                    !matches!(entry, Entry::Directory)
                } else {
                    !key[prefix.len()..].contains('/')
                }
            })
            .map(|(key, entry)| info(key, entry))
            .collect();

        Ok(Some(objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::ObjectType;

    #[test]
    fn test_insert_and_list() {
        let ws = MemoryWorkspace::new();
        ws.insert_notebook("/c/Source/Lesson", Language::Python, "x").unwrap();
        ws.insert_notebook("/c/Source/Includes/Setup", Language::Python, "y").unwrap();
        ws.insert_file("/c/Source/README.md").unwrap();

        let flat = ws.ls("/c/Source", false).unwrap().unwrap();
        let paths: Vec<_> = flat.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(paths, vec!["/c/Source/Includes", "/c/Source/Lesson", "/c/Source/README.md"]);

        let deep = ws.ls("/c/Source", true).unwrap().unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.iter().all(|o| o.object_type != ObjectType::Directory));
    }

    #[test]
    fn test_import_requires_parent() {
        let ws = MemoryWorkspace::new();
        assert!(ws.import_notebook(Language::Sql, "/a/b", "x").is_err());

        ws.mkdirs("/a").unwrap();
        ws.import_notebook(Language::Sql, "/a/b", "x").unwrap();
        assert_eq!(ws.export_notebook("/a/b").unwrap(), "x");
    }

    #[test]
    fn test_delete_is_recursive_and_exact() {
        let ws = MemoryWorkspace::new();
        ws.insert_notebook("/a/b/c", Language::Sql, "x").unwrap();
        ws.insert_notebook("/a/bc", Language::Sql, "x").unwrap();

        ws.delete_path("/a/b").unwrap();
        assert_eq!(ws.notebook_paths().unwrap(), vec!["/a/bc"]);
    }

    #[test]
    fn test_missing_notebook() {
        let ws = MemoryWorkspace::new();
        assert!(matches!(ws.export_notebook("/x"), Err(Error::NotFound(_))));
        assert!(ws.ls("/x", false).unwrap().is_none());
    }
}
