//! Local filesystem store adapter.
//!
//! "Connecting" to the local filesystem cannot fail; only per-path listing
//! can (missing directory, permissions). Symlinks are not followed.

use super::{ChildEntry, FileStore, StoreSession};
use crate::error::{ConnectError, ListError};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Store adapter over a local directory tree.
#[derive(Debug, Clone, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }
}

impl FileStore for LocalStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>, ConnectError> {
        Ok(Box::new(LocalSession))
    }
}

struct LocalSession;

impl StoreSession for LocalSession {
    fn list_children(&mut self, path: &str) -> Result<Vec<ChildEntry>, ListError> {
        let dir = Path::new(path);
        let read_dir = std::fs::read_dir(dir).map_err(|e| ListError::from_io(path, e))?;

        let mut children = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| ListError::from_io(path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    // Type unknown: surface the entry with no stats so the
                    // traversal records a per-file issue instead of aborting.
                    debug!(path = %path, name = %name, error = %e, "file_type failed");
                    children.push(ChildEntry {
                        name,
                        is_directory: false,
                        size: None,
                        modified_at: None,
                    });
                    continue;
                }
            };

            if file_type.is_symlink() {
                continue;
            }

            if file_type.is_dir() {
                children.push(ChildEntry {
                    name,
                    is_directory: true,
                    size: None,
                    modified_at: None,
                });
                continue;
            }

            let (size, modified_at) = match entry.metadata() {
                Ok(meta) => (Some(meta.len()), epoch_millis(&meta)),
                Err(e) => {
                    debug!(path = %path, name = %name, error = %e, "stat failed");
                    (None, None)
                }
            };

            children.push(ChildEntry {
                name,
                is_directory: false,
                size,
                modified_at,
            });
        }

        Ok(children)
    }

    fn disconnect(&mut self) {}
}

fn epoch_millis(meta: &std::fs::Metadata) -> Option<i64> {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_children_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();

        let store = LocalStore::new();
        let mut session = store.connect().unwrap();
        let mut children = session
            .list_children(&tmp.path().to_string_lossy())
            .unwrap();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "a.txt");
        assert!(!children[0].is_directory);
        assert_eq!(children[0].size, Some(5));
        assert!(children[0].modified_at.is_some());
        assert_eq!(children[1].name, "sub");
        assert!(children[1].is_directory);
    }

    #[test]
    fn test_list_missing_directory() {
        let store = LocalStore::new();
        let mut session = store.connect().unwrap();
        let err = session.list_children("/nonexistent/driftwatch-test").unwrap_err();
        assert!(matches!(err, ListError::NotFound(_)));
    }

    #[test]
    fn test_symlinks_skipped() {
        #[cfg(unix)]
        {
            let tmp = TempDir::new().unwrap();
            fs::write(tmp.path().join("real.txt"), "x").unwrap();
            std::os::unix::fs::symlink(
                tmp.path().join("real.txt"),
                tmp.path().join("link.txt"),
            )
            .unwrap();

            let store = LocalStore::new();
            let mut session = store.connect().unwrap();
            let children = session
                .list_children(&tmp.path().to_string_lossy())
                .unwrap();
            assert_eq!(children.len(), 1);
            assert_eq!(children[0].name, "real.txt");
        }
    }
}
