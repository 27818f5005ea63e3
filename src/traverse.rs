//! Recursive enumeration of an owner's subtree.
//!
//! Depth-first walk driven by an explicit stack of directory paths. Every
//! listing names its path outright, so there is no cursor to restore on any
//! exit path. A failed listing anywhere in the subtree fails the whole
//! owner (the caller skips the owner and keeps its registry entries safe);
//! a file with unreadable stats is skipped with a per-file issue and the
//! traversal continues.

use crate::error::ListError;
use crate::store::{join_path, StoreSession};
use crate::types::{FileDescriptor, ScanIssue};
use tracing::debug;

/// Outcome of fully traversing one owner folder.
#[derive(Debug)]
pub struct OwnerTraversal {
    pub files: Vec<FileDescriptor>,
    /// Non-fatal per-file problems (unreadable stats).
    pub issues: Vec<ScanIssue>,
}

/// Enumerate all files under `owner_root`, which is the store path of the
/// owner folder named `owner_folder`.
pub fn list_owner_files(
    session: &mut dyn StoreSession,
    owner_folder: &str,
    owner_root: &str,
) -> Result<OwnerTraversal, ListError> {
    let mut files = Vec::new();
    let mut issues = Vec::new();

    // (store path, path relative to the owner folder)
    let mut stack: Vec<(String, String)> = vec![(owner_root.to_string(), String::new())];

    while let Some((dir_path, rel_prefix)) = stack.pop() {
        let children = session.list_children(&dir_path)?;

        for child in children {
            let rel_path = if rel_prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{rel_prefix}/{}", child.name)
            };

            if child.is_directory {
                stack.push((join_path(&dir_path, &child.name), rel_path));
                continue;
            }

            match (child.size, child.modified_at) {
                (Some(size), Some(modified_at)) => {
                    files.push(FileDescriptor::new(owner_folder, &rel_path, size, modified_at));
                }
                _ => {
                    issues.push(ScanIssue::file(
                        owner_folder,
                        &rel_path,
                        "stats unavailable, file skipped",
                    ));
                }
            }
        }
    }

    debug!(
        owner = %owner_folder,
        files = files.len(),
        skipped = issues.len(),
        "owner traversal complete"
    );

    Ok(OwnerTraversal { files, issues })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChildEntry;
    use std::collections::HashMap;

    /// Canned directory tree keyed by store path.
    struct FakeSession {
        dirs: HashMap<String, Vec<ChildEntry>>,
        fail_on: Option<String>,
    }

    impl FakeSession {
        fn new() -> Self {
            Self {
                dirs: HashMap::new(),
                fail_on: None,
            }
        }

        fn dir(mut self, path: &str, children: Vec<ChildEntry>) -> Self {
            self.dirs.insert(path.to_string(), children);
            self
        }
    }

    impl StoreSession for FakeSession {
        fn list_children(&mut self, path: &str) -> Result<Vec<ChildEntry>, ListError> {
            if self.fail_on.as_deref() == Some(path) {
                return Err(ListError::PermissionDenied(path.to_string()));
            }
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| ListError::NotFound(path.to_string()))
        }

        fn disconnect(&mut self) {}
    }

    fn file(name: &str, size: u64, mtime: i64) -> ChildEntry {
        ChildEntry {
            name: name.to_string(),
            is_directory: false,
            size: Some(size),
            modified_at: Some(mtime),
        }
    }

    fn dir(name: &str) -> ChildEntry {
        ChildEntry {
            name: name.to_string(),
            is_directory: true,
            size: None,
            modified_at: None,
        }
    }

    #[test]
    fn test_nested_traversal() {
        let mut session = FakeSession::new()
            .dir(
                "/root/alice",
                vec![file("a.txt", 500, 1000), dir("photos")],
            )
            .dir(
                "/root/alice/photos",
                vec![file("one.jpg", 2000, 1100), dir("raw")],
            )
            .dir("/root/alice/photos/raw", vec![file("x.cr2", 9000, 1200)]);

        let result = list_owner_files(&mut session, "alice", "/root/alice").unwrap();
        assert!(result.issues.is_empty());

        let mut rel_paths: Vec<&str> = result
            .files
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect();
        rel_paths.sort();
        assert_eq!(
            rel_paths,
            vec!["a.txt", "photos/one.jpg", "photos/raw/x.cr2"]
        );

        let nested = result
            .files
            .iter()
            .find(|f| f.relative_path == "photos/raw/x.cr2")
            .unwrap();
        assert_eq!(nested.owner_folder, "alice");
        assert_eq!(nested.name, "x.cr2");
        assert_eq!(nested.size, 9000);
    }

    #[test]
    fn test_empty_owner() {
        let mut session = FakeSession::new().dir("/root/alice", vec![]);
        let result = list_owner_files(&mut session, "alice", "/root/alice").unwrap();
        assert!(result.files.is_empty());
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_unreadable_subdirectory_fails_owner() {
        let mut session = FakeSession::new()
            .dir("/root/alice", vec![file("a.txt", 1, 1), dir("private")])
            .dir("/root/alice/private", vec![]);
        session.fail_on = Some("/root/alice/private".to_string());

        let err = list_owner_files(&mut session, "alice", "/root/alice").unwrap_err();
        assert!(matches!(err, ListError::PermissionDenied(_)));
    }

    #[test]
    fn test_statless_file_is_nonfatal_issue() {
        let mut session = FakeSession::new().dir(
            "/root/alice",
            vec![
                file("good.txt", 10, 1),
                ChildEntry {
                    name: "broken.txt".to_string(),
                    is_directory: false,
                    size: None,
                    modified_at: None,
                },
            ],
        );

        let result = list_owner_files(&mut session, "alice", "/root/alice").unwrap();
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].relative_path, "good.txt");
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].path.as_deref(), Some("broken.txt"));
    }
}
