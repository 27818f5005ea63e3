//! Shared test fixtures: an in-memory catalog collaborator that records
//! every call, and filesystem helpers for building owner trees.

use driftwatch::{
    ArtifactId, Catalog, CatalogError, ChildEntry, ConnectError, FileDescriptor, FileStore,
    ListError, OwnerId, StoreSession,
};
use filetime::FileTime;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Catalog fake. Counts `create` calls per logical file so at-most-once
/// creation is directly assertable, and records deletions.
#[derive(Default)]
pub struct MemoryCatalog {
    next_id: AtomicU64,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    state: Mutex<CatalogState>,
}

#[derive(Default)]
struct CatalogState {
    /// (owner_folder, rel_path, size, mtime) -> number of create calls
    create_calls: HashMap<(String, String, u64, i64), u32>,
    /// artifact id -> owner id it was created for
    live: HashMap<String, i64>,
    deleted: Vec<String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls_for(&self, owner: &str, rel_path: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state
            .create_calls
            .iter()
            .filter(|((o, p, _, _), _)| o == owner && p == rel_path)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn total_create_calls(&self) -> u32 {
        self.state.lock().unwrap().create_calls.values().sum()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn owner_of(&self, artifact: &ArtifactId) -> Option<i64> {
        self.state.lock().unwrap().live.get(&artifact.0).copied()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

impl Catalog for MemoryCatalog {
    fn create(&self, file: &FileDescriptor, owner: OwnerId) -> Result<ArtifactId, CatalogError> {
        let mut state = self.state.lock().unwrap();
        let key = (
            file.owner_folder.clone(),
            file.relative_path.clone(),
            file.size,
            file.modified_at,
        );
        *state.create_calls.entry(key).or_insert(0) += 1;

        if self.fail_create.load(Ordering::Relaxed) {
            return Err(CatalogError::Create("catalog rejected file".to_string()));
        }

        let id = format!("art-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        state.live.insert(id.clone(), owner.0);
        Ok(ArtifactId(id))
    }

    fn delete(&self, artifact: &ArtifactId) -> Result<(), CatalogError> {
        if self.fail_delete.load(Ordering::Relaxed) {
            return Err(CatalogError::Delete("catalog offline".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.live.remove(&artifact.0);
        state.deleted.push(artifact.0.clone());
        Ok(())
    }
}

/// Create `root/owner/rel_path` with the given content and mtime.
pub fn write_owner_file(root: &Path, owner: &str, rel_path: &str, content: &[u8], mtime_secs: i64) {
    let path = root.join(owner).join(rel_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime_secs, 0)).unwrap();
}

/// In-memory store whose tree can be mutated between scans, including
/// marking paths as unlistable. Unlike permission tricks on a real
/// filesystem this fails reliably under any user.
#[derive(Default)]
pub struct FakeStore {
    tree: Mutex<FakeTree>,
}

#[derive(Clone, Default)]
struct FakeTree {
    dirs: HashMap<String, Vec<ChildEntry>>,
    fail: HashSet<String>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, parent: &str, name: &str) {
        let mut tree = self.tree.lock().unwrap();
        let path = format!("{}/{}", parent.trim_end_matches('/'), name);
        tree.dirs.entry(parent.to_string()).or_default().push(ChildEntry {
            name: name.to_string(),
            is_directory: true,
            size: None,
            modified_at: None,
        });
        tree.dirs.entry(path).or_default();
    }

    pub fn add_file(&self, dir: &str, name: &str, size: u64, mtime: i64) {
        let mut tree = self.tree.lock().unwrap();
        tree.dirs.entry(dir.to_string()).or_default().push(ChildEntry {
            name: name.to_string(),
            is_directory: false,
            size: Some(size),
            modified_at: Some(mtime),
        });
    }

    pub fn remove_file(&self, dir: &str, name: &str) {
        let mut tree = self.tree.lock().unwrap();
        if let Some(children) = tree.dirs.get_mut(dir) {
            children.retain(|c| c.name != name);
        }
    }

    pub fn fail_path(&self, path: &str) {
        self.tree.lock().unwrap().fail.insert(path.to_string());
    }
}

impl FileStore for FakeStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>, ConnectError> {
        Ok(Box::new(FakeSession {
            tree: self.tree.lock().unwrap().clone(),
        }))
    }
}

struct FakeSession {
    tree: FakeTree,
}

impl StoreSession for FakeSession {
    fn list_children(&mut self, path: &str) -> Result<Vec<ChildEntry>, ListError> {
        if self.tree.fail.contains(path) {
            return Err(ListError::PermissionDenied(path.to_string()));
        }
        self.tree
            .dirs
            .get(path)
            .cloned()
            .ok_or_else(|| ListError::NotFound(path.to_string()))
    }

    fn disconnect(&mut self) {}
}
