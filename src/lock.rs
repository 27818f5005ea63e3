//! Scan mutual exclusion.
//!
//! At most one scan pass runs at a time, system-wide. The lock is a JSON
//! state file (holder token, acquisition time, TTL) created with atomic
//! create-if-absent. A lock older than its TTL is stale and is reclaimed by
//! the next acquire attempt; a crashed holder therefore blocks scanning only
//! until the TTL elapses or an operator runs `unlock`. The TTL must exceed
//! the realistic worst-case scan duration, or two passes can overlap after a
//! premature reclaim.
//!
//! The read-check-reclaim of an existing state file runs under a short fs2
//! flock on a sibling guard file so two reclaiming processes cannot both
//! win. The flock is NOT held for the duration of the scan: the state file
//! with its TTL is authoritative, which is what keeps the contract identical
//! whether the previous holder exited or crashed.

use crate::error::LockError;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Persisted lock state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockState {
    pub holder_token: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_secs: u64,
    pub pid: u32,
}

impl LockState {
    fn new(ttl: Duration) -> Self {
        Self {
            holder_token: Uuid::new_v4().to_string(),
            acquired_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
            pid: std::process::id(),
        }
    }

    /// Age of the lock in whole seconds.
    pub fn held_secs(&self) -> u64 {
        (Utc::now() - self.acquired_at).num_seconds().max(0) as u64
    }

    pub fn is_stale(&self) -> bool {
        self.held_secs() > self.ttl_secs
    }
}

/// The scan lock at a fixed filesystem path.
#[derive(Debug, Clone)]
pub struct ScanLock {
    path: PathBuf,
}

impl ScanLock {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(".guard");
        PathBuf::from(p)
    }

    fn io_err(&self, source: io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Hold the acquire-side flock for the duration of a closure.
    fn with_guard<T>(&self, f: impl FnOnce() -> Result<T, LockError>) -> Result<T, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let guard = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.guard_path())
            .map_err(|e| self.io_err(e))?;
        FileExt::lock_exclusive(&guard).map_err(|e| self.io_err(e))?;
        let result = f();
        // flock released when `guard` closes
        drop(guard);
        result
    }

    /// Try to acquire the lock.
    ///
    /// Succeeds when no lock file exists, or when the existing lock's age
    /// exceeds its TTL (the stale lock is reclaimed and logged). Returns
    /// `LockError::Held` immediately otherwise; callers surface that as
    /// "already running", not as a failure of the engine.
    pub fn try_acquire(&self, ttl: Duration) -> Result<LockGuard, LockError> {
        self.with_guard(|| {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
            {
                Ok(file) => {
                    let state = LockState::new(ttl);
                    write_state(&file, &state).map_err(|e| self.io_err(e))?;
                    debug!(path = %self.path.display(), token = %state.holder_token, "scan lock acquired");
                    Ok(LockGuard {
                        lock: self.clone(),
                        token: state.holder_token,
                        released: false,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let existing = self.read_state()?;
                    if !existing.is_stale() {
                        return Err(LockError::Held {
                            holder: existing.holder_token.clone(),
                            held_secs: existing.held_secs(),
                            ttl_secs: existing.ttl_secs,
                        });
                    }

                    warn!(
                        path = %self.path.display(),
                        holder = %existing.holder_token,
                        held_secs = existing.held_secs(),
                        ttl_secs = existing.ttl_secs,
                        "reclaiming stale scan lock"
                    );
                    fs::remove_file(&self.path).map_err(|e| self.io_err(e))?;
                    let file = OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .open(&self.path)
                        .map_err(|e| self.io_err(e))?;
                    let state = LockState::new(ttl);
                    write_state(&file, &state).map_err(|e| self.io_err(e))?;
                    Ok(LockGuard {
                        lock: self.clone(),
                        token: state.holder_token,
                        released: false,
                    })
                }
                Err(e) => Err(self.io_err(e)),
            }
        })
    }

    /// Operator escape hatch: drop the lock regardless of holder or age.
    /// Returns true when a lock file was actually removed.
    pub fn force_release(&self) -> Result<bool, LockError> {
        self.with_guard(|| match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "scan lock force-released");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_err(e)),
        })
    }

    /// Current lock state, if any.
    pub fn status(&self) -> Result<Option<LockState>, LockError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|e| LockError::Corrupt(e.to_string()))?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(e)),
        }
    }

    fn read_state(&self) -> Result<LockState, LockError> {
        let bytes = fs::read(&self.path).map_err(|e| self.io_err(e))?;
        serde_json::from_slice(&bytes).map_err(|e| LockError::Corrupt(e.to_string()))
    }

    fn release_token(&self, token: &str) -> Result<(), LockError> {
        self.with_guard(|| {
            let state = match self.status()? {
                Some(state) => state,
                None => return Ok(()), // force-released while we ran
            };
            if state.holder_token != token {
                // Our TTL elapsed mid-scan and another pass reclaimed the
                // lock; their lock is not ours to remove.
                warn!(
                    path = %self.path.display(),
                    holder = %state.holder_token,
                    "scan lock was reclaimed by another pass; not releasing"
                );
                return Ok(());
            }
            fs::remove_file(&self.path).map_err(|e| self.io_err(e))?;
            debug!(path = %self.path.display(), "scan lock released");
            Ok(())
        })
    }
}

fn write_state(mut file: &File, state: &LockState) -> io::Result<()> {
    use std::io::Write;
    let payload = serde_json::to_vec_pretty(state)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    file.write_all(&payload)?;
    file.sync_all()
}

/// Holds the scan lock. Released explicitly via [`LockGuard::release`]; the
/// `Drop` impl is the safety net for early-return paths.
pub struct LockGuard {
    lock: ScanLock,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.lock.release_token(&self.token)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.lock.release_token(&self.token) {
            warn!(error = %e, "failed to release scan lock on drop");
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.lock.path)
            .finish()
    }
}
