//! Error types for the sync engine.
//!
//! Each error enum corresponds to one blast radius: `ConnectError` aborts a
//! whole pass, `ListError` skips one owner (or aborts the pass when the root
//! itself is unreadable), `CatalogError` skips one file, `RegistryError` is
//! fatal before any creation is attempted.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to establish a store session. Aborts the pass.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error during connect: {0}")]
    Protocol(String),
}

/// Failure to list one directory. Scoped to the owner being traversed.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("directory not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error listing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("protocol error listing {path}: {message}")]
    Protocol { path: String, message: String },
}

impl ListError {
    pub fn from_io(path: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_string()),
            _ => Self::Io {
                path: path.to_string(),
                source,
            },
        }
    }
}

/// Failure reported by the downstream catalog collaborator. Scoped to one
/// file (create) or one registry entry (delete).
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("artifact creation failed: {0}")]
    Create(String),

    #[error("artifact deletion failed: {0}")]
    Delete(String),
}

/// Errors from scan lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("scan lock held by {holder} for {held_secs}s (ttl {ttl_secs}s)")]
    Held {
        holder: String,
        held_secs: u64,
        ttl_secs: u64,
    },

    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("lock state unreadable: {0}")]
    Corrupt(String),
}

/// Errors from the persisted registry. Always fatal for the running pass:
/// operating without the registry guarantee would cause uncontrolled
/// duplicate creation.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("registry corrupt: {0}")]
    Corrupt(String),

    #[error("registry IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure of an identity-store lookup. The resolver treats lookup errors as
/// "no match" for the strategy that hit them, but they are logged.
#[derive(Error, Debug)]
#[error("identity lookup failed: {0}")]
pub struct IdentityError(pub String);

/// Top-level failure of a scan pass.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("synchronization is disabled in settings")]
    Disabled,

    #[error("a scan is already running: {0}")]
    AlreadyRunning(#[source] LockError),

    #[error("store connection failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("store root unreadable: {0}")]
    RootUnreadable(#[source] ListError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("lock error: {0}")]
    Lock(#[source] LockError),
}

/// Errors from loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] io::Error),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
