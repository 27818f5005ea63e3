//! Uniform interface over hierarchical file stores.
//!
//! A [`FileStore`] produces connected [`StoreSession`]s; a session lists a
//! directory's immediate children by explicit path. There is no current
//! directory and no `chdir`: every listing names its path, so recursive
//! traversal never has a "return to previous directory" step to get wrong.
//!
//! Session lifecycle is `Disconnected -> Connected -> Closed`; callers only
//! ever observe a connected session.

mod ftp;
mod local;

pub use ftp::FtpStore;
pub use local::LocalStore;

use crate::error::{ConnectError, ListError};

/// One immediate child of a directory, as reported by the store.
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes; `None` when the store could not stat the entry.
    pub size: Option<u64>,
    /// Modification time in epoch milliseconds; `None` when unavailable.
    pub modified_at: Option<i64>,
}

/// A connected session against a file store.
pub trait StoreSession {
    /// List the immediate children of `path`. Paths are forward-slash
    /// separated and absolute within the store.
    fn list_children(&mut self, path: &str) -> Result<Vec<ChildEntry>, ListError>;

    /// Close the session. Idempotent; errors during close are swallowed
    /// after logging since there is nothing a caller can do with them.
    fn disconnect(&mut self);
}

/// A file store that can open sessions.
pub trait FileStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>, ConnectError>;
}

/// Join a store path and a child name with a single separator.
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() || base == "/" {
        format!("{}{}", if base == "/" { "/" } else { "" }, name)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/srv/files", "alice"), "/srv/files/alice");
        assert_eq!(join_path("/srv/files/", "alice"), "/srv/files/alice");
        assert_eq!(join_path("/", "alice"), "/alice");
        assert_eq!(join_path("", "alice"), "alice");
    }
}
