//! File identity for idempotent ingestion.
//!
//! A fingerprint is derived from what the store reports about a file, not
//! from its content: owner folder, relative path, size, and mtime. Two
//! observations with the same fingerprint are the same processed unit. If a
//! store rewrites content without updating size or mtime the change is
//! invisible here; that is a property of the store, not something this
//! module papers over.

use crate::types::FileDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic identity of a file observation. Lowercase blake3 hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a descriptor.
///
/// Fields are newline-joined before hashing; the integer fields use
/// fixed-width decimal so that e.g. (size=12, mtime=3) and (size=1,
/// mtime=23) cannot collide through concatenation.
pub fn fingerprint(descriptor: &FileDescriptor) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(descriptor.owner_folder.as_bytes());
    hasher.update(b"\n");
    hasher.update(descriptor.relative_path.as_bytes());
    hasher.update(b"\n");
    hasher.update(format!("{:020}", descriptor.size).as_bytes());
    hasher.update(b"\n");
    hasher.update(format!("{:020}", descriptor.modified_at).as_bytes());
    Fingerprint(hasher.finalize().to_hex().to_string())
}
