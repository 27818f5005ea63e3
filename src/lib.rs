//! Driftwatch - idempotent file-store → catalog synchronization.
//!
//! Driftwatch watches a hierarchical file store (a local directory tree or
//! a remote FTP endpoint), discovers files under per-owner top-level
//! folders, and drives one-way synchronization into a downstream catalog:
//! an artifact is created the first time a file is seen, never re-created,
//! and removed again when the source file disappears.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐    ┌───────────┐    ┌────────────┐    ┌──────────────┐
//! │   Store   │    │ Traversal │    │  Registry  │    │   Catalog    │
//! │ (FS/FTP)  │───▶│ + Finger- │───▶│ (SQLite,   │───▶│ (create/     │
//! │           │    │   print   │    │  durable)  │    │  delete)     │
//! └───────────┘    └───────────┘    └────────────┘    └──────────────┘
//!        ▲                                ▲
//!        │         ┌───────────┐         │
//!        └─────────│   Scan    │─────────┘
//!                  │Orchestrator│  one pass at a time (TTL scan lock)
//!                  └───────────┘
//! ```
//!
//! # Core concepts
//!
//! - **Owner**: the identity a top-level source folder resolves to; files
//!   in unresolved folders are never ingested.
//! - **Fingerprint**: deterministic identity of a file observation
//!   (owner, path, size, mtime); the registry of fingerprints is what makes
//!   repeated scans idempotent.
//! - **Reconciliation**: after a clean pass, artifacts whose files vanished
//!   are deleted — but only for owners that were fully traversed.
//! - **Scan lock**: TTL-based mutual exclusion so overlapping triggers
//!   (timer, manual, webhook) never run two passes at once.

pub mod catalog;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod lock;
pub mod logging;
pub mod owners;
pub mod reconcile;
pub mod registry;
pub mod scan;
pub mod sinks;
pub mod store;
pub mod traverse;
pub mod types;

// Re-exports for convenience
pub use catalog::{ActivityLog, Catalog, NullActivityLog};
pub use config::{Config, OwnerRecord, StoreKind};
pub use error::{
    CatalogError, ConfigError, ConnectError, IdentityError, ListError, LockError, RegistryError,
    ScanError,
};
pub use fingerprint::{fingerprint, Fingerprint};
pub use lock::{LockGuard, LockState, ScanLock};
pub use owners::{ConfigIdentityStore, IdentityStore, OwnerIdentity, OwnerResolver};
pub use registry::Registry;
pub use scan::{ScanOptions, ScanOrchestrator};
pub use store::{ChildEntry, FileStore, FtpStore, LocalStore, StoreSession};
pub use types::{
    ArtifactId, FileDescriptor, OwnerId, RegistryEntry, ScanIssue, ScanReport, Trigger,
};
