//! Core types for the sync engine.
//!
//! A scan pass turns store listings into [`FileDescriptor`]s, checks each
//! one against the persisted registry, and summarizes the outcome in a
//! [`ScanReport`]. Descriptors and owner mappings live for one pass only;
//! [`RegistryEntry`] rows live from successful artifact creation until
//! reconciliation removes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity an owner folder resolved to (e.g. a customer account id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a downstream catalog artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file observed during traversal. Read-only once produced for a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Top-level folder the file belongs to.
    pub owner_folder: String,
    /// Path relative to the owner folder, forward-slash separated.
    pub relative_path: String,
    /// File name (basename of `relative_path`).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, Unix epoch milliseconds.
    pub modified_at: i64,
}

impl FileDescriptor {
    pub fn new(owner_folder: &str, relative_path: &str, size: u64, modified_at: i64) -> Self {
        let name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string();
        Self {
            owner_folder: owner_folder.to_string(),
            relative_path: relative_path.to_string(),
            name,
            size,
            modified_at,
        }
    }
}

/// What started a scan pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scheduled" => Some(Self::Scheduled),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the persisted registry: a file that has been materialized in
/// the catalog. Created only after the catalog reported success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub fingerprint: crate::fingerprint::Fingerprint,
    pub owner_folder: String,
    pub relative_path: String,
    pub artifact_id: ArtifactId,
    pub created_at: DateTime<Utc>,
    pub triggered_by: Trigger,
}

/// Where in the pass an issue was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueScope {
    /// Whole owner skipped (unreadable directory, unresolved folder).
    Owner,
    /// Single file skipped (stat failure, catalog create failure).
    File,
    /// Reconciliation entry left in place (catalog delete failure).
    Reconcile,
}

impl IssueScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::File => "file",
            Self::Reconcile => "reconcile",
        }
    }
}

/// A non-fatal problem encountered during a pass.
#[derive(Debug, Clone)]
pub struct ScanIssue {
    pub scope: IssueScope,
    pub owner: Option<String>,
    pub path: Option<String>,
    pub message: String,
}

impl ScanIssue {
    pub fn owner(owner: &str, message: impl Into<String>) -> Self {
        Self {
            scope: IssueScope::Owner,
            owner: Some(owner.to_string()),
            path: None,
            message: message.into(),
        }
    }

    pub fn file(owner: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            scope: IssueScope::File,
            owner: Some(owner.to_string()),
            path: Some(path.to_string()),
            message: message.into(),
        }
    }

    pub fn reconcile(owner: &str, path: &str, message: impl Into<String>) -> Self {
        Self {
            scope: IssueScope::Reconcile,
            owner: Some(owner.to_string()),
            path: Some(path.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.scope.as_str())?;
        if let Some(owner) = &self.owner {
            write!(f, " owner={owner}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " path={path}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Summary of one scan pass. Produced fresh per pass, never persisted.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub trigger: Trigger,
    /// Artifacts created this pass.
    pub created: u64,
    /// Files already in the registry, left alone.
    pub skipped: u64,
    /// Registry entries reconciled away (artifact deleted).
    pub deleted: u64,
    /// Owner folders fully traversed this pass.
    pub owners_scanned: u64,
    /// Top-level folders that resolved to no identity.
    pub owners_unresolved: u64,
    /// True when the pass stopped at its wall-clock budget before finishing.
    pub incomplete: bool,
    pub duration_ms: u64,
    pub issues: Vec<ScanIssue>,
}

impl ScanReport {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            created: 0,
            skipped: 0,
            deleted: 0,
            owners_scanned: 0,
            owners_unresolved: 0,
            incomplete: false,
            duration_ms: 0,
            issues: Vec::new(),
        }
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} skipped={} deleted={} owners={} unresolved={} errors={}{}",
            self.created,
            self.skipped,
            self.deleted,
            self.owners_scanned,
            self.owners_unresolved,
            self.issues.len(),
            if self.incomplete { " (incomplete)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_roundtrip() {
        for trigger in [Trigger::Scheduled, Trigger::Manual] {
            assert_eq!(Trigger::parse(trigger.as_str()), Some(trigger));
        }
        assert!(Trigger::parse("webhook").is_none());
        assert_eq!(Trigger::parse("MANUAL"), Some(Trigger::Manual));
    }

    #[test]
    fn test_descriptor_name_from_relative_path() {
        let f = FileDescriptor::new("alice", "sub/dir/a.txt", 500, 1_700_000_000_000);
        assert_eq!(f.name, "a.txt");

        let root = FileDescriptor::new("alice", "a.txt", 500, 0);
        assert_eq!(root.name, "a.txt");
    }

    #[test]
    fn test_report_display_counts() {
        let mut report = ScanReport::new(Trigger::Manual);
        report.created = 2;
        report.skipped = 5;
        let s = report.to_string();
        assert!(s.contains("created=2"));
        assert!(s.contains("skipped=5"));
        assert!(!s.contains("incomplete"));
    }
}
