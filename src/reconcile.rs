//! Post-scan reconciliation.
//!
//! After a pass has observed every file of every traversable owner, any
//! registry entry with no observed fingerprint describes a file that
//! vanished from the store: its artifact is deleted and the entry removed.
//!
//! Only owners that were fully and successfully traversed this pass are
//! considered. An owner whose directory was unreachable contributes nothing
//! to `observed`, and pruning its entries on that evidence would turn a
//! connectivity blip into mass deletion — so entries of untraversed owners
//! are never touched.

use crate::catalog::{ActivityLog, Catalog};
use crate::error::RegistryError;
use crate::fingerprint::Fingerprint;
use crate::registry::Registry;
use crate::types::ScanIssue;
use std::collections::HashSet;
use tracing::{info, warn};

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Entries whose artifacts were deleted and removed from the registry.
    pub deleted: u64,
    /// Entries left in place because the catalog refused the deletion.
    pub issues: Vec<ScanIssue>,
}

/// Remove registry entries (and their artifacts) for files no longer
/// present in the store.
pub fn reconcile(
    registry: &Registry,
    catalog: &dyn Catalog,
    activity: &dyn ActivityLog,
    observed: &HashSet<Fingerprint>,
    traversed_owners: &HashSet<String>,
) -> Result<ReconcileOutcome, RegistryError> {
    let mut outcome = ReconcileOutcome::default();

    for entry in registry.all()? {
        if !traversed_owners.contains(&entry.owner_folder) {
            continue;
        }
        if observed.contains(&entry.fingerprint) {
            continue;
        }

        match catalog.delete(&entry.artifact_id) {
            Ok(()) => {
                // Remove the entry only after the artifact is confirmed
                // gone; an entry without an artifact is harmless, an
                // artifact without an entry is untracked forever.
                registry.remove(&entry.fingerprint)?;
                outcome.deleted += 1;
                activity.append(&format!(
                    "removed {}/{} (artifact {})",
                    entry.owner_folder, entry.relative_path, entry.artifact_id
                ));
            }
            Err(e) => {
                warn!(
                    owner = %entry.owner_folder,
                    path = %entry.relative_path,
                    artifact = %entry.artifact_id,
                    error = %e,
                    "artifact deletion failed; keeping registry entry for retry"
                );
                outcome.issues.push(ScanIssue::reconcile(
                    &entry.owner_folder,
                    &entry.relative_path,
                    e.to_string(),
                ));
            }
        }
    }

    if outcome.deleted > 0 || !outcome.issues.is_empty() {
        info!(
            deleted = outcome.deleted,
            failures = outcome.issues.len(),
            "reconciliation complete"
        );
    }

    Ok(outcome)
}
