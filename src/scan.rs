//! Scan orchestration.
//!
//! One scan pass: acquire the lock, connect the store, resolve and traverse
//! each owner folder, create artifacts for unseen fingerprints (persisting
//! each registry insert immediately, so a killed pass resumes instead of
//! duplicating), reconcile vanished files, release the lock, return a
//! summary. The lock guard releases on every exit path.
//!
//! Failure scoping follows the error taxonomy: connect/root failures abort
//! the pass, a listing failure skips one owner, a catalog create failure
//! skips one file, a registry failure aborts before anything else is
//! created.

use crate::catalog::{ActivityLog, Catalog};
use crate::config::Config;
use crate::error::ScanError;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::lock::ScanLock;
use crate::owners::{IdentityStore, OwnerResolver};
use crate::reconcile::reconcile;
use crate::registry::Registry;
use crate::store::{join_path, FileStore, StoreSession};
use crate::traverse::list_owner_files;
use crate::types::{RegistryEntry, ScanIssue, ScanReport, Trigger};
use chrono::Utc;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Per-pass knobs, read once from settings at scan start.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Store path under which owner folders live.
    pub root: String,
    /// Scan-enable flag; a disabled engine refuses to run.
    pub enabled: bool,
    pub lock_ttl: Duration,
    pub connect_retries: u32,
    /// Optional wall-clock budget for the pass.
    pub scan_budget: Option<Duration>,
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.store.root.clone(),
            enabled: config.sync.enabled,
            lock_ttl: config.lock_ttl(),
            connect_retries: config.store.connect_retries,
            scan_budget: config.scan_budget(),
        }
    }
}

/// Composes store, registry, lock, resolver and collaborators into the
/// single entry point external triggers invoke.
pub struct ScanOrchestrator<'a> {
    store: &'a dyn FileStore,
    identities: &'a dyn IdentityStore,
    catalog: &'a dyn Catalog,
    activity: &'a dyn ActivityLog,
    registry: &'a Registry,
    lock: &'a ScanLock,
    options: ScanOptions,
}

impl<'a> ScanOrchestrator<'a> {
    pub fn new(
        store: &'a dyn FileStore,
        identities: &'a dyn IdentityStore,
        catalog: &'a dyn Catalog,
        activity: &'a dyn ActivityLog,
        registry: &'a Registry,
        lock: &'a ScanLock,
        options: ScanOptions,
    ) -> Self {
        Self {
            store,
            identities,
            catalog,
            activity,
            registry,
            lock,
            options,
        }
    }

    /// Run one scan pass. Returns `ScanError::AlreadyRunning` immediately
    /// under lock contention; that is an expected outcome for overlapping
    /// triggers, not an engine fault.
    pub fn run(&self, trigger: Trigger) -> Result<ScanReport, ScanError> {
        if !self.options.enabled {
            return Err(ScanError::Disabled);
        }

        let start = Instant::now();
        let guard = self.lock.try_acquire(self.options.lock_ttl).map_err(|e| {
            if matches!(e, crate::error::LockError::Held { .. }) {
                ScanError::AlreadyRunning(e)
            } else {
                ScanError::Lock(e)
            }
        })?;

        let result = self.run_locked(trigger, start);

        if let Err(e) = guard.release() {
            warn!(error = %e, "scan lock release failed");
        }

        result.map(|mut report| {
            report.duration_ms = start.elapsed().as_millis() as u64;
            info!(
                trigger = %report.trigger,
                created = report.created,
                skipped = report.skipped,
                deleted = report.deleted,
                owners = report.owners_scanned,
                unresolved = report.owners_unresolved,
                errors = report.issues.len(),
                incomplete = report.incomplete,
                duration_ms = report.duration_ms,
                "scan complete"
            );
            report
        })
    }

    fn run_locked(&self, trigger: Trigger, start: Instant) -> Result<ScanReport, ScanError> {
        // Probe the registry before anything is created: running without it
        // would mint duplicates on every subsequent pass.
        let registry_entries = self.registry.len()?;

        self.activity
            .append(&format!("scan started ({trigger}), registry holds {registry_entries} entries"));

        let mut session = self.connect_with_retry()?;
        let outcome = self.ingest(session.as_mut(), trigger, start);
        session.disconnect();
        let (mut report, observed, traversed) = outcome?;

        if report.incomplete {
            warn!("scan budget exhausted; stopping before reconciliation");
            self.activity
                .append("scan stopped at wall-clock budget; reconciliation skipped");
        } else {
            let outcome = reconcile(
                self.registry,
                self.catalog,
                self.activity,
                &observed,
                &traversed,
            )?;
            report.deleted = outcome.deleted;
            report.issues.extend(outcome.issues);
        }

        self.activity.append(&format!("scan finished: {report}"));
        Ok(report)
    }

    /// Enumerate, resolve, traverse and ingest every owner. Returns the
    /// pass report plus the observed-fingerprint and traversed-owner sets
    /// the reconciler needs.
    #[allow(clippy::type_complexity)]
    fn ingest(
        &self,
        session: &mut dyn StoreSession,
        trigger: Trigger,
        start: Instant,
    ) -> Result<(ScanReport, HashSet<Fingerprint>, HashSet<String>), ScanError> {
        let top_level = session
            .list_children(&self.options.root)
            .map_err(ScanError::RootUnreadable)?;

        let resolver = OwnerResolver::new(self.identities);
        let deadline = self.options.scan_budget.map(|budget| start + budget);

        let mut report = ScanReport::new(trigger);
        let mut observed = HashSet::new();
        let mut traversed: HashSet<String> = HashSet::new();

        'owners: for child in top_level.into_iter().filter(|c| c.is_directory) {
            if past(deadline) {
                report.incomplete = true;
                break;
            }

            let folder = child.name;
            let Some(owner_id) = resolver.resolve(&folder) else {
                report.owners_unresolved += 1;
                info!(folder = %folder, "folder resolves to no owner; skipped");
                continue;
            };

            let owner_root = join_path(&self.options.root, &folder);
            let traversal = match list_owner_files(session, &folder, &owner_root) {
                Ok(traversal) => traversal,
                Err(e) => {
                    warn!(owner = %folder, error = %e, "owner traversal failed; skipping owner");
                    report.issues.push(ScanIssue::owner(&folder, e.to_string()));
                    continue;
                }
            };

            report.issues.extend(traversal.issues);
            traversed.insert(folder.clone());
            report.owners_scanned += 1;

            for file in traversal.files {
                if past(deadline) {
                    report.incomplete = true;
                    break 'owners;
                }

                let fp = fingerprint(&file);
                if self.registry.has(&fp)? {
                    report.skipped += 1;
                    observed.insert(fp);
                    continue;
                }

                let artifact_id = match self.catalog.create(&file, owner_id) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(
                            owner = %folder,
                            path = %file.relative_path,
                            error = %e,
                            "artifact creation failed; file skipped"
                        );
                        report
                            .issues
                            .push(ScanIssue::file(&folder, &file.relative_path, e.to_string()));
                        continue;
                    }
                };

                let entry = RegistryEntry {
                    fingerprint: fp.clone(),
                    owner_folder: file.owner_folder.clone(),
                    relative_path: file.relative_path.clone(),
                    artifact_id: artifact_id.clone(),
                    created_at: Utc::now(),
                    triggered_by: trigger,
                };
                if let Err(e) = self.registry.put(&entry) {
                    // The artifact exists but the registry cannot record it;
                    // continuing would duplicate it on the next pass too.
                    error!(
                        artifact = %artifact_id,
                        owner = %folder,
                        path = %file.relative_path,
                        error = %e,
                        "registry write failed after artifact creation; aborting pass"
                    );
                    return Err(e.into());
                }

                report.created += 1;
                observed.insert(fp);
                self.activity.append(&format!(
                    "created {}/{} for owner {} (artifact {})",
                    file.owner_folder, file.relative_path, owner_id, artifact_id
                ));
            }
        }

        Ok((report, observed, traversed))
    }

    fn connect_with_retry(&self) -> Result<Box<dyn StoreSession>, ScanError> {
        let attempts = self.options.connect_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.store.connect() {
                Ok(session) => return Ok(session),
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "store connect failed; retrying");
                    std::thread::sleep(Duration::from_millis(500 * attempt as u64));
                }
                Err(e) => return Err(ScanError::Connect(e)),
            }
        }
    }
}

fn past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
