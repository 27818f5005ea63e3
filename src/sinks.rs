//! Built-in collaborator implementations for standalone deployments.
//!
//! Real installations back [`Catalog`] with their catalog system; the
//! standalone binary spools artifacts as JSON documents on disk instead,
//! one file per artifact, so a downstream importer can pick them up. The
//! activity log is a plain appended line file.

use crate::catalog::{ActivityLog, Catalog};
use crate::error::CatalogError;
use crate::types::{ArtifactId, FileDescriptor, OwnerId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// The JSON document written per artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub artifact_id: ArtifactId,
    pub owner_id: i64,
    pub owner_folder: String,
    pub relative_path: String,
    pub name: String,
    pub size: u64,
    pub modified_at: i64,
    pub created_at: DateTime<Utc>,
}

/// Catalog spooling one JSON document per artifact into a directory.
/// Deletion removes the document; deleting an already-absent artifact is a
/// no-op (the outcome is the same).
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn artifact_path(&self, artifact: &ArtifactId) -> PathBuf {
        self.dir.join(format!("{}.json", artifact.0))
    }

    /// Load a spooled record, mostly for inspection and tests.
    pub fn load(&self, artifact: &ArtifactId) -> std::io::Result<ArtifactRecord> {
        let bytes = std::fs::read(self.artifact_path(artifact))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl Catalog for DirectoryCatalog {
    fn create(&self, file: &FileDescriptor, owner: OwnerId) -> Result<ArtifactId, CatalogError> {
        let artifact_id = ArtifactId(Uuid::new_v4().to_string());
        let record = ArtifactRecord {
            artifact_id: artifact_id.clone(),
            owner_id: owner.0,
            owner_folder: file.owner_folder.clone(),
            relative_path: file.relative_path.clone(),
            name: file.name.clone(),
            size: file.size,
            modified_at: file.modified_at,
            created_at: Utc::now(),
        };
        let payload = serde_json::to_vec_pretty(&record)
            .map_err(|e| CatalogError::Create(e.to_string()))?;
        std::fs::write(self.artifact_path(&artifact_id), payload)
            .map_err(|e| CatalogError::Create(e.to_string()))?;
        debug!(artifact = %artifact_id, path = %file.relative_path, "artifact spooled");
        Ok(artifact_id)
    }

    fn delete(&self, artifact: &ArtifactId) -> Result<(), CatalogError> {
        match std::fs::remove_file(self.artifact_path(artifact)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(artifact = %artifact, "artifact already absent");
                Ok(())
            }
            Err(e) => Err(CatalogError::Delete(e.to_string())),
        }
    }
}

/// Append-only activity log writing timestamped lines to a file. Write
/// failures are logged and swallowed; a broken activity log never fails a
/// scan.
pub struct FileActivityLog {
    path: PathBuf,
}

impl FileActivityLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ActivityLog for FileActivityLog {
    fn append(&self, line: &str) {
        let stamped = format!(
            "{} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            line
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(stamped.as_bytes()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "activity log write failed");
        }
    }
}
