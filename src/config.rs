//! Settings for the sync engine.
//!
//! Settings are read once per scan pass. They cover the store connection,
//! the lock TTL, the enable flag, the state directory (registry database,
//! lock file, activity log, artifact spool) and, for standalone deployments,
//! the owners table backing identity resolution.

use crate::error::ConfigError;
use crate::store::{FileStore, FtpStore, LocalStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    /// Identity records for [`crate::owners::ConfigIdentityStore`].
    #[serde(default)]
    pub owners: Vec<OwnerRecord>,
}

/// Which store adapter to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Local,
    Ftp,
}

/// Store connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Root path under which owner folders live.
    pub root: String,

    /// Remote host (FTP only).
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_ftp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,

    /// Bounded number of connect attempts before the pass is aborted.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

/// Scan pass behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Lock staleness TTL. Must exceed the realistic worst-case scan
    /// duration or two passes can overlap after a premature reclaim.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Optional wall-clock budget for one pass; exceeded budget stops the
    /// pass with an incomplete report.
    #[serde(default)]
    pub scan_budget_secs: Option<u64>,

    /// Directory for registry database, lock file, logs and spool.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

/// One identity in the standalone owners table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerRecord {
    pub id: i64,
    pub name: String,
    /// Explicit folder-name attribute, for reverse lookup.
    #[serde(default)]
    pub folder: Option<String>,
}

fn default_ftp_port() -> u16 {
    21
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_io_timeout() -> u64 {
    30
}

fn default_connect_retries() -> u32 {
    3
}

fn default_enabled() -> bool {
    true
}

fn default_lock_ttl() -> u64 {
    3600
}

fn default_state_dir() -> String {
    "~/.driftwatch".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            lock_ttl_secs: default_lock_ttl(),
            scan_budget_secs: None,
            state_dir: default_state_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.root.is_empty() {
            return Err(ConfigError::Invalid("store.root must be set".to_string()));
        }
        if self.store.kind == StoreKind::Ftp
            && self.store.host.as_deref().unwrap_or("").is_empty()
        {
            return Err(ConfigError::Invalid(
                "store.host must be set for an FTP store".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the configured store adapter.
    pub fn build_store(&self) -> Result<Box<dyn FileStore>, ConfigError> {
        match self.store.kind {
            StoreKind::Local => Ok(Box::new(LocalStore::new())),
            StoreKind::Ftp => {
                let host = self.store.host.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("store.host must be set for an FTP store".to_string())
                })?;
                Ok(Box::new(FtpStore::new(
                    host,
                    self.store.port,
                    &self.store.username,
                    &self.store.password,
                    Duration::from_secs(self.store.connect_timeout_secs),
                    Duration::from_secs(self.store.io_timeout_secs),
                )))
            }
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        expand_tilde(Path::new(&self.sync.state_dir))
    }

    pub fn registry_path(&self) -> PathBuf {
        self.state_dir().join("registry.sqlite3")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("scan.lock")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.state_dir().join("catalog")
    }

    pub fn activity_log_path(&self) -> PathBuf {
        self.state_dir().join("activity.log")
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.sync.lock_ttl_secs)
    }

    pub fn scan_budget(&self) -> Option<Duration> {
        self.sync.scan_budget_secs.map(Duration::from_secs)
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [store]
            root = "/srv/files"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.kind, StoreKind::Local);
        assert_eq!(config.store.connect_retries, 3);
        assert!(config.sync.enabled);
        assert_eq!(config.sync.lock_ttl_secs, 3600);
        assert!(config.sync.scan_budget_secs.is_none());
        assert!(config.owners.is_empty());
    }

    #[test]
    fn test_ftp_config_roundtrip() {
        let config: Config = toml::from_str(
            r#"
            [store]
            kind = "ftp"
            root = "/incoming"
            host = "ftp.example.com"
            username = "sync"
            password = "secret"

            [sync]
            lock_ttl_secs = 600

            [[owners]]
            id = 7
            name = "alice"
            folder = "alice_files"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.store.kind, StoreKind::Ftp);
        assert_eq!(parsed.sync.lock_ttl_secs, 600);
        assert_eq!(parsed.owners.len(), 1);
        assert_eq!(parsed.owners[0].folder.as_deref(), Some("alice_files"));
    }

    #[test]
    fn test_ftp_without_host_rejected() {
        let config: Config = toml::from_str(
            r#"
            [store]
            kind = "ftp"
            root = "/incoming"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_paths() {
        let config: Config = toml::from_str(
            r#"
            [store]
            root = "/srv/files"

            [sync]
            state_dir = "/var/lib/driftwatch"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/var/lib/driftwatch/registry.sqlite3")
        );
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/var/lib/driftwatch/scan.lock")
        );
    }
}
