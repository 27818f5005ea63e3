//! Owner-folder → identity resolution.
//!
//! A top-level folder belongs to exactly one owner identity or to nobody.
//! Resolution tries strategies in fixed order, first success wins:
//!
//! 1. exact identity-name match,
//! 2. trailing numeric id encoded in the folder name, validated against the
//!    identity store,
//! 3. reverse lookup of an identity whose stored folder attribute equals the
//!    folder name.
//!
//! A folder that resolves to nothing is skipped for the pass: no artifact is
//! ever created with unknown ownership.

use crate::config::OwnerRecord;
use crate::error::IdentityError;
use crate::types::OwnerId;
use regex::Regex;
use tracing::{debug, warn};

/// An identity known to the identity store.
#[derive(Debug, Clone)]
pub struct OwnerIdentity {
    pub id: OwnerId,
    pub name: String,
    /// Stored folder-name attribute, if the identity has one.
    pub folder: Option<String>,
}

/// Read-only identity lookup collaborator.
pub trait IdentityStore {
    fn find_by_name(&self, name: &str) -> Result<Option<OwnerIdentity>, IdentityError>;
    fn find_by_id(&self, id: i64) -> Result<Option<OwnerIdentity>, IdentityError>;
    fn find_by_folder(&self, folder: &str) -> Result<Option<OwnerIdentity>, IdentityError>;
}

/// Resolver applying the ordered strategies against an identity store.
pub struct OwnerResolver<'a> {
    identities: &'a dyn IdentityStore,
    id_suffix: Regex,
}

impl<'a> OwnerResolver<'a> {
    pub fn new(identities: &'a dyn IdentityStore) -> Self {
        Self {
            identities,
            id_suffix: Regex::new(r"(\d+)$").expect("static regex"),
        }
    }

    /// Resolve a folder name to an owner id, or `None` if no strategy
    /// matches. Lookup errors fail only the strategy that hit them.
    pub fn resolve(&self, folder_name: &str) -> Option<OwnerId> {
        if let Some(identity) = self.lookup(folder_name, "name", |s| s.find_by_name(folder_name)) {
            debug!(folder = %folder_name, owner = %identity.id, "resolved by exact name");
            return Some(identity.id);
        }

        if let Some(id) = self.numeric_suffix(folder_name) {
            if let Some(identity) = self.lookup(folder_name, "id", |s| s.find_by_id(id)) {
                debug!(folder = %folder_name, owner = %identity.id, "resolved by id suffix");
                return Some(identity.id);
            }
        }

        if let Some(identity) =
            self.lookup(folder_name, "folder", |s| s.find_by_folder(folder_name))
        {
            debug!(folder = %folder_name, owner = %identity.id, "resolved by folder attribute");
            return Some(identity.id);
        }

        None
    }

    fn lookup(
        &self,
        folder_name: &str,
        strategy: &str,
        f: impl FnOnce(&dyn IdentityStore) -> Result<Option<OwnerIdentity>, IdentityError>,
    ) -> Option<OwnerIdentity> {
        match f(self.identities) {
            Ok(found) => found,
            Err(e) => {
                warn!(folder = %folder_name, strategy, error = %e, "identity lookup failed");
                None
            }
        }
    }

    fn numeric_suffix(&self, folder_name: &str) -> Option<i64> {
        self.id_suffix
            .captures(folder_name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
    }
}

/// Identity store backed by the `[[owners]]` table in settings, for
/// standalone deployments. Real deployments implement [`IdentityStore`]
/// against their account system instead.
pub struct ConfigIdentityStore {
    records: Vec<OwnerRecord>,
}

impl ConfigIdentityStore {
    pub fn new(records: Vec<OwnerRecord>) -> Self {
        Self { records }
    }

    fn to_identity(record: &OwnerRecord) -> OwnerIdentity {
        OwnerIdentity {
            id: OwnerId(record.id),
            name: record.name.clone(),
            folder: record.folder.clone(),
        }
    }
}

impl IdentityStore for ConfigIdentityStore {
    fn find_by_name(&self, name: &str) -> Result<Option<OwnerIdentity>, IdentityError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.name == name)
            .map(Self::to_identity))
    }

    fn find_by_id(&self, id: i64) -> Result<Option<OwnerIdentity>, IdentityError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.id == id)
            .map(Self::to_identity))
    }

    fn find_by_folder(&self, folder: &str) -> Result<Option<OwnerIdentity>, IdentityError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.folder.as_deref() == Some(folder))
            .map(Self::to_identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConfigIdentityStore {
        ConfigIdentityStore::new(vec![
            OwnerRecord {
                id: 7,
                name: "alice".to_string(),
                folder: None,
            },
            OwnerRecord {
                id: 9,
                name: "bob".to_string(),
                folder: Some("bob_dropbox".to_string()),
            },
            OwnerRecord {
                id: 42,
                name: "customer_42".to_string(),
                folder: None,
            },
        ])
    }

    #[test]
    fn test_resolve_by_exact_name() {
        let store = store();
        let resolver = OwnerResolver::new(&store);
        assert_eq!(resolver.resolve("alice"), Some(OwnerId(7)));
    }

    #[test]
    fn test_resolve_by_numeric_suffix() {
        let store = store();
        let resolver = OwnerResolver::new(&store);
        // "uploads_9" is nobody's name, but 9 is bob's id.
        assert_eq!(resolver.resolve("uploads_9"), Some(OwnerId(9)));
    }

    #[test]
    fn test_resolve_by_folder_attribute() {
        let store = store();
        let resolver = OwnerResolver::new(&store);
        assert_eq!(resolver.resolve("bob_dropbox"), Some(OwnerId(9)));
    }

    #[test]
    fn test_exact_name_beats_numeric_suffix() {
        // "customer_42" is both an exact identity name (id 42) and carries
        // the numeric suffix 42; exact-name must win. Make them differ to
        // prove precedence.
        let store = ConfigIdentityStore::new(vec![
            OwnerRecord {
                id: 100,
                name: "customer_42".to_string(),
                folder: None,
            },
            OwnerRecord {
                id: 42,
                name: "someone_else".to_string(),
                folder: None,
            },
        ]);
        let resolver = OwnerResolver::new(&store);
        assert_eq!(resolver.resolve("customer_42"), Some(OwnerId(100)));
    }

    #[test]
    fn test_unresolved_folder() {
        let store = store();
        let resolver = OwnerResolver::new(&store);
        assert_eq!(resolver.resolve("mystery"), None);
    }

    #[test]
    fn test_suffix_must_validate_against_store() {
        let store = store();
        let resolver = OwnerResolver::new(&store);
        // 9999 is not a known id; strategy 2 must not invent an owner.
        assert_eq!(resolver.resolve("uploads_9999"), None);
    }
}
