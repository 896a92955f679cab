//! Chained credential store

use std::sync::Arc;

use super::traits::{CredentialError, CredentialResult, CredentialStore};

/// Tries each store in order; writes go to the first one
pub struct ChainCredentialStore {
    stores: Vec<Arc<dyn CredentialStore>>,
}

impl ChainCredentialStore {
    pub fn new(stores: Vec<Arc<dyn CredentialStore>>) -> Self {
        Self { stores }
    }

    /// Name of the store holding `key`
    pub fn find_store(&self, key: &str) -> Option<&str> {
        self.stores.iter().find(|s| s.has(key)).map(|s| s.name())
    }
}

impl CredentialStore for ChainCredentialStore {
    fn name(&self) -> &str {
        "chain"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.stores.iter().find_map(|s| s.get(key))
    }

    fn store(&self, key: &str, value: &str) -> CredentialResult<()> {
        match self.stores.first() {
            Some(store) => store.store(key, value),
            None => Err(CredentialError::ReadOnly),
        }
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        match self.stores.first() {
            Some(store) => store.delete(key),
            None => Err(CredentialError::ReadOnly),
        }
    }
}
