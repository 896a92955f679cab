//! In-memory credential store

use parking_lot::RwLock;
use std::collections::HashMap;

use super::traits::{CredentialError, CredentialResult, CredentialStore};

/// Read-write store for tests and ephemeral keys; keys are case-insensitive
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_key(self, key: &str, value: &str) -> Self {
        self.keys.write().insert(key.to_lowercase(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.keys.read().get(&key.to_lowercase()).cloned()
    }

    fn store(&self, key: &str, value: &str) -> CredentialResult<()> {
        self.keys.write().insert(key.to_lowercase(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> CredentialResult<()> {
        self.keys
            .write()
            .remove(&key.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new().with_key("OpenAI", "sk-1");
        assert_eq!(store.get("openai"), Some("sk-1".to_string()));

        store.store("anthropic", "ak-1").unwrap();
        assert_eq!(store.len(), 2);

        store.delete("anthropic").unwrap();
        assert_eq!(
            store.delete("anthropic"),
            Err(CredentialError::NotFound("anthropic".into()))
        );
        assert!(!store.is_empty());
    }
}
