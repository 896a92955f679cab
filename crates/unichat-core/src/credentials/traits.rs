//! Credential store trait and errors

use thiserror::Error;

/// Errors from credential store operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("store is read-only")]
    ReadOnly,

    #[error("credential not found: {0}")]
    NotFound(String),
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// Source of API keys
///
/// Keys are looked up by provider or vendor name (`openai`, `openrouter`,
/// ...) or by a literal variable name such as `OPENAI_API_KEY`.
pub trait CredentialStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Look up a credential
    fn get(&self, key: &str) -> Option<String>;

    /// Store a credential
    fn store(&self, _key: &str, _value: &str) -> CredentialResult<()> {
        Err(CredentialError::ReadOnly)
    }

    /// Remove a credential
    fn delete(&self, _key: &str) -> CredentialResult<()> {
        Err(CredentialError::ReadOnly)
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}
