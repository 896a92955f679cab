//! Credential lookup for model descriptors without an inline API key
//!
//! - `CredentialStore` trait
//! - `EnvCredentialStore`: provider name to `<PROVIDER>_API_KEY` variables
//! - `MemoryCredentialStore`: in-memory, read-write
//! - `ChainCredentialStore`: first match across several stores

mod chain_store;
mod env_store;
mod memory_store;
mod traits;

pub use chain_store::ChainCredentialStore;
pub use env_store::EnvCredentialStore;
pub use memory_store::MemoryCredentialStore;
pub use traits::{CredentialError, CredentialResult, CredentialStore};
