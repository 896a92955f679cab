//! Environment variable credential store

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;

use super::traits::CredentialStore;

/// Provider name to environment variable names, in lookup order
static ENV_VAR_MAP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("openai", vec!["OPENAI_API_KEY"]);
    m.insert("anthropic", vec!["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"]);
    m.insert("gemini", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("google", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("azure", vec!["AZURE_OPENAI_API_KEY", "AZURE_API_KEY"]);
    m.insert("ollama", vec!["OLLAMA_API_KEY"]);
    m
});

/// Read-only store over the process environment
///
/// `get("openrouter")` tries, in order: the key as a variable name, the
/// mapped variables for known providers, then `OPENROUTER_API_KEY`. Empty
/// values count as missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self
    }

    /// Environment variables consulted for `provider`
    pub fn env_vars_for(provider: &str) -> Vec<String> {
        let lower = provider.to_lowercase();
        let mut vars: Vec<String> = ENV_VAR_MAP
            .get(lower.as_str())
            .map(|v| v.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();
        let auto = format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"));
        if !vars.contains(&auto) {
            vars.push(auto);
        }
        vars
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

impl CredentialStore for EnvCredentialStore {
    fn name(&self) -> &str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        non_empty(key).or_else(|| Self::env_vars_for(key).iter().find_map(|v| non_empty(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialError;

    #[test]
    fn test_env_store_read_only() {
        let store = EnvCredentialStore::new();
        assert_eq!(store.store("x", "y"), Err(CredentialError::ReadOnly));
        assert_eq!(store.delete("x"), Err(CredentialError::ReadOnly));
    }

    #[test]
    fn test_env_vars_for_provider() {
        assert_eq!(EnvCredentialStore::env_vars_for("gemini"), vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        assert_eq!(EnvCredentialStore::env_vars_for("open-router"), vec!["OPEN_ROUTER_API_KEY"]);
    }

    #[test]
    fn test_env_store_lookup() {
        env::set_var("UNICHAT_TEST_VENDOR_API_KEY", "vk-1");
        let store = EnvCredentialStore::new();
        assert_eq!(store.get("unichat_test_vendor"), Some("vk-1".to_string()));
        assert_eq!(store.get("UNICHAT_TEST_VENDOR_API_KEY"), Some("vk-1".to_string()));
        env::remove_var("UNICHAT_TEST_VENDOR_API_KEY");

        env::set_var("UNICHAT_TEST_EMPTY_API_KEY", "");
        assert!(!store.has("unichat_test_empty"));
        env::remove_var("UNICHAT_TEST_EMPTY_API_KEY");
    }
}
