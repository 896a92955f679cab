//! Model registry
//!
//! Resolves the model ids callers pass to the orchestrator. A miss is not an
//! error at this level; the orchestrator synthesizes a descriptor instead.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::ConfigProvider;
use crate::credentials::CredentialStore;
use crate::types::ModelDescriptor;

/// Read-only view of the model catalog
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Exact id match
    async fn find_model(&self, id: &str) -> Option<ModelDescriptor>;

    /// All known models
    async fn list_models(&self) -> Vec<ModelDescriptor>;
}

/// Registry over a fixed model list
///
/// Later entries with the same id replace earlier ones, so layering user
/// config under workspace config lets the workspace win.
#[derive(Debug, Default)]
pub struct StaticModelRegistry {
    models: RwLock<Vec<ModelDescriptor>>,
}

impl StaticModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        let registry = Self::default();
        for model in models {
            registry.insert(model);
        }
        registry
    }

    /// Build from config sources, lowest priority first
    pub async fn from_config(sources: &[Arc<dyn ConfigProvider>]) -> Self {
        let registry = Self::default();
        for source in sources {
            for model in source.get_models().await {
                registry.insert(model);
            }
        }
        registry
    }

    /// Add or replace a model
    pub fn insert(&self, model: ModelDescriptor) {
        let mut models = self.models.write();
        match models.iter_mut().find(|m| m.id == model.id) {
            Some(slot) => *slot = model,
            None => models.push(model),
        }
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ModelRegistry for StaticModelRegistry {
    async fn find_model(&self, id: &str) -> Option<ModelDescriptor> {
        self.models.read().iter().find(|m| m.id == id).cloned()
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        self.models.read().clone()
    }
}

/// Fill in a missing API key from the credential store
///
/// Looks up the vendor prefix of the id first (`openrouter/...`), then the
/// provider family name.
pub fn attach_credential(mut model: ModelDescriptor, store: &dyn CredentialStore) -> ModelDescriptor {
    if model.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        return model;
    }
    let vendor = model.id.split_once('/').map(|(v, _)| v.to_string());
    model.api_key = vendor
        .and_then(|v| store.get(&v))
        .or_else(|| store.get(model.provider.as_str()));
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;
    use crate::credentials::MemoryCredentialStore;
    use crate::types::ProviderFamily;

    #[tokio::test]
    async fn test_exact_id_lookup() {
        let registry = StaticModelRegistry::new(vec![
            ModelDescriptor::new("gpt-4o", ProviderFamily::OpenAi),
            ModelDescriptor::new("sonnet", ProviderFamily::Anthropic),
        ]);
        assert_eq!(
            registry.find_model("sonnet").await.map(|m| m.provider),
            Some(ProviderFamily::Anthropic)
        );
        assert!(registry.find_model("Sonnet").await.is_none());
        assert_eq!(registry.list_models().await.len(), 2);
    }

    #[tokio::test]
    async fn test_from_config_later_sources_win() {
        let user: Arc<dyn ConfigProvider> = Arc::new(MemoryConfigProvider::with_models(vec![
            ModelDescriptor::new("fast", ProviderFamily::OpenAi),
            ModelDescriptor::new("local", ProviderFamily::Ollama),
        ]));
        let workspace: Arc<dyn ConfigProvider> = Arc::new(MemoryConfigProvider::with_models(vec![
            ModelDescriptor::new("fast", ProviderFamily::Gemini),
        ]));

        let registry = StaticModelRegistry::from_config(&[user, workspace]).await;
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.find_model("fast").await.map(|m| m.provider),
            Some(ProviderFamily::Gemini)
        );
    }

    #[test]
    fn test_attach_credential() {
        let store = MemoryCredentialStore::new()
            .with_key("openai", "sk-openai")
            .with_key("openrouter", "sk-or");

        let plain = attach_credential(ModelDescriptor::new("gpt-4o", ProviderFamily::OpenAi), &store);
        assert_eq!(plain.api_key.as_deref(), Some("sk-openai"));

        let routed = attach_credential(ModelDescriptor::synthesize("openrouter/qwen-max"), &store);
        assert_eq!(routed.api_key.as_deref(), Some("sk-or"));

        let explicit = attach_credential(
            ModelDescriptor::new("gpt-4o", ProviderFamily::OpenAi).with_api_key("sk-inline"),
            &store,
        );
        assert_eq!(explicit.api_key.as_deref(), Some("sk-inline"));
    }
}
