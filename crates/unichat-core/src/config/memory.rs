//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::file::ConfigFile;
use super::settings::CompletionSettings;
use super::traits::{delete_model, insert_model, replace_model, ConfigProvider, ConfigResult};
use crate::types::ModelDescriptor;

/// In-memory configuration provider for testing and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: RwLock<ConfigFile>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with an initial model list
    pub fn with_models(models: Vec<ModelDescriptor>) -> Self {
        Self {
            config: RwLock::new(ConfigFile {
                models,
                settings: CompletionSettings::default(),
            }),
        }
    }

    /// Builder-style settings
    pub fn with_settings(self, settings: CompletionSettings) -> Self {
        self.config.write().settings = settings;
        self
    }

    pub fn clear(&self) {
        *self.config.write() = ConfigFile::default();
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn get_models(&self) -> Vec<ModelDescriptor> {
        self.config.read().models.clone()
    }

    async fn get_settings(&self) -> CompletionSettings {
        self.config.read().settings.clone()
    }

    async fn add_model(&self, model: ModelDescriptor) -> ConfigResult<()> {
        insert_model(&mut self.config.write().models, model)
    }

    async fn update_model(&self, id: &str, model: ModelDescriptor) -> ConfigResult<()> {
        replace_model(&mut self.config.write().models, id, model)
    }

    async fn remove_model(&self, id: &str) -> ConfigResult<()> {
        delete_model(&mut self.config.write().models, id)
    }

    async fn set_settings(&self, settings: CompletionSettings) -> ConfigResult<()> {
        self.config.write().settings = settings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::types::ProviderFamily;

    #[tokio::test]
    async fn test_memory_config_provider() {
        let config = MemoryConfigProvider::new();
        assert!(config.get_models().await.is_empty());

        config
            .add_model(ModelDescriptor::new("gpt-4o", ProviderFamily::OpenAi))
            .await
            .unwrap();
        assert_eq!(config.get_models().await.len(), 1);

        // ids are case-insensitive
        assert!(matches!(
            config.add_model(ModelDescriptor::new("GPT-4o", ProviderFamily::OpenAi)).await,
            Err(ConfigError::ModelExists(_))
        ));

        let updated = ModelDescriptor::new("gpt-4o", ProviderFamily::OpenAi).with_api_base("https://proxy/v1");
        config.update_model("gpt-4o", updated).await.unwrap();
        assert_eq!(config.get_models().await[0].api_base.as_deref(), Some("https://proxy/v1"));

        config.remove_model("gpt-4o").await.unwrap();
        assert!(matches!(
            config.remove_model("gpt-4o").await,
            Err(ConfigError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_roundtrip() {
        let config = MemoryConfigProvider::new();
        assert_eq!(config.get_settings().await, CompletionSettings::default());

        let settings = CompletionSettings {
            context_count: 2,
            ..Default::default()
        };
        config.set_settings(settings.clone()).await.unwrap();
        assert_eq!(config.get_settings().await, settings);
    }
}
