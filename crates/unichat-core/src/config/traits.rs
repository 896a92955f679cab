//! Configuration provider trait

use async_trait::async_trait;

use super::settings::CompletionSettings;
use crate::types::ModelDescriptor;

/// Configuration provider abstraction
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: YAML file (~/.config/unichat/config.yaml)
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Configured models
    async fn get_models(&self) -> Vec<ModelDescriptor>;

    /// Completion settings, defaults filled in
    async fn get_settings(&self) -> CompletionSettings;

    /// Add a model; ids are unique (case-insensitive)
    async fn add_model(&self, model: ModelDescriptor) -> ConfigResult<()>;

    /// Replace the model with the given id
    async fn update_model(&self, id: &str, model: ModelDescriptor) -> ConfigResult<()>;

    /// Remove a model
    async fn remove_model(&self, id: &str) -> ConfigResult<()>;

    /// Replace the completion settings
    async fn set_settings(&self, settings: CompletionSettings) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model already exists: {0}")]
    ModelExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Shared list operations for providers keeping a model list
pub(crate) fn insert_model(models: &mut Vec<ModelDescriptor>, model: ModelDescriptor) -> ConfigResult<()> {
    if models.iter().any(|m| m.id.eq_ignore_ascii_case(&model.id)) {
        return Err(ConfigError::ModelExists(model.id));
    }
    models.push(model);
    Ok(())
}

pub(crate) fn replace_model(
    models: &mut [ModelDescriptor],
    id: &str,
    model: ModelDescriptor,
) -> ConfigResult<()> {
    match models.iter_mut().find(|m| m.id.eq_ignore_ascii_case(id)) {
        Some(slot) => {
            *slot = model;
            Ok(())
        }
        None => Err(ConfigError::ModelNotFound(id.to_string())),
    }
}

pub(crate) fn delete_model(models: &mut Vec<ModelDescriptor>, id: &str) -> ConfigResult<()> {
    let before = models.len();
    models.retain(|m| !m.id.eq_ignore_ascii_case(id));
    if models.len() == before {
        Err(ConfigError::ModelNotFound(id.to_string()))
    } else {
        Ok(())
    }
}
