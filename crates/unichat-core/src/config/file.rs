//! File-based configuration provider (YAML)
//!
//! Supports user-level (~/.config/unichat/config.yaml) and workspace-level
//! (.config/unichat/config.yaml) config.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::CompletionSettings;
use super::traits::{delete_model, insert_model, replace_model, ConfigProvider, ConfigResult};
use crate::types::ModelDescriptor;

/// Configuration file structure
///
/// ```yaml
/// models:
///   - id: fast
///     provider: openai
///     model: gpt-4o-mini
///     capabilities: { image_input: true, tool_calling: true }
/// settings:
///   context_count: 10
///   retry: { max_attempts: 3 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    /// Model catalog
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,

    #[serde(default)]
    pub settings: CompletionSettings,
}

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/unichat/config.yaml)
    User,
    /// Workspace-level config (.config/unichat/config.yaml in workspace root)
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// File-based configuration provider
///
/// Reads and writes configuration from YAML files. A missing file reads as
/// an empty catalog with default settings; writes create it.
///
/// # Example
///
/// ```no_run
/// use unichat_core::config::FileConfigProvider;
///
/// let user_config = FileConfigProvider::user();
/// let workspace_config = FileConfigProvider::workspace("/path/to/workspace");
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<ConfigFile>>,
}

impl FileConfigProvider {
    /// Create a new file config provider for a specific path
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// Create a user-level config provider (~/.config/unichat/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("unichat").join("config.yaml"), ConfigLevel::User)
    }

    /// Create a workspace-level config provider (.config/unichat/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root.as_ref().join(".config").join("unichat").join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> ConfigResult<ConfigFile> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    fn save(&self, config: &ConfigFile) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_yaml::to_string(config)?)?;
        *self.cache.write() = Some(config.clone());
        Ok(())
    }

    /// Cached config, loaded on first use
    pub fn config(&self) -> ConfigResult<ConfigFile> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }
        self.reload()
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<ConfigFile> {
        let config = self.load()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Apply `edit` to the current config and persist it
    fn modify<F>(&self, edit: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut ConfigFile) -> ConfigResult<()>,
    {
        let mut config = self.config()?;
        edit(&mut config)?;
        self.save(&config)
    }

    /// Copy the current file to `config.yaml.backup`
    pub fn backup(&self) -> ConfigResult<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }
        let backup_path = self.path.with_extension("yaml.backup");
        fs::copy(&self.path, &backup_path)?;
        Ok(Some(backup_path))
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    // A broken file reads as empty; the error surfaces on the next write
    async fn get_models(&self) -> Vec<ModelDescriptor> {
        self.config().map(|c| c.models).unwrap_or_default()
    }

    async fn get_settings(&self) -> CompletionSettings {
        self.config().map(|c| c.settings).unwrap_or_default()
    }

    async fn add_model(&self, model: ModelDescriptor) -> ConfigResult<()> {
        self.modify(|c| insert_model(&mut c.models, model))
    }

    async fn update_model(&self, id: &str, model: ModelDescriptor) -> ConfigResult<()> {
        self.modify(|c| replace_model(&mut c.models, id, model))
    }

    async fn remove_model(&self, id: &str) -> ConfigResult<()> {
        self.modify(|c| delete_model(&mut c.models, id))
    }

    async fn set_settings(&self, settings: CompletionSettings) -> ConfigResult<()> {
        self.modify(|c| {
            c.settings = settings;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::types::{ModelCapabilities, ProviderFamily};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_config_provider() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let provider = FileConfigProvider::new(&path, ConfigLevel::User);

        assert!(!provider.exists());
        assert!(provider.get_models().await.is_empty());

        provider
            .add_model(
                ModelDescriptor::new("sonnet", ProviderFamily::Anthropic)
                    .with_model("claude-sonnet-4")
                    .with_capabilities(ModelCapabilities::chat()),
            )
            .await
            .unwrap();
        assert!(provider.exists());

        // a fresh provider sees the persisted model
        let reread = FileConfigProvider::new(&path, ConfigLevel::User);
        let models = reread.get_models().await;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].model_name(), "claude-sonnet-4");
        assert!(models[0].capabilities.tool_calling);
    }

    #[tokio::test]
    async fn test_yaml_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "models:\n  - id: local\n    provider: ollama\n    model: qwen3\nsettings:\n  context_count: 6\n",
        )
        .unwrap();

        let provider = FileConfigProvider::new(&path, ConfigLevel::Workspace);
        let models = provider.get_models().await;
        assert_eq!(models[0].provider, ProviderFamily::Ollama);
        assert_eq!(models[0].api_base(), "http://localhost:11434");
        let settings = provider.get_settings().await;
        assert_eq!(settings.context_count, 6);
        assert_eq!(settings.max_tool_rounds, 10);

        provider.set_settings(CompletionSettings::default()).await.unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("context_count: 10"));
        assert!(content.contains("qwen3"));
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_reported_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "models: [oops").unwrap();

        let provider = FileConfigProvider::new(&path, ConfigLevel::User);
        assert!(provider.get_models().await.is_empty());
        let err = provider
            .add_model(ModelDescriptor::new("x", ProviderFamily::OpenAi))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let provider = FileConfigProvider::new(&path, ConfigLevel::User);
        assert!(provider.backup().unwrap().is_none());

        fs::write(&path, "models: []").unwrap();
        let backup_path = provider.backup().unwrap().unwrap();
        assert!(backup_path.exists());
        assert!(backup_path.to_string_lossy().ends_with("config.yaml.backup"));
    }

    #[test]
    fn test_workspace_path() {
        let provider = FileConfigProvider::workspace("/ws");
        assert_eq!(provider.path(), Path::new("/ws/.config/unichat/config.yaml"));
        assert_eq!(provider.level().as_str(), "workspace");
    }
}
