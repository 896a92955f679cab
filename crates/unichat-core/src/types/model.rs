//! Model descriptor and provider family types

use serde::{Deserialize, Serialize};

/// Backend family - decides which adapter speaks to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    /// OpenAI chat completions and compatible APIs
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
    /// Scripted backend for tests and demos
    Mock,
}

impl ProviderFamily {
    /// Identifier used in config files and credential lookups
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::Gemini => "gemini",
            ProviderFamily::Ollama => "ollama",
            ProviderFamily::Mock => "mock",
        }
    }

    /// All families
    pub fn all() -> [ProviderFamily; 5] {
        [
            ProviderFamily::OpenAi,
            ProviderFamily::Anthropic,
            ProviderFamily::Gemini,
            ProviderFamily::Ollama,
            ProviderFamily::Mock,
        ]
    }

    /// Parse a provider or vendor name
    ///
    /// OpenAI-compatible vendors map to the OpenAI family.
    pub fn from_vendor(name: &str) -> Option<ProviderFamily> {
        match name.to_lowercase().as_str() {
            "openai" | "azure" | "openrouter" | "deepseek" | "groq" | "xai" | "mistral"
            | "together" | "fireworks" | "moonshot" | "qwen" | "dashscope" | "siliconflow" => {
                Some(ProviderFamily::OpenAi)
            }
            "anthropic" | "claude" => Some(ProviderFamily::Anthropic),
            "gemini" | "google" => Some(ProviderFamily::Gemini),
            "ollama" => Some(ProviderFamily::Ollama),
            "mock" => Some(ProviderFamily::Mock),
            _ => None,
        }
    }

    /// Guess a family from a bare model name
    pub fn infer_from_model(model: &str) -> ProviderFamily {
        let lower = model.to_lowercase();
        if let Some((prefix, _)) = lower.split_once('/') {
            if let Some(family) = Self::from_vendor(prefix) {
                return family;
            }
        }
        if lower.starts_with("claude") {
            ProviderFamily::Anthropic
        } else if lower.starts_with("gemini") || lower.starts_with("imagen") {
            ProviderFamily::Gemini
        } else if lower.starts_with("mock") {
            ProviderFamily::Mock
        } else {
            ProviderFamily::OpenAi
        }
    }

    /// Default API base for this family
    pub fn default_api_base(&self) -> &'static str {
        match self {
            ProviderFamily::OpenAi => "https://api.openai.com/v1",
            ProviderFamily::Anthropic => "https://api.anthropic.com/v1",
            ProviderFamily::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderFamily::Ollama => "http://localhost:11434",
            ProviderFamily::Mock => "http://localhost:0/mock",
        }
    }

    /// Whether requests need an API key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderFamily::Ollama | ProviderFamily::Mock)
    }
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default API base for an OpenAI-compatible vendor name
pub fn vendor_api_base(vendor: &str) -> Option<&'static str> {
    match vendor.to_lowercase().as_str() {
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "xai" => Some("https://api.x.ai/v1"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "fireworks" => Some("https://api.fireworks.ai/inference/v1"),
        _ => None,
    }
}

/// Model capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Accepts image input
    #[serde(default)]
    pub image_input: bool,
    /// Supports tool/function calling
    #[serde(default)]
    pub tool_calling: bool,
    /// Emits a reasoning stream
    #[serde(default)]
    pub reasoning: bool,
    /// Produces images
    #[serde(default)]
    pub image_generation: bool,
    /// Has built-in web search
    #[serde(default)]
    pub web_search: bool,
}

impl ModelCapabilities {
    /// Typical chat model: images in, tools
    pub fn chat() -> Self {
        Self {
            image_input: true,
            tool_calling: true,
            ..Default::default()
        }
    }

    /// Everything enabled
    pub fn full() -> Self {
        Self {
            image_input: true,
            tool_calling: true,
            reasoning: true,
            image_generation: true,
            web_search: true,
        }
    }
}

/// Everything a turn needs to know about its model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Registry id (what callers pass to the orchestrator)
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Backend family
    pub provider: ProviderFamily,
    /// Model name as the backend expects it
    #[serde(default)]
    pub model: String,
    /// Custom API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Credential; resolved from the credential store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub capabilities: ModelCapabilities,
    /// Context length in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
}

impl ModelDescriptor {
    /// Create a descriptor whose backend model name equals its id
    pub fn new(id: impl Into<String>, provider: ProviderFamily) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            model: id.clone(),
            id,
            provider,
            api_base: None,
            api_key: None,
            capabilities: ModelCapabilities::default(),
            context_length: None,
        }
    }

    /// Minimal descriptor for an id the registry does not know
    ///
    /// A `vendor/model` id keeps only the model part as the backend name
    /// and picks up the vendor's default base URL.
    pub fn synthesize(id: &str) -> Self {
        let family = ProviderFamily::infer_from_model(id);
        let mut descriptor = Self::new(id, family);
        if let Some((vendor, model)) = id.split_once('/') {
            if ProviderFamily::from_vendor(vendor).is_some() {
                descriptor.model = model.to_string();
                descriptor.api_base = vendor_api_base(vendor).map(str::to_string);
            }
        }
        descriptor.capabilities = ModelCapabilities::chat();
        descriptor
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Effective API base without a trailing slash
    pub fn api_base(&self) -> String {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
            .trim_end_matches('/')
            .to_string()
    }

    /// Backend model name (falls back to the id)
    pub fn model_name(&self) -> &str {
        if self.model.is_empty() {
            &self.id
        } else {
            &self.model
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let model = ModelDescriptor::new("gpt4", ProviderFamily::OpenAi)
            .with_model("gpt-4o")
            .with_api_key("sk-test")
            .with_capabilities(ModelCapabilities::full());

        assert_eq!(model.id, "gpt4");
        assert_eq!(model.model_name(), "gpt-4o");
        assert_eq!(model.api_key.as_deref(), Some("sk-test"));
        assert!(model.capabilities.tool_calling);
        assert_eq!(model.api_base(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_synthesize_unknown_model() {
        let model = ModelDescriptor::synthesize("gpt-x-unknown");
        assert_eq!(model.provider, ProviderFamily::OpenAi);
        assert_eq!(model.model_name(), "gpt-x-unknown");
        assert!(model.api_key.is_none());
    }

    #[test]
    fn test_synthesize_vendor_prefixed() {
        let model = ModelDescriptor::synthesize("openrouter/meta-llama/llama-3");
        assert_eq!(model.provider, ProviderFamily::OpenAi);
        assert_eq!(model.model_name(), "meta-llama/llama-3");
        assert_eq!(model.api_base(), "https://openrouter.ai/api/v1");

        let claude = ModelDescriptor::synthesize("claude-sonnet-4");
        assert_eq!(claude.provider, ProviderFamily::Anthropic);
    }

    #[test]
    fn test_family_serialization() {
        let json = serde_json::to_string(&ProviderFamily::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let family: ProviderFamily = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(family, ProviderFamily::Gemini);
    }

    #[test]
    fn test_api_base_trims_slash() {
        let model = ModelDescriptor::new("m", ProviderFamily::Ollama).with_api_base("http://host:11434/");
        assert_eq!(model.api_base(), "http://host:11434");
    }
}
