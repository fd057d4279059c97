use serde::Deserialize;
use secrecy::Secret;
use std::path::Path;
use tokio::fs;

use browzee_core::{config::ModelConfig, Error, Result};

/// Provider catalogue, usually `providers.json` next to the binary.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub providers: Vec<ProviderDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderDefinition {
    pub name: String,
    pub base_url: Option<String>,
    pub api_key: Option<Secret<String>>,
    pub api_key_env: Option<String>,
    pub models: Vec<ModelDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefinition {
    pub id: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path).await
            .map_err(|e| Error::gateway(format!("Failed to read provider config: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::gateway(format!("Failed to parse provider config: {}", e)))?;

        Ok(config)
    }

    /// First model advertising `capability` (e.g. `chat`, `vision`).
    pub fn model_with_capability(&self, capability: &str) -> Option<ModelConfig> {
        self.providers.iter().find_map(|provider| {
            provider
                .models
                .iter()
                .find(|m| m.capabilities.iter().any(|c| c == capability))
                .map(|m| ModelConfig {
                    provider: provider.name.clone(),
                    model: m.id.clone(),
                    base_url: provider.base_url.clone(),
                    api_key: provider.api_key.clone(),
                    api_key_env: provider.api_key_env.clone(),
                    temperature: m.temperature,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_and_pick_by_capability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.json");
        std::fs::write(
            &path,
            r#"{
                "providers": [
                    {"name": "openai", "models": [{"id": "gpt-4.1", "capabilities": ["chat"]}]},
                    {"name": "openai_compatible", "base_url": "https://api.x.ai/v1",
                     "api_key_env": "XAI_API_KEY",
                     "models": [{"id": "grok-2-vision", "capabilities": ["vision"], "temperature": 0.0}]}
                ]
            }"#,
        )
        .unwrap();

        let cfg = ProviderConfig::load(&path).await.unwrap();
        let chat = cfg.model_with_capability("chat").unwrap();
        assert_eq!(chat.provider, "openai");
        assert_eq!(chat.model, "gpt-4.1");

        let vision = cfg.model_with_capability("vision").unwrap();
        assert_eq!(vision.base_url.as_deref(), Some("https://api.x.ai/v1"));
        assert_eq!(vision.api_key_env.as_deref(), Some("XAI_API_KEY"));
        assert!(cfg.model_with_capability("planner").is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        assert!(ProviderConfig::load("/definitely/not/here.json").await.is_err());
    }
}
