//! LLM provider construction.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::Secret;

use browzee_core::{
    config::{ModelConfig, ModelsConfig},
    traits::LlmClient,
    types::{ChatMessage, Role},
    Error, Result,
};

use crate::openai_compat::{OpenAiCompatClient, OPENAI_BASE_URL};
use crate::rig_client::{RigConfig, RigLlmClient};

/// Offline client that finishes immediately, echoing the last user turn.
#[derive(Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn ainvoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_default();
        let preview: String = last_user.chars().take(200).collect();
        Ok(ChatMessage::assistant(format!(
            "FINAL ANSWER: Mock response to: {}",
            preview
        )))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn resolve_key(cfg: &ModelConfig) -> Option<Secret<String>> {
    if let Some(key) = &cfg.api_key {
        return Some(key.clone());
    }
    cfg.api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|v| !v.is_empty())
        .map(Secret::new)
}

/// Build a client for one model definition.
pub fn build_client(cfg: &ModelConfig) -> Result<Arc<dyn LlmClient>> {
    let provider = cfg.provider.to_lowercase();
    let client: Arc<dyn LlmClient> = match provider.as_str() {
        "mock" => Arc::new(MockLlmClient),
        "openai_compatible" | "xai" | "gemini" => {
            let base_url = cfg.base_url.clone().ok_or_else(|| {
                Error::Config(format!("model {} needs a base_url", cfg.model))
            })?;
            let key = resolve_key(cfg).ok_or_else(|| {
                Error::Config(format!("no API key configured for model {}", cfg.model))
            })?;
            let mut client = OpenAiCompatClient::new(base_url, key, &cfg.model);
            if let Some(t) = cfg.temperature {
                client = client.with_temperature(t);
            }
            Arc::new(client)
        }
        "openai" => match resolve_key(cfg) {
            // Explicit keys and custom endpoints go through the HTTP client
            Some(key) => {
                let base_url = cfg.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                let mut client = OpenAiCompatClient::new(base_url, key, &cfg.model);
                if let Some(t) = cfg.temperature {
                    client = client.with_temperature(t);
                }
                Arc::new(client)
            }
            None => Arc::new(RigLlmClient::new(with_temperature(
                RigConfig::openai(&cfg.model),
                cfg.temperature,
            ))),
        },
        "anthropic" => Arc::new(RigLlmClient::new(with_temperature(
            RigConfig::anthropic(&cfg.model),
            cfg.temperature,
        ))),
        other => {
            return Err(Error::Config(format!("unknown model provider: {}", other)));
        }
    };

    tracing::debug!(provider = %provider, model = %cfg.model, "Model client ready");
    Ok(client)
}

fn with_temperature(config: RigConfig, temperature: Option<f32>) -> RigConfig {
    match temperature {
        Some(t) => config.with_temperature(t),
        None => config,
    }
}

/// The models a running service needs.
#[derive(Clone)]
pub struct ModelSet {
    pub chat: Arc<dyn LlmClient>,
    pub planner: Option<Arc<dyn LlmClient>>,
    pub vision: Option<Arc<dyn LlmClient>>,
}

impl ModelSet {
    /// Build the set. The chat model is required; a vision model that cannot
    /// be built is skipped with a warning.
    pub fn from_config(cfg: &ModelsConfig) -> Result<Self> {
        let chat = build_client(&cfg.chat)?;
        let planner = cfg.planner.as_ref().map(build_client).transpose()?;
        let vision = match cfg.vision.as_ref().map(build_client).transpose() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Vision model unavailable, page-context chat falls back to the chat model");
                None
            }
        };
        Ok(Self {
            chat,
            planner,
            vision,
        })
    }

    /// All roles served by one client.
    pub fn single(client: Arc<dyn LlmClient>) -> Self {
        Self {
            chat: client.clone(),
            planner: None,
            vision: Some(client),
        }
    }

    pub fn vision_or_chat(&self) -> Arc<dyn LlmClient> {
        self.vision.clone().unwrap_or_else(|| self.chat.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_echoes() {
        let reply = MockLlmClient
            .ainvoke(&[ChatMessage::system("sys"), ChatMessage::user("open example.com")])
            .await
            .unwrap();
        assert_eq!(reply.text(), "FINAL ANSWER: Mock response to: open example.com");
    }

    #[test]
    fn test_build_client_rejects_unknown_provider() {
        let cfg = ModelConfig {
            provider: "carrier-pigeon".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(build_client(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_compatible_provider_needs_base_url() {
        let cfg = ModelConfig {
            provider: "openai_compatible".into(),
            api_key: Some(Secret::new("k".into())),
            ..ModelConfig::default()
        };
        assert!(build_client(&cfg).is_err());

        let cfg = ModelConfig {
            base_url: Some("http://localhost:1234/v1".into()),
            ..cfg
        };
        assert_eq!(build_client(&cfg).unwrap().name(), "gpt-4.1");
    }

    #[test]
    fn test_model_set_tolerates_missing_vision() {
        let cfg = ModelsConfig {
            chat: ModelConfig {
                provider: "mock".into(),
                ..ModelConfig::default()
            },
            planner: None,
            vision: Some(ModelConfig {
                provider: "openai_compatible".into(),
                base_url: None,
                ..ModelConfig::default()
            }),
        };
        let set = ModelSet::from_config(&cfg).unwrap();
        assert!(set.vision.is_none());
        assert_eq!(set.vision_or_chat().name(), "mock");
    }
}
