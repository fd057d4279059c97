//! Rig LLM client adapter.
//!
//! Wraps Rig's Agent for integration with our LlmClient trait. Rig agents
//! take a single prompt string, so the conversation is flattened and image
//! parts are dropped; use the OpenAI-compatible client for vision.

use async_trait::async_trait;

use browzee_core::{
    traits::LlmClient,
    types::{ChatMessage, ContentPart, Role},
    Error, Result,
};

// Import required Rig traits
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;

/// Provider type for Rig clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigProvider {
    OpenAI,
    Anthropic,
}

impl RigProvider {
    fn key_var(&self) -> &'static str {
        match self {
            RigProvider::OpenAI => "OPENAI_API_KEY",
            RigProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Configuration for Rig client.
#[derive(Debug, Clone)]
pub struct RigConfig {
    /// Provider to use.
    pub provider: RigProvider,
    /// Model name.
    pub model: String,
    /// System prompt.
    pub system_prompt: Option<String>,
    /// Temperature (0.0 - 1.0).
    pub temperature: Option<f32>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            provider: RigProvider::OpenAI,
            model: "gpt-4.1".to_string(),
            system_prompt: None,
            temperature: None,
        }
    }
}

impl RigConfig {
    /// Create config for OpenAI.
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            provider: RigProvider::OpenAI,
            model: model.into(),
            ..Default::default()
        }
    }

    /// Create config for Anthropic.
    pub fn anthropic(model: impl Into<String>) -> Self {
        Self {
            provider: RigProvider::Anthropic,
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Rig-based LLM client.
pub struct RigLlmClient {
    config: RigConfig,
}

impl RigLlmClient {
    /// Create a new Rig client with the given configuration.
    pub fn new(config: RigConfig) -> Self {
        Self { config }
    }

    /// Create a client for OpenAI GPT-4.1.
    pub fn gpt41() -> Self {
        Self::new(RigConfig::openai("gpt-4.1"))
    }

    /// Create a client for Claude Sonnet.
    pub fn claude_sonnet() -> Self {
        Self::new(RigConfig::anthropic("claude-3-7-sonnet-latest"))
    }

    /// Build messages into a prompt string.
    fn build_prompt(&self, messages: &[ChatMessage]) -> String {
        let mut prompt = String::new();

        for msg in messages {
            let label = match msg.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            let images = msg
                .content
                .iter()
                .filter(|p| matches!(p, ContentPart::Image { .. }))
                .count();
            if images > 0 {
                tracing::debug!(images, "Dropping image parts for text-only model");
            }
            prompt.push_str(&format!("{}: {}\n\n", label, msg.text()));
        }

        prompt
    }

    async fn call_openai(&self, prompt: &str) -> Result<String> {
        use rig::providers::openai;

        let client = openai::Client::from_env();
        let mut agent_builder = client.agent(&self.config.model);
        if let Some(ref system) = self.config.system_prompt {
            agent_builder = agent_builder.preamble(system);
        }
        if let Some(t) = self.config.temperature {
            agent_builder = agent_builder.temperature(t as f64);
        }
        let agent = agent_builder.build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::ModelProvider(format!("OpenAI error: {}", e)))
    }

    async fn call_anthropic(&self, prompt: &str) -> Result<String> {
        use rig::providers::anthropic;

        let client = anthropic::Client::from_env();
        let mut agent_builder = client.agent(&self.config.model);
        if let Some(ref system) = self.config.system_prompt {
            agent_builder = agent_builder.preamble(system);
        }
        if let Some(t) = self.config.temperature {
            agent_builder = agent_builder.temperature(t as f64);
        }
        let agent = agent_builder.build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| Error::ModelProvider(format!("Anthropic error: {}", e)))
    }
}

#[async_trait]
impl LlmClient for RigLlmClient {
    async fn ainvoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        // Check env var first to avoid panic in from_env
        let var = self.config.provider.key_var();
        if std::env::var(var).is_err() {
            return Err(Error::ModelProvider(format!("{} not set", var)));
        }

        let prompt = self.build_prompt(messages);
        tracing::debug!(
            provider = ?self.config.provider,
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Calling LLM"
        );

        let response = match self.config.provider {
            RigProvider::OpenAI => self.call_openai(&prompt).await?,
            RigProvider::Anthropic => self.call_anthropic(&prompt).await?,
        };
        Ok(ChatMessage::assistant(response))
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Create a default LLM client based on available API keys.
pub fn create_default_client() -> Result<RigLlmClient> {
    if std::env::var("OPENAI_API_KEY").is_ok() {
        Ok(RigLlmClient::gpt41())
    } else if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        Ok(RigLlmClient::claude_sonnet())
    } else {
        Err(Error::ModelProvider(
            "No API key found. Set OPENAI_API_KEY or ANTHROPIC_API_KEY".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RigConfig::anthropic("claude-3-7-sonnet-latest")
            .with_system_prompt("You are a browsing assistant")
            .with_temperature(0.2);

        assert_eq!(config.provider, RigProvider::Anthropic);
        assert_eq!(config.system_prompt.as_deref(), Some("You are a browsing assistant"));
        assert_eq!(config.temperature, Some(0.2));
    }

    #[test]
    fn test_build_prompt_flattens_and_drops_images() {
        let client = RigLlmClient::gpt41();
        let messages = vec![
            ChatMessage::system("You are helpful"),
            ChatMessage::user_with_image("What is on the page?", "data:image/png;base64,AAAA"),
        ];

        let prompt = client.build_prompt(&messages);
        assert!(prompt.contains("System: You are helpful"));
        assert!(prompt.contains("User: What is on the page?"));
        assert!(!prompt.contains("base64"));
    }
}
