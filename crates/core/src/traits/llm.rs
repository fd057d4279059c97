//! Language model traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

/// LLM client interface.
///
/// Implementations receive the full conversation and return one assistant
/// message. Image parts are only honoured by multimodal adapters.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate the next assistant message.
    async fn ainvoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage>;

    /// Model identifier, used in logs.
    fn name(&self) -> &str {
        "llm"
    }
}
