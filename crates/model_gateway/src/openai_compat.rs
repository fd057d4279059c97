//! Minimal client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Used for providers reached through an OpenAI-shaped API (xAI, Gemini's
//! OpenAI endpoint, OpenAI itself) and for any model that must see images.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::{json, Value};

use browzee_core::{
    traits::LlmClient,
    types::{ChatMessage, ContentPart},
    Error, Result,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Secret<String>,
    model: String,
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Secret<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn message_json(msg: &ChatMessage) -> Value {
        let parts: Vec<Value> = msg
            .content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                ContentPart::Image { url } => {
                    json!({ "type": "image_url", "image_url": { "url": url } })
                }
            })
            .collect();
        json!({ "role": msg.role.as_str(), "content": parts })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(Self::message_json).collect::<Vec<_>>(),
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn ainvoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, url = %url, messages = messages.len(), "Calling chat completions");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| Error::model(format!("request to {} failed: {}", self.base_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::model(format!(
                "{} returned {}: {}",
                self.model,
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::model(format!("invalid completion response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::model("completion response had no content"))?;

        Ok(ChatMessage::assistant(content))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_parts_use_image_url() {
        let client = OpenAiCompatClient::new(
            "https://example.com/v1/",
            Secret::new("k".to_string()),
            "grok-2-vision",
        )
        .with_temperature(0.0);
        let body = client.request_body(&[ChatMessage::user_with_image(
            "describe",
            "data:image/png;base64,AAAA",
        )]);

        assert_eq!(client.base_url, "https://example.com/v1");
        assert_eq!(body["model"], "grok-2-vision");
        assert_eq!(body["temperature"], 0.0);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }
}
