//! Mock implementations of core traits for testing.
//!
//! Scripted stand-ins for the LLM, the browser and the human operator that
//! the controller, store and gateway crates share in their tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    traits::{BrowserLauncher, BrowserSession, HumanInteraction, LlmClient},
    types::{BrowserAction, ChatMessage},
    Error, Result,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Minimal valid PNG header, enough for anything that only forwards bytes.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

// =============================================================================
// Mock LLM Client
// =============================================================================

/// Scripted mock LLM that returns predefined responses.
///
/// Responses are consumed in order; the last one repeats once the script is
/// exhausted.
pub struct MockLlm {
    responses: Mutex<VecDeque<Result<String>>>,
    last: Mutex<String>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    gate: Option<Arc<Notify>>,
}

impl MockLlm {
    /// Create a new mock LLM with a queue of responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            last: Mutex::new("FINAL ANSWER: Done".to_string()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Create a mock that always returns the same response.
    pub fn constant(response: &str) -> Self {
        Self::new(vec![response])
    }

    /// Create a mock whose every call fails.
    pub fn failing(message: &str) -> Self {
        let mock = Self::new(vec![]);
        lock(&mock.responses).push_back(Err(Error::model(message)));
        mock
    }

    /// Block every call until the gate is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Get the number of calls made to this mock.
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Messages received by each call, in order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn ainvoke(&self, messages: &[ChatMessage]) -> Result<ChatMessage> {
        lock(&self.calls).push(messages.to_vec());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = lock(&self.responses).pop_front();
        match next {
            Some(Ok(text)) => {
                *lock(&self.last) = text.clone();
                Ok(ChatMessage::assistant(text))
            }
            Some(Err(e)) => {
                // Failures repeat as well
                lock(&self.responses).push_front(Err(Error::model(e.to_string())));
                Err(e)
            }
            None => Ok(ChatMessage::assistant(lock(&self.last).clone())),
        }
    }

    fn name(&self) -> &str {
        "mock-llm"
    }
}

// =============================================================================
// Mock Browser
// =============================================================================

/// Browser session that records actions instead of performing them.
pub struct MockBrowser {
    actions: Mutex<Vec<BrowserAction>>,
    fail_on: Option<&'static str>,
    gate: Option<Arc<Notify>>,
    url: Mutex<String>,
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            fail_on: None,
            gate: None,
            url: Mutex::new("about:blank".to_string()),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Fail every action with the given name (see `BrowserAction::name`).
    pub fn failing_on(mut self, action: &'static str) -> Self {
        self.fail_on = Some(action);
        self
    }

    /// Block every action until the gate is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn executed(&self) -> Vec<BrowserAction> {
        lock(&self.actions).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockBrowser {
    async fn execute(&self, action: &BrowserAction) -> Result<String> {
        if self.is_closed() {
            return Err(Error::browser("session closed"));
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_on == Some(action.name()) {
            return Err(Error::browser(format!("{} failed", action.name())));
        }

        lock(&self.actions).push(action.clone());
        let observation = match action {
            BrowserAction::Navigate { url } => {
                *lock(&self.url) = url.clone();
                format!("Navigated to {}", url)
            }
            BrowserAction::ExtractContent => "Page content: mock page".to_string(),
            other => format!("{} ok", other.name()),
        };
        Ok(observation)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(Error::browser("session closed"));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(lock(&self.url).clone())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Launcher that hands out fresh `MockBrowser`s and remembers them.
#[derive(Default)]
pub struct MockLauncher {
    launched: Mutex<Vec<Arc<MockBrowser>>>,
    fail: bool,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            launched: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn launched(&self) -> Vec<Arc<MockBrowser>> {
        lock(&self.launched).clone()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
        if self.fail {
            return Err(Error::browser("could not launch browser"));
        }
        let browser = Arc::new(MockBrowser::new());
        lock(&self.launched).push(browser.clone());
        Ok(browser)
    }
}

// =============================================================================
// Recording Interaction
// =============================================================================

/// Operator stand-in that records traffic and answers from a script.
///
/// With no scripted answers left, `ask` fails with `NoOperatorConnected`.
#[derive(Default)]
pub struct RecordingInteraction {
    broadcasts: Mutex<Vec<String>>,
    questions: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<String>>,
}

impl RecordingInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answers(answers: Vec<&str>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(String::from).collect()),
            ..Self::default()
        }
    }

    pub fn broadcasts(&self) -> Vec<String> {
        lock(&self.broadcasts).clone()
    }

    pub fn questions(&self) -> Vec<String> {
        lock(&self.questions).clone()
    }
}

#[async_trait]
impl HumanInteraction for RecordingInteraction {
    async fn broadcast(&self, message: &str) -> Result<()> {
        lock(&self.broadcasts).push(message.to_string());
        Ok(())
    }

    async fn ask(&self, question: &str) -> Result<String> {
        lock(&self.questions).push(question.to_string());
        lock(&self.answers)
            .pop_front()
            .ok_or(Error::NoOperatorConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_script_then_repeat() {
        let llm = MockLlm::new(vec!["one", "two"]);
        let msgs = [ChatMessage::user("hi")];
        assert_eq!(llm.ainvoke(&msgs).await.unwrap().text(), "one");
        assert_eq!(llm.ainvoke(&msgs).await.unwrap().text(), "two");
        assert_eq!(llm.ainvoke(&msgs).await.unwrap().text(), "two");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_browser_close_idempotent() {
        let browser = MockBrowser::new();
        browser
            .execute(&BrowserAction::Navigate {
                url: "https://example.com".into(),
            })
            .await
            .unwrap();
        browser.close().await.unwrap();
        browser.close().await.unwrap();
        assert!(browser.is_closed());
        assert!(browser.execute(&BrowserAction::GoBack).await.is_err());
        assert_eq!(browser.executed().len(), 1);
    }
}
