//! Task submission and control.
//!
//! Browser tasks go through the controller slot, one at a time. Chat modes
//! call a model directly and never touch the slot.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use browzee_controller::{AgentOptions, ControllerSlot};
use browzee_core::{
    config::AgentConfig,
    traits::BrowserLauncher,
    types::{ChatMessage, RunSnapshot, TaskMode, TaskRequest},
    Error, Result,
};
use browzee_interaction::InteractionChannel;
use browzee_model_gateway::ModelSet;
use browzee_store::MemoryStore;

pub const SERVER_NAME: &str = "BrowZee Agent";
pub const SERVER_VERSION: &str = "1.0";

const NO_PAGE_AVAILABLE: &str = "No browser page available for screenshot.";

const SEARCH_SYSTEM_PROMPT: &str = "You are BrowZee AI Assistant, a helpful and intelligent assistant.\n\
Provide clear, direct answers to questions. When appropriate, include suggestions for follow-up tasks that the user might want to perform.\n\
Format your answers in clean, readable text without unnecessary markdown.";

/// Headings that introduce the follow-up task list in a search answer.
const TASK_MARKERS: [&str; 3] = ["tasks you might consider:", "suggested tasks:", "suggestions:"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    /// `completed`, `stopped`, `answered` or `error`.
    pub status: String,
    pub result: String,
}

impl TaskResponse {
    fn new(status: &str, result: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            result: result.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: String,
}

impl ControlResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub server: String,
    pub version: String,
    pub task: Option<RunSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub answer: String,
    pub tasks: Option<String>,
}

pub struct TaskService {
    slot: Arc<ControllerSlot>,
    launcher: Arc<dyn BrowserLauncher>,
    models: ModelSet,
    channel: Arc<InteractionChannel>,
    memory: Option<Arc<MemoryStore>>,
    agent: AgentConfig,
}

impl TaskService {
    pub fn new(
        slot: Arc<ControllerSlot>,
        launcher: Arc<dyn BrowserLauncher>,
        models: ModelSet,
        channel: Arc<InteractionChannel>,
        agent: AgentConfig,
    ) -> Self {
        Self {
            slot,
            launcher,
            models,
            channel,
            memory: None,
            agent,
        }
    }

    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn channel(&self) -> Arc<InteractionChannel> {
        Arc::clone(&self.channel)
    }

    pub fn slot(&self) -> Arc<ControllerSlot> {
        Arc::clone(&self.slot)
    }

    fn memory(&self) -> Option<&Arc<MemoryStore>> {
        self.memory.as_ref().filter(|_| self.agent.enable_memory)
    }

    /// Handle a submission according to its mode.
    pub async fn run_task(&self, request: TaskRequest) -> Result<TaskResponse> {
        let text = request.task.trim();
        if text.is_empty() {
            return Err(Error::invalid_request("task must not be empty"));
        }
        tracing::info!(mode = %request.mode, "Received task");

        match request.mode {
            TaskMode::Chat => self.chat(text).await,
            TaskMode::ChatWithPageContext => self.chat_with_page(text).await,
            TaskMode::Task | TaskMode::InteractiveTask => self.run_agent(text, request.mode).await,
        }
    }

    async fn chat(&self, text: &str) -> Result<TaskResponse> {
        let mut messages = Vec::new();
        if let Some(memory) = self.memory() {
            messages.push(ChatMessage::system(memory.as_context_summary().await));
            messages.extend(memory.short_term_messages());
        }
        messages.push(ChatMessage::user(text));

        let answer = self.models.chat.ainvoke(&messages).await?.text();
        self.channel.send_status(&answer);

        if let Some(memory) = self.memory() {
            memory.append_user_message(text);
            memory.append_assistant_message(answer.clone());
            let memory = Arc::clone(memory);
            let llm = Arc::clone(&self.models.chat);
            let text = text.to_string();
            tokio::spawn(async move {
                memory.record_facts(llm.as_ref(), &text).await;
            });
        }

        Ok(TaskResponse::new("answered", answer))
    }

    async fn chat_with_page(&self, question: &str) -> Result<TaskResponse> {
        let Some(controller) = self.slot.latest() else {
            return Ok(self.page_unavailable());
        };
        let png = match controller.browser().screenshot().await {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(error = %e, "Screenshot for page chat failed");
                return Ok(self.page_unavailable());
            }
        };

        let prompt = format!(
            "This is a screenshot of the current web page. The user asked:\n\"{}\"\nAnswer based on the visual content if possible.",
            question
        );
        let image = format!("data:image/png;base64,{}", STANDARD.encode(png));
        let answer = self
            .models
            .vision_or_chat()
            .ainvoke(&[ChatMessage::user_with_image(prompt, image)])
            .await?
            .text();

        self.channel.send_status(&answer);
        Ok(TaskResponse::new("answered", answer))
    }

    fn page_unavailable(&self) -> TaskResponse {
        self.channel.send_status(&format!("❌ {}", NO_PAGE_AVAILABLE));
        TaskResponse::new("error", NO_PAGE_AVAILABLE)
    }

    async fn run_agent(&self, task: &str, mode: TaskMode) -> Result<TaskResponse> {
        if let Some(active) = self.slot.active().filter(|c| !c.state().is_terminal()) {
            return Err(Error::already_running(active.task()));
        }

        // The previous run kept its page open for page chat
        if let Some(previous) = self.slot.last() {
            if let Err(e) = previous.browser().close().await {
                tracing::warn!(error = %e, "Failed to close previous browser");
            }
        }

        let browser = self.launcher.launch().await?;

        let mut options = AgentOptions::from_config(&self.agent)
            .with_mode(mode)
            .with_interaction(self.channel.clone());
        if let Some(planner) = &self.models.planner {
            options = options.with_planner(Arc::clone(planner));
        }
        if let Some(memory) = self.memory() {
            options = options.with_memory(Arc::clone(memory));
        }

        let handle = match self
            .slot
            .start(task, browser.clone(), Arc::clone(&self.models.chat), options)
        {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!(error = %close_err, "Failed to close unused browser");
                }
                return Err(e);
            }
        };

        let controller = Arc::clone(handle.controller());
        let result = handle.wait().await?;
        self.channel.send_status(&result);

        Ok(TaskResponse::new(controller.state().as_str(), result))
    }

    pub fn stop_task(&self) -> ControlResponse {
        match self.slot.active() {
            Some(controller) if controller.stop() => {
                self.channel.send_status("🛑 Task stopped by user.");
                ControlResponse::new("stopped")
            }
            _ => ControlResponse::new("no_active_task"),
        }
    }

    pub fn pause_task(&self) -> ControlResponse {
        match self.slot.active().filter(|c| !c.state().is_terminal()) {
            Some(controller) => {
                if controller.pause() {
                    self.channel.send_status("⏸ Task paused by user.");
                }
                ControlResponse::new("paused")
            }
            None => ControlResponse::new("no_active_task"),
        }
    }

    pub fn resume_task(&self) -> ControlResponse {
        match self.slot.active().filter(|c| !c.state().is_terminal()) {
            Some(controller) => {
                if controller.resume() {
                    self.channel.send_status("▶ Task resumed by user.");
                }
                ControlResponse::new("resumed")
            }
            None => ControlResponse::new("no_active_task"),
        }
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            status: "ok".to_string(),
            server: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
            task: self.slot.active().map(|c| c.snapshot()),
        }
    }

    /// Answer a free-form question, separating suggested follow-up tasks.
    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(Error::invalid_request("query must not be empty"));
        }
        let messages = [
            ChatMessage::system(SEARCH_SYSTEM_PROMPT),
            ChatMessage::user(query),
        ];
        let answer = self.models.chat.ainvoke(&messages).await?.text();
        Ok(split_suggested_tasks(&answer))
    }
}

fn split_suggested_tasks(answer: &str) -> SearchResponse {
    // ASCII lowering keeps byte offsets aligned with `answer`
    let lower = answer.to_ascii_lowercase();
    for marker in TASK_MARKERS {
        if let Some(pos) = lower.find(marker) {
            let tasks = answer[pos + marker.len()..].trim();
            if !tasks.is_empty() {
                return SearchResponse {
                    answer: answer[..pos].trim().to_string(),
                    tasks: Some(tasks.to_string()),
                };
            }
        }
    }
    SearchResponse {
        answer: answer.trim().to_string(),
        tasks: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_suggested_tasks() {
        let split = split_suggested_tasks(
            "Rust is a systems language.\n\nSuggested tasks:\n- Open rust-lang.org\n- Read the book",
        );
        assert_eq!(split.answer, "Rust is a systems language.");
        assert_eq!(
            split.tasks.as_deref(),
            Some("- Open rust-lang.org\n- Read the book")
        );
    }

    #[test]
    fn test_answer_without_tasks() {
        let split = split_suggested_tasks("  Two.  ");
        assert_eq!(split.answer, "Two.");
        assert!(split.tasks.is_none());

        // A heading with nothing after it is part of the answer
        let split = split_suggested_tasks("Nothing here. Suggestions:");
        assert!(split.tasks.is_none());
    }
}
