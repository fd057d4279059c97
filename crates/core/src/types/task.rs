use serde::{Deserialize, Serialize};

/// How an inbound request should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskMode {
    /// Drive the browser without operator questions.
    #[default]
    Task,
    /// Plain conversation with the chat model.
    Chat,
    /// Conversation grounded on a screenshot of the current page.
    #[serde(alias = "chat-this-page")]
    ChatWithPageContext,
    /// Drive the browser, escalating questions to the operator.
    InteractiveTask,
}

impl TaskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskMode::Task => "task",
            TaskMode::Chat => "chat",
            TaskMode::ChatWithPageContext => "chat-with-page-context",
            TaskMode::InteractiveTask => "interactive-task",
        }
    }

    /// Whether this mode launches a browser-driving run.
    pub fn is_browser_task(&self) -> bool {
        matches!(self, TaskMode::Task | TaskMode::InteractiveTask)
    }
}

impl std::fmt::Display for TaskMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task: String,
    #[serde(default)]
    pub mode: TaskMode,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, mode: TaskMode) -> Self {
        Self {
            task: task.into(),
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_aliases() {
        let req: TaskRequest =
            serde_json::from_str(r#"{"task":"hi","mode":"chat-this-page"}"#).unwrap();
        assert_eq!(req.mode, TaskMode::ChatWithPageContext);

        let req: TaskRequest = serde_json::from_str(r#"{"task":"go"}"#).unwrap();
        assert_eq!(req.mode, TaskMode::Task);

        let req: TaskRequest =
            serde_json::from_str(r#"{"task":"go","mode":"interactive-task"}"#).unwrap();
        assert!(req.mode.is_browser_task());
    }
}
