use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskMode;

// =============================================================================
// Run State
// =============================================================================

/// Lifecycle of a single agent run.
///
/// `running <-> paused`, `running|paused -> stopped`, `running -> completed`.
/// `stopped` and `completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Paused,
    Stopped,
    Completed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped | RunState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Stopped => "stopped",
            RunState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// A single browser operation the agent can request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowserAction {
    Navigate {
        url: String,
    },
    Click {
        selector: String,
    },
    InputText {
        selector: String,
        text: String,
    },
    Scroll {
        direction: ScrollDirection,
        /// Pixels; the session picks a page-sized default when absent.
        #[serde(default)]
        amount: Option<i64>,
    },
    GoBack,
    ExtractContent,
    Wait {
        millis: u64,
    },
}

impl BrowserAction {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserAction::Navigate { .. } => "navigate",
            BrowserAction::Click { .. } => "click",
            BrowserAction::InputText { .. } => "input_text",
            BrowserAction::Scroll { .. } => "scroll",
            BrowserAction::GoBack => "go_back",
            BrowserAction::ExtractContent => "extract_content",
            BrowserAction::Wait { .. } => "wait",
        }
    }
}

/// What the agent decided to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AgentAction {
    Browser(BrowserAction),
    AskHuman { question: String },
    Done { text: String },
}

impl AgentAction {
    pub fn describe(&self) -> String {
        match self {
            AgentAction::Browser(action) => match action {
                BrowserAction::Navigate { url } => format!("navigate to {}", url),
                BrowserAction::Click { selector } => format!("click {}", selector),
                BrowserAction::InputText { selector, .. } => format!("type into {}", selector),
                other => other.name().replace('_', " "),
            },
            AgentAction::AskHuman { question } => format!("ask human: {}", question),
            AgentAction::Done { .. } => "finish".to_string(),
        }
    }
}

// =============================================================================
// Step bookkeeping
// =============================================================================

/// One executed step, kept in order for prompting and the final summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub action: AgentAction,
    pub result: String,
}

/// Result of a single `step()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// An action ran; the loop should continue.
    Continue,
    /// The agent finished with this text.
    Done(String),
    /// The run is stopped; nothing further will execute.
    Skipped,
}

/// Serialisable view of an active or finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub id: String,
    pub task: String,
    pub mode: TaskMode,
    pub state: RunState,
    pub step: usize,
    pub pending_question: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Stopped.is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(!RunState::Paused.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn test_browser_action_json() {
        let action: BrowserAction =
            serde_json::from_str(r##"{"action":"input_text","selector":"#q","text":"rust"}"##)
                .unwrap();
        assert_eq!(
            action,
            BrowserAction::InputText {
                selector: "#q".into(),
                text: "rust".into()
            }
        );

        let action: BrowserAction =
            serde_json::from_str(r#"{"action":"scroll","direction":"down"}"#).unwrap();
        assert_eq!(
            action,
            BrowserAction::Scroll {
                direction: ScrollDirection::Down,
                amount: None
            }
        );
    }
}
