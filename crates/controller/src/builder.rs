//! Options for constructing an [`AgentController`](crate::AgentController).

use std::sync::Arc;

use browzee_core::{
    config::AgentConfig,
    traits::{HumanInteraction, LlmClient},
    types::TaskMode,
};
use browzee_store::MemoryStore;

/// Per-run collaborators and limits.
#[derive(Clone)]
pub struct AgentOptions {
    pub(crate) mode: TaskMode,
    pub(crate) interactive: bool,
    pub(crate) interaction: Option<Arc<dyn HumanInteraction>>,
    pub(crate) planner: Option<Arc<dyn LlmClient>>,
    pub(crate) planner_interval: usize,
    pub(crate) max_steps: usize,
    pub(crate) use_vision: bool,
    pub(crate) memory: Option<Arc<MemoryStore>>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            mode: TaskMode::Task,
            interactive: false,
            interaction: None,
            planner: None,
            planner_interval: 5,
            max_steps: 100,
            use_vision: false,
            memory: None,
        }
    }
}

impl AgentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits taken from the `[agent]` config section.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            planner_interval: config.planner_interval,
            max_steps: config.max_steps,
            use_vision: config.use_vision,
            ..Self::default()
        }
    }

    /// Set the task mode. `interactive_task` also enables ASK HUMAN.
    pub fn with_mode(mut self, mode: TaskMode) -> Self {
        self.mode = mode;
        if mode == TaskMode::InteractiveTask {
            self.interactive = true;
        }
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Channel used for status broadcasts and questions.
    pub fn with_interaction(mut self, interaction: Arc<dyn HumanInteraction>) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn LlmClient>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Re-plan every `interval` steps. Zero is treated as one.
    pub fn with_planner_interval(mut self, interval: usize) -> Self {
        self.planner_interval = interval.max(1);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Attach a screenshot of the page to every step prompt.
    pub fn with_vision(mut self, use_vision: bool) -> Self {
        self.use_vision = use_vision;
        self
    }

    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn mode(&self) -> TaskMode {
        self.mode
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_mode_enables_asking() {
        let opts = AgentOptions::new().with_mode(TaskMode::InteractiveTask);
        assert!(opts.is_interactive());
        assert!(!AgentOptions::new().with_mode(TaskMode::Task).is_interactive());
    }

    #[test]
    fn test_from_config() {
        let cfg = AgentConfig {
            max_steps: 7,
            planner_interval: 0,
            ..AgentConfig::default()
        };
        let opts = AgentOptions::from_config(&cfg).with_planner_interval(cfg.planner_interval);
        assert_eq!(opts.max_steps, 7);
        assert_eq!(opts.planner_interval, 1);
    }
}
