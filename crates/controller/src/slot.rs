//! Single active-run registry.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use browzee_core::{
    traits::{BrowserSession, LlmClient},
    Error, Result,
};

use crate::agent::{lock, AgentController};
use crate::builder::AgentOptions;

#[derive(Default)]
struct Slots {
    active: Option<Arc<AgentController>>,
    last: Option<Arc<AgentController>>,
}

/// Holds at most one running controller.
///
/// The slot is taken on `start` and released when the run reaches a
/// terminal state; the finished run stays reachable through `last()`.
#[derive(Default)]
pub struct ControllerSlot {
    slots: Mutex<Slots>,
}

impl ControllerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a non-terminal run occupies the slot.
    pub fn is_busy(&self) -> bool {
        lock(&self.slots)
            .active
            .as_ref()
            .is_some_and(|c| !c.state().is_terminal())
    }

    /// Start `task` in the background.
    ///
    /// Fails with `AlreadyRunning` while another run is active; that run is
    /// left untouched and `browser` is not used.
    pub fn start(
        self: &Arc<Self>,
        task: impl Into<String>,
        browser: Arc<dyn BrowserSession>,
        llm: Arc<dyn LlmClient>,
        options: AgentOptions,
    ) -> Result<RunHandle> {
        let controller = {
            let mut slots = lock(&self.slots);
            if let Some(active) = &slots.active {
                if !active.state().is_terminal() {
                    return Err(Error::already_running(active.task()));
                }
            }
            let controller = Arc::new(AgentController::new(task, browser, llm, options));
            slots.active = Some(Arc::clone(&controller));
            controller
        };
        metrics::counter!("browzee_tasks_started_total").increment(1);

        let slot = Arc::clone(self);
        let run = Arc::clone(&controller);
        let join = tokio::spawn(async move {
            let result = run.run().await;
            slot.release(&run);
            metrics::counter!("browzee_tasks_finished_total", "state" => run.state().as_str())
                .increment(1);
            result
        });

        Ok(RunHandle { controller, join })
    }

    fn release(&self, run: &Arc<AgentController>) {
        let mut slots = lock(&self.slots);
        if slots.active.as_ref().is_some_and(|a| Arc::ptr_eq(a, run)) {
            slots.active = None;
        }
        slots.last = Some(Arc::clone(run));
    }

    /// The run currently holding the slot.
    pub fn active(&self) -> Option<Arc<AgentController>> {
        lock(&self.slots).active.clone()
    }

    /// The most recently finished run.
    pub fn last(&self) -> Option<Arc<AgentController>> {
        lock(&self.slots).last.clone()
    }

    /// Active run, else the last finished one.
    pub fn latest(&self) -> Option<Arc<AgentController>> {
        let slots = lock(&self.slots);
        slots.active.clone().or_else(|| slots.last.clone())
    }
}

/// A started run.
pub struct RunHandle {
    controller: Arc<AgentController>,
    join: JoinHandle<Result<String>>,
}

impl RunHandle {
    pub fn controller(&self) -> &Arc<AgentController> {
        &self.controller
    }

    /// Wait for the run to finish and return its final result.
    pub async fn wait(self) -> Result<String> {
        self.join
            .await
            .map_err(|e| Error::internal(format!("agent run panicked: {}", e)))?
    }
}
