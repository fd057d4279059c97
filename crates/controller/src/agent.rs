//! The browser agent run loop.
//!
//! Each step asks the model for the next action, waits at a checkpoint
//! while the run is paused, executes the action and records the result.
//! Every suspension point is raced against the run's cancellation token so
//! `stop()` takes effect within one checkpoint.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use browzee_core::{
    traits::{BrowserSession, LlmClient},
    types::{
        AgentAction, ChatMessage, RunSnapshot, RunState, StepOutcome, StepRecord, TaskMode,
    },
    Error, Result,
};

use crate::builder::AgentOptions;
use crate::parser::{ActionParser, ParsedResponse};
use crate::planning::Planner;

/// Conversation messages sent per step, besides the task itself.
const MAX_HISTORY_MESSAGES: usize = 30;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Progress {
    step: usize,
    history: Vec<StepRecord>,
    conversation: Vec<ChatMessage>,
    plan: Option<String>,
    final_result: Option<String>,
    pending_question: Option<String>,
    memory_context: Option<String>,
}

/// Drives one task in one browser session.
pub struct AgentController {
    id: String,
    task: String,
    llm: Arc<dyn LlmClient>,
    browser: Arc<dyn BrowserSession>,
    options: AgentOptions,
    parser: ActionParser,
    planner: Option<Planner>,
    state: watch::Sender<RunState>,
    cancel: CancellationToken,
    step_lock: tokio::sync::Mutex<()>,
    started_at: DateTime<Utc>,
    progress: Mutex<Progress>,
}

impl AgentController {
    pub fn new(
        task: impl Into<String>,
        browser: Arc<dyn BrowserSession>,
        llm: Arc<dyn LlmClient>,
        options: AgentOptions,
    ) -> Self {
        let task = task.into();
        let (state, _) = watch::channel(RunState::Running);
        let planner = options.planner.clone().map(Planner::new);
        let progress = Progress {
            conversation: vec![ChatMessage::user(format!("Task: {}", task))],
            ..Progress::default()
        };

        Self {
            id: Uuid::new_v4().to_string(),
            task,
            llm,
            browser,
            options,
            parser: ActionParser::new(),
            planner,
            state,
            cancel: CancellationToken::new(),
            step_lock: tokio::sync::Mutex::new(()),
            started_at: Utc::now(),
            progress: Mutex::new(progress),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn mode(&self) -> TaskMode {
        self.options.mode
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// The session this run drives.
    pub fn browser(&self) -> Arc<dyn BrowserSession> {
        Arc::clone(&self.browser)
    }

    pub fn history(&self) -> Vec<StepRecord> {
        lock(&self.progress).history.clone()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let progress = lock(&self.progress);
        RunSnapshot {
            id: self.id.clone(),
            task: self.task.clone(),
            mode: self.options.mode,
            state: self.state(),
            step: progress.step,
            pending_question: progress.pending_question.clone(),
            started_at: self.started_at,
        }
    }

    /// Result text of a finished run.
    pub fn final_result(&self) -> Result<String> {
        let state = self.state();
        if !state.is_terminal() {
            return Err(Error::invalid_state(format!(
                "no final result while the task is {}",
                state
            )));
        }
        Ok(lock(&self.progress).final_result.clone().unwrap_or_default())
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Returns false when the run was not running.
    pub fn pause(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s == RunState::Running {
                *s = RunState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(run_id = %self.id, "Run paused");
        }
        changed
    }

    /// Returns false when the run was not paused.
    pub fn resume(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s == RunState::Paused {
                *s = RunState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(run_id = %self.id, "Run resumed");
        }
        changed
    }

    /// Stop the run and cancel whatever it is waiting on.
    ///
    /// Returns false when the run had already finished.
    pub fn stop(&self) -> bool {
        let result = format!("Task stopped.\n{}", self.summary());
        let changed = self.finish(RunState::Stopped, result);
        if changed {
            tracing::info!(run_id = %self.id, "Run stopped");
        }
        changed
    }

    fn finish(&self, target: RunState, result: String) -> bool {
        let changed = {
            let mut progress = lock(&self.progress);
            if self.state.borrow().is_terminal() {
                false
            } else {
                progress.final_result.get_or_insert(result);
                progress.pending_question = None;
                self.state.send_replace(target);
                true
            }
        };
        if target == RunState::Stopped {
            self.cancel.cancel();
        }
        changed
    }

    async fn fail(&self, error: Error) -> Error {
        let reason = error.to_string();
        tracing::error!(run_id = %self.id, error = %reason, "Agent run failed");
        if self.finish(RunState::Stopped, format!("Task failed: {}", reason)) {
            self.broadcast(&format!("❌ Task failed: {}", reason)).await;
        }
        error
    }

    /// Await `fut` unless the run is stopped first.
    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::TaskStopped),
            res = fut => res,
        }
    }

    /// Block while paused. True when the run may act.
    async fn checkpoint(&self) -> bool {
        let mut rx = self.state.subscribe();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = rx.wait_for(|s| *s != RunState::Paused) => {
                res.map(|s| *s == RunState::Running).unwrap_or(false)
            }
        }
    }

    async fn broadcast(&self, message: &str) {
        if let Some(interaction) = &self.options.interaction {
            if let Err(e) = interaction.broadcast(message).await {
                tracing::debug!(run_id = %self.id, error = %e, "Broadcast failed");
            }
        }
    }

    /// Ask the operator through the attached interaction channel.
    pub async fn ask_human(&self, question: &str) -> Result<String> {
        let interaction = self
            .options
            .interaction
            .clone()
            .ok_or(Error::NoOperatorConnected)?;

        lock(&self.progress).pending_question = Some(question.to_string());
        tracing::info!(run_id = %self.id, question, "Asking operator");
        let result = self.cancellable(interaction.ask(question)).await;
        lock(&self.progress).pending_question = None;
        result
    }

    // =========================================================================
    // Loop
    // =========================================================================

    fn summary(&self) -> String {
        let progress = lock(&self.progress);
        if progress.history.is_empty() {
            return "No actions were taken.".to_string();
        }
        let mut out = format!("Completed {} step(s):", progress.history.len());
        for record in &progress.history {
            out.push_str(&format!("\n{}. {}", record.index, record.action.describe()));
        }
        out
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are a browser automation agent. You control a real web browser to complete the user's task.\n\n\
            Reply with a short THOUGHT line followed by exactly one of:\n\
            ACTION: {\"action\": \"navigate\", \"url\": \"https://...\"}\n\
            ACTION: {\"action\": \"click\", \"selector\": \"css selector\"}\n\
            ACTION: {\"action\": \"input_text\", \"selector\": \"css selector\", \"text\": \"...\"}\n\
            ACTION: {\"action\": \"scroll\", \"direction\": \"down\", \"amount\": 600}\n\
            ACTION: {\"action\": \"go_back\"}\n\
            ACTION: {\"action\": \"extract_content\"}\n\
            ACTION: {\"action\": \"wait\", \"millis\": 1000}\n\
            FINAL ANSWER: <the result for the user>\n",
        );
        if self.options.interactive {
            prompt.push_str(
                "ASK HUMAN: <question>\n\n\
                Use ASK HUMAN when you need information or a confirmation only the user can give, \
                for example before submitting a payment or when a login is required.\n",
            );
        }
        prompt
    }

    async fn build_messages(&self, index: usize) -> Vec<ChatMessage> {
        let (conversation, plan, memory_context) = {
            let progress = lock(&self.progress);
            (
                progress.conversation.clone(),
                progress.plan.clone(),
                progress.memory_context.clone(),
            )
        };

        let mut messages = vec![ChatMessage::system(self.system_prompt())];
        if let Some(context) = memory_context {
            messages.push(ChatMessage::system(context));
        }
        if let Some(plan) = plan {
            messages.push(ChatMessage::system(plan));
        }

        // Task first, then the most recent turns
        let mut turns = conversation.into_iter();
        messages.extend(turns.next());
        let rest: Vec<ChatMessage> = turns.collect();
        let skip = rest.len().saturating_sub(MAX_HISTORY_MESSAGES);
        messages.extend(rest.into_iter().skip(skip));

        let url = self
            .browser
            .current_url()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        let prompt = format!("Step {}. Current URL: {}\nDecide the next action.", index, url);

        if self.options.use_vision {
            match self.browser.screenshot().await {
                Ok(png) => {
                    let data_url = format!("data:image/png;base64,{}", STANDARD.encode(png));
                    messages.push(ChatMessage::user_with_image(prompt, data_url));
                    return messages;
                }
                Err(e) => {
                    tracing::warn!(run_id = %self.id, error = %e, "Screenshot failed, continuing without vision");
                }
            }
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }

    async fn refresh_plan(&self, index: usize) {
        let Some(planner) = &self.planner else {
            return;
        };
        if (index - 1) % self.options.planner_interval.max(1) != 0 {
            return;
        }

        let history = lock(&self.progress).history.clone();
        match self.cancellable(planner.plan(&self.task, &history)).await {
            Ok(steps) => {
                tracing::debug!(run_id = %self.id, steps = steps.len(), "Plan updated");
                lock(&self.progress).plan = Some(Planner::format_plan(&steps));
            }
            Err(Error::TaskStopped) => {}
            Err(e) => {
                tracing::warn!(run_id = %self.id, error = %e, "Planner failed, keeping previous plan");
            }
        }
    }

    /// Decide, wait while paused, act, record.
    pub async fn step(&self) -> Result<StepOutcome> {
        let _guard = self.step_lock.lock().await;
        if self.state().is_terminal() {
            return Ok(StepOutcome::Skipped);
        }

        let index = lock(&self.progress).step + 1;
        self.refresh_plan(index).await;

        let messages = self.build_messages(index).await;
        let reply = match self.cancellable(self.llm.ainvoke(&messages)).await {
            Ok(reply) => reply.text(),
            Err(Error::TaskStopped) => return Ok(StepOutcome::Skipped),
            Err(e) => return Err(self.fail(e).await),
        };
        let parsed = self.parser.parse(&reply);

        if !self.checkpoint().await {
            return Ok(StepOutcome::Skipped);
        }

        let (action, observation) = match parsed {
            ParsedResponse::Action(AgentAction::Done { text }) => {
                self.record(index, AgentAction::Done { text: text.clone() }, reply, "Task finished.".to_string());
                if self.finish(RunState::Completed, format!("Task completed.\n{}", text)) {
                    tracing::info!(run_id = %self.id, steps = index, "Run completed");
                }
                return Ok(StepOutcome::Done(text));
            }
            ParsedResponse::Action(AgentAction::Browser(browser_action)) => {
                tracing::info!(run_id = %self.id, step = index, action = browser_action.name(), "Executing action");
                match self.cancellable(self.browser.execute(&browser_action)).await {
                    Ok(observation) => (Some(AgentAction::Browser(browser_action)), observation),
                    Err(Error::TaskStopped) => return Ok(StepOutcome::Skipped),
                    Err(e) => {
                        let err = Error::action(format!("{} failed: {}", browser_action.name(), e));
                        return Err(self.fail(err).await);
                    }
                }
            }
            ParsedResponse::Action(AgentAction::AskHuman { question }) => {
                let observation = if !self.options.interactive {
                    "Asking the user is not available for this task. Continue on your own.".to_string()
                } else {
                    match self.ask_human(&question).await {
                        Ok(answer) => format!("Human answered: {}", answer),
                        Err(Error::TaskStopped) => return Ok(StepOutcome::Skipped),
                        Err(
                            e @ (Error::NoOperatorConnected
                            | Error::ConnectionLost
                            | Error::Timeout(_)
                            | Error::QuestionPending(_)),
                        ) => {
                            tracing::warn!(run_id = %self.id, error = %e, "Question not answered");
                            format!("Could not reach the user ({}). Continue on your own.", e)
                        }
                        Err(e) => return Err(self.fail(e).await),
                    }
                };
                (Some(AgentAction::AskHuman { question }), observation)
            }
            ParsedResponse::Think { thought, error } => {
                tracing::debug!(run_id = %self.id, thought_len = thought.len(), "Agent thinking");
                let observation = match error {
                    Some(e) => format!("Your action could not be used: {}. Reply with one ACTION, ASK HUMAN or FINAL ANSWER.", e),
                    None => "No action given. Reply with one ACTION, ASK HUMAN or FINAL ANSWER.".to_string(),
                };
                (None, observation)
            }
        };

        match action {
            Some(action) => {
                let line = format!("Step {}: {}", index, action.describe());
                self.record(index, action, reply, observation);
                if self.state().is_terminal() {
                    return Ok(StepOutcome::Skipped);
                }
                self.broadcast(&line).await;
            }
            None => self.record_turn(index, reply, observation),
        }
        Ok(StepOutcome::Continue)
    }

    fn record(&self, index: usize, action: AgentAction, reply: String, result: String) {
        lock(&self.progress).history.push(StepRecord {
            index,
            action,
            result: result.clone(),
        });
        self.record_turn(index, reply, result);
    }

    fn record_turn(&self, index: usize, reply: String, observation: String) {
        let mut progress = lock(&self.progress);
        progress.conversation.push(ChatMessage::assistant(reply));
        progress
            .conversation
            .push(ChatMessage::user(format!("Observation: {}", observation)));
        progress.step = index;
        metrics::counter!("browzee_agent_steps_total").increment(1);
    }

    /// Run steps until the task completes, fails, is stopped or runs out of
    /// steps. Returns the final result.
    pub async fn run(&self) -> Result<String> {
        tracing::info!(run_id = %self.id, task = %self.task, mode = %self.options.mode, "Starting agent run");

        if let Some(memory) = &self.options.memory {
            memory.append_user_message(self.task.clone());
            let summary = memory.as_context_summary().await;
            lock(&self.progress).memory_context = Some(summary);
        }

        while !self.state().is_terminal() {
            let steps = lock(&self.progress).step;
            if steps >= self.options.max_steps {
                let reason = format!(
                    "Step limit of {} reached before the task finished.",
                    self.options.max_steps
                );
                let result = format!("Task stopped.\n{}\n{}", reason, self.summary());
                if self.finish(RunState::Stopped, result) {
                    tracing::warn!(run_id = %self.id, max_steps = self.options.max_steps, "Step limit reached");
                    self.broadcast(&format!("🛑 {}", reason)).await;
                }
                break;
            }

            if let Err(e) = self.step().await {
                tracing::debug!(run_id = %self.id, error = %e, "Step ended the run");
            }
        }

        let state = self.state();
        if state == RunState::Stopped {
            if let Err(e) = self.browser.close().await {
                tracing::warn!(run_id = %self.id, error = %e, "Failed to close browser");
            }
        }

        let result = self.final_result()?;
        if state == RunState::Completed {
            if let Some(memory) = &self.options.memory {
                memory.append_assistant_message(result.clone());
                memory.record_facts(self.llm.as_ref(), &result).await;
            }
        }

        tracing::info!(run_id = %self.id, state = %state, "Agent run finished");
        Ok(result)
    }
}
