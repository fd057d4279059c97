//! Error types for Browzee.

use thiserror::Error;

/// Result type alias using Browzee's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Browzee.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Controller Errors
    // =========================================================================
    #[error("A task is already running: {0}")]
    AlreadyRunning(String),

    #[error("Action execution failed: {0}")]
    ActionExecution(String),

    #[error("Invalid controller state: {0}")]
    InvalidState(String),

    #[error("Task was stopped")]
    TaskStopped,

    // =========================================================================
    // Interaction Errors
    // =========================================================================
    #[error("No operator connected")]
    NoOperatorConnected,

    #[error("Operator connection lost")]
    ConnectionLost,

    #[error("A question is already waiting for an answer: {0}")]
    QuestionPending(String),

    // =========================================================================
    // Memory Errors
    // =========================================================================
    #[error("Memory persistence error: {0}")]
    MemoryPersistence(String),

    // =========================================================================
    // External Collaborators
    // =========================================================================
    #[error("Model provider error: {0}")]
    ModelProvider(String),

    #[error("Browser error: {0}")]
    Browser(String),

    // =========================================================================
    // Gateway Errors
    // =========================================================================
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an already-running error.
    pub fn already_running(task: impl Into<String>) -> Self {
        Self::AlreadyRunning(task.into())
    }

    /// Create an action execution error.
    pub fn action(msg: impl Into<String>) -> Self {
        Self::ActionExecution(msg.into())
    }

    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a memory persistence error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::MemoryPersistence(msg.into())
    }

    /// Create a model provider error.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::ModelProvider(msg.into())
    }

    /// Create a browser error.
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a gateway error.
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning(_) => "already_running",
            Self::ActionExecution(_) => "action_failed",
            Self::InvalidState(_) => "invalid_state",
            Self::TaskStopped => "stopped",
            Self::NoOperatorConnected => "no_operator",
            Self::ConnectionLost => "connection_lost",
            Self::QuestionPending(_) => "question_pending",
            Self::MemoryPersistence(_) => "memory_error",
            Self::ModelProvider(_) => "model_error",
            Self::Browser(_) => "browser_error",
            Self::Gateway(_) => "gateway_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) => "config_error",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) | Self::Other(_) => "internal_error",
            Self::Timeout(_) => "timeout",
        }
    }
}
