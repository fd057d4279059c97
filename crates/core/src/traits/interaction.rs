//! Human-in-the-loop traits.

use async_trait::async_trait;

use crate::error::Result;

/// Channel to the human operator watching a run.
#[async_trait]
pub trait HumanInteraction: Send + Sync {
    /// Send a status line to every connected listener.
    async fn broadcast(&self, message: &str) -> Result<()>;

    /// Ask the operator a question and wait for the answer.
    ///
    /// Fails with `NoOperatorConnected` when nobody is listening and with
    /// `QuestionPending` while another question is outstanding.
    async fn ask(&self, question: &str) -> Result<String>;
}
