//! Browser driver traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::BrowserAction;

/// A live browser page the agent drives.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Perform an action and return a short textual observation.
    async fn execute(&self, action: &BrowserAction) -> Result<String>;

    /// PNG screenshot of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn current_url(&self) -> Result<String>;

    /// Release the browser. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Factory for new browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>>;
}
