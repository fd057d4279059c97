//! Core traits for Browzee.
//!
//! Traits are organized by the collaborator they abstract:
//! - `llm`: language models (LlmClient)
//! - `browser`: the driven browser (BrowserSession, BrowserLauncher)
//! - `interaction`: the human operator (HumanInteraction)
//! - `store`: long-term fact persistence (FactStore)

pub mod browser;
pub mod interaction;
pub mod llm;
pub mod store;

pub use browser::*;
pub use interaction::*;
pub use llm::*;
pub use store::*;
