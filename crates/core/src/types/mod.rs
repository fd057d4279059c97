//! Core type definitions for Browzee.
//!
//! Broken down into submodules:
//! - `message`: role-tagged chat messages with text/image content parts
//! - `task`: inbound task requests and their modes
//! - `agent`: run state, browser actions and step bookkeeping

pub mod agent;
pub mod message;
pub mod task;

pub use agent::*;
pub use message::*;
pub use task::*;
