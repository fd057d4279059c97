#![deny(unused)]
//! Agent controller for Browzee.
//!
//! This crate provides the browser-agent step loop with pause, resume and
//! stop, the action parser, the optional planner, and the single-slot
//! registry that keeps at most one run active.

pub mod agent;
pub mod builder;
pub mod parser;
pub mod planning;
pub mod slot;

pub use agent::AgentController;
pub use builder::AgentOptions;
pub use parser::{ActionParser, ParsedResponse};
pub use planning::{PlanStep, Planner};
pub use slot::{ControllerSlot, RunHandle};
