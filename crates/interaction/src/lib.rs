#![deny(unused)]
//! Human-in-the-loop channel for Browzee.
//!
//! This crate provides:
//! - A listener registry with FIFO status broadcast
//! - A single-outstanding `ask` resolved by the operator's reply
//! - The JSON message shapes exchanged over `/ws/status`

pub mod channel;
pub mod message;

pub use channel::{InteractionChannel, ListenerId};
pub use message::{InboundMessage, OutboundMessage};
