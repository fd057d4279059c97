#![deny(unused)]
//! Memory for Browzee.
//!
//! Two tiers:
//! - short-term: the ordered conversation of the current session
//! - long-term: per-user facts (`fact_<n>` -> text) behind a [`FactStore`]
//!
//! [`FactStore`]: browzee_core::traits::FactStore

pub mod facts;
pub mod memory;

pub use facts::{default_memory_dir, FileFactStore, InMemoryFactStore};
pub use memory::{MemoryStore, NO_KNOWN_INFORMATION};
