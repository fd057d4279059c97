#![deny(unused)]
//! Core types, traits, and error definitions for Browzee.
//!
//! This crate provides the foundational building blocks shared by the
//! controller, memory, interaction and gateway crates.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
