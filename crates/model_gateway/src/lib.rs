#![deny(unused)]
//! Model Gateway for Browzee.
//!
//! This crate provides:
//! - Rig LLM client adapter (OpenAI, Anthropic; text only)
//! - OpenAI-compatible multimodal HTTP client (xAI, Gemini, OpenAI)
//! - Mock client for offline runs
//! - Provider config loading and the chat/planner/vision model set

pub mod config;
pub mod openai_compat;
pub mod providers;
pub mod rig_client;

pub use config::ProviderConfig;
pub use openai_compat::OpenAiCompatClient;
pub use providers::{build_client, MockLlmClient, ModelSet};
pub use rig_client::{create_default_client, RigConfig, RigLlmClient, RigProvider};
