#![deny(unused)]
//! HTTP and WebSocket entry point for Browzee.
//!
//! This crate provides the task service behind `/run-task` and the control
//! endpoints, the operator WebSocket, and the process-wide logging and
//! metrics setup.

pub mod metrics;
pub mod server;
pub mod task_service;
pub mod telemetry;
pub mod ws;

pub use crate::metrics::setup_metrics_recorder;
pub use server::{ApiError, AppState, GatewayServer};
pub use task_service::{
    ControlResponse, SearchResponse, StatusResponse, TaskResponse, TaskService,
};
pub use telemetry::configure_tracing;
