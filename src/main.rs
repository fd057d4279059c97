#![deny(unused)]
//! Browzee - browser automation agent server.
//!
//! Runs browser tasks one at a time behind an HTTP API, streams progress to
//! connected operators over `/ws/status` and relays their answers back to
//! the agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use browzee_browser::{ChromiumLauncher, LaunchOptions};
use browzee_controller::ControllerSlot;
use browzee_core::config::AppConfig;
use browzee_gateway::{configure_tracing, setup_metrics_recorder, GatewayServer, TaskService};
use browzee_interaction::InteractionChannel;
use browzee_model_gateway::{MockLlmClient, ModelSet, ProviderConfig};
use browzee_store::{default_memory_dir, FileFactStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    configure_tracing(&config.logging)?;

    tracing::info!("Starting Browzee v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Models
    // =========================================================================
    let providers_path = Path::new("providers.json");
    if providers_path.exists() {
        tracing::info!("Loading LLM config from providers.json");
        match ProviderConfig::load(providers_path).await {
            Ok(providers) => {
                if let Some(chat) = providers.model_with_capability("chat") {
                    config.models.chat = chat;
                }
                if let Some(vision) = providers.model_with_capability("vision") {
                    config.models.vision = Some(vision);
                }
                if let Some(planner) = providers.model_with_capability("planning") {
                    config.models.planner = Some(planner);
                }
            }
            Err(e) => {
                tracing::error!("Failed to parse providers.json: {}. Using configured models.", e);
            }
        }
    }

    let models = match ModelSet::from_config(&config.models) {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!("Failed to create chat model: {}. Falling back to mock client.", e);
            ModelSet::single(Arc::new(MockLlmClient))
        }
    };
    tracing::info!(
        chat = %config.models.chat.model,
        planner = models.planner.is_some(),
        vision = models.vision.is_some(),
        "Models ready"
    );

    // =========================================================================
    // Memory, browser, operator channel
    // =========================================================================
    let memory_dir = config
        .memory
        .directory
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_memory_dir);
    tracing::info!(dir = %memory_dir.display(), user = %config.agent.user_id, "Long-term memory");
    let memory = Arc::new(MemoryStore::new(
        config.agent.user_id.clone(),
        Arc::new(FileFactStore::new(memory_dir)),
    ));

    let launcher = Arc::new(ChromiumLauncher::new(LaunchOptions::from(&config.browser)));

    let mut channel = InteractionChannel::new();
    if let Some(secs) = config.agent.ask_timeout_secs {
        channel = channel.with_timeout(Duration::from_secs(secs));
    }
    let channel = Arc::new(channel);

    let service = TaskService::new(
        Arc::new(ControllerSlot::new()),
        launcher,
        models,
        channel,
        config.agent.clone(),
    )
    .with_memory(memory);

    // =========================================================================
    // Server
    // =========================================================================
    let mut server = GatewayServer::new(config.server.clone(), Arc::new(service));
    if config.server.enable_metrics {
        server = server.with_metrics(setup_metrics_recorder()?);
    }

    server.run().await?;
    Ok(())
}
