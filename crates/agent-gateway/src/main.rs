use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use agent_core::ToolRegistry;
use agent_gateway::cli::{Cli, Command};
use agent_gateway::config::GatewayConfig;
use agent_gateway::providers::OpenAiCompatProvider;
use agent_gateway::state::AppState;
use agent_gateway::storage::MemoryStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_server(GatewayConfig::from_env_and_flags(None, None)).await,
        Some(Command::Serve { bind, system_prompt }) => {
            run_server(GatewayConfig::from_env_and_flags(bind, system_prompt)).await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,agent_gateway=debug")),
        )
        .init();
}

async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("agent gateway starting");

    if config.token.is_none() {
        tracing::warn!("GATEWAY_TOKEN not set — sessions endpoint is unauthenticated");
    }

    let registry = ToolRegistry::with_builtins();
    let provider = Arc::new(OpenAiCompatProvider::new(
        config.openai_base_url.clone(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    ));
    let storage = Arc::new(MemoryStorage::new());

    let bind = config.bind.clone();
    let state = AppState::new(config, registry, provider, storage);
    let app = agent_gateway::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding to {bind}"))?;
    tracing::info!(addr = %bind, "agent gateway listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
