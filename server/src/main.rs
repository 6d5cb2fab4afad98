mod config;
mod services;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use matatena_core::repository::game_repository::GameRepository;
use matatena_core::repository::profile_repository::ProfileRepository;
use matatena_core::{DiceService, JwtIdentityProvider, RulesPolicy, SessionService};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::mongo_config::setup_mongo;
use crate::config::server_config::ServerConfig;
use crate::services::live_game_socket_service::{run_live_game_websocket_server, GameHub};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("matatena_server=debug")),
        )
        .init();

    let config = ServerConfig::parse();
    let mongo_client = setup_mongo(&config.mongo_uri)
        .await
        .with_context(|| format!("connecting to {}", config.mongo_uri))?;

    let games = GameRepository::new(&mongo_client, &config.database);
    games.ensure_indexes().await.context("creating ledger indexes")?;
    let profiles = ProfileRepository::new(&mongo_client, &config.database);

    let rules = if config.strict_rules {
        RulesPolicy::strict()
    } else {
        RulesPolicy::permissive()
    };
    let hub = Arc::new(GameHub::new(
        Arc::new(SessionService::new(Arc::new(games), rules)),
        DiceService::new(Arc::new(profiles)),
        Arc::new(JwtIdentityProvider::new(config.jwt_secret.as_bytes())),
        config.handshake_timeout(),
    ));

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    info!(addr = %config.addr, ?rules, "starting push server");
    run_live_game_websocket_server(listener, hub).await;
    Ok(())
}
