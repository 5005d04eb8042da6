// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Conduit Connector - standalone connector process
//!
//! Runs the callback server with the in-memory default provider. Connectors with
//! their own devices embed [`conduit_core::runtime::ConnectorRuntime`] instead.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use conduit_client::ApiClient;
use conduit_core::config::Config;
use conduit_core::default_provider::DefaultProvider;
use conduit_core::persistence;
use conduit_core::runtime::ConnectorRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conduit_core=info".parse()?),
        )
        .init();

    info!("Starting Conduit Connector");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        async_instance_creation = config.service_options.async_instance_creation,
        enforce_thing_creation = config.service_options.enforce_thing_creation,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let persistence = persistence::connect(&config.database_url).await?;
    persistence.health_check().await?;
    info!("Database connection established");

    let client = ApiClient::from_env().map_err(|e| {
        error!("Platform client error: {}", e);
        e
    })?;
    info!(base_url = %client.base_url(), "Platform client configured");

    let runtime = ConnectorRuntime::builder()
        .persistence(persistence)
        .client(Arc::new(client))
        .provider(Arc::new(DefaultProvider::new()))
        .verifier(config.verifier())
        .options(config.service_options)
        .bind_addr(config.http_addr)
        .build()?
        .start()
        .await?;

    info!(addr = %runtime.local_addr(), "Conduit Connector initialized successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    runtime.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
