// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for a connector.
//!
//! [`ConnectorRuntime`] wires the service, the update relay and the callback server
//! together so a connector can run inside an existing tokio application.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use conduit_client::ApiClient;
//! use conduit_core::default_provider::DefaultProvider;
//! use conduit_core::persistence;
//! use conduit_core::runtime::ConnectorRuntime;
//! use conduit_core::verification::{RequestContextPolicy, SignatureVerifier};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let persistence = persistence::connect("sqlite:connector.db").await?;
//!     let public_key = conduit_protocol::signing::parse_public_key("...")?;
//!
//!     let runtime = ConnectorRuntime::builder()
//!         .persistence(persistence)
//!         .client(Arc::new(ApiClient::from_env()?))
//!         .provider(Arc::new(DefaultProvider::new()))
//!         .verifier(SignatureVerifier::new(public_key, RequestContextPolicy::Direct))
//!         .bind_addr("0.0.0.0:8080".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use conduit_client::PlatformClient;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::handlers;
use crate::persistence::Persistence;
use crate::provider::DeviceProvider;
use crate::relay::UpdateRelay;
use crate::server;
use crate::service::{ConnectorService, ServiceOptions, ThingTemplates, no_thing_templates};
use crate::verification::SignatureVerifier;

/// How long shutdown waits for the relay to drain queued updates.
pub const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating a [`ConnectorRuntime`].
pub struct ConnectorRuntimeBuilder {
    persistence: Option<Arc<dyn Persistence>>,
    client: Option<Arc<dyn PlatformClient>>,
    provider: Option<Arc<dyn DeviceProvider>>,
    verifier: Option<SignatureVerifier>,
    thing_templates: ThingTemplates,
    options: ServiceOptions,
    bind_addr: SocketAddr,
}

impl std::fmt::Debug for ConnectorRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRuntimeBuilder")
            .field("persistence", &self.persistence.as_ref().map(|_| "..."))
            .field("client", &self.client.as_ref().map(|_| "..."))
            .field("provider", &self.provider.as_ref().map(|_| "..."))
            .field("verifier", &self.verifier)
            .field("options", &self.options)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl Default for ConnectorRuntimeBuilder {
    fn default() -> Self {
        Self {
            persistence: None,
            client: None,
            provider: None,
            verifier: None,
            thing_templates: no_thing_templates(),
            options: ServiceOptions::default(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl ConnectorRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence layer (required).
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the platform client (required).
    pub fn client(mut self, client: Arc<dyn PlatformClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the device provider (required).
    pub fn provider(mut self, provider: Arc<dyn DeviceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the callback signature verifier (required).
    pub fn verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set how thing templates are derived from instantiation requests.
    ///
    /// Default: no things are created.
    pub fn thing_templates(mut self, thing_templates: ThingTemplates) -> Self {
        self.thing_templates = thing_templates;
        self
    }

    /// Set thing synchronization options.
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the bind address for the callback server.
    ///
    /// Default: `0.0.0.0:8080`
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing or the options conflict.
    pub fn build(self) -> Result<ConnectorRuntimeConfig> {
        let persistence = self
            .persistence
            .ok_or_else(|| anyhow::anyhow!("persistence is required"))?;
        let client = self
            .client
            .ok_or_else(|| anyhow::anyhow!("platform client is required"))?;
        let provider = self
            .provider
            .ok_or_else(|| anyhow::anyhow!("device provider is required"))?;
        let verifier = self
            .verifier
            .ok_or_else(|| anyhow::anyhow!("signature verifier is required"))?;

        let service = ConnectorService::new(
            persistence,
            client,
            provider,
            self.thing_templates,
            self.options,
        )?;

        Ok(ConnectorRuntimeConfig {
            service,
            verifier: Arc::new(verifier),
            bind_addr: self.bind_addr,
        })
    }
}

/// Configuration for a [`ConnectorRuntime`].
#[derive(Debug)]
pub struct ConnectorRuntimeConfig {
    service: ConnectorService,
    verifier: Arc<SignatureVerifier>,
    bind_addr: SocketAddr,
}

impl ConnectorRuntimeConfig {
    /// Start the runtime.
    ///
    /// Restores persisted state into the provider, starts the update relay and binds the
    /// callback server.
    pub async fn start(self) -> Result<ConnectorRuntime> {
        self.service.restore().await?;

        let relay_handle = match UpdateRelay::from_provider(self.service.clone()) {
            Some(relay) => Some(relay.spawn()),
            None => {
                warn!("Provider update stream already taken, relay not started");
                None
            }
        };

        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = handlers::router(self.service.clone(), self.verifier);
        let server_handle = tokio::spawn(server::serve(listener, app, shutdown_rx));

        info!(addr = %local_addr, "ConnectorRuntime started");

        Ok(ConnectorRuntime {
            server_handle,
            relay_handle,
            shutdown_tx,
            service: self.service,
            local_addr,
        })
    }
}

/// A running connector.
///
/// The runtime manages:
/// - the HTTP server for platform callbacks
/// - the relay forwarding provider updates to the platform
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct ConnectorRuntime {
    server_handle: JoinHandle<Result<()>>,
    relay_handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    service: ConnectorService,
    local_addr: SocketAddr,
}

impl std::fmt::Debug for ConnectorRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRuntime")
            .field("service", &self.service)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl ConnectorRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> ConnectorRuntimeBuilder {
        ConnectorRuntimeBuilder::new()
    }

    /// Address the callback server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The lifecycle service, for pushing updates outside the relay.
    pub fn service(&self) -> &ConnectorService {
        &self.service
    }

    /// Gracefully shut down the runtime.
    ///
    /// Stops accepting callbacks and waits for in-flight requests. Then closes the
    /// provider's update queue and lets the relay forward what is still queued. The relay
    /// is aborted if other senders keep the queue open past [`RELAY_DRAIN_TIMEOUT`].
    pub async fn shutdown(self) -> Result<()> {
        info!("ConnectorRuntime shutting down...");

        let _ = self.shutdown_tx.send(true);

        let result = match self.server_handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!("ConnectorRuntime server error during shutdown: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("ConnectorRuntime server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
        };

        self.service.provider().close_update_events();
        if let Some(relay) = self.relay_handle {
            let abort = relay.abort_handle();
            match tokio::time::timeout(RELAY_DRAIN_TIMEOUT, relay).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Update relay task failed: {}", e),
                Err(_) => {
                    warn!(
                        timeout_secs = RELAY_DRAIN_TIMEOUT.as_secs(),
                        "Update queue still open, aborting relay"
                    );
                    abort.abort();
                }
            }
        }

        if result.is_ok() {
            info!("ConnectorRuntime shutdown complete");
        }
        result
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished()
    }
}
