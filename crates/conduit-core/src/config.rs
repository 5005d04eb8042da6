// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

use conduit_protocol::signing::parse_public_key;
use ed25519_dalek::VerifyingKey;

use crate::service::ServiceOptions;
use crate::verification::{DEFAULT_MAX_BODY_BYTES, RequestContextPolicy, SignatureVerifier};

/// Connector configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// HTTP server address for platform callbacks
    pub http_addr: SocketAddr,
    /// Platform key callbacks are signed with
    pub public_key: VerifyingKey,
    /// Host and URI used when verifying signatures
    pub request_context: RequestContextPolicy,
    /// Thing synchronization options
    pub service_options: ServiceOptions,
    /// Largest callback body accepted
    pub max_body_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CONDUIT_DATABASE_URL`: PostgreSQL or SQLite connection string
    /// - `CONDUIT_PUBLIC_KEY`: base64 ed25519 public key of the platform
    ///
    /// Optional (with defaults):
    /// - `CONDUIT_HTTP_PORT`: callback server port (default: 8080)
    /// - `CONDUIT_PROXY_HOST` / `CONDUIT_PROXY_PATH`: public host and path prefix behind a proxy (both or neither)
    /// - `CONDUIT_ASYNC_INSTANCE_CREATION`: create things in the background (default: false)
    /// - `CONDUIT_ENFORCE_THING_CREATION`: fail instantiation on thing errors (default: the opposite of async)
    /// - `CONDUIT_MAX_BODY_BYTES`: largest callback body (default: 10485760)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("CONDUIT_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("CONDUIT_DATABASE_URL"))?;

        let public_key = std::env::var("CONDUIT_PUBLIC_KEY")
            .map_err(|_| ConfigError::Missing("CONDUIT_PUBLIC_KEY"))?;
        let public_key = parse_public_key(&public_key).map_err(|_| {
            ConfigError::Invalid(
                "CONDUIT_PUBLIC_KEY",
                "must be a base64-encoded 32-byte ed25519 public key",
            )
        })?;

        let http_port: u16 = std::env::var("CONDUIT_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CONDUIT_HTTP_PORT", "must be a valid port number")
            })?;

        let request_context = match (
            std::env::var("CONDUIT_PROXY_HOST").ok(),
            std::env::var("CONDUIT_PROXY_PATH").ok(),
        ) {
            (Some(host), Some(path)) => RequestContextPolicy::Proxied { host, path },
            (None, None) => RequestContextPolicy::Direct,
            (Some(_), None) => {
                return Err(ConfigError::Invalid(
                    "CONDUIT_PROXY_PATH",
                    "must be set when CONDUIT_PROXY_HOST is set",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "CONDUIT_PROXY_HOST",
                    "must be set when CONDUIT_PROXY_PATH is set",
                ));
            }
        };

        let async_instance_creation =
            parse_bool("CONDUIT_ASYNC_INSTANCE_CREATION")?.unwrap_or(false);
        let enforce_thing_creation =
            parse_bool("CONDUIT_ENFORCE_THING_CREATION")?.unwrap_or(!async_instance_creation);

        let max_body_bytes: usize = std::env::var("CONDUIT_MAX_BODY_BYTES")
            .unwrap_or_else(|_| DEFAULT_MAX_BODY_BYTES.to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("CONDUIT_MAX_BODY_BYTES", "must be a positive integer")
            })?;

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            public_key,
            request_context,
            service_options: ServiceOptions {
                async_instance_creation,
                enforce_thing_creation,
            },
            max_body_bytes,
        })
    }

    /// Signature verifier for this configuration.
    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(self.public_key, self.request_context.clone())
            .with_max_body_bytes(self.max_body_bytes)
    }
}

fn parse_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid(key, "must be true or false")),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
