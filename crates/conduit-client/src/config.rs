// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the platform client.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Default platform API root.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8090/api/v1/";

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root. Must end with `/`.
    pub base_url: String,
    /// Timeout for a single request.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONDUIT_PLATFORM_URL`: API root (default: "http://127.0.0.1:8090/api/v1/")
    /// - `CONDUIT_PLATFORM_TIMEOUT_MS`: Request timeout in milliseconds (default: 5000)
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("CONDUIT_PLATFORM_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let request_timeout_ms: u64 = std::env::var("CONDUIT_PLATFORM_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|e| {
                ClientError::Config(format!("invalid CONDUIT_PLATFORM_TIMEOUT_MS: {}", e))
            })?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    /// Set the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
