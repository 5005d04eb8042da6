// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Conduit Client - outbound calls from a connector to the platform.
//!
//! Every call is authenticated with the bearer [`Token`](conduit_protocol::Token) of the
//! installation or instance it is made for.
//!
//! | Operation | Method | Endpoint | Expected |
//! |-----------|--------|----------|----------|
//! | `create_thing` | POST | `connectorhub/callback/instances/things` | 201 |
//! | `update_thing_property_value` | PUT | `.../things/{thing}/components/{component}/properties/{property}` | 204 |
//! | `update_thing_status` | PUT | `.../things/{thing}/status` | 204 |
//! | `update_action_status` | PUT | `connectorhub/callback/instances/actions/requests/{id}` | 204 |
//! | `update_installation_state` | POST | `connectorhub/callback/installations/state` | 204 |
//! | `update_instance_state` | POST | `connectorhub/callback/instances/state` | 204 |
//! | `delete_thing` | DELETE | `.../things/{thing}` | 204 |
//!
//! Any other status is reported as [`ClientError::UnexpectedStatusCode`]; the actual status
//! and body are logged.

#![deny(missing_docs)]

/// Platform client trait and its HTTP implementation.
pub mod client;

/// Client configuration.
pub mod config;

/// Client error type.
pub mod error;

/// Recording test double for the platform client.
pub mod mock;

/// Request and response bodies.
pub mod types;

pub use client::{ApiClient, PlatformClient};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use mock::{MockPlatformClient, PlatformCall};
