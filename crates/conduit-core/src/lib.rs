// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Conduit Core - Connector Runtime
//!
//! This crate hosts the connector side of the platform callback protocol. It verifies
//! signed callbacks, tracks installations and instances, registers things with the
//! platform and relays device updates back to it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              Platform                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │ signed callbacks                             ▲
//!           ▼                                              │ conduit-client
//! ┌───────────────────────┐    ┌──────────────────┐    ┌───────────────────┐
//! │  verification +       │───►│ ConnectorService │───►│   UpdateRelay     │
//! │  handlers (axum)      │    │  (lifecycle)     │    │ (sequential)      │
//! └───────────────────────┘    └──────────────────┘    └───────────────────┘
//!                                 │            │                ▲
//!                                 ▼            ▼                │ UpdateEvent
//!                      ┌──────────────┐  ┌───────────────────────────────┐
//!                      │ Persistence  │  │        DeviceProvider          │
//!                      │ (SQL)        │  │  (connector-specific devices)  │
//!                      └──────────────┘  └───────────────────────────────┘
//! ```
//!
//! # Callback Protocol
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /installations` | Persist an installation and register it with the provider |
//! | `DELETE /installations/{id}` | Unregister and delete an installation with its instances |
//! | `POST /instances` | Persist an instance and synchronize its things |
//! | `DELETE /instances/{id}` | Unregister and delete an instance with its mappings |
//! | `POST /actions` | Forward an action to the provider |
//!
//! Every callback must carry a valid ed25519 `Signature` header; see [`verification`].
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `CONDUIT_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `CONDUIT_PUBLIC_KEY` | Yes | - | Base64 ed25519 key callbacks are signed with |
//! | `CONDUIT_HTTP_PORT` | No | `8080` | Callback server port |
//! | `CONDUIT_PROXY_HOST` | No | - | Public host when behind a proxy |
//! | `CONDUIT_PROXY_PATH` | No | - | Public path prefix of the routes when behind a proxy |
//! | `CONDUIT_ASYNC_INSTANCE_CREATION` | No | `false` | Synchronize things in the background |
//! | `CONDUIT_ENFORCE_THING_CREATION` | No | `!async` | Fail instantiation on the first thing error |
//! | `CONDUIT_MAX_BODY_BYTES` | No | `10485760` | Largest callback body |
//! | `CONDUIT_PLATFORM_URL` | No | `http://127.0.0.1:8090/api/v1/` | Platform API base URL |
//! | `CONDUIT_PLATFORM_TIMEOUT_MS` | No | `5000` | Platform request timeout |
//!
//! # Modules
//!
//! - [`config`]: Server configuration from environment variables
//! - [`persistence`]: SQL storage for installations, instances and thing mappings
//! - [`service`]: Lifecycle orchestration and thing synchronization
//! - [`relay`]: Forwarding of provider updates to the platform
//! - [`verification`]: Signature verification middleware
//! - [`runtime`]: Embeddable runtime tying everything together

#![deny(missing_docs)]

/// Server configuration loaded from environment variables.
pub mod config;

/// In-memory device provider for connectors without device logic of their own.
pub mod default_provider;

/// Error types for connector operations with error code mapping.
pub mod error;

/// HTTP routes for the callback protocol.
pub mod handlers;

/// Embedded database migrations.
pub mod migrations;

/// Installation, instance and thing mapping records.
pub mod model;

/// Persistence trait and SQL backends.
pub mod persistence;

/// Device provider contract.
pub mod provider;

/// Update relay from the provider to the platform.
pub mod relay;

/// Embeddable connector runtime.
pub mod runtime;

/// HTTP server.
pub mod server;

/// Lifecycle orchestration.
pub mod service;

/// Callback signature verification.
pub mod verification;
