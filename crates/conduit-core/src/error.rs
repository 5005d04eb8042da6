// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for conduit-core.

use std::fmt;

use conduit_client::ClientError;
use conduit_protocol::ThingError;

use crate::provider::ProviderError;

/// Result type using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Kind of record a [`CoreError::NotFound`] or [`CoreError::AlreadyExists`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// An installation.
    Installation,
    /// An instance.
    Instance,
    /// A thing mapping.
    ThingMapping,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Installation => "Installation",
            Self::Instance => "Instance",
            Self::ThingMapping => "Thing mapping",
        })
    }
}

/// Errors raised by the connector runtime.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The record does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of record.
        entity: Entity,
        /// The id that was looked up.
        id: String,
    },

    /// A record with the same identity exists.
    #[error("{entity} '{id}' already exists")]
    AlreadyExists {
        /// Kind of record.
        entity: Entity,
        /// The conflicting id.
        id: String,
    },

    /// Mutually exclusive or malformed options.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A thing template failed validation.
    #[error("invalid thing description: {0}")]
    InvalidThing(#[from] ThingError),

    /// Database operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// A platform call failed.
    #[error("platform error: {0}")]
    Platform(#[from] ClientError),

    /// The device provider rejected a call.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`].
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether this is a [`CoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::InvalidThing(_) => "INVALID_THING",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Platform(_) => "PLATFORM_ERROR",
            Self::Provider(_) => "PROVIDER_ERROR",
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Database {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}
