// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Callback messages exchanged between the platform and a connector.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque bearer credential issued by the platform for an installation or instance.
///
/// The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value, for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle state of an installation or instance.
///
/// Only `Initialized` is ever produced locally. Later states are reported by the
/// connector to the platform, never derived from stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum LifecycleState {
    /// Record was created.
    Initialized = 1,
    /// Setup did not finish in time.
    Timeout = 2,
    /// Setup continues asynchronously.
    Ongoing = 3,
    /// The connector refused the request.
    Rejected = 4,
    /// Setup failed.
    Failed = 5,
}

impl TryFrom<i32> for LifecycleState {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Initialized),
            2 => Ok(Self::Timeout),
            3 => Ok(Self::Ongoing),
            4 => Ok(Self::Rejected),
            5 => Ok(Self::Failed),
            other => Err(format!("unknown lifecycle state: {}", other)),
        }
    }
}

impl From<LifecycleState> for i32 {
    fn from(state: LifecycleState) -> Self {
        state as i32
    }
}

/// A single configuration entry supplied by the user during installation or instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Configuration key.
    pub id: String,
    /// Arbitrary JSON value.
    pub value: serde_json::Value,
}

/// Sent by the platform when the connector is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationRequest {
    /// Installation identity.
    pub id: String,
    /// Credential for calls on behalf of this installation.
    pub token: Token,
    /// State reported by the platform.
    pub state: LifecycleState,
    /// User-supplied configuration, in order.
    #[serde(default)]
    pub configuration: Vec<Configuration>,
    /// When the platform issued the request.
    pub timestamp: DateTime<Utc>,
}

/// Sent by the platform when a new instance of an installation is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiationRequest {
    /// Instance identity.
    pub id: String,
    /// Owning installation.
    pub installation_id: String,
    /// Credential for calls on behalf of this instance.
    pub token: Token,
    /// State reported by the platform.
    pub state: LifecycleState,
    /// User-supplied configuration, in order.
    #[serde(default)]
    pub configuration: Vec<Configuration>,
    /// When the platform issued the request.
    pub timestamp: DateTime<Utc>,
}

/// Body of an installation or instance state update sent to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdateRequest {
    /// New state.
    pub state: LifecycleState,
    /// Opaque details shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// A named action argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameterValue {
    /// Parameter name as declared on the action.
    pub name: String,
    /// Parameter value.
    pub value: String,
}

/// Sent by the platform to trigger an action on a thing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    /// Action request identity, used for later status updates.
    pub id: String,
    /// Platform-assigned thing identity.
    pub thing_id: String,
    /// Component that declares the action.
    pub component_id: String,
    /// Action identity within the component.
    pub action_id: String,
    /// Arguments.
    #[serde(default)]
    pub parameters: Vec<ActionParameterValue>,
}

/// Outcome of an action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRequestStatus {
    /// The action finished.
    Completed,
    /// The action is still running; a status update will follow.
    Pending,
    /// The action failed.
    Failed,
}

/// Answer to an action request, or a later status update for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Outcome.
    pub status: ActionRequestStatus,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    /// A completed action.
    pub fn completed() -> Self {
        Self {
            status: ActionRequestStatus::Completed,
            error: None,
        }
    }

    /// An action still in progress.
    pub fn pending() -> Self {
        Self {
            status: ActionRequestStatus::Pending,
            error: None,
        }
    }

    /// A failed action with its reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ActionRequestStatus::Failed,
            error: Some(error.into()),
        }
    }
}
