// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response bodies of the platform callback API.

use chrono::{DateTime, Utc};
use conduit_protocol::ActionRequestStatus;
use conduit_protocol::thing::{StatusType, Thing};
use serde::{Deserialize, Serialize};

/// Body of `POST .../things`.
#[derive(Debug, Serialize)]
pub struct AddThingRequest<'a> {
    /// Description of the thing to create.
    pub thing: &'a Thing,
}

/// Answer to [`AddThingRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddThingResponse {
    /// Platform-assigned thing id.
    pub id: String,
}

/// Body of a property value update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThingPropertyValueRequest {
    /// New value.
    pub value: String,
    /// When the value changed.
    pub last_update: DateTime<Utc>,
}

/// Body of a thing status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateThingStatusRequest {
    /// New availability.
    pub status: StatusType,
}

/// Body of an action request status update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequestStatusUpdate {
    /// New status.
    pub status: ActionRequestStatus,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
