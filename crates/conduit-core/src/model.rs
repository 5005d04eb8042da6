// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Installations, instances and thing mappings as stored by the connector.

use conduit_protocol::thing::Thing;
use conduit_protocol::{Configuration, InstallationRequest, Token};

/// A registration of the connector with one platform tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct Installation {
    /// Installation identity.
    pub id: String,
    /// Credential for calls on behalf of this installation.
    pub token: Token,
    /// Configuration in the order it was supplied.
    pub configuration: Vec<Configuration>,
}

impl From<&InstallationRequest> for Installation {
    fn from(request: &InstallationRequest) -> Self {
        Self {
            id: request.id.clone(),
            token: request.token.clone(),
            configuration: request.configuration.clone(),
        }
    }
}

/// A concrete instantiation under an installation.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Instance identity.
    pub id: String,
    /// Owning installation.
    pub installation_id: String,
    /// Credential for calls on behalf of this instance.
    pub token: Token,
    /// Configuration in the order it was supplied.
    pub configuration: Vec<Configuration>,
    /// Things registered for this instance.
    pub thing_mappings: Vec<ThingMapping>,
}

impl Instance {
    /// Platform thing id registered for a device, if any.
    pub fn thing_id_for(&self, external_id: &str) -> Option<&str> {
        self.thing_mappings
            .iter()
            .find(|m| m.external_id == external_id)
            .map(|m| m.thing_id.as_str())
    }
}

/// Correlates a platform thing with the connector's own device id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, sqlx::FromRow)]
pub struct ThingMapping {
    /// Owning instance.
    pub instance_id: String,
    /// Platform-assigned thing id.
    pub thing_id: String,
    /// Connector-side device id, unique per instance.
    pub external_id: String,
}

/// A thing to create for a new instance, together with its device id.
#[derive(Debug, Clone, PartialEq)]
pub struct ThingTemplate {
    /// Description sent to the platform.
    pub thing: Thing,
    /// Connector-side device id.
    pub external_id: String,
}

impl ThingTemplate {
    /// Pair a thing description with a device id.
    pub fn new(thing: Thing, external_id: impl Into<String>) -> Self {
        Self {
            thing,
            external_id: external_id.into(),
        }
    }
}
