// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Device provider contract.
//!
//! The provider is the connector-specific half of a connector: it knows how to talk to
//! the external devices. The runtime tells it about installations and instances, forwards
//! action requests to it, and drains its [`UpdateEvent`] queue through the
//! [`UpdateRelay`](crate::relay::UpdateRelay).

use async_trait::async_trait;
use conduit_protocol::{ActionRequest, ActionRequestStatus, ActionResponse};
use tokio::sync::mpsc;

use crate::model::{Installation, Instance};

/// Errors a device provider may report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The installation was never registered with the provider.
    #[error("installation '{0}' is not registered")]
    UnknownInstallation(String),

    /// The instance was never registered with the provider.
    #[error("instance '{0}' is not registered")]
    UnknownInstance(String),

    /// The connector exposes no actions.
    #[error("actions are not supported by this connector")]
    ActionsNotSupported,

    /// The action could not be performed.
    #[error("{0}")]
    Action(String),
}

/// A property value changed on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyUpdateEvent {
    /// Instance owning the thing.
    pub instance_id: String,
    /// Platform thing id.
    pub thing_id: String,
    /// Component holding the property.
    pub component_id: String,
    /// Property id.
    pub property_id: String,
    /// New value.
    pub value: String,
}

/// An action answered as pending has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    /// Instance the action was requested for.
    pub instance_id: String,
    /// Id of the original action request.
    pub action_request_id: String,
    /// Final outcome.
    pub response: ActionResponse,
}

/// A device-originated update. Either part, or both, may be present.
///
/// When both are present the property update is forwarded first; if it fails, the
/// action is reported as failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateEvent {
    /// Property change to forward.
    pub property_update: Option<PropertyUpdateEvent>,
    /// Action outcome to forward.
    pub action_event: Option<ActionEvent>,
}

impl UpdateEvent {
    /// An event carrying only a property change.
    pub fn property(update: PropertyUpdateEvent) -> Self {
        Self {
            property_update: Some(update),
            action_event: None,
        }
    }

    /// An event carrying only an action outcome.
    pub fn action(event: ActionEvent) -> Self {
        Self {
            property_update: None,
            action_event: Some(event),
        }
    }

    /// Attach an action outcome that depends on this event's property change.
    pub fn with_action(mut self, event: ActionEvent) -> Self {
        self.action_event = Some(event);
        self
    }
}

/// Connector-specific device integration.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Hand out the single ordered update queue.
    ///
    /// Returns `None` once the receiver has been taken.
    fn take_update_events(&self) -> Option<mpsc::Receiver<UpdateEvent>>;

    /// Drop the provider's own handle on the update queue.
    ///
    /// The stream ends once every other sender is gone too. Providers that keep no
    /// sender need not override this.
    fn close_update_events(&self) {}

    /// Start serving installations.
    async fn register_installations(
        &self,
        installations: Vec<Installation>,
    ) -> Result<(), ProviderError>;

    /// Stop serving an installation.
    async fn remove_installation(&self, installation_id: &str) -> Result<(), ProviderError>;

    /// Start serving instances, including their thing mappings.
    async fn register_instances(&self, instances: Vec<Instance>) -> Result<(), ProviderError>;

    /// Stop serving an instance.
    async fn remove_instance(&self, instance_id: &str) -> Result<(), ProviderError>;

    /// Perform an action on a device.
    ///
    /// A returned [`ActionRequestStatus::Failed`] must be reported as `Err` instead.
    async fn request_action(
        &self,
        instance: &Instance,
        request: &ActionRequest,
    ) -> Result<ActionRequestStatus, ProviderError>;
}
