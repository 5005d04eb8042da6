// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Forwarding of provider update events to the platform.
//!
//! The relay consumes the provider's event stream one event at a time. Within an event
//! the property update is pushed before the action outcome; if the property update fails
//! the action is reported as `FAILED` regardless of what the provider said.

use conduit_protocol::ActionResponse;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::provider::UpdateEvent;
use crate::service::ConnectorService;

/// Sequential consumer of [`UpdateEvent`]s.
pub struct UpdateRelay {
    service: ConnectorService,
    events: mpsc::Receiver<UpdateEvent>,
}

impl std::fmt::Debug for UpdateRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRelay")
            .field("service", &self.service)
            .field("events", &"...")
            .finish()
    }
}

impl UpdateRelay {
    /// Relay events from `events` through `service`.
    pub fn new(service: ConnectorService, events: mpsc::Receiver<UpdateEvent>) -> Self {
        Self { service, events }
    }

    /// Relay the update stream of the service's provider.
    ///
    /// Returns `None` if the stream has already been taken.
    pub fn from_provider(service: ConnectorService) -> Option<Self> {
        let events = service.provider().take_update_events()?;
        Some(Self::new(service, events))
    }

    /// Run the relay on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events until the provider closes the stream.
    pub async fn run(mut self) {
        info!("Update relay started");

        let mut processed: u64 = 0;
        while let Some(event) = self.events.recv().await {
            self.handle(event).await;
            processed += 1;
        }

        info!(processed, "Update stream closed, relay stopped");
    }

    /// Forward a single event.
    pub async fn handle(&self, event: UpdateEvent) {
        let mut property_error = None;

        if let Some(update) = event.property_update {
            debug!(
                instance_id = %update.instance_id,
                thing_id = %update.thing_id,
                component_id = %update.component_id,
                property_id = %update.property_id,
                "Relaying property update"
            );
            if let Err(e) = self
                .service
                .update_property(
                    &update.instance_id,
                    &update.thing_id,
                    &update.component_id,
                    &update.property_id,
                    &update.value,
                )
                .await
            {
                error!(
                    instance_id = %update.instance_id,
                    thing_id = %update.thing_id,
                    error = %e,
                    "Failed to update property"
                );
                property_error = Some(e);
            }
        }

        if let Some(mut action) = event.action_event {
            if let Some(e) = &property_error {
                warn!(
                    action_request_id = %action.action_request_id,
                    "Marking action as failed after property update failure"
                );
                action.response = ActionResponse::failed(format!("failed to update property: {e}"));
            }

            debug!(
                instance_id = %action.instance_id,
                action_request_id = %action.action_request_id,
                status = ?action.response.status,
                "Relaying action status"
            );
            if let Err(e) = self
                .service
                .update_action_status(
                    &action.instance_id,
                    &action.action_request_id,
                    &action.response,
                )
                .await
            {
                error!(
                    instance_id = %action.instance_id,
                    action_request_id = %action.action_request_id,
                    error = %e,
                    "Failed to update action status"
                );
            }
        }
    }
}
