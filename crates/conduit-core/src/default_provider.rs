// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory device provider.
//!
//! Keeps the registered installations and instances in memory and owns the update
//! queue. Connectors embed it, push events through [`DefaultProvider::update_sender`]
//! and plug in an [`ActionHandler`] if they expose actions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use conduit_protocol::{ActionRequest, ActionRequestStatus};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::model::{Installation, Instance};
use crate::provider::{DeviceProvider, ProviderError, UpdateEvent};

/// Default capacity of the update queue.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Performs actions requested by the platform.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action. Return `Pending` and push an [`ActionEvent`](crate::provider::ActionEvent)
    /// later for long-running actions.
    async fn handle(
        &self,
        instance: &Instance,
        request: &ActionRequest,
    ) -> Result<ActionRequestStatus, ProviderError>;
}

/// [`DeviceProvider`] backed by in-memory maps and a bounded channel.
pub struct DefaultProvider {
    installations: RwLock<HashMap<String, Installation>>,
    instances: RwLock<HashMap<String, Instance>>,
    sender: Mutex<Option<mpsc::Sender<UpdateEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<UpdateEvent>>>,
    action_handler: Option<Arc<dyn ActionHandler>>,
}

impl std::fmt::Debug for DefaultProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultProvider")
            .field("action_handler", &self.action_handler.as_ref().map(|_| "..."))
            .finish_non_exhaustive()
    }
}

impl Default for DefaultProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultProvider {
    /// Create a provider without action support.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_UPDATE_CAPACITY)
    }

    /// Create a provider whose update queue holds up to `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            installations: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            action_handler: None,
        }
    }

    /// Handle action requests with `handler`.
    pub fn with_action_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.action_handler = Some(handler);
        self
    }

    /// Sender for pushing device updates to the platform.
    ///
    /// Returns `None` after [`close_update_events`](DeviceProvider::close_update_events).
    pub fn update_sender(&self) -> Option<mpsc::Sender<UpdateEvent>> {
        self.sender.lock().ok()?.clone()
    }

    /// A registered installation.
    pub async fn installation(&self, id: &str) -> Option<Installation> {
        self.installations.read().await.get(id).cloned()
    }

    /// A registered instance.
    pub async fn instance(&self, id: &str) -> Option<Instance> {
        self.instances.read().await.get(id).cloned()
    }

    /// All registered instances.
    pub async fn instances(&self) -> Vec<Instance> {
        self.instances.read().await.values().cloned().collect()
    }

    /// Number of registered installations.
    pub async fn installation_count(&self) -> usize {
        self.installations.read().await.len()
    }
}

#[async_trait]
impl DeviceProvider for DefaultProvider {
    fn take_update_events(&self) -> Option<mpsc::Receiver<UpdateEvent>> {
        self.receiver.lock().ok()?.take()
    }

    fn close_update_events(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            if sender.take().is_some() {
                debug!("Update queue closed");
            }
        }
    }

    async fn register_installations(
        &self,
        installations: Vec<Installation>,
    ) -> Result<(), ProviderError> {
        let mut registered = self.installations.write().await;
        for installation in installations {
            debug!(installation_id = %installation.id, "Registering installation");
            registered.insert(installation.id.clone(), installation);
        }
        Ok(())
    }

    async fn remove_installation(&self, installation_id: &str) -> Result<(), ProviderError> {
        if self
            .installations
            .write()
            .await
            .remove(installation_id)
            .is_none()
        {
            return Err(ProviderError::UnknownInstallation(
                installation_id.to_string(),
            ));
        }

        let mut instances = self.instances.write().await;
        let before = instances.len();
        instances.retain(|_, instance| instance.installation_id != installation_id);

        info!(
            installation_id,
            removed_instances = before - instances.len(),
            "Installation removed from provider"
        );
        Ok(())
    }

    async fn register_instances(&self, instances: Vec<Instance>) -> Result<(), ProviderError> {
        let mut registered = self.instances.write().await;
        for instance in instances {
            debug!(
                instance_id = %instance.id,
                things = instance.thing_mappings.len(),
                "Registering instance"
            );
            registered.insert(instance.id.clone(), instance);
        }
        Ok(())
    }

    async fn remove_instance(&self, instance_id: &str) -> Result<(), ProviderError> {
        match self.instances.write().await.remove(instance_id) {
            Some(_) => Ok(()),
            None => Err(ProviderError::UnknownInstance(instance_id.to_string())),
        }
    }

    async fn request_action(
        &self,
        instance: &Instance,
        request: &ActionRequest,
    ) -> Result<ActionRequestStatus, ProviderError> {
        match &self.action_handler {
            Some(handler) => handler.handle(instance, request).await,
            None => Err(ProviderError::ActionsNotSupported),
        }
    }
}
