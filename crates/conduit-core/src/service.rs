// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle orchestration for installations, instances and things.
//!
//! [`ConnectorService`] is called by the callback handlers once a request has passed
//! signature verification. It persists installations and instances, keeps the device
//! provider informed, registers things with the platform and answers action requests.
//!
//! # Thing Synchronization
//!
//! When an instance is added, the thing templates derived from the instantiation request
//! are created on the platform one by one and their mappings persisted. Two options
//! control the behavior:
//!
//! | Option | Effect |
//! |--------|--------|
//! | `async_instance_creation` | Synchronization runs as a background task; the request returns immediately |
//! | `enforce_thing_creation` | The first failing template aborts synchronization and fails the request |
//!
//! The options are mutually exclusive. Without enforcement, failing templates are
//! skipped. In every mode the instance is registered with the provider exactly once,
//! after synchronization, with the mappings that were created.

use std::sync::Arc;

use chrono::Utc;
use conduit_client::PlatformClient;
use conduit_protocol::thing::{StatusType, Thing};
use conduit_protocol::{
    ActionRequest, ActionRequestStatus, ActionResponse, InstallationRequest, InstantiationRequest,
    LifecycleState,
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{CoreError, Entity, Result};
use crate::model::{Installation, Instance, ThingMapping, ThingTemplate};
use crate::persistence::Persistence;
use crate::provider::DeviceProvider;

/// Error text returned when an action targets a thing this connector does not know.
pub const THING_NOT_FOUND: &str = "thing ID was not found at connector";

/// Derives the things to create for a new instance.
pub type ThingTemplates = Arc<dyn Fn(&InstantiationRequest) -> Vec<ThingTemplate> + Send + Sync>;

/// Thing templates for connectors that create things later, or never.
pub fn no_thing_templates() -> ThingTemplates {
    Arc::new(|_: &InstantiationRequest| Vec::new())
}

/// Thing synchronization options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Create things in a background task after answering the instantiation request.
    pub async_instance_creation: bool,
    /// Fail the instantiation request if any thing cannot be created.
    pub enforce_thing_creation: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            async_instance_creation: false,
            enforce_thing_creation: true,
        }
    }
}

impl ServiceOptions {
    /// Background synchronization without enforcement.
    pub fn asynchronous() -> Self {
        Self {
            async_instance_creation: true,
            enforce_thing_creation: false,
        }
    }

    /// Synchronous synchronization that skips failing templates.
    pub fn lenient() -> Self {
        Self {
            async_instance_creation: false,
            enforce_thing_creation: false,
        }
    }

    /// Reject combinations that cannot be honored.
    pub fn validate(&self) -> Result<()> {
        if self.async_instance_creation && self.enforce_thing_creation {
            return Err(CoreError::InvalidConfiguration(
                "enforced thing creation cannot be enabled when async instance creation is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Drives installation and instance lifecycles.
#[derive(Clone)]
pub struct ConnectorService {
    persistence: Arc<dyn Persistence>,
    client: Arc<dyn PlatformClient>,
    provider: Arc<dyn DeviceProvider>,
    thing_templates: ThingTemplates,
    options: ServiceOptions,
}

impl std::fmt::Debug for ConnectorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorService")
            .field("persistence", &"...")
            .field("client", &"...")
            .field("provider", &"...")
            .field("options", &self.options)
            .finish()
    }
}

impl ConnectorService {
    /// Create the service.
    ///
    /// Fails with [`CoreError::InvalidConfiguration`] if `options` enables both async
    /// instance creation and enforced thing creation.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        client: Arc<dyn PlatformClient>,
        provider: Arc<dyn DeviceProvider>,
        thing_templates: ThingTemplates,
        options: ServiceOptions,
    ) -> Result<Self> {
        options.validate()?;

        Ok(Self {
            persistence,
            client,
            provider,
            thing_templates,
            options,
        })
    }

    /// Active options.
    pub fn options(&self) -> ServiceOptions {
        self.options
    }

    /// The persistence layer.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// The device provider.
    pub fn provider(&self) -> &Arc<dyn DeviceProvider> {
        &self.provider
    }

    /// Register all persisted installations and instances with the provider.
    ///
    /// Called once on startup.
    pub async fn restore(&self) -> Result<()> {
        let installations = self.persistence.list_installations().await.map_err(|e| {
            error!(error = %e, "Failed to retrieve installations from database");
            e
        })?;
        let installation_count = installations.len();
        if let Err(e) = self.provider.register_installations(installations).await {
            warn!(error = %e, "Provider rejected restored installations");
        }

        let instances = self.persistence.list_instances().await.map_err(|e| {
            error!(error = %e, "Failed to retrieve instances from database");
            e
        })?;
        let instance_count = instances.len();
        if let Err(e) = self.provider.register_instances(instances).await {
            warn!(error = %e, "Provider rejected restored instances");
        }

        info!(
            installations = installation_count,
            instances = instance_count,
            "Restored connector state"
        );
        Ok(())
    }

    // ========================================================================
    // Installations
    // ========================================================================

    /// Persist a new installation and register it with the provider.
    #[instrument(skip(self, request), fields(installation_id = %request.id))]
    pub async fn add_installation(&self, request: &InstallationRequest) -> Result<()> {
        info!("Received an installation request");

        self.persistence
            .add_installation(request)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to add installation");
                e
            })?;

        if let Err(e) = self
            .provider
            .register_installations(vec![Installation::from(request)])
            .await
        {
            warn!(error = %e, "Provider failed to register installation");
        }

        Ok(())
    }

    /// Unregister an installation and delete it, including its token.
    ///
    /// No further platform calls can be made for the installation afterwards.
    #[instrument(skip(self))]
    pub async fn remove_installation(&self, installation_id: &str) -> Result<()> {
        info!("Received an installation removal request");

        if let Err(e) = self.provider.remove_installation(installation_id).await {
            warn!(error = %e, "Tried to remove installation that is not registered");
        }

        self.persistence
            .remove_installation(installation_id)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to remove installation from database");
                e
            })
    }

    /// Report the state of an installation to the platform.
    pub async fn update_installation_state(
        &self,
        installation_id: &str,
        state: LifecycleState,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let installation = self
            .persistence
            .get_installation(installation_id)
            .await?
            .ok_or_else(|| CoreError::not_found(Entity::Installation, installation_id))?;

        self.client
            .update_installation_state(&installation.token, state, details)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Persist a new instance and synchronize its things.
    ///
    /// In async mode synchronization is detached and its errors are only logged.
    #[instrument(skip(self, request), fields(instance_id = %request.id, installation_id = %request.installation_id))]
    pub async fn add_instance(&self, request: &InstantiationRequest) -> Result<()> {
        info!("Received an instantiation request");

        self.persistence.add_instance(request).await.map_err(|e| {
            error!(error = %e, "Failed to add instance");
            e
        })?;

        let templates = (self.thing_templates)(request);
        let instance = Instance {
            id: request.id.clone(),
            installation_id: request.installation_id.clone(),
            token: request.token.clone(),
            configuration: request.configuration.clone(),
            thing_mappings: Vec::new(),
        };

        if self.options.async_instance_creation {
            let service = self.clone();
            tokio::spawn(async move {
                let instance_id = instance.id.clone();
                if let Err(e) = service.synchronize_things(instance, templates).await {
                    error!(instance_id = %instance_id, error = %e, "Background thing synchronization failed");
                }
            });
            return Ok(());
        }

        self.synchronize_things(instance, templates).await?;
        Ok(())
    }

    /// Create things for `instance` and register it with the provider.
    ///
    /// Returns the mappings that were created. With enforcement the first failure aborts
    /// the remaining templates and is returned after the provider registration.
    pub async fn synchronize_things(
        &self,
        mut instance: Instance,
        templates: Vec<ThingTemplate>,
    ) -> Result<Vec<ThingMapping>> {
        let enforce = self.options.enforce_thing_creation && !self.options.async_instance_creation;
        let total = templates.len();

        let mut mappings = Vec::with_capacity(total);
        let mut failure = None;

        for template in &templates {
            match self.create_thing_for(&instance, template).await {
                Ok(mapping) => mappings.push(mapping),
                Err(e) => {
                    error!(
                        instance_id = %instance.id,
                        external_id = %template.external_id,
                        name = %template.thing.name,
                        error = %e,
                        "Failed to create new thing"
                    );
                    if enforce {
                        info!(instance_id = %instance.id, "Cancelling instance creation since thing creation is enforced");
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        info!(
            instance_id = %instance.id,
            created = mappings.len(),
            total,
            "Thing synchronization finished"
        );

        instance.thing_mappings = mappings.clone();
        if let Err(e) = self.provider.register_instances(vec![instance]).await {
            warn!(error = %e, "Provider failed to register instance");
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(mappings),
        }
    }

    /// Unregister an instance and delete it, including its token and thing mappings.
    #[instrument(skip(self))]
    pub async fn remove_instance(&self, instance_id: &str) -> Result<()> {
        info!("Received an instance removal request");

        if let Err(e) = self.provider.remove_instance(instance_id).await {
            warn!(error = %e, "Tried to remove instance that is not registered");
        }

        self.persistence
            .remove_instance(instance_id)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to remove instance from database");
                e
            })
    }

    /// Report the state of an instance to the platform.
    pub async fn update_instance_state(
        &self,
        instance_id: &str,
        state: LifecycleState,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let instance = self.instance(instance_id).await?;
        self.client
            .update_instance_state(&instance.token, state, details)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Things
    // ========================================================================

    /// Register a thing for an existing instance.
    ///
    /// A device that already has a mapping in the instance is not created again.
    pub async fn create_thing(
        &self,
        instance_id: &str,
        thing: Thing,
        external_id: &str,
    ) -> Result<ThingMapping> {
        let instance = self.instance(instance_id).await?;
        self.create_thing_for(&instance, &ThingTemplate::new(thing, external_id))
            .await
    }

    async fn create_thing_for(
        &self,
        instance: &Instance,
        template: &ThingTemplate,
    ) -> Result<ThingMapping> {
        template.thing.verify()?;

        if let Some(existing) = self
            .persistence
            .get_mapping_by_external_id(&instance.id, &template.external_id)
            .await?
        {
            debug!(
                instance_id = %instance.id,
                external_id = %template.external_id,
                thing_id = %existing.thing_id,
                "Thing already registered"
            );
            return Ok(existing);
        }

        let thing_id = self
            .client
            .create_thing(&instance.token, &template.thing)
            .await?;

        let mapping = ThingMapping {
            instance_id: instance.id.clone(),
            thing_id,
            external_id: template.external_id.clone(),
        };
        self.persistence.add_thing_mapping(&mapping).await?;

        info!(
            instance_id = %mapping.instance_id,
            thing_id = %mapping.thing_id,
            external_id = %mapping.external_id,
            "Created new thing"
        );
        Ok(mapping)
    }

    /// Delete a thing from the platform and forget its mapping.
    pub async fn remove_thing(&self, instance_id: &str, thing_id: &str) -> Result<()> {
        let instance = self.instance(instance_id).await?;
        self.client.delete_thing(&instance.token, thing_id).await?;
        self.persistence
            .remove_thing_mapping(instance_id, thing_id)
            .await
    }

    /// Push a property value of a thing to the platform.
    pub async fn update_property(
        &self,
        instance_id: &str,
        thing_id: &str,
        component_id: &str,
        property_id: &str,
        value: &str,
    ) -> Result<()> {
        let instance = self.instance(instance_id).await?;
        self.client
            .update_thing_property_value(
                &instance.token,
                thing_id,
                component_id,
                property_id,
                value,
                Utc::now(),
            )
            .await?;
        Ok(())
    }

    /// Change the availability of a thing on the platform.
    pub async fn update_thing_status(
        &self,
        instance_id: &str,
        thing_id: &str,
        status: StatusType,
    ) -> Result<()> {
        let instance = self.instance(instance_id).await?;
        self.client
            .update_thing_status(&instance.token, thing_id, status)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Forward an action request to the provider.
    ///
    /// Returns `None` when the action completed, or the response to send otherwise. An
    /// unknown thing or a provider error yields a `FAILED` response rather than an error.
    #[instrument(skip(self, request), fields(action_request_id = %request.id, thing_id = %request.thing_id))]
    pub async fn perform_action(&self, request: &ActionRequest) -> Result<Option<ActionResponse>> {
        info!(action_id = %request.action_id, "Received an action request");

        let instance = match self
            .persistence
            .get_instance_by_thing_id(&request.thing_id)
            .await?
        {
            Some(instance) => instance,
            None => {
                warn!("Could not retrieve the instance for thing ID");
                return Ok(Some(ActionResponse::failed(THING_NOT_FOUND)));
            }
        };

        let status = match self.provider.request_action(&instance, request).await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Failed to perform action");
                return Ok(Some(ActionResponse::failed(e.to_string())));
            }
        };

        match status {
            ActionRequestStatus::Completed => Ok(None),
            ActionRequestStatus::Pending => Ok(Some(ActionResponse::pending())),
            ActionRequestStatus::Failed => {
                error!(
                    instance_id = %instance.id,
                    "Device provider set action state to FAILED without returning an error"
                );
                Ok(Some(ActionResponse {
                    status: ActionRequestStatus::Failed,
                    error: None,
                }))
            }
        }
    }

    /// Report the final outcome of a pending action to the platform.
    pub async fn update_action_status(
        &self,
        instance_id: &str,
        action_request_id: &str,
        response: &ActionResponse,
    ) -> Result<()> {
        let instance = self.instance(instance_id).await?;
        self.client
            .update_action_status(
                &instance.token,
                action_request_id,
                response.status,
                response.error.as_deref(),
            )
            .await?;
        Ok(())
    }

    async fn instance(&self, instance_id: &str) -> Result<Instance> {
        self.persistence
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| CoreError::not_found(Entity::Instance, instance_id))
    }
}
