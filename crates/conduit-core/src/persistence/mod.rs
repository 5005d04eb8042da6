// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for conduit-core.
//!
//! Installations and instances are created together with their configuration in one
//! transaction. Removing an installation cascades to its configuration and instances;
//! removing an instance cascades to its configuration and thing mappings.

pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use conduit_protocol::{Configuration, InstallationRequest, InstantiationRequest, Token};

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use crate::error::{CoreError, Entity};
use crate::model::{Installation, Instance, ThingMapping};

/// Installation row without its configuration.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct InstallationRow {
    pub id: String,
    pub token: String,
}

/// Instance row without its configuration and mappings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct InstanceRow {
    pub id: String,
    pub installation_id: String,
    pub token: String,
}

/// Configuration entry with its value stored as JSON text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ConfigurationRow {
    pub id: String,
    pub value: String,
}

impl InstallationRow {
    pub(crate) fn into_installation(
        self,
        configuration: Vec<ConfigurationRow>,
    ) -> Result<Installation, CoreError> {
        Ok(Installation {
            id: self.id,
            token: Token::new(self.token),
            configuration: decode_configuration(configuration)?,
        })
    }
}

impl InstanceRow {
    pub(crate) fn into_instance(
        self,
        configuration: Vec<ConfigurationRow>,
        thing_mappings: Vec<ThingMapping>,
    ) -> Result<Instance, CoreError> {
        Ok(Instance {
            id: self.id,
            installation_id: self.installation_id,
            token: Token::new(self.token),
            configuration: decode_configuration(configuration)?,
            thing_mappings,
        })
    }
}

fn decode_configuration(rows: Vec<ConfigurationRow>) -> Result<Vec<Configuration>, CoreError> {
    rows.into_iter()
        .map(|row| {
            Ok(Configuration {
                id: row.id,
                value: serde_json::from_str(&row.value)?,
            })
        })
        .collect()
}

/// Serialize configuration values for storage, keeping their position.
pub(crate) fn encode_configuration(
    configuration: &[Configuration],
) -> Result<Vec<(i32, &str, String)>, CoreError> {
    configuration
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            Ok((
                position as i32,
                entry.id.as_str(),
                serde_json::to_string(&entry.value)?,
            ))
        })
        .collect()
}

/// Map an insert failure to `AlreadyExists`/`NotFound` where the constraint tells us which.
pub(crate) fn insert_error(
    err: sqlx::Error,
    entity: Entity,
    id: &str,
    parent: Option<(Entity, &str)>,
) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return CoreError::AlreadyExists {
                entity,
                id: id.to_string(),
            };
        }
        if db_err.is_foreign_key_violation()
            && let Some((parent_entity, parent_id)) = parent
        {
            return CoreError::not_found(parent_entity, parent_id);
        }
    }

    CoreError::Database {
        operation: "insert".to_string(),
        details: err.to_string(),
    }
}

/// Storage for installations, instances and thing mappings.
///
/// Lookups return `Ok(None)` for missing records; removals return
/// [`CoreError::NotFound`].
#[async_trait::async_trait]
pub trait Persistence: Send + Sync {
    /// Store an installation and its configuration.
    async fn add_installation(&self, request: &InstallationRequest) -> Result<(), CoreError>;

    /// Load an installation with its configuration.
    async fn get_installation(&self, id: &str) -> Result<Option<Installation>, CoreError>;

    /// Load all installations.
    async fn list_installations(&self) -> Result<Vec<Installation>, CoreError>;

    /// Delete an installation, its configuration and its instances.
    async fn remove_installation(&self, id: &str) -> Result<(), CoreError>;

    /// Store an instance and its configuration.
    ///
    /// Fails with `NotFound` if the owning installation does not exist.
    async fn add_instance(&self, request: &InstantiationRequest) -> Result<(), CoreError>;

    /// Load an instance with its configuration and thing mappings.
    async fn get_instance(&self, id: &str) -> Result<Option<Instance>, CoreError>;

    /// Load all instances.
    async fn list_instances(&self) -> Result<Vec<Instance>, CoreError>;

    /// Load the instance owning a platform thing.
    async fn get_instance_by_thing_id(&self, thing_id: &str)
    -> Result<Option<Instance>, CoreError>;

    /// Delete an instance, its configuration and its thing mappings.
    async fn remove_instance(&self, id: &str) -> Result<(), CoreError>;

    /// Store a thing mapping. `(instance_id, external_id)` must be unique.
    async fn add_thing_mapping(&self, mapping: &ThingMapping) -> Result<(), CoreError>;

    /// All thing mappings of an instance.
    async fn get_mappings_by_instance_id(
        &self,
        instance_id: &str,
    ) -> Result<Vec<ThingMapping>, CoreError>;

    /// The mapping of a device within an instance.
    async fn get_mapping_by_external_id(
        &self,
        instance_id: &str,
        external_id: &str,
    ) -> Result<Option<ThingMapping>, CoreError>;

    /// Delete the mapping of a platform thing within an instance.
    async fn remove_thing_mapping(&self, instance_id: &str, thing_id: &str)
    -> Result<(), CoreError>;

    /// Configuration of the installation owning an instance.
    async fn get_installation_configuration_for_instance(
        &self,
        instance_id: &str,
    ) -> Result<Vec<Configuration>, CoreError>;

    /// Check that the database is reachable.
    async fn health_check(&self) -> Result<(), CoreError>;
}

/// Open the backend matching the URL scheme and run its migrations.
///
/// `sqlite:` URLs use [`SqlitePersistence`]; `postgres://` and `postgresql://` use
/// [`PostgresPersistence`].
pub async fn connect(database_url: &str) -> Result<Arc<dyn Persistence>, CoreError> {
    if database_url.starts_with("sqlite:") {
        Ok(Arc::new(SqlitePersistence::from_url(database_url).await?))
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        Ok(Arc::new(PostgresPersistence::from_url(database_url).await?))
    } else {
        Err(CoreError::InvalidConfiguration(format!(
            "unsupported database url scheme: {}",
            database_url.split(':').next().unwrap_or_default()
        )))
    }
}
