// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use conduit_protocol::{Configuration, InstallationRequest, InstantiationRequest};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::{CoreError, Entity};
use crate::migrations;
use crate::model::{Installation, Instance, ThingMapping};

use super::{
    ConfigurationRow, InstallationRow, InstanceRow, Persistence, encode_configuration,
    insert_error,
};

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a `sqlite:` URL and run all migrations.
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_url("sqlite:.data/connector.db?mode=rwc").await?;
    /// ```
    pub async fn from_url(url: &str) -> Result<Self, CoreError> {
        if url.contains(":memory:") {
            return Self::in_memory().await;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| CoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", url, e),
            })?;

        Self::migrate(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds a single connection that is never recycled, so the data lives as
    /// long as the persistence value.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, CoreError> {
        migrations::run_sqlite(&pool)
            .await
            .map_err(|e| CoreError::Database {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn installation_configuration(
        &self,
        installation_id: &str,
    ) -> Result<Vec<ConfigurationRow>, CoreError> {
        let rows = sqlx::query_as::<_, ConfigurationRow>(
            r#"
            SELECT id, value
            FROM installation_configuration
            WHERE installation_id = ?
            ORDER BY position
            "#,
        )
        .bind(installation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn instance_configuration(
        &self,
        instance_id: &str,
    ) -> Result<Vec<ConfigurationRow>, CoreError> {
        let rows = sqlx::query_as::<_, ConfigurationRow>(
            r#"
            SELECT id, value
            FROM instance_configuration
            WHERE instance_id = ?
            ORDER BY position
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn load_instance(&self, row: InstanceRow) -> Result<Instance, CoreError> {
        let configuration = self.instance_configuration(&row.id).await?;
        let mappings = self.get_mappings_by_instance_id(&row.id).await?;
        row.into_instance(configuration, mappings)
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn add_installation(&self, request: &InstallationRequest) -> Result<(), CoreError> {
        let configuration = encode_configuration(&request.configuration)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO installations (id, token) VALUES (?, ?)")
            .bind(&request.id)
            .bind(request.token.expose())
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_error(e, Entity::Installation, &request.id, None))?;

        for (position, id, value) in configuration {
            sqlx::query(
                r#"
                INSERT INTO installation_configuration (installation_id, position, id, value)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&request.id)
            .bind(position)
            .bind(id)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_installation(&self, id: &str) -> Result<Option<Installation>, CoreError> {
        let row = sqlx::query_as::<_, InstallationRow>(
            "SELECT id, token FROM installations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let configuration = self.installation_configuration(&row.id).await?;
                Ok(Some(row.into_installation(configuration)?))
            }
            None => Ok(None),
        }
    }

    async fn list_installations(&self) -> Result<Vec<Installation>, CoreError> {
        let rows = sqlx::query_as::<_, InstallationRow>(
            "SELECT id, token FROM installations ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut installations = Vec::with_capacity(rows.len());
        for row in rows {
            let configuration = self.installation_configuration(&row.id).await?;
            installations.push(row.into_installation(configuration)?);
        }
        Ok(installations)
    }

    async fn remove_installation(&self, id: &str) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM installations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(Entity::Installation, id));
        }
        Ok(())
    }

    async fn add_instance(&self, request: &InstantiationRequest) -> Result<(), CoreError> {
        let configuration = encode_configuration(&request.configuration)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO instances (id, installation_id, token) VALUES (?, ?, ?)")
            .bind(&request.id)
            .bind(&request.installation_id)
            .bind(request.token.expose())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                insert_error(
                    e,
                    Entity::Instance,
                    &request.id,
                    Some((Entity::Installation, &request.installation_id)),
                )
            })?;

        for (position, id, value) in configuration {
            sqlx::query(
                r#"
                INSERT INTO instance_configuration (instance_id, position, id, value)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&request.id)
            .bind(position)
            .bind(id)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_instance(&self, id: &str) -> Result<Option<Instance>, CoreError> {
        let row = sqlx::query_as::<_, InstanceRow>(
            "SELECT id, installation_id, token FROM instances WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_instance(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, CoreError> {
        let rows = sqlx::query_as::<_, InstanceRow>(
            "SELECT id, installation_id, token FROM instances ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            instances.push(self.load_instance(row).await?);
        }
        Ok(instances)
    }

    async fn get_instance_by_thing_id(
        &self,
        thing_id: &str,
    ) -> Result<Option<Instance>, CoreError> {
        let row = sqlx::query_as::<_, InstanceRow>(
            r#"
            SELECT i.id, i.installation_id, i.token
            FROM instances i
            JOIN instance_thing_mapping m ON m.instance_id = i.id
            WHERE m.thing_id = ?
            LIMIT 1
            "#,
        )
        .bind(thing_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_instance(row).await?)),
            None => Ok(None),
        }
    }

    async fn remove_instance(&self, id: &str) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM instances WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(Entity::Instance, id));
        }
        Ok(())
    }

    async fn add_thing_mapping(&self, mapping: &ThingMapping) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO instance_thing_mapping (instance_id, thing_id, external_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&mapping.instance_id)
        .bind(&mapping.thing_id)
        .bind(&mapping.external_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            insert_error(
                e,
                Entity::ThingMapping,
                &mapping.external_id,
                Some((Entity::Instance, &mapping.instance_id)),
            )
        })?;

        Ok(())
    }

    async fn get_mappings_by_instance_id(
        &self,
        instance_id: &str,
    ) -> Result<Vec<ThingMapping>, CoreError> {
        let mappings = sqlx::query_as::<_, ThingMapping>(
            r#"
            SELECT instance_id, thing_id, external_id
            FROM instance_thing_mapping
            WHERE instance_id = ?
            ORDER BY created_at, thing_id
            "#,
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(mappings)
    }

    async fn get_mapping_by_external_id(
        &self,
        instance_id: &str,
        external_id: &str,
    ) -> Result<Option<ThingMapping>, CoreError> {
        let mapping = sqlx::query_as::<_, ThingMapping>(
            r#"
            SELECT instance_id, thing_id, external_id
            FROM instance_thing_mapping
            WHERE instance_id = ? AND external_id = ?
            "#,
        )
        .bind(instance_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }

    async fn remove_thing_mapping(
        &self,
        instance_id: &str,
        thing_id: &str,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            "DELETE FROM instance_thing_mapping WHERE instance_id = ? AND thing_id = ?",
        )
        .bind(instance_id)
        .bind(thing_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(Entity::ThingMapping, thing_id));
        }
        Ok(())
    }

    async fn get_installation_configuration_for_instance(
        &self,
        instance_id: &str,
    ) -> Result<Vec<Configuration>, CoreError> {
        let installation_id: Option<String> =
            sqlx::query_scalar("SELECT installation_id FROM instances WHERE id = ?")
                .bind(instance_id)
                .fetch_optional(&self.pool)
                .await?;

        let installation_id =
            installation_id.ok_or_else(|| CoreError::not_found(Entity::Instance, instance_id))?;

        self.get_installation(&installation_id)
            .await?
            .map(|installation| installation.configuration)
            .ok_or_else(|| CoreError::not_found(Entity::Installation, installation_id))
    }

    async fn health_check(&self) -> Result<(), CoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
