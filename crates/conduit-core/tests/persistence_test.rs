// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite persistence tests.
//!
//! PostgreSQL runs the same queries; set TEST_DATABASE_URL to a postgres URL to cover it
//! through `persistence::connect`.

mod common;

use std::sync::Arc;

use conduit_core::error::{CoreError, Entity};
use conduit_core::model::ThingMapping;
use conduit_core::persistence::sqlite::SqlitePersistence;
use conduit_core::persistence::{self, Persistence};
use conduit_protocol::{Configuration, Token};
use serde_json::json;

use common::*;

async fn store() -> SqlitePersistence {
    SqlitePersistence::in_memory().await.unwrap()
}

fn mapping(instance_id: &str, thing_id: &str, external_id: &str) -> ThingMapping {
    ThingMapping {
        instance_id: instance_id.to_string(),
        thing_id: thing_id.to_string(),
        external_id: external_id.to_string(),
    }
}

async fn seeded() -> SqlitePersistence {
    let store = store().await;
    store
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();
    store
        .add_instance(&instantiation_request("instance-1", "inst-1"))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_installation_round_trip() {
    let store = store().await;
    let mut request = installation_request("inst-1");
    request.configuration = vec![
        Configuration {
            id: "b".to_string(),
            value: json!({"nested": [1, 2]}),
        },
        Configuration {
            id: "a".to_string(),
            value: json!(null),
        },
        Configuration {
            id: "c".to_string(),
            value: json!("text"),
        },
    ];

    store.add_installation(&request).await.unwrap();
    let stored = store.get_installation("inst-1").await.unwrap().unwrap();

    assert_eq!(stored.id, "inst-1");
    assert_eq!(stored.token, Token::new("inst-1-token"));
    // Supplied order, not key order.
    assert_eq!(stored.configuration, request.configuration);
}

#[tokio::test]
async fn test_missing_installation_is_none() {
    let store = store().await;
    assert!(store.get_installation("missing").await.unwrap().is_none());
    assert!(store.list_installations().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_installation() {
    let store = store().await;
    store
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();

    let err = store
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::AlreadyExists {
            entity: Entity::Installation,
            ..
        }
    ));
}

#[tokio::test]
async fn test_instance_round_trip() {
    let store = seeded().await;
    store
        .add_thing_mapping(&mapping("instance-1", "thing-1", "dev-1"))
        .await
        .unwrap();

    let instance = store.get_instance("instance-1").await.unwrap().unwrap();
    assert_eq!(instance.installation_id, "inst-1");
    assert_eq!(instance.token, Token::new("instance-1-token"));
    assert_eq!(instance.configuration[0].id, "host");
    assert_eq!(instance.configuration[1].value, json!(8443));
    assert_eq!(instance.thing_mappings, vec![mapping("instance-1", "thing-1", "dev-1")]);

    assert_eq!(store.list_instances().await.unwrap(), vec![instance]);
}

#[tokio::test]
async fn test_instance_requires_installation() {
    let store = store().await;

    let err = store
        .add_instance(&instantiation_request("instance-1", "missing"))
        .await
        .unwrap_err();
    match err {
        CoreError::NotFound { entity, id } => {
            assert_eq!(entity, Entity::Installation);
            assert_eq!(id, "missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_duplicate_instance() {
    let store = seeded().await;

    let err = store
        .add_instance(&instantiation_request("instance-1", "inst-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::AlreadyExists {
            entity: Entity::Instance,
            ..
        }
    ));
}

#[tokio::test]
async fn test_instance_by_thing_id() {
    let store = seeded().await;
    store
        .add_thing_mapping(&mapping("instance-1", "thing-7", "dev-7"))
        .await
        .unwrap();

    let instance = store.get_instance_by_thing_id("thing-7").await.unwrap().unwrap();
    assert_eq!(instance.id, "instance-1");
    assert!(store.get_instance_by_thing_id("thing-8").await.unwrap().is_none());
}

#[tokio::test]
async fn test_mapping_external_id_is_unique_per_instance() {
    let store = seeded().await;
    store
        .add_thing_mapping(&mapping("instance-1", "thing-1", "dev-1"))
        .await
        .unwrap();

    let err = store
        .add_thing_mapping(&mapping("instance-1", "thing-2", "dev-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::AlreadyExists {
            entity: Entity::ThingMapping,
            ..
        }
    ));

    let found = store
        .get_mapping_by_external_id("instance-1", "dev-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.thing_id, "thing-1");
}

#[tokio::test]
async fn test_mapping_requires_instance() {
    let store = store().await;

    let err = store
        .add_thing_mapping(&mapping("missing", "thing-1", "dev-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::NotFound {
            entity: Entity::Instance,
            ..
        }
    ));
}

#[tokio::test]
async fn test_remove_thing_mapping() {
    let store = seeded().await;
    store
        .add_thing_mapping(&mapping("instance-1", "thing-1", "dev-1"))
        .await
        .unwrap();

    store.remove_thing_mapping("instance-1", "thing-1").await.unwrap();
    assert!(store
        .get_mappings_by_instance_id("instance-1")
        .await
        .unwrap()
        .is_empty());

    let err = store
        .remove_thing_mapping("instance-1", "thing-1")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_remove_installation_cascades() {
    let store = seeded().await;
    store
        .add_thing_mapping(&mapping("instance-1", "thing-1", "dev-1"))
        .await
        .unwrap();

    store.remove_installation("inst-1").await.unwrap();

    assert!(store.get_instance("instance-1").await.unwrap().is_none());
    assert!(store.get_instance_by_thing_id("thing-1").await.unwrap().is_none());
    assert!(store
        .get_mappings_by_instance_id("instance-1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_remove_instance_keeps_installation() {
    let store = seeded().await;

    store.remove_instance("instance-1").await.unwrap();

    assert!(store.get_instance("instance-1").await.unwrap().is_none());
    assert!(store.get_installation("inst-1").await.unwrap().is_some());
    assert!(store.remove_instance("instance-1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_installation_configuration_for_instance() {
    let store = seeded().await;

    let configuration = store
        .get_installation_configuration_for_instance("instance-1")
        .await
        .unwrap();
    assert_eq!(configuration.len(), 1);
    assert_eq!(configuration[0].id, "region");

    let err = store
        .get_installation_configuration_for_instance("missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_health_check() {
    let store = store().await;
    store.health_check().await.unwrap();
}

#[tokio::test]
async fn test_connect_selects_backend_by_scheme() {
    let store: Arc<dyn Persistence> = persistence::connect("sqlite::memory:").await.unwrap();
    store.health_check().await.unwrap();

    let Err(err) = persistence::connect("mysql://localhost/conduit").await else {
        panic!("mysql urls are not supported");
    };
    assert!(matches!(err, CoreError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_postgres_backend() {
    let Some(url) = std::env::var("TEST_DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres"))
    else {
        return;
    };

    let store = persistence::connect(&url).await.unwrap();
    let suffix = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let installation_id = format!("inst-{suffix}");
    let instance_id = format!("instance-{suffix}");

    store
        .add_installation(&installation_request(&installation_id))
        .await
        .unwrap();
    store
        .add_instance(&instantiation_request(&instance_id, &installation_id))
        .await
        .unwrap();
    store
        .add_thing_mapping(&mapping(&instance_id, &format!("thing-{suffix}"), "dev-1"))
        .await
        .unwrap();

    let instance = store.get_instance(&instance_id).await.unwrap().unwrap();
    assert_eq!(instance.thing_mappings.len(), 1);

    store.remove_installation(&installation_id).await.unwrap();
    assert!(store.get_instance(&instance_id).await.unwrap().is_none());
}
