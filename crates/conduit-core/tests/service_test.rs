// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle and thing synchronization tests for ConnectorService.

mod common;

use std::sync::Arc;

use conduit_client::PlatformCall;
use conduit_core::default_provider::DefaultProvider;
use conduit_core::error::{CoreError, Entity};
use conduit_core::persistence::Persistence;
use conduit_core::provider::{DeviceProvider, ProviderError};
use conduit_core::service::{
    ConnectorService, ServiceOptions, THING_NOT_FOUND, no_thing_templates,
};
use conduit_protocol::thing::StatusType;
use conduit_protocol::{
    ActionRequestStatus, ActionResponse, InstantiationRequest, LifecycleState, Token,
};

use common::*;

fn create_calls(calls: &[PlatformCall]) -> Vec<(String, bool)> {
    calls
        .iter()
        .filter_map(|call| match call {
            PlatformCall::CreateThing { name, thing_id, .. } => {
                Some((name.clone(), thing_id.is_some()))
            }
            _ => None,
        })
        .collect()
}

// ============================================================================
// Installations
// ============================================================================

#[tokio::test]
async fn test_add_installation_persists_and_registers() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;

    ctx.service
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();

    let stored = ctx.persistence.get_installation("inst-1").await.unwrap().unwrap();
    assert_eq!(stored.token, Token::new("inst-1-token"));
    assert_eq!(stored.configuration.len(), 1);

    let registered = ctx.provider.installation("inst-1").await.unwrap();
    assert_eq!(registered, stored);
}

#[tokio::test]
async fn test_duplicate_installation_is_rejected() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;
    let request = installation_request("inst-1");

    ctx.service.add_installation(&request).await.unwrap();
    let err = ctx.service.add_installation(&request).await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::AlreadyExists {
            entity: Entity::Installation,
            ..
        }
    ));
}

#[tokio::test]
async fn test_remove_installation_unknown_to_provider_still_deletes() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;

    // Stored but never registered with the provider.
    ctx.persistence
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();

    ctx.service.remove_installation("inst-1").await.unwrap();

    assert!(ctx.persistence.get_installation("inst-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_remove_unknown_installation_is_not_found() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;

    let err = ctx.service.remove_installation("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_remove_installation_cascades_to_instances() {
    let ctx = TestContext::new(ServiceOptions::default(), templates(&["lamp"])).await;
    let instance_id = ctx.with_instance().await;

    ctx.service.remove_installation("inst-1").await.unwrap();

    assert!(ctx.persistence.get_instance(&instance_id).await.unwrap().is_none());
    assert!(ctx
        .persistence
        .get_mappings_by_instance_id(&instance_id)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx.provider.instance(&instance_id).await.is_none());
}

#[tokio::test]
async fn test_update_installation_state_uses_installation_token() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;
    ctx.service
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();

    ctx.service
        .update_installation_state("inst-1", LifecycleState::Ongoing, None)
        .await
        .unwrap();

    assert_eq!(
        ctx.client.calls().await,
        vec![PlatformCall::UpdateInstallationState {
            token: Token::new("inst-1-token"),
            state: LifecycleState::Ongoing,
        }]
    );

    let err = ctx
        .service
        .update_installation_state("missing", LifecycleState::Failed, None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Instances and thing synchronization
// ============================================================================

#[tokio::test]
async fn test_add_instance_creates_all_things() {
    let ctx = TestContext::new(
        ServiceOptions::default(),
        templates(&["lamp", "plug", "sensor"]),
    )
    .await;

    let instance_id = ctx.with_instance().await;

    let mappings = ctx
        .persistence
        .get_mappings_by_instance_id(&instance_id)
        .await
        .unwrap();
    assert_eq!(mappings.len(), 3);

    let registered = ctx.provider.instance(&instance_id).await.unwrap();
    assert_eq!(registered.thing_mappings.len(), 3);
    assert_eq!(registered.thing_id_for("dev-plug"), Some("thing-2"));

    for call in ctx.client.calls().await {
        if let PlatformCall::CreateThing { token, .. } = call {
            assert_eq!(token, Token::new("instance-1-token"));
        }
    }
}

#[tokio::test]
async fn test_enforced_creation_stops_at_first_failure() {
    let ctx = TestContext::new(
        ServiceOptions::default(),
        templates(&["lamp", "plug", "sensor"]),
    )
    .await;
    ctx.client.fail_thing("plug").await;

    ctx.service
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();
    let err = ctx
        .service
        .add_instance(&instantiation_request("instance-1", "inst-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Platform(_)));

    assert_eq!(
        create_calls(&ctx.client.calls().await),
        vec![("lamp".to_string(), true), ("plug".to_string(), false)]
    );

    // The instance record stays, with the mappings created before the failure.
    assert!(ctx.persistence.get_instance("instance-1").await.unwrap().is_some());
    let mappings = ctx
        .persistence
        .get_mappings_by_instance_id("instance-1")
        .await
        .unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].external_id, "dev-lamp");

    let registered = ctx.provider.instance("instance-1").await.unwrap();
    assert_eq!(registered.thing_mappings, mappings);
}

#[tokio::test]
async fn test_lenient_creation_skips_failures() {
    let ctx = TestContext::new(
        ServiceOptions::lenient(),
        templates(&["lamp", "plug", "sensor"]),
    )
    .await;
    ctx.client.fail_thing("plug").await;

    let instance_id = ctx.with_instance().await;

    assert_eq!(
        create_calls(&ctx.client.calls().await),
        vec![
            ("lamp".to_string(), true),
            ("plug".to_string(), false),
            ("sensor".to_string(), true),
        ]
    );

    let registered = ctx.provider.instance(&instance_id).await.unwrap();
    let external_ids: Vec<_> = registered
        .thing_mappings
        .iter()
        .map(|m| m.external_id.as_str())
        .collect();
    assert_eq!(external_ids.len(), 2);
    assert!(external_ids.contains(&"dev-lamp"));
    assert!(external_ids.contains(&"dev-sensor"));
}

#[tokio::test]
async fn test_invalid_thing_is_never_sent() {
    let mut broken = thing("broken");
    broken.display_type.clear();
    let template = conduit_core::model::ThingTemplate::new(broken, "dev-broken");
    let ctx = TestContext::new(
        ServiceOptions::default(),
        Arc::new(move |_: &InstantiationRequest| vec![template.clone()]),
    )
    .await;

    ctx.service
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();
    let err = ctx
        .service
        .add_instance(&instantiation_request("instance-1", "inst-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::InvalidThing(_)));
    assert!(ctx.client.calls().await.is_empty());
}

#[tokio::test]
async fn test_async_creation_returns_before_things_exist() {
    let ctx = TestContext::new(ServiceOptions::asynchronous(), templates(&["lamp", "plug"])).await;
    ctx.client.fail_thing("lamp").await;

    ctx.service
        .add_installation(&installation_request("inst-1"))
        .await
        .unwrap();
    ctx.service
        .add_instance(&instantiation_request("instance-1", "inst-1"))
        .await
        .unwrap();

    let mappings = ctx.wait_for_mappings("instance-1", 1).await;
    assert_eq!(mappings[0].external_id, "dev-plug");

    let registered = ctx.wait_for_registration("instance-1").await;
    assert_eq!(registered.thing_mappings.len(), 1);
}

#[tokio::test]
async fn test_async_with_enforcement_is_rejected() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;

    let result = ConnectorService::new(
        ctx.persistence.clone(),
        ctx.client.clone(),
        ctx.provider.clone(),
        no_thing_templates(),
        ServiceOptions {
            async_instance_creation: true,
            enforce_thing_creation: true,
        },
    );
    assert!(matches!(result, Err(CoreError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn test_instance_for_unknown_installation_is_not_found() {
    let ctx = TestContext::new(ServiceOptions::default(), templates(&["lamp"])).await;

    let err = ctx
        .service
        .add_instance(&instantiation_request("instance-1", "missing"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::NotFound {
            entity: Entity::Installation,
            ..
        }
    ));
    assert!(ctx.client.calls().await.is_empty());
    assert!(ctx.provider.instance("instance-1").await.is_none());
}

#[tokio::test]
async fn test_remove_instance() {
    let ctx = TestContext::new(ServiceOptions::default(), templates(&["lamp"])).await;
    let instance_id = ctx.with_instance().await;

    ctx.service.remove_instance(&instance_id).await.unwrap();

    assert!(ctx.persistence.get_instance(&instance_id).await.unwrap().is_none());
    assert!(ctx.provider.instance(&instance_id).await.is_none());
    assert!(ctx.persistence.get_installation("inst-1").await.unwrap().is_some());

    let err = ctx.service.remove_instance(&instance_id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_restore_registers_persisted_state() {
    let ctx = TestContext::new(ServiceOptions::default(), templates(&["lamp"])).await;
    let instance_id = ctx.with_instance().await;

    // A fresh provider, as after a restart.
    let provider = Arc::new(DefaultProvider::new());
    let service = ConnectorService::new(
        ctx.persistence.clone(),
        ctx.client.clone(),
        provider.clone(),
        no_thing_templates(),
        ServiceOptions::default(),
    )
    .unwrap();

    service.restore().await.unwrap();

    assert_eq!(provider.installation_count().await, 1);
    let restored = provider.instance(&instance_id).await.unwrap();
    assert_eq!(restored.configuration.len(), 2);
    assert_eq!(restored.thing_id_for("dev-lamp"), Some("thing-1"));
}

#[tokio::test]
async fn test_update_instance_state_uses_instance_token() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;
    let instance_id = ctx.with_instance().await;

    ctx.service
        .update_instance_state(&instance_id, LifecycleState::Rejected, None)
        .await
        .unwrap();

    assert_eq!(
        ctx.client.calls().await,
        vec![PlatformCall::UpdateInstanceState {
            token: Token::new("instance-1-token"),
            state: LifecycleState::Rejected,
        }]
    );
}

// ============================================================================
// Things
// ============================================================================

#[tokio::test]
async fn test_create_thing_reuses_existing_mapping() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;
    let instance_id = ctx.with_instance().await;

    let first = ctx
        .service
        .create_thing(&instance_id, thing("lamp"), "dev-lamp")
        .await
        .unwrap();
    let second = ctx
        .service
        .create_thing(&instance_id, thing("lamp"), "dev-lamp")
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.client.created_thing_ids().await, vec!["thing-1"]);
}

#[tokio::test]
async fn test_create_thing_for_unknown_instance() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;

    let err = ctx
        .service
        .create_thing("missing", thing("lamp"), "dev-lamp")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_remove_thing() {
    let ctx = TestContext::new(ServiceOptions::default(), templates(&["lamp"])).await;
    let instance_id = ctx.with_instance().await;

    ctx.service.remove_thing(&instance_id, "thing-1").await.unwrap();

    assert!(ctx
        .persistence
        .get_mappings_by_instance_id(&instance_id)
        .await
        .unwrap()
        .is_empty());
    assert!(ctx.client.calls().await.contains(&PlatformCall::DeleteThing {
        token: Token::new("instance-1-token"),
        thing_id: "thing-1".to_string(),
    }));
}

#[tokio::test]
async fn test_update_thing_status() {
    let ctx = TestContext::new(ServiceOptions::default(), templates(&["lamp"])).await;
    let instance_id = ctx.with_instance().await;

    ctx.service
        .update_thing_status(&instance_id, "thing-1", StatusType::Available)
        .await
        .unwrap();

    assert!(ctx.client.calls().await.contains(&PlatformCall::UpdateThingStatus {
        token: Token::new("instance-1-token"),
        thing_id: "thing-1".to_string(),
        status: StatusType::Available,
    }));
}

// ============================================================================
// Actions
// ============================================================================

async fn action_context(
    handler: Option<Result<ActionRequestStatus, ProviderError>>,
) -> TestContext {
    let provider = match handler {
        Some(result) => DefaultProvider::new().with_action_handler(Arc::new(FixedActionHandler(result))),
        None => DefaultProvider::new(),
    };
    let ctx =
        TestContext::with_provider(ServiceOptions::default(), templates(&["lamp"]), provider).await;
    ctx.with_instance().await;
    ctx
}

#[tokio::test]
async fn test_action_for_unknown_thing_fails() {
    let ctx = action_context(Some(Ok(ActionRequestStatus::Completed))).await;

    let response = ctx
        .service
        .perform_action(&action_request("unknown-thing"))
        .await
        .unwrap();

    assert_eq!(response, Some(ActionResponse::failed(THING_NOT_FOUND)));
}

#[tokio::test]
async fn test_completed_action_has_no_response() {
    let ctx = action_context(Some(Ok(ActionRequestStatus::Completed))).await;

    let response = ctx
        .service
        .perform_action(&action_request("thing-1"))
        .await
        .unwrap();
    assert_eq!(response, None);
}

#[tokio::test]
async fn test_pending_action() {
    let ctx = action_context(Some(Ok(ActionRequestStatus::Pending))).await;

    let response = ctx
        .service
        .perform_action(&action_request("thing-1"))
        .await
        .unwrap();
    assert_eq!(response, Some(ActionResponse::pending()));
}

#[tokio::test]
async fn test_provider_error_becomes_failed_response() {
    let ctx = action_context(Some(Err(ProviderError::Action("device offline".to_string())))).await;

    let response = ctx
        .service
        .perform_action(&action_request("thing-1"))
        .await
        .unwrap();
    assert_eq!(response, Some(ActionResponse::failed("device offline")));
}

#[tokio::test]
async fn test_actions_not_supported() {
    let ctx = action_context(None).await;

    let response = ctx
        .service
        .perform_action(&action_request("thing-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.status, ActionRequestStatus::Failed);
    assert_eq!(
        response.error.as_deref(),
        Some("actions are not supported by this connector")
    );
}

#[tokio::test]
async fn test_failed_status_without_error_is_passed_through() {
    let ctx = action_context(Some(Ok(ActionRequestStatus::Failed))).await;

    let response = ctx
        .service
        .perform_action(&action_request("thing-1"))
        .await
        .unwrap();
    assert_eq!(
        response,
        Some(ActionResponse {
            status: ActionRequestStatus::Failed,
            error: None,
        })
    );
}

#[tokio::test]
async fn test_provider_update_stream_taken_once() {
    let ctx = TestContext::new(ServiceOptions::default(), no_thing_templates()).await;

    assert!(ctx.provider.take_update_events().is_some());
    assert!(ctx.provider.take_update_events().is_none());
}
