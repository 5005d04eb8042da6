// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for conduit-core tests.
//!
//! Provides TestContext wiring an in-memory SQLite database, the mock platform client
//! and the default provider into a ConnectorService.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use chrono::Utc;
use ed25519_dalek::SigningKey;

use conduit_client::MockPlatformClient;
use conduit_core::default_provider::{ActionHandler, DefaultProvider};
use conduit_core::model::{Instance, ThingMapping, ThingTemplate};
use conduit_core::persistence::Persistence;
use conduit_core::persistence::sqlite::SqlitePersistence;
use conduit_core::provider::ProviderError;
use conduit_core::service::{ConnectorService, ServiceOptions, ThingTemplates};
use conduit_core::verification::{RequestContextPolicy, SignatureVerifier};
use conduit_protocol::signing;
use conduit_protocol::thing::{Action, Component, Property, Thing, ValueType};
use conduit_protocol::{
    ActionRequest, ActionRequestStatus, Configuration, InstallationRequest, InstantiationRequest,
    LifecycleState, Token,
};

/// Date header value used for signed test requests.
pub const DATE: &str = "Tue, 07 Jun 2022 20:51:35 GMT";

/// Host the test requests are signed for.
pub const HOST: &str = "connector.test";

/// Key the platform signs callbacks with in tests.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[7u8; 32])
}

/// Verifier matching [`signing_key`] in direct mode.
pub fn verifier() -> Arc<SignatureVerifier> {
    Arc::new(SignatureVerifier::new(
        signing_key().verifying_key(),
        RequestContextPolicy::Direct,
    ))
}

/// Signature header value for a request signed for `https://{host}{uri}`.
pub fn signature_for(method: &str, host: &str, uri: &str, body: &str) -> String {
    let mut headers = HeaderMap::new();
    headers.insert(header::DATE, HeaderValue::from_static(DATE));
    let payload =
        signing::signable_payload(method, "https", host, uri, &headers, body.as_bytes()).unwrap();
    signing::sign(&signing_key(), &payload)
}

/// A correctly signed JSON request.
pub fn signed_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    let signature = signature_for(method, HOST, uri, body);
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, HOST)
        .header(header::DATE, DATE)
        .header(header::CONTENT_TYPE, "application/json")
        .header(signing::SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A valid thing with one switch component.
pub fn thing(name: &str) -> Thing {
    Thing {
        name: name.to_string(),
        manufacturer: "ACME".to_string(),
        display_type: "core.LIGHT".to_string(),
        main_component_id: "switch".to_string(),
        components: vec![Component {
            id: "switch".to_string(),
            name: "Switch".to_string(),
            component_type: "core.SWITCH".to_string(),
            properties: vec![Property {
                id: "on".to_string(),
                name: "On".to_string(),
                value_type: ValueType::Boolean,
                ..Default::default()
            }],
            actions: vec![Action {
                id: "toggle".to_string(),
                name: "Toggle".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Templates creating one thing per name, with external id `dev-<name>`.
pub fn templates(names: &[&str]) -> ThingTemplates {
    let templates: Vec<ThingTemplate> = names
        .iter()
        .map(|name| ThingTemplate::new(thing(name), format!("dev-{name}")))
        .collect();
    Arc::new(move |_: &InstantiationRequest| templates.clone())
}

pub fn installation_request(id: &str) -> InstallationRequest {
    InstallationRequest {
        id: id.to_string(),
        token: Token::new(format!("{id}-token")),
        state: LifecycleState::Initialized,
        configuration: vec![Configuration {
            id: "region".to_string(),
            value: serde_json::json!("eu"),
        }],
        timestamp: Utc::now(),
    }
}

pub fn instantiation_request(id: &str, installation_id: &str) -> InstantiationRequest {
    InstantiationRequest {
        id: id.to_string(),
        installation_id: installation_id.to_string(),
        token: Token::new(format!("{id}-token")),
        state: LifecycleState::Initialized,
        configuration: vec![
            Configuration {
                id: "host".to_string(),
                value: serde_json::json!("10.0.0.2"),
            },
            Configuration {
                id: "port".to_string(),
                value: serde_json::json!(8443),
            },
        ],
        timestamp: Utc::now(),
    }
}

pub fn action_request(thing_id: &str) -> ActionRequest {
    ActionRequest {
        id: "action-1".to_string(),
        thing_id: thing_id.to_string(),
        component_id: "switch".to_string(),
        action_id: "toggle".to_string(),
        parameters: Vec::new(),
    }
}

/// Action handler answering every request the same way.
pub struct FixedActionHandler(pub Result<ActionRequestStatus, ProviderError>);

#[async_trait]
impl ActionHandler for FixedActionHandler {
    async fn handle(
        &self,
        _instance: &Instance,
        _request: &ActionRequest,
    ) -> Result<ActionRequestStatus, ProviderError> {
        self.0.clone()
    }
}

/// Service wired to in-memory collaborators.
pub struct TestContext {
    pub service: ConnectorService,
    pub persistence: Arc<SqlitePersistence>,
    pub client: Arc<MockPlatformClient>,
    pub provider: Arc<DefaultProvider>,
}

impl TestContext {
    pub async fn new(options: ServiceOptions, thing_templates: ThingTemplates) -> Self {
        Self::with_provider(options, thing_templates, DefaultProvider::new()).await
    }

    pub async fn with_provider(
        options: ServiceOptions,
        thing_templates: ThingTemplates,
        provider: DefaultProvider,
    ) -> Self {
        let persistence = Arc::new(SqlitePersistence::in_memory().await.unwrap());
        let client = Arc::new(MockPlatformClient::new());
        let provider = Arc::new(provider);

        let service = ConnectorService::new(
            persistence.clone(),
            client.clone(),
            provider.clone(),
            thing_templates,
            options,
        )
        .unwrap();

        Self {
            service,
            persistence,
            client,
            provider,
        }
    }

    /// Add an installation and an instance, returning the instance id.
    pub async fn with_instance(&self) -> String {
        self.service
            .add_installation(&installation_request("inst-1"))
            .await
            .unwrap();
        self.service
            .add_instance(&instantiation_request("instance-1", "inst-1"))
            .await
            .unwrap();
        "instance-1".to_string()
    }

    /// Poll until `count` mappings exist for the instance.
    pub async fn wait_for_mappings(&self, instance_id: &str, count: usize) -> Vec<ThingMapping> {
        for _ in 0..100 {
            let mappings = self
                .persistence
                .get_mappings_by_instance_id(instance_id)
                .await
                .unwrap();
            if mappings.len() >= count {
                return mappings;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {count} mappings of {instance_id}");
    }

    /// Poll until the provider knows the instance.
    pub async fn wait_for_registration(&self, instance_id: &str) -> Instance {
        for _ in 0..100 {
            if let Some(instance) = self.provider.instance(instance_id).await {
                return instance;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {instance_id} to be registered");
    }
}
