// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Platform client for connector callbacks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_protocol::thing::{StatusType, Thing};
use conduit_protocol::{ActionRequestStatus, LifecycleState, StateUpdateRequest, Token};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{
    ActionRequestStatusUpdate, AddThingRequest, AddThingResponse, UpdateThingPropertyValueRequest,
    UpdateThingStatusRequest,
};

const THINGS_ENDPOINT: &str = "connectorhub/callback/instances/things";
const ACTIONS_ENDPOINT: &str = "connectorhub/callback/instances/actions/requests";
const INSTANCE_STATE_ENDPOINT: &str = "connectorhub/callback/instances/state";
const INSTALLATION_STATE_ENDPOINT: &str = "connectorhub/callback/installations/state";

/// Calls a connector makes to the platform.
///
/// Implementations must be safe to share between the request handlers and the update relay.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Register a new thing and return its platform-assigned id.
    async fn create_thing(&self, token: &Token, thing: &Thing) -> Result<String>;

    /// Push a new property value.
    async fn update_thing_property_value(
        &self,
        token: &Token,
        thing_id: &str,
        component_id: &str,
        property_id: &str,
        value: &str,
        last_update: DateTime<Utc>,
    ) -> Result<()>;

    /// Change a thing's availability.
    async fn update_thing_status(
        &self,
        token: &Token,
        thing_id: &str,
        status: StatusType,
    ) -> Result<()>;

    /// Report the outcome of an action request answered as pending.
    async fn update_action_status(
        &self,
        token: &Token,
        action_request_id: &str,
        status: ActionRequestStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Report the lifecycle state of an installation.
    async fn update_installation_state(
        &self,
        token: &Token,
        state: LifecycleState,
        details: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Report the lifecycle state of an instance.
    async fn update_instance_state(
        &self,
        token: &Token,
        state: LifecycleState,
        details: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Remove a thing from the platform.
    async fn delete_thing(&self, token: &Token, thing_id: &str) -> Result<()>;
}

/// HTTP implementation of [`PlatformClient`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client with the given configuration.
    ///
    /// Fails with [`ClientError::InvalidBaseUrl`] unless the base URL is absolute and
    /// ends with `/`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if !config.base_url.ends_with('/') {
            return Err(ClientError::InvalidBaseUrl(config.base_url));
        }
        let base_url = match Url::parse(&config.base_url) {
            Ok(url) if !url.cannot_be_a_base() => url,
            _ => return Err(ClientError::InvalidBaseUrl(config.base_url)),
        };

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// The API root all endpoints are resolved against.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Resolve `endpoint` against the base URL and append `ids` as percent-encoded path
    /// segments.
    fn url(&self, endpoint: &str, ids: &[&str]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(endpoint)
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .extend(ids);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, token: &Token) -> reqwest::RequestBuilder {
        self.http.request(method, url).bearer_auth(token.expose())
    }

    async fn do_request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        token: &Token,
        payload: Option<&T>,
        expected: StatusCode,
    ) -> Result<()> {
        let endpoint = url.path().to_string();
        let mut request = self.request(method.clone(), url, token);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            error!(%method, endpoint = %endpoint, error = %e, "Platform request failed");
            ClientError::from(e)
        })?;

        let status = response.status();
        if status != expected {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %method,
                endpoint = %endpoint,
                expected = expected.as_u16(),
                status = status.as_u16(),
                body = %body,
                "Unexpected response status code received"
            );
            return Err(ClientError::UnexpectedStatusCode);
        }

        debug!(%method, endpoint = %endpoint, status = status.as_u16(), "Platform request succeeded");
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for ApiClient {
    #[instrument(skip(self, token, thing), fields(name = %thing.name))]
    async fn create_thing(&self, token: &Token, thing: &Thing) -> Result<String> {
        let response = self
            .request(Method::POST, self.url(THINGS_ENDPOINT, &[])?, token)
            .json(&AddThingRequest { thing })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to create thing");
                ClientError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::CREATED {
            warn!(
                expected = StatusCode::CREATED.as_u16(),
                status = status.as_u16(),
                body = %body,
                "Could not create thing"
            );
            return Err(ClientError::UnexpectedStatusCode);
        }

        let created: AddThingResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?;

        debug!(thing_id = %created.id, "Thing created");
        Ok(created.id)
    }

    async fn update_thing_property_value(
        &self,
        token: &Token,
        thing_id: &str,
        component_id: &str,
        property_id: &str,
        value: &str,
        last_update: DateTime<Utc>,
    ) -> Result<()> {
        let message = UpdateThingPropertyValueRequest {
            value: value.to_string(),
            last_update,
        };

        self.do_request(
            Method::PUT,
            self.url(
                THINGS_ENDPOINT,
                &[thing_id, "components", component_id, "properties", property_id],
            )?,
            token,
            Some(&message),
            StatusCode::NO_CONTENT,
        )
        .await
    }

    async fn update_thing_status(
        &self,
        token: &Token,
        thing_id: &str,
        status: StatusType,
    ) -> Result<()> {
        self.do_request(
            Method::PUT,
            self.url(THINGS_ENDPOINT, &[thing_id, "status"])?,
            token,
            Some(&UpdateThingStatusRequest { status }),
            StatusCode::NO_CONTENT,
        )
        .await
    }

    async fn update_action_status(
        &self,
        token: &Token,
        action_request_id: &str,
        status: ActionRequestStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let message = ActionRequestStatusUpdate {
            status,
            error: error.map(str::to_string),
        };

        self.do_request(
            Method::PUT,
            self.url(ACTIONS_ENDPOINT, &[action_request_id])?,
            token,
            Some(&message),
            StatusCode::NO_CONTENT,
        )
        .await
    }

    async fn update_installation_state(
        &self,
        token: &Token,
        state: LifecycleState,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        self.do_request(
            Method::POST,
            self.url(INSTALLATION_STATE_ENDPOINT, &[])?,
            token,
            Some(&StateUpdateRequest { state, details }),
            StatusCode::NO_CONTENT,
        )
        .await
    }

    async fn update_instance_state(
        &self,
        token: &Token,
        state: LifecycleState,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        self.do_request(
            Method::POST,
            self.url(INSTANCE_STATE_ENDPOINT, &[])?,
            token,
            Some(&StateUpdateRequest { state, details }),
            StatusCode::NO_CONTENT,
        )
        .await
    }

    async fn delete_thing(&self, token: &Token, thing_id: &str) -> Result<()> {
        self.do_request::<()>(
            Method::DELETE,
            self.url(THINGS_ENDPOINT, &[thing_id])?,
            token,
            None,
            StatusCode::NO_CONTENT,
        )
        .await
    }
}
