// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock platform client for testing.
//!
//! Records every call and answers from memory. Individual calls can be made to fail
//! with [`ClientError::UnexpectedStatusCode`], as a platform rejection would.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_protocol::thing::{StatusType, Thing};
use conduit_protocol::{ActionRequestStatus, LifecycleState, Token};
use tokio::sync::Mutex;

use crate::client::PlatformClient;
use crate::error::{ClientError, Result};

/// A call received by [`MockPlatformClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    /// `create_thing`; `thing_id` is `None` when the call failed.
    CreateThing {
        /// Bearer token used.
        token: Token,
        /// Thing name.
        name: String,
        /// Assigned id.
        thing_id: Option<String>,
    },
    /// `update_thing_property_value`.
    UpdatePropertyValue {
        /// Bearer token used.
        token: Token,
        /// Thing id.
        thing_id: String,
        /// Component id.
        component_id: String,
        /// Property id.
        property_id: String,
        /// New value.
        value: String,
    },
    /// `update_thing_status`.
    UpdateThingStatus {
        /// Bearer token used.
        token: Token,
        /// Thing id.
        thing_id: String,
        /// New status.
        status: StatusType,
    },
    /// `update_action_status`.
    UpdateActionStatus {
        /// Bearer token used.
        token: Token,
        /// Action request id.
        action_request_id: String,
        /// Reported status.
        status: ActionRequestStatus,
        /// Reported error.
        error: Option<String>,
    },
    /// `update_installation_state`.
    UpdateInstallationState {
        /// Bearer token used.
        token: Token,
        /// Reported state.
        state: LifecycleState,
    },
    /// `update_instance_state`.
    UpdateInstanceState {
        /// Bearer token used.
        token: Token,
        /// Reported state.
        state: LifecycleState,
    },
    /// `delete_thing`.
    DeleteThing {
        /// Bearer token used.
        token: Token,
        /// Thing id.
        thing_id: String,
    },
}

/// In-memory [`PlatformClient`] that records calls.
#[derive(Debug, Default)]
pub struct MockPlatformClient {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
    next_id: AtomicUsize,
    failing_things: Mutex<HashSet<String>>,
    fail_property_updates: AtomicBool,
    fail_action_updates: AtomicBool,
}

impl MockPlatformClient {
    /// Create a mock that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_thing` fail for things with this name.
    pub async fn fail_thing(&self, name: &str) {
        self.failing_things.lock().await.insert(name.to_string());
    }

    /// Make every property value update fail.
    pub fn fail_property_updates(&self, fail: bool) {
        self.fail_property_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every action status update fail.
    pub fn fail_action_updates(&self, fail: bool) {
        self.fail_action_updates.store(fail, Ordering::SeqCst);
    }

    /// All calls received so far, in order.
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().await.clone()
    }

    /// Ids assigned by successful `create_thing` calls, in order.
    pub async fn created_thing_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                PlatformCall::CreateThing {
                    thing_id: Some(id), ..
                } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: PlatformCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    async fn create_thing(&self, token: &Token, thing: &Thing) -> Result<String> {
        if self.failing_things.lock().await.contains(&thing.name) {
            self.record(PlatformCall::CreateThing {
                token: token.clone(),
                name: thing.name.clone(),
                thing_id: None,
            })
            .await;
            return Err(ClientError::UnexpectedStatusCode);
        }

        let id = format!("thing-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(PlatformCall::CreateThing {
            token: token.clone(),
            name: thing.name.clone(),
            thing_id: Some(id.clone()),
        })
        .await;
        Ok(id)
    }

    async fn update_thing_property_value(
        &self,
        token: &Token,
        thing_id: &str,
        component_id: &str,
        property_id: &str,
        value: &str,
        _last_update: DateTime<Utc>,
    ) -> Result<()> {
        self.record(PlatformCall::UpdatePropertyValue {
            token: token.clone(),
            thing_id: thing_id.to_string(),
            component_id: component_id.to_string(),
            property_id: property_id.to_string(),
            value: value.to_string(),
        })
        .await;

        if self.fail_property_updates.load(Ordering::SeqCst) {
            return Err(ClientError::UnexpectedStatusCode);
        }
        Ok(())
    }

    async fn update_thing_status(
        &self,
        token: &Token,
        thing_id: &str,
        status: StatusType,
    ) -> Result<()> {
        self.record(PlatformCall::UpdateThingStatus {
            token: token.clone(),
            thing_id: thing_id.to_string(),
            status,
        })
        .await;
        Ok(())
    }

    async fn update_action_status(
        &self,
        token: &Token,
        action_request_id: &str,
        status: ActionRequestStatus,
        error: Option<&str>,
    ) -> Result<()> {
        self.record(PlatformCall::UpdateActionStatus {
            token: token.clone(),
            action_request_id: action_request_id.to_string(),
            status,
            error: error.map(str::to_string),
        })
        .await;

        if self.fail_action_updates.load(Ordering::SeqCst) {
            return Err(ClientError::UnexpectedStatusCode);
        }
        Ok(())
    }

    async fn update_installation_state(
        &self,
        token: &Token,
        state: LifecycleState,
        _details: Option<serde_json::Value>,
    ) -> Result<()> {
        self.record(PlatformCall::UpdateInstallationState {
            token: token.clone(),
            state,
        })
        .await;
        Ok(())
    }

    async fn update_instance_state(
        &self,
        token: &Token,
        state: LifecycleState,
        _details: Option<serde_json::Value>,
    ) -> Result<()> {
        self.record(PlatformCall::UpdateInstanceState {
            token: token.clone(),
            state,
        })
        .await;
        Ok(())
    }

    async fn delete_thing(&self, token: &Token, thing_id: &str) -> Result<()> {
        self.record(PlatformCall::DeleteThing {
            token: token.clone(),
            thing_id: thing_id.to_string(),
        })
        .await;
        Ok(())
    }
}
