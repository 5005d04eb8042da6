// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP routes for the platform callback protocol.
//!
//! | Route | Success |
//! |-------|---------|
//! | `POST /installations` | `201 Created` |
//! | `DELETE /installations/{id}` | `204 No Content` |
//! | `POST /instances` | `201 Created` |
//! | `DELETE /instances/{id}` | `204 No Content` |
//! | `POST /actions` | `204 No Content`, or `200 OK` with an action response |
//! | `GET /health` | `200 OK` (unsigned) |
//!
//! All routes except `/health` sit behind [`verify_signature`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router, middleware};
use conduit_protocol::{ActionRequest, InstallationRequest, InstantiationRequest};
use serde_json::json;
use tracing::warn;

use crate::error::CoreError;
use crate::service::ConnectorService;
use crate::verification::{SignatureVerifier, verify_signature};

/// Build the callback router.
pub fn router(service: ConnectorService, verifier: Arc<SignatureVerifier>) -> Router {
    let protocol = Router::new()
        .route("/installations", post(add_installation))
        .route("/installations/{id}", delete(remove_installation))
        .route("/instances", post(add_instance))
        .route("/instances/{id}", delete(remove_instance))
        .route("/actions", post(perform_action))
        .layer(middleware::from_fn_with_state(verifier, verify_signature));

    Router::new()
        .route("/health", get(health))
        .merge(protocol)
        .with_state(service)
}

async fn add_installation(
    State(service): State<ConnectorService>,
    Json(request): Json<InstallationRequest>,
) -> Result<StatusCode, CoreError> {
    service.add_installation(&request).await?;
    Ok(StatusCode::CREATED)
}

async fn remove_installation(
    State(service): State<ConnectorService>,
    Path(id): Path<String>,
) -> Result<StatusCode, CoreError> {
    service.remove_installation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_instance(
    State(service): State<ConnectorService>,
    Json(request): Json<InstantiationRequest>,
) -> Result<StatusCode, CoreError> {
    service.add_instance(&request).await?;
    Ok(StatusCode::CREATED)
}

async fn remove_instance(
    State(service): State<ConnectorService>,
    Path(id): Path<String>,
) -> Result<StatusCode, CoreError> {
    service.remove_instance(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn perform_action(
    State(service): State<ConnectorService>,
    Json(request): Json<ActionRequest>,
) -> Result<Response, CoreError> {
    Ok(match service.perform_action(&request).await? {
        None => StatusCode::NO_CONTENT.into_response(),
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
    })
}

async fn health(State(service): State<ConnectorService>) -> Response {
    match service.persistence().health_check().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

impl CoreError {
    /// HTTP status reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
