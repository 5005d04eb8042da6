// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Signature verification for incoming platform callbacks.
//!
//! Every protocol request carries an ed25519 signature over its canonical form in the
//! `Signature` header. [`verify_signature`] is an axum middleware that buffers the body,
//! rebuilds the canonical payload and rejects the request with `400 Bad Signature`
//! unless the signature verifies against the configured public key. The buffered body
//! is handed on unchanged.
//!
//! Behind a reverse proxy the host and path the platform signed differ from what the
//! connector sees; [`RequestContextPolicy::Proxied`] substitutes the public host and
//! mounts each route under the public path prefix.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use conduit_protocol::signing::{self, SIGNATURE_HEADER, SigningError};
use ed25519_dalek::VerifyingKey;
use tracing::{debug, warn};

/// Default upper bound for buffered request bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Scheme assumed for every signed URL.
pub const SIGNED_SCHEME: &str = "https";

/// Source of the host and request URI placed in the canonical payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestContextPolicy {
    /// Use the host and URI the request arrived with.
    Direct,
    /// Use the public host and path prefix of a proxy deployment.
    Proxied {
        /// Public host, optionally with port.
        host: String,
        /// Public path the connector's routes are mounted under, e.g. `/hooks`.
        path: String,
    },
}

/// Host and request URI to verify against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Host, optionally with port.
    pub host: String,
    /// Path and query string.
    pub request_uri: String,
}

impl RequestContextPolicy {
    /// Resolve the context for a request.
    ///
    /// In direct mode the host comes from the URI authority, falling back to the `Host`
    /// header, and the request URI is the path with its query string. In proxied mode the
    /// configured host is used and the path with its query string is appended to the
    /// configured prefix, so `/installations/inst-1` behind `/hooks` resolves to
    /// `/hooks/installations/inst-1`.
    pub fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> RequestContext {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        match self {
            Self::Direct => {
                let host = uri
                    .authority()
                    .map(|a| a.as_str().to_string())
                    .or_else(|| {
                        headers
                            .get(header::HOST)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string)
                    })
                    .unwrap_or_default();
                RequestContext {
                    host,
                    request_uri: path_and_query.to_string(),
                }
            }
            Self::Proxied { host, path } => RequestContext {
                host: host.clone(),
                request_uri: format!("{}{}", path.trim_end_matches('/'), path_and_query),
            },
        }
    }
}

/// Verifies callback signatures with the platform's public key.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: VerifyingKey,
    policy: RequestContextPolicy,
    max_body_bytes: usize,
}

impl SignatureVerifier {
    /// Create a verifier with the default body limit.
    pub fn new(public_key: VerifyingKey, policy: RequestContextPolicy) -> Self {
        Self {
            public_key,
            policy,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Set the maximum body size accepted for verification.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// The configured request context policy.
    pub fn policy(&self) -> &RequestContextPolicy {
        &self.policy
    }

    /// Maximum body size accepted for verification.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Check the signature of a fully buffered request.
    pub fn verify(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), SigningError> {
        let signature = signature_header(headers)?;
        let context = self.policy.resolve(uri, headers);
        let payload = signing::signable_payload(
            method.as_str(),
            SIGNED_SCHEME,
            &context.host,
            &context.request_uri,
            headers,
            body,
        )?;
        signing::verify(&self.public_key, &payload, &signature)
    }
}

fn signature_header(headers: &HeaderMap) -> Result<ed25519_dalek::Signature, SigningError> {
    let value = headers
        .get(SIGNATURE_HEADER)
        .ok_or(SigningError::MissingHeader(SIGNATURE_HEADER))?;
    let encoded = value
        .to_str()
        .map_err(|e| SigningError::InvalidEncoding(e.to_string()))?;
    signing::decode_signature(encoded)
}

/// Middleware rejecting requests whose signature does not verify.
pub async fn verify_signature(
    State(verifier): State<Arc<SignatureVerifier>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    if let Err(e) = signature_header(&parts.headers) {
        warn!(method = %parts.method, uri = %parts.uri, error = %e, "Rejected callback without valid signature header");
        return bad_signature();
    }

    let bytes = match to_bytes(body, verifier.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(method = %parts.method, uri = %parts.uri, error = %e, "Failed to read callback body");
            return bad_signature();
        }
    };

    if let Err(e) = verifier.verify(&parts.method, &parts.uri, &parts.headers, &bytes) {
        warn!(method = %parts.method, uri = %parts.uri, error = %e, "Rejected callback with bad signature");
        return bad_signature();
    }

    debug!(method = %parts.method, uri = %parts.uri, "Callback signature verified");
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn bad_signature() -> Response {
    (StatusCode::BAD_REQUEST, "Bad Signature").into_response()
}
