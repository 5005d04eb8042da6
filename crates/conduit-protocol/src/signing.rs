// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Canonical payloads and ed25519 signatures for platform callbacks.
//!
//! The signer and the verifier both build the payload with [`signable_payload`]; any
//! difference in field order, labels or delimiters breaks every signature.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use http::HeaderMap;

/// Header carrying the base64-encoded ed25519 signature.
pub const SIGNATURE_HEADER: &str = "Signature";

/// Headers included in the canonical payload, in emission order.
///
/// Append only. Reordering invalidates every signature issued so far.
pub const SIGNED_HEADERS: &[&str] = &["Date"];

const DELIMITER: &[u8] = b"\r\n";

/// Errors raised while building, signing or verifying a canonical payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    /// A header listed in [`SIGNED_HEADERS`] is absent from the request.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The signature header is not valid base64 or not a 64-byte signature.
    #[error("invalid signature encoding: {0}")]
    InvalidEncoding(String),

    /// The configured public key cannot be decoded.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The signature does not match the canonical payload.
    #[error("bad signature")]
    BadSignature,
}

/// Build the canonical payload for a request.
///
/// `host` may include a port and `request_uri` includes the query string. Header values
/// are copied as raw bytes; no escaping is applied.
pub fn signable_payload(
    method: &str,
    scheme: &str,
    host: &str,
    request_uri: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<u8>, SigningError> {
    let mut payload = Vec::with_capacity(64 + host.len() + request_uri.len() + body.len());

    push_fragment(&mut payload, "method", method.as_bytes());
    payload.extend_from_slice(DELIMITER);

    let url = format!("{scheme}://{host}{request_uri}");
    push_fragment(&mut payload, "url", url.as_bytes());
    payload.extend_from_slice(DELIMITER);

    for name in SIGNED_HEADERS {
        let value = headers
            .get(*name)
            .ok_or(SigningError::MissingHeader(*name))?;
        push_fragment(&mut payload, name, value.as_bytes());
        payload.extend_from_slice(DELIMITER);
    }

    push_fragment(&mut payload, "body", body);

    Ok(payload)
}

fn push_fragment(out: &mut Vec<u8>, label: &str, value: &[u8]) {
    out.push(b'(');
    out.extend_from_slice(label.as_bytes());
    out.extend_from_slice(b"):");
    out.extend_from_slice(value);
}

/// Sign a canonical payload, returning the value for the [`SIGNATURE_HEADER`].
pub fn sign(key: &SigningKey, payload: &[u8]) -> String {
    STANDARD.encode(key.sign(payload).to_bytes())
}

/// Decode a [`SIGNATURE_HEADER`] value into a raw signature.
pub fn decode_signature(encoded: &str) -> Result<Signature, SigningError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SigningError::InvalidEncoding(e.to_string()))?;

    Signature::from_slice(&bytes).map_err(|e| SigningError::InvalidEncoding(e.to_string()))
}

/// Verify `signature` over `payload`.
pub fn verify(
    key: &VerifyingKey,
    payload: &[u8],
    signature: &Signature,
) -> Result<(), SigningError> {
    key.verify_strict(payload, signature)
        .map_err(|_| SigningError::BadSignature)
}

/// Parse a base64-encoded 32-byte ed25519 public key.
pub fn parse_public_key(encoded: &str) -> Result<VerifyingKey, SigningError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))?;

    let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        SigningError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
    })?;

    VerifyingKey::from_bytes(&bytes).map_err(|e| SigningError::InvalidPublicKey(e.to_string()))
}
