// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Conduit Protocol - wire contract between the platform and a connector.
//!
//! Every callback the platform sends to a connector is signed with ed25519 over a
//! canonical byte payload built from the request. This crate holds the pieces that
//! both sides of that contract must agree on byte-for-byte:
//!
//! - [`signing`]: canonical payload construction, signing and verification
//! - [`messages`]: lifecycle requests, action requests/responses, tokens
//! - [`thing`]: thing descriptions registered with the platform, and their validation
//!
//! # Canonical Payload
//!
//! ```text
//! (method):GET\r\n
//! (url):https://foo.com:8080/bar?hello=world\r\n
//! (Date):Wed, 07 Oct 2020 10:00:00 GMT\r\n
//! (body):
//! ```
//!
//! Fields are emitted in a fixed order: method, url, each signed header in declared
//! order, body. New headers may only be appended to [`signing::SIGNED_HEADERS`].

#![deny(missing_docs)]

/// Callback wire messages (installations, instances, actions).
pub mod messages;

/// Canonical request payloads and ed25519 signatures.
pub mod signing;

/// Thing descriptions and their validation rules.
pub mod thing;

pub use messages::{
    ActionParameterValue, ActionRequest, ActionRequestStatus, ActionResponse, Configuration,
    InstallationRequest, InstantiationRequest, LifecycleState, StateUpdateRequest, Token,
};
pub use signing::{SIGNATURE_HEADER, SIGNED_HEADERS, SigningError};
pub use thing::{Thing, ThingError};
