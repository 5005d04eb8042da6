// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for conduit-client.

use thiserror::Error;

/// Result type using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by platform calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The configured base URL is not absolute or does not end with `/`.
    #[error("the base url must be absolute and end with a slash: {0}")]
    InvalidBaseUrl(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// The platform answered with a status other than the expected one.
    #[error("unexpected status code")]
    UnexpectedStatusCode,

    /// The platform answered with a body that could not be decoded.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The request could not be sent or the response could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
