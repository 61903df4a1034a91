// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the control plane, mapped to wire `Error` envelopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes, mirrored on the wire as `Error.Code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerError {
    BadEnvelope,
    UnknownMessage,
    Unauthenticated,
    Forbidden,
    TokenInvalid,
    TokenConsumed,
    NotConnected,
    QueueOverflow,
    Internal,
}

impl ServerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadEnvelope => "bad_envelope",
            Self::UnknownMessage => "unknown_message",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::TokenInvalid => "token_invalid",
            Self::TokenConsumed => "token_consumed",
            Self::NotConnected => "not_connected",
            Self::QueueOverflow => "queue_overflow",
            Self::Internal => "internal",
        }
    }

    /// Build the wire `Error` envelope body for this failure.
    pub fn to_envelope(&self, message: impl Into<String>) -> crate::envelope::ErrorBody {
        crate::envelope::ErrorBody { code: self.code().to_owned(), message: message.into() }
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::error::Error for ServerError {}

/// Transport-layer failures. These never reach the wire as `Error`
/// envelopes — the connection is torn down instead.
#[derive(Debug)]
pub enum TransportError {
    Bind(std::io::Error),
    Tls(String),
    Handshake(String),
    Frame(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "bind error: {e}"),
            Self::Tls(e) => write!(f, "tls error: {e}"),
            Self::Handshake(e) => write!(f, "handshake error: {e}"),
            Self::Frame(e) => write!(f, "frame error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}
