// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Transport error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong talking to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Request timed out.
    Timeout,
    /// Link dropped mid-request.
    ConnectionLost,
    /// Relay temporarily unavailable (5xx, maintenance).
    Unavailable,
    /// Relay asked us to slow down.
    RateLimited,
    /// Credentials rejected.
    Unauthorized,
    /// Response could not be decoded.
    BadResponse,
    /// Relay refused the request for a non-transient reason.
    Rejected,
    /// Page held nothing past the requested cursor.
    Redelivered,
}

impl TransportErrorKind {
    /// Whether errors of this kind are worth retrying by default.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            TransportErrorKind::Timeout
                | TransportErrorKind::ConnectionLost
                | TransportErrorKind::Unavailable
                | TransportErrorKind::RateLimited
                | TransportErrorKind::Redelivered
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::Unavailable => "unavailable",
            TransportErrorKind::RateLimited => "rate limited",
            TransportErrorKind::Unauthorized => "unauthorized",
            TransportErrorKind::BadResponse => "bad response",
            TransportErrorKind::Rejected => "rejected",
            TransportErrorKind::Redelivered => "redelivered",
        };
        f.write_str(name)
    }
}

/// Uniform error returned by every relay call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Error category.
    pub kind: TransportErrorKind,
    /// Whether the caller may retry the same request.
    pub retryable: bool,
    /// Human-readable detail.
    pub message: String,
}

impl TransportError {
    /// Creates an error whose retryability follows its kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            retryable: kind.is_transient(),
            message: message.into(),
        }
    }

    /// Creates an error that may be retried regardless of kind.
    pub fn retryable(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            retryable: true,
            message: message.into(),
        }
    }

    /// Creates an error that must not be retried.
    pub fn fatal(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            retryable: false,
            message: message.into(),
        }
    }

    /// Shorthand for a dropped link.
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionLost, message)
    }

    /// Shorthand for a timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}
