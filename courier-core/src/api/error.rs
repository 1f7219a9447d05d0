// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Error Types
//!
//! Unified error type for registration and restore.

use thiserror::Error;

use crate::identity::IdentityError;
use crate::network::{RetryError, TransportError};
use crate::restore::RestorePhase;
use crate::storage::StorageError;

/// Unified error type for Courier operations.
#[derive(Error, Debug)]
pub enum CourierError {
    /// Relay call failed and was not (or no longer) retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The relay returned an empty node list.
    #[error("no nodes available")]
    NoNodesAvailable,

    /// A session of the same kind is already running.
    #[error("session already active")]
    SessionAlreadyActive,

    /// A restore phase gave up after bounded retries.
    #[error("restore phase {phase} failed: {cause}")]
    RestorePhaseFailed {
        /// Phase that failed.
        phase: RestorePhase,
        /// Last transport error.
        cause: TransportError,
    },

    /// A local write was refused or failed.
    #[error("storage persist failed: {0}")]
    StoragePersistFailed(String),

    /// The session was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Mnemonic or key derivation failed.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The relay returned a token that is not valid base64.
    #[error("invalid authorization token")]
    InvalidAuthToken,

    /// A state change would break the allowed order.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// State before.
        from: String,
        /// Rejected state.
        to: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CourierError {
    /// Whether starting the operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CourierError::Transport(e) => e.retryable,
            CourierError::RestorePhaseFailed { cause, .. } => cause.retryable,
            CourierError::StoragePersistFailed(_) | CourierError::Cancelled => true,
            _ => false,
        }
    }
}

impl From<RetryError> for CourierError {
    fn from(e: RetryError) -> Self {
        match e {
            RetryError::Fatal(e) | RetryError::Exhausted { last: e, .. } => {
                CourierError::Transport(e)
            }
            RetryError::Cancelled => CourierError::Cancelled,
        }
    }
}

/// Result type for Courier operations.
pub type CourierResult<T> = Result<T, CourierError>;
