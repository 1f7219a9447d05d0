// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bounded retry with exponential backoff for relay calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::TransportError;
use super::monitor::ConnectionMonitor;

/// Backoff schedule: `base_delay_ms * 2^min(attempt, 6)`, capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay (milliseconds).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Add up to 20% random jitter to each delay.
    #[serde(default)]
    pub jitter: bool,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

impl BackoffConfig {
    /// Immediate retries, for tests and local transports.
    pub fn immediate() -> Self {
        BackoffConfig {
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(6);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let spread = delay.as_millis() as u64 / 5;
        let extra = rand::thread_rng().gen_range(0..=spread);
        delay + Duration::from_millis(extra)
    }
}

/// How many times a failing call is retried and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failure; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Delay schedule.
    pub backoff: BackoffConfig,
}

/// Why a retried call gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// The relay returned a non-retryable error.
    Fatal(TransportError),
    /// Retryable errors persisted past the retry bound.
    Exhausted {
        /// Last error observed.
        last: TransportError,
        /// Failed attempts counted against the bound.
        attempts: u32,
    },
    /// Cancellation fired while waiting.
    Cancelled,
}

/// A failure report handed to the caller before the next retry or give-up.
#[derive(Debug)]
pub struct FailureReport<'a> {
    /// The error just observed.
    pub error: &'a TransportError,
    /// Failed attempts so far, counting this one.
    pub attempt: u32,
    /// True if no further retry follows.
    pub terminal: bool,
}

/// Runs `call` until it succeeds, fails fatally, exhausts `policy`, or is cancelled.
///
/// Before each attempt the call parks until `monitor` reports `Connected`.
/// A retryable failure observed while the link is down is not counted
/// against the bound: the call waits for the link and tries again. The
/// in-flight call itself is never interrupted by `cancel`.
pub async fn retry_transport<T, F, Fut, R>(
    policy: &RetryPolicy,
    monitor: &ConnectionMonitor,
    cancel: &CancellationToken,
    operation: &str,
    mut call: F,
    mut on_failure: R,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
    R: FnMut(FailureReport<'_>),
{
    let mut failures = 0u32;

    loop {
        monitor
            .wait_until_connected(cancel)
            .await
            .map_err(|_| RetryError::Cancelled)?;

        let error = match call().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if error.retryable && !monitor.is_connected() {
            debug!(operation, %error, "link down, pausing until reconnect");
            continue;
        }

        failures += 1;
        let terminal = !error.retryable || failures > policy.max_retries;
        on_failure(FailureReport {
            error: &error,
            attempt: failures,
            terminal,
        });

        if !error.retryable {
            warn!(operation, %error, "relay call failed fatally");
            return Err(RetryError::Fatal(error));
        }
        if terminal {
            warn!(operation, %error, attempts = failures, "relay call retries exhausted");
            return Err(RetryError::Exhausted {
                last: error,
                attempts: failures,
            });
        }

        let delay = policy.backoff.next_delay(failures - 1);
        warn!(operation, %error, attempt = failures, ?delay, "relay call failed, retrying");
        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
