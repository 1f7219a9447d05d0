// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier Configuration
//!
//! Tunables for registration, restore and event publication. Every field has
//! a default, so a partial JSON document (or `{}`) is a valid configuration.

use serde::{Deserialize, Serialize};

use super::error::{CourierError, CourierResult};
use crate::network::{BackoffConfig, RetryPolicy};

/// Restore tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreConfig {
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Retries per failing page before the phase fails.
    #[serde(default = "default_max_phase_retries")]
    pub max_phase_retries: u32,
    /// Delay schedule between page retries.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_page_size() -> u32 {
    50
}

fn default_max_phase_retries() -> u32 {
    4
}

impl Default for RestoreConfig {
    fn default() -> Self {
        RestoreConfig {
            page_size: default_page_size(),
            max_phase_retries: default_max_phase_retries(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl RestoreConfig {
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_phase_retries,
            backoff: self.backoff.clone(),
        }
    }
}

/// Registration tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Retries per relay request.
    #[serde(default = "default_max_request_retries")]
    pub max_request_retries: u32,
    /// Attempts at persisting the router key before giving up.
    #[serde(default = "default_max_persist_attempts")]
    pub max_persist_attempts: u32,
    /// Delay schedule between retries.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_max_request_retries() -> u32 {
    3
}

fn default_max_persist_attempts() -> u32 {
    3
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        RegistrationConfig {
            max_request_retries: default_max_request_retries(),
            max_persist_attempts: default_max_persist_attempts(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl RegistrationConfig {
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_request_retries,
            backoff: self.backoff.clone(),
        }
    }
}

/// Event publication tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Events buffered per subscriber before the oldest are dropped.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    64
}

impl Default for PublisherConfig {
    fn default() -> Self {
        PublisherConfig {
            capacity: default_capacity(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub restore: RestoreConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

impl CourierConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> CourierResult<Self> {
        let config: CourierConfig =
            serde_json::from_str(json).map_err(|e| CourierError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would stall a session.
    pub fn validate(&self) -> CourierResult<()> {
        if self.restore.page_size == 0 {
            return Err(CourierError::Configuration(
                "restore.page_size must be positive".into(),
            ));
        }
        if self.publisher.capacity == 0 {
            return Err(CourierError::Configuration(
                "publisher.capacity must be positive".into(),
            ));
        }
        if self.registration.max_persist_attempts == 0 {
            return Err(CourierError::Configuration(
                "registration.max_persist_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Sets the restore page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.restore.page_size = page_size;
        self
    }

    /// Sets the retry bound for restore phases.
    pub fn with_max_phase_retries(mut self, retries: u32) -> Self {
        self.restore.max_phase_retries = retries;
        self
    }

    /// Sets the retry bound for registration requests.
    pub fn with_max_request_retries(mut self, retries: u32) -> Self {
        self.registration.max_request_retries = retries;
        self
    }

    /// Uses the same backoff for registration and restore.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.restore.backoff = backoff.clone();
        self.registration.backoff = backoff;
        self
    }

    /// Sets the per-subscriber event buffer.
    pub fn with_publisher_capacity(mut self, capacity: usize) -> Self {
        self.publisher.capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CourierConfig::default();
        assert_eq!(config.restore.page_size, 50);
        assert_eq!(config.restore.max_phase_retries, 4);
        assert_eq!(config.restore.backoff.base_delay_ms, 500);
        assert_eq!(config.restore.backoff.max_delay_ms, 30_000);
        assert_eq!(config.publisher.capacity, 64);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            CourierConfig::from_json(r#"{"restore": {"page_size": 20}, "publisher": {}}"#).unwrap();
        assert_eq!(config.restore.page_size, 20);
        assert_eq!(config.restore.max_phase_retries, 4);
        assert_eq!(config.registration, RegistrationConfig::default());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = CourierConfig::from_json(r#"{"restore": {"page_size": 0}}"#);
        assert!(matches!(result, Err(CourierError::Configuration(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            CourierConfig::from_json("{not json"),
            Err(CourierError::Configuration(_))
        ));
    }

    #[test]
    fn test_builders() {
        let config = CourierConfig::default()
            .with_page_size(10)
            .with_backoff(BackoffConfig::immediate())
            .with_publisher_capacity(4);
        assert_eq!(config.restore.page_size, 10);
        assert_eq!(config.registration.backoff.base_delay_ms, 0);
        assert_eq!(config.publisher.capacity, 4);
        assert!(config.validate().is_ok());
    }
}
