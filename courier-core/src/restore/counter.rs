// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Restore denominators.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::network::{
    retry_transport, ConnectionMonitor, MsgsCounts, RelayTransport, RetryError, RetryPolicy,
};

/// Fetches the contact and message totals once per restore session.
pub struct RestoreCounter {
    transport: Arc<dyn RelayTransport>,
    monitor: ConnectionMonitor,
    policy: RetryPolicy,
}

impl RestoreCounter {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        monitor: ConnectionMonitor,
        policy: RetryPolicy,
    ) -> Self {
        RestoreCounter {
            transport,
            monitor,
            policy,
        }
    }

    /// Totals reported by the node, or `None` if it cannot report them.
    pub async fn fetch_counts(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<MsgsCounts>, RetryError> {
        let counts = retry_transport(
            &self.policy,
            &self.monitor,
            cancel,
            "fetch_counts",
            || {
                let transport = self.transport.clone();
                async move { transport.fetch_counts().await }
            },
            |report| debug!(attempt = report.attempt, error = %report.error, "count fetch failed"),
        )
        .await?;

        match counts {
            Some(counts) => info!(
                contacts = counts.total_contacts,
                messages = counts.total_messages,
                "restore counts fetched"
            ),
            None => info!("node reported no counts, progress is indeterminate"),
        }
        Ok(counts)
    }
}
