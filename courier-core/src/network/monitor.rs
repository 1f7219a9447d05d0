// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Monitor
//!
//! Tracks relay liveness. Registration and restore consult it before every
//! network call and park while the link is down.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Relay connectivity as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkStatus {
    /// No connection attempt has resolved yet.
    #[default]
    Loading,
    /// Relay reachable.
    Connected,
    /// Relay unreachable.
    Disconnected,
}

/// Returned when a wait is interrupted by cancellation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("wait cancelled")]
pub struct WaitCancelled;

type StatusListener = Arc<dyn Fn(NetworkStatus) + Send + Sync>;

struct MonitorInner {
    status: watch::Sender<NetworkStatus>,
    listeners: RwLock<Vec<StatusListener>>,
}

/// Shared connectivity holder. Cloning yields another handle to the same state.
///
/// Only the transport glue should call [`report_connected`](Self::report_connected)
/// and [`report_disconnected`](Self::report_disconnected); everything else reads.
#[derive(Clone)]
pub struct ConnectionMonitor {
    inner: Arc<MonitorInner>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    /// Creates a monitor in the `Loading` state.
    pub fn new() -> Self {
        let (status, _) = watch::channel(NetworkStatus::Loading);
        ConnectionMonitor {
            inner: Arc::new(MonitorInner {
                status,
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Current status.
    pub fn status(&self) -> NetworkStatus {
        *self.inner.status.borrow()
    }

    /// Returns true if the relay is reachable.
    pub fn is_connected(&self) -> bool {
        self.status() == NetworkStatus::Connected
    }

    /// Records that the relay became reachable.
    pub fn report_connected(&self) {
        self.transition(NetworkStatus::Connected);
    }

    /// Records that the relay became unreachable.
    pub fn report_disconnected(&self) {
        self.transition(NetworkStatus::Disconnected);
    }

    /// Registers a callback invoked on every status change.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(NetworkStatus) + Send + Sync + 'static,
    {
        self.inner.listeners.write().push(Arc::new(listener));
    }

    /// Watch receiver for async consumers.
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.inner.status.subscribe()
    }

    /// Parks until the status is `Connected` or `cancel` fires.
    pub async fn wait_until_connected(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(), WaitCancelled> {
        let mut rx = self.subscribe();
        loop {
            if *rx.borrow_and_update() == NetworkStatus::Connected {
                return Ok(());
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(WaitCancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(WaitCancelled);
                    }
                }
            }
        }
    }

    fn transition(&self, next: NetworkStatus) {
        // Loading is only the initial state; nothing transitions back into it.
        let changed = self.inner.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            info!(status = ?next, "network status changed");
            let listeners = self.inner.listeners.read().clone();
            for listener in listeners {
                listener(next);
            }
        }
    }
}
