// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier
//!
//! Main entry point: wires transport, storage, connectivity and the event
//! publisher, and runs registration and restore sessions.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use courier_core::{ConnectionMonitor, Courier, CourierConfig, MemoryStorage, MockRelay};
//!
//! let monitor = ConnectionMonitor::new();
//! let courier = Courier::with_storage(
//!     Arc::new(MockRelay::new()),
//!     Arc::new(MemoryStorage::new()),
//!     monitor.clone(),
//!     CourierConfig::default(),
//! )?;
//!
//! let mut events = courier.subscribe();
//! monitor.report_connected();
//! let progress = courier.connect_and_restore(None).await?;
//! assert_eq!(progress.progress_percentage, 100);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::config::CourierConfig;
use super::error::{CourierError, CourierResult};
use super::events::{CourierEvent, EventHandler, ProgressPublisher, Subscription};
use super::session::SessionSlot;
use crate::network::{ConnectionMonitor, NetworkStatus, RelayTransport};
use crate::owner::OwnerInfo;
use crate::registration::{OwnerRegistrar, RegistrationOutcome};
use crate::restore::{ProgressSnapshot, RestoreCoordinator, RestoreProgress};
use crate::storage::{RestoreStore, SecureStorage};

struct CourierInner {
    secure: Arc<dyn SecureStorage>,
    monitor: ConnectionMonitor,
    publisher: ProgressPublisher,
    registrar: OwnerRegistrar,
    coordinator: RestoreCoordinator,
    registration_slot: Arc<SessionSlot>,
    restore_slot: Arc<SessionSlot>,
    registration_cancel: Mutex<Option<CancellationToken>>,
    restore_cancel: Mutex<Option<CancellationToken>>,
    stashed: Mutex<Option<RestoreProgress>>,
    owner: Mutex<Option<OwnerInfo>>,
}

/// Registration and restore orchestrator for one owner.
///
/// Cloning yields another handle to the same orchestrator.
#[derive(Clone)]
pub struct Courier {
    inner: Arc<CourierInner>,
}

impl Courier {
    /// Creates an orchestrator over separate secret and history stores.
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        secure: Arc<dyn SecureStorage>,
        store: Arc<dyn RestoreStore>,
        monitor: ConnectionMonitor,
        config: CourierConfig,
    ) -> CourierResult<Self> {
        config.validate()?;

        let publisher = ProgressPublisher::new(config.publisher.capacity);
        publisher.publish(CourierEvent::NetworkStatusChanged {
            status: monitor.status(),
        });
        {
            let publisher = publisher.clone();
            monitor.on_change(move |status| {
                publisher.publish(CourierEvent::NetworkStatusChanged { status });
            });
        }

        let registrar = OwnerRegistrar::new(
            transport.clone(),
            secure.clone(),
            monitor.clone(),
            publisher.clone(),
            config.registration.clone(),
        );
        let coordinator = RestoreCoordinator::new(
            transport,
            secure.clone(),
            store,
            monitor.clone(),
            publisher.clone(),
            config.restore.clone(),
        );

        Ok(Courier {
            inner: Arc::new(CourierInner {
                secure,
                monitor,
                publisher,
                registrar,
                coordinator,
                registration_slot: SessionSlot::new(),
                restore_slot: SessionSlot::new(),
                registration_cancel: Mutex::new(None),
                restore_cancel: Mutex::new(None),
                stashed: Mutex::new(None),
                owner: Mutex::new(None),
            }),
        })
    }

    /// Creates an orchestrator over one store serving both roles.
    pub fn with_storage<S>(
        transport: Arc<dyn RelayTransport>,
        storage: Arc<S>,
        monitor: ConnectionMonitor,
        config: CourierConfig,
    ) -> CourierResult<Self>
    where
        S: SecureStorage + RestoreStore + 'static,
    {
        Self::new(transport, storage.clone(), storage, monitor, config)
    }

    /// Subscribes to events; the latest snapshot arrives first.
    pub fn subscribe(&self) -> Subscription {
        self.inner.publisher.subscribe()
    }

    /// The event publisher.
    pub fn publisher(&self) -> &ProgressPublisher {
        &self.inner.publisher
    }

    /// Forwards events to `handler` from a background task.
    pub fn attach_handler(&self, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        self.inner.publisher.attach(handler)
    }

    /// Current relay connectivity.
    pub fn network_status(&self) -> NetworkStatus {
        self.inner.monitor.status()
    }

    /// The registered owner, once known.
    pub fn owner(&self) -> Option<OwnerInfo> {
        self.inner.owner.lock().clone()
    }

    pub fn is_registering(&self) -> bool {
        self.inner.registration_slot.is_active()
    }

    pub fn is_restoring(&self) -> bool {
        self.inner.restore_slot.is_active()
    }

    /// Registers the owner. Fails with `SessionAlreadyActive` if a
    /// registration is already running.
    pub async fn start_registration(
        &self,
        mnemonic: Option<String>,
    ) -> CourierResult<RegistrationOutcome> {
        let _guard = self
            .inner
            .registration_slot
            .try_acquire()
            .ok_or(CourierError::SessionAlreadyActive)?;

        let cancel = CancellationToken::new();
        *self.inner.registration_cancel.lock() = Some(cancel.clone());

        let span = info_span!("registration", session = %Uuid::new_v4());
        let result = self
            .inner
            .registrar
            .register(mnemonic.as_deref(), &cancel)
            .instrument(span)
            .await;

        *self.inner.registration_cancel.lock() = None;

        let outcome = result?;
        *self.inner.owner.lock() = Some(outcome.owner.clone());
        Ok(outcome)
    }

    /// Restores contacts and messages from the node.
    ///
    /// Resumes an interrupted session (in this process or from a stored
    /// checkpoint) instead of starting over. Fails with
    /// `SessionAlreadyActive` if a restore is already running; the running
    /// session is not touched.
    pub async fn start_restore(&self) -> CourierResult<ProgressSnapshot> {
        let _guard = self
            .inner
            .restore_slot
            .try_acquire()
            .ok_or(CourierError::SessionAlreadyActive)?;

        let cancel = CancellationToken::new();
        *self.inner.restore_cancel.lock() = Some(cancel.clone());

        let span = info_span!("restore", session = %Uuid::new_v4());
        let result = self.run_restore(&cancel).instrument(span).await;

        *self.inner.restore_cancel.lock() = None;

        if let Err(e) = &result {
            match e {
                CourierError::Cancelled => info!("restore cancelled"),
                e if !cancel.is_cancelled() => {
                    warn!(error = %e, "restore stopped");
                    self.inner.publisher.publish(CourierEvent::RestoreAborted {
                        reason: e.to_string(),
                        retryable: e.is_retryable(),
                    });
                }
                _ => {}
            }
        }
        result
    }

    /// Registers, then restores.
    ///
    /// Every relay call parks until the monitor reports `Connected`, so this
    /// may be called before the link is up.
    pub async fn connect_and_restore(
        &self,
        mnemonic: Option<String>,
    ) -> CourierResult<ProgressSnapshot> {
        self.start_registration(mnemonic).await?;
        self.start_restore().await
    }

    /// Cancels running sessions. An in-flight page is written before the
    /// restore stops; its progress is kept for the next `start_restore`.
    ///
    /// Returns true if a session was running.
    pub fn cancel(&self) -> bool {
        let mut cancelled = false;
        for slot in [&self.inner.registration_cancel, &self.inner.restore_cancel] {
            if let Some(token) = slot.lock().as_ref() {
                token.cancel();
                cancelled = true;
            }
        }
        if cancelled {
            info!("session cancellation requested");
        }
        cancelled
    }

    async fn run_restore(&self, cancel: &CancellationToken) -> CourierResult<ProgressSnapshot> {
        let stashed = self.inner.stashed.lock().take();
        let mut progress = self.inner.coordinator.prepare(stashed, cancel).await?;

        let known_owner = self.inner.owner.lock().clone();
        let mut owner = match known_owner {
            Some(owner) => owner,
            None => OwnerInfo::new(None, self.inner.secure.read_last_message_index()?),
        };

        let result = self
            .inner
            .coordinator
            .run(&mut progress, &mut owner, cancel)
            .await;

        *self.inner.owner.lock() = Some(owner);
        if result.is_err() {
            *self.inner.stashed.lock() = Some(progress);
        }
        result
    }
}
