// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Restore Coordinator
//!
//! Drives one restore session: contacts first, then messages, then
//! finished. Each page is written locally before it is counted, so a
//! cancelled or failed session can resume from its cursors without
//! double-counting.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::counter::RestoreCounter;
use super::progress::RestoreProgress;
use super::state::{RestorePhase, RestoreProcessState, RestoreState};
use crate::api::{CourierError, CourierEvent, CourierResult, ProgressPublisher, RestoreConfig};
use crate::network::{
    retry_transport, ConnectionMonitor, MessagePage, RelayTransport, RetryError, TransportError,
    TransportErrorKind, TransportResult,
};
use crate::owner::OwnerInfo;
use crate::restore::ProgressSnapshot;
use crate::storage::{RestoreStore, SecureStorage};

/// Runs the restore phases against the relay and local storage.
pub struct RestoreCoordinator {
    transport: Arc<dyn RelayTransport>,
    secure: Arc<dyn SecureStorage>,
    store: Arc<dyn RestoreStore>,
    monitor: ConnectionMonitor,
    publisher: ProgressPublisher,
    counter: RestoreCounter,
    config: RestoreConfig,
}

impl RestoreCoordinator {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        secure: Arc<dyn SecureStorage>,
        store: Arc<dyn RestoreStore>,
        monitor: ConnectionMonitor,
        publisher: ProgressPublisher,
        config: RestoreConfig,
    ) -> Self {
        let counter = RestoreCounter::new(transport.clone(), monitor.clone(), config.retry_policy());
        RestoreCoordinator {
            transport,
            secure,
            store,
            monitor,
            publisher,
            counter,
            config,
        }
    }

    /// Builds the progress a session starts from.
    ///
    /// In order of preference: `stashed` progress from an interrupted session
    /// in this process, a stored checkpoint, or fresh progress seeded with the
    /// node's counts and the stored message index.
    pub async fn prepare(
        &self,
        stashed: Option<RestoreProgress>,
        cancel: &CancellationToken,
    ) -> CourierResult<RestoreProgress> {
        if let Some(progress) = stashed {
            info!(state = ?progress.state(), "resuming interrupted restore");
            return Ok(progress);
        }

        if let Some(checkpoint) = self.store.load_checkpoint()? {
            info!(state = ?checkpoint.state, "resuming restore from checkpoint");
            return Ok(RestoreProgress::from_checkpoint(checkpoint));
        }

        let mut progress = RestoreProgress::new();
        let counts = self
            .counter
            .fetch_counts(cancel)
            .await
            .map_err(|e| self.phase_error(RestorePhase::Contacts, e))?;
        progress.apply_counts(counts);

        if let Some(index) = self.secure.read_last_message_index()? {
            let local = self.store.message_count()?;
            debug!(index, local, "messages cursor seeded from storage");
            progress.resume_messages_after(Some(index), local);
        }
        Ok(progress)
    }

    /// Runs the remaining phases until finished, cancelled, or failed.
    ///
    /// On error `progress` keeps the last committed position.
    pub async fn run(
        &self,
        progress: &mut RestoreProgress,
        owner: &mut OwnerInfo,
        cancel: &CancellationToken,
    ) -> CourierResult<ProgressSnapshot> {
        self.publish_state(progress, cancel);

        loop {
            match progress.state() {
                RestoreState::RestoringContacts => {
                    self.restore_contacts(progress, cancel).await?;
                    self.transition(progress, RestoreState::RestoringMessages, cancel)?;
                }
                RestoreState::RestoringMessages => {
                    self.restore_messages(progress, owner, cancel).await?;
                    self.transition(progress, RestoreState::RestoreFinished, cancel)?;
                }
                RestoreState::RestoreFinished => break,
            }
        }

        if let Err(e) = self.store.clear_checkpoint() {
            warn!(error = %e, "failed to clear restore checkpoint");
        }
        info!(
            contacts = progress.contacts_restored_amount(),
            messages = progress.restored_messages_amount(),
            "restore finished"
        );
        Ok(progress.snapshot())
    }

    async fn restore_contacts(
        &self,
        progress: &mut RestoreProgress,
        cancel: &CancellationToken,
    ) -> CourierResult<()> {
        if progress.counts_known() && progress.total_contacts_key() == 0 {
            debug!("node has no contacts, skipping contact pages");
            return Ok(());
        }

        let limit = self.config.page_size;
        loop {
            check_cancelled(cancel)?;

            let cursor = progress.contacts_cursor();
            let page = self
                .fetch_page(RestorePhase::Contacts, progress, cancel, || {
                    let transport = self.transport.clone();
                    let cursor = cursor.clone();
                    async move { transport.fetch_contacts_page(cursor, limit).await }
                })
                .await?;

            let done = page.contacts.is_empty() || page.next_cursor.is_none();
            let fresh = progress.new_contacts(&page.contacts);
            if !fresh.is_empty() {
                self.store
                    .store_contacts(&fresh)
                    .map_err(|e| CourierError::StoragePersistFailed(format!("contacts: {e}")))?;
            }

            progress.commit_contacts(&fresh, page.next_cursor);
            debug!(
                received = page.contacts.len(),
                new = fresh.len(),
                total = progress.contacts_restored_amount(),
                "contacts page committed"
            );
            self.commit(progress, cancel);

            if done {
                return Ok(());
            }
        }
    }

    async fn restore_messages(
        &self,
        progress: &mut RestoreProgress,
        owner: &mut OwnerInfo,
        cancel: &CancellationToken,
    ) -> CourierResult<()> {
        if !progress.counts_known() {
            progress.set_process_state(RestoreProcessState::MessagesCounts { msgs_counts: None });
            let counts = self
                .counter
                .fetch_counts(cancel)
                .await
                .map_err(|e| self.phase_error(RestorePhase::Messages, e))?;
            progress.apply_counts(counts);
            self.commit(progress, cancel);
        }
        let msgs_counts = progress.counts_known().then(|| progress.total_messages());
        progress.set_process_state(RestoreProcessState::MessagesCounts { msgs_counts });

        if progress.counts_known() && progress.total_messages() == 0 {
            debug!("node has no messages, skipping message pages");
            return Ok(());
        }

        progress.set_process_state(RestoreProcessState::RestoreMessages);
        let limit = self.config.page_size;
        loop {
            check_cancelled(cancel)?;

            let after = progress.last_message_index();
            let page = self
                .fetch_page(RestorePhase::Messages, progress, cancel, || {
                    let transport = self.transport.clone();
                    async move {
                        let page = transport.fetch_messages_page(after, limit).await?;
                        if is_redelivery(&page, after) {
                            return Err(TransportError::new(
                                TransportErrorKind::Redelivered,
                                format!("no message past index {after:?}"),
                            ));
                        }
                        Ok(page)
                    }
                })
                .await?;

            // Only an empty page ends the stream.
            if page.messages.is_empty() {
                return Ok(());
            }

            let fresh = progress.new_messages(&page.messages);
            self.store
                .store_messages(&fresh)
                .map_err(|e| CourierError::StoragePersistFailed(format!("messages: {e}")))?;

            if let Some(index) = fresh.iter().map(|m| m.id).max() {
                if owner.message_last_index().map_or(true, |current| index > current) {
                    match self.secure.persist_last_message_index(index) {
                        Ok(true) => {}
                        Ok(false) => {
                            return Err(CourierError::StoragePersistFailed(
                                "last message index refused".into(),
                            ))
                        }
                        Err(e) => {
                            return Err(CourierError::StoragePersistFailed(format!(
                                "last message index: {e}"
                            )))
                        }
                    }
                    owner.advance_message_last_index(index);
                }
            }

            progress.commit_messages(&fresh);
            debug!(
                received = page.messages.len(),
                new = fresh.len(),
                total = progress.restored_messages_amount(),
                "messages page committed"
            );
            self.commit(progress, cancel);
        }
    }

    /// Fetches one page with bounded retries, publishing each failure.
    async fn fetch_page<T, F, Fut>(
        &self,
        phase: RestorePhase,
        progress: &RestoreProgress,
        cancel: &CancellationToken,
        call: F,
    ) -> CourierResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let frozen = progress.snapshot();
        let operation = match phase {
            RestorePhase::Contacts => "fetch_contacts_page",
            RestorePhase::Messages => "fetch_messages_page",
        };

        retry_transport(
            &self.config.retry_policy(),
            &self.monitor,
            cancel,
            operation,
            call,
            |report| {
                if cancel.is_cancelled() {
                    return;
                }
                self.publisher.publish(CourierEvent::RestorePhaseFailed {
                    phase,
                    cause: report.error.clone(),
                    attempt: report.attempt,
                    terminal: report.terminal,
                    progress: frozen.clone(),
                });
            },
        )
        .await
        .map_err(|e| self.phase_error(phase, e))
    }

    fn phase_error(&self, phase: RestorePhase, error: RetryError) -> CourierError {
        match error {
            RetryError::Cancelled => CourierError::Cancelled,
            RetryError::Fatal(cause) | RetryError::Exhausted { last: cause, .. } => {
                warn!(%phase, error = %cause, "restore phase failed");
                CourierError::RestorePhaseFailed { phase, cause }
            }
        }
    }

    fn transition(
        &self,
        progress: &mut RestoreProgress,
        next: RestoreState,
        cancel: &CancellationToken,
    ) -> CourierResult<()> {
        check_cancelled(cancel)?;
        progress.advance_to(next)?;
        info!(state = ?next, percentage = progress.progress_percentage(), "restore state changed");
        self.save_checkpoint(progress);
        self.publish_state(progress, cancel);
        Ok(())
    }

    /// Checkpoints committed progress and publishes it unless cancelled.
    fn commit(&self, progress: &RestoreProgress, cancel: &CancellationToken) {
        self.save_checkpoint(progress);
        if !cancel.is_cancelled() {
            self.publisher.publish(CourierEvent::ProgressUpdated {
                progress: progress.snapshot(),
            });
        }
    }

    fn save_checkpoint(&self, progress: &RestoreProgress) {
        if progress.state().is_terminal() {
            return;
        }
        if let Err(e) = self.store.save_checkpoint(&progress.to_checkpoint()) {
            warn!(error = %e, "failed to save restore checkpoint");
        }
    }

    fn publish_state(&self, progress: &RestoreProgress, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        self.publisher.publish(CourierEvent::RestoreStateChanged {
            state: progress.state(),
        });
        self.publisher.publish(CourierEvent::ProgressUpdated {
            progress: progress.snapshot(),
        });
    }
}

/// True if a non-empty page holds nothing past `after`.
fn is_redelivery(page: &MessagePage, after: Option<i64>) -> bool {
    match (page.last_index(), after) {
        (Some(last), Some(after)) => last <= after,
        _ => false,
    }
}

fn check_cancelled(cancel: &CancellationToken) -> CourierResult<()> {
    if cancel.is_cancelled() {
        Err(CourierError::Cancelled)
    } else {
        Ok(())
    }
}
