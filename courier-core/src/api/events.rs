// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event System
//!
//! [`ProgressPublisher`] fans registration and restore events out to any
//! number of observers. Publication is serialized and never blocks: each
//! subscriber has a bounded buffer and a slow subscriber loses its oldest
//! events. A new subscriber first receives the latest [`PublisherSnapshot`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::network::{NetworkStatus, TransportError};
use crate::registration::OwnerRegistrationState;
use crate::restore::{ProgressSnapshot, RestorePhase, RestoreState};

/// Events emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourierEvent {
    /// Latest known state, delivered first to every new subscriber.
    Snapshot(PublisherSnapshot),

    /// Relay connectivity changed.
    NetworkStatusChanged { status: NetworkStatus },

    /// Registration advanced.
    RegistrationStateChanged { state: OwnerRegistrationState },

    /// Registration stopped on an error.
    RegistrationFailed {
        /// Error description.
        reason: String,
        /// Whether starting registration again may succeed.
        retryable: bool,
    },

    /// Restore moved to a new phase.
    RestoreStateChanged { state: RestoreState },

    /// Restore session ended with an error other than cancellation.
    RestoreAborted {
        /// Error description.
        reason: String,
        /// Whether starting the restore again may resume it.
        retryable: bool,
    },

    /// Restore counters changed.
    ProgressUpdated { progress: ProgressSnapshot },

    /// A restore page failed.
    RestorePhaseFailed {
        /// Phase the page belongs to.
        phase: RestorePhase,
        /// Transport error behind the failure.
        cause: TransportError,
        /// Failed attempts for this page so far.
        attempt: u32,
        /// True if the phase gives up.
        terminal: bool,
        /// Progress frozen at the failure.
        progress: ProgressSnapshot,
    },
}

/// Latest state seen by the publisher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublisherSnapshot {
    /// Sequence number of the last event folded into this snapshot.
    pub sequence: u64,
    pub network_status: NetworkStatus,
    pub registration: Option<OwnerRegistrationState>,
    pub restore_state: Option<RestoreState>,
    pub progress: Option<ProgressSnapshot>,
}

impl PublisherSnapshot {
    fn apply(&mut self, event: &CourierEvent) {
        match event {
            CourierEvent::Snapshot(_)
            | CourierEvent::RegistrationFailed { .. }
            | CourierEvent::RestoreAborted { .. } => {}
            CourierEvent::NetworkStatusChanged { status } => self.network_status = *status,
            CourierEvent::RegistrationStateChanged { state } => {
                self.registration = Some(state.clone())
            }
            CourierEvent::RestoreStateChanged { state } => self.restore_state = Some(*state),
            CourierEvent::ProgressUpdated { progress }
            | CourierEvent::RestorePhaseFailed { progress, .. } => {
                self.progress = Some(progress.clone())
            }
        }
    }
}

/// An event with its publication sequence number.
///
/// Sequence numbers increase by one per published event; a gap tells the
/// subscriber it lagged and lost events.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub sequence: u64,
    pub event: CourierEvent,
}

struct PublisherInner {
    sender: broadcast::Sender<PublishedEvent>,
    latest: Mutex<PublisherSnapshot>,
}

/// Single-writer, multi-reader event broadcaster.
#[derive(Clone)]
pub struct ProgressPublisher {
    inner: Arc<PublisherInner>,
}

impl ProgressPublisher {
    /// Creates a publisher buffering `capacity` events per subscriber.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        ProgressPublisher {
            inner: Arc::new(PublisherInner {
                sender,
                latest: Mutex::new(PublisherSnapshot::default()),
            }),
        }
    }

    /// Publishes `event` to every subscriber. Never blocks on readers.
    pub fn publish(&self, event: CourierEvent) -> u64 {
        let mut latest = self.inner.latest.lock();
        latest.sequence += 1;
        latest.apply(&event);
        let sequence = latest.sequence;

        // No subscribers is not an error.
        let _ = self.inner.sender.send(PublishedEvent { sequence, event });
        sequence
    }

    /// Subscribes; the first item received is the latest snapshot.
    pub fn subscribe(&self) -> Subscription {
        let latest = self.inner.latest.lock();
        let receiver = self.inner.sender.subscribe();
        Subscription {
            pending: Some(PublishedEvent {
                sequence: latest.sequence,
                event: CourierEvent::Snapshot(latest.clone()),
            }),
            receiver,
            dropped: 0,
        }
    }

    /// Latest snapshot.
    pub fn latest(&self) -> PublisherSnapshot {
        self.inner.latest.lock().clone()
    }

    /// Sequence number of the last published event.
    pub fn sequence(&self) -> u64 {
        self.inner.latest.lock().sequence
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Forwards every event to `handler` from a background task, in order.
    ///
    /// The task ends when the publisher is dropped or the handle is aborted.
    pub fn attach(&self, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        let mut subscription = self.subscribe();
        tokio::spawn(async move {
            while let Some(published) = subscription.recv().await {
                handler.on_event(published.event);
            }
        })
    }
}

/// A subscriber's view of the event stream.
pub struct Subscription {
    pending: Option<PublishedEvent>,
    receiver: broadcast::Receiver<PublishedEvent>,
    dropped: u64,
}

impl Subscription {
    /// Next event, or `None` once the publisher is gone.
    ///
    /// Events lost to lag are skipped and counted in [`dropped`](Self::dropped).
    pub async fn recv(&mut self) -> Option<PublishedEvent> {
        if let Some(first) = self.pending.take() {
            return Some(first);
        }
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is buffered.
    pub fn try_recv(&mut self) -> Option<PublishedEvent> {
        if let Some(first) = self.pending.take() {
            return Some(first);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drains every buffered event.
    pub fn drain(&mut self) -> Vec<PublishedEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Events lost because this subscriber fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn record_lag(&mut self, n: u64) {
        debug!(dropped = n, "subscriber lagged, oldest events dropped");
        self.dropped += n;
    }
}

/// Event handler trait.
///
/// Implement this trait to receive Courier events.
pub trait EventHandler: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: CourierEvent);
}

/// Simple callback-based event handler.
pub struct CallbackHandler<F>
where
    F: Fn(CourierEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(CourierEvent) + Send + Sync,
{
    /// Creates a new callback handler.
    pub fn new(callback: F) -> Self {
        CallbackHandler { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(CourierEvent) + Send + Sync,
{
    fn on_event(&self, event: CourierEvent) {
        (self.callback)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: NetworkStatus) -> CourierEvent {
        CourierEvent::NetworkStatusChanged { status }
    }

    #[test]
    fn test_first_item_is_snapshot() {
        let publisher = ProgressPublisher::new(8);
        publisher.publish(status(NetworkStatus::Connected));

        let mut sub = publisher.subscribe();
        let first = sub.try_recv().unwrap();
        assert_eq!(first.sequence, 1);
        match first.event {
            CourierEvent::Snapshot(snapshot) => {
                assert_eq!(snapshot.network_status, NetworkStatus::Connected)
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_events_arrive_in_order() {
        let publisher = ProgressPublisher::new(8);
        let mut sub = publisher.subscribe();
        sub.try_recv();

        publisher.publish(status(NetworkStatus::Connected));
        publisher.publish(status(NetworkStatus::Disconnected));
        publisher.publish(status(NetworkStatus::Connected));

        let sequences: Vec<u64> = sub.drain().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_slow_subscriber_drops_oldest() {
        let publisher = ProgressPublisher::new(2);
        let mut sub = publisher.subscribe();
        sub.try_recv();

        for _ in 0..5 {
            publisher.publish(status(NetworkStatus::Connected));
        }

        let sequences: Vec<u64> = sub.drain().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![4, 5]);
        assert_eq!(sub.dropped(), 3);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = ProgressPublisher::new(1);
        assert_eq!(publisher.publish(status(NetworkStatus::Connected)), 1);
        assert_eq!(publisher.latest().network_status, NetworkStatus::Connected);
    }

    #[tokio::test]
    async fn test_attached_handler_sees_events() {
        let publisher = ProgressPublisher::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler = Arc::new(CallbackHandler::new(move |event| {
            seen_clone.lock().push(event);
        }));

        let task = publisher.attach(handler);
        publisher.publish(status(NetworkStatus::Disconnected));
        drop(publisher);
        task.await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[0], CourierEvent::Snapshot(_)));
        assert_eq!(seen[1], status(NetworkStatus::Disconnected));
    }
}
