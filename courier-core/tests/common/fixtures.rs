// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test Fixtures
//!
//! Relay data, configurations and event helpers.

use std::sync::Arc;
use std::time::Duration;

use courier_core::api::{CourierConfig, CourierEvent, Subscription};
use courier_core::network::{BackoffConfig, ContactRecord, MessageRecord};
use courier_core::{ConnectionMonitor, Courier, MemoryStorage, MockRelay, RestoreState};

/// Installs a log subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn contacts(n: usize) -> Vec<ContactRecord> {
    (0..n)
        .map(|i| ContactRecord {
            public_key: format!("{:064x}", i + 1),
            alias: Some(format!("Contact {i}")),
            route_hint: None,
        })
        .collect()
}

pub fn messages(ids: std::ops::RangeInclusive<i64>) -> Vec<MessageRecord> {
    ids.map(|id| MessageRecord {
        id,
        sender: format!("{:064x}", (id % 7) + 1),
        content: format!("message {id}"),
        created_at: 1_700_000_000 + id as u64,
    })
    .collect()
}

/// Immediate retries and the given page size.
pub fn fast_config(page_size: u32) -> CourierConfig {
    CourierConfig::default()
        .with_page_size(page_size)
        .with_backoff(BackoffConfig::immediate())
        .with_publisher_capacity(1024)
}

pub struct Harness {
    pub courier: Courier,
    pub relay: Arc<MockRelay>,
    pub storage: Arc<MemoryStorage>,
    pub monitor: ConnectionMonitor,
}

/// A courier over `relay` and fresh memory storage, link up.
pub fn harness(relay: MockRelay, config: CourierConfig) -> Harness {
    harness_with_storage(relay, MemoryStorage::new(), config)
}

pub fn harness_with_storage(
    relay: MockRelay,
    storage: MemoryStorage,
    config: CourierConfig,
) -> Harness {
    init_tracing();
    let relay = Arc::new(relay);
    let storage = Arc::new(storage);
    let monitor = ConnectionMonitor::new();
    monitor.report_connected();

    let courier = Courier::with_storage(relay.clone(), storage.clone(), monitor.clone(), config)
        .expect("valid config");

    Harness {
        courier,
        relay,
        storage,
        monitor,
    }
}

/// Buffered events without the leading snapshot.
pub fn drain_events(subscription: &mut Subscription) -> Vec<CourierEvent> {
    subscription
        .drain()
        .into_iter()
        .map(|published| published.event)
        .filter(|event| !matches!(event, CourierEvent::Snapshot(_)))
        .collect()
}

/// Percentages carried by progress events, in order.
pub fn percentages(events: &[CourierEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            CourierEvent::ProgressUpdated { progress } => Some(progress.progress_percentage),
            _ => None,
        })
        .collect()
}

/// Restore states published, in order.
pub fn restore_states(events: &[CourierEvent]) -> Vec<RestoreState> {
    events
        .iter()
        .filter_map(|event| match event {
            CourierEvent::RestoreStateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
