// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! History Restore Tests
//!
//! End-to-end restore sessions against the mock relay: weighted progress,
//! phase skipping, bounded retries, duplicates, disconnects and
//! single-flight sessions.

mod common;

use std::time::Duration;

use common::fixtures::{
    contacts, drain_events, fast_config, harness, harness_with_storage, messages, percentages,
    restore_states, wait_for,
};
use courier_core::api::CourierEvent;
use courier_core::network::{MsgsCounts, TransportError, TransportErrorKind};
use courier_core::{
    CourierError, MemoryStorage, MockOp, MockRelay, NetworkStatus, RestorePhase, RestoreState,
    RestoreStore, SecureStorage,
};

fn phase_failures(events: &[CourierEvent]) -> Vec<(RestorePhase, u32, bool, u8)> {
    events
        .iter()
        .filter_map(|event| match event {
            CourierEvent::RestorePhaseFailed {
                phase,
                attempt,
                terminal,
                progress,
                ..
            } => Some((*phase, *attempt, *terminal, progress.progress_percentage)),
            _ => None,
        })
        .collect()
}

fn assert_monotonic(values: &[u8]) {
    for pair in values.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {values:?}");
    }
}

// =============================================================================
// Weighted progress
// =============================================================================

#[tokio::test]
async fn test_messages_only_restore_reaches_midpoint_after_first_page() {
    let relay = MockRelay::new().with_messages(messages(1..=100));
    let h = harness(relay, fast_config(50));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    let events = drain_events(&mut events);
    let values = percentages(&events);
    assert!(values.contains(&10));
    assert!(values.contains(&55));
    assert_eq!(values.last(), Some(&100));
    assert_monotonic(&values);

    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.restored_messages_amount, 100);
    assert_eq!(done.total_messages, 100);
    assert_eq!(done.state, RestoreState::RestoreFinished);
    // No contacts on the node, so no contact pages were requested.
    assert_eq!(h.relay.calls(MockOp::ContactsPage), 0);
    assert_eq!(h.storage.message_ids().len(), 100);
}

#[tokio::test]
async fn test_contacts_only_restore_skips_message_pages() {
    let relay = MockRelay::new().with_contacts(contacts(20));
    let h = harness(relay, fast_config(10));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    let events = drain_events(&mut events);
    let values = percentages(&events);
    assert!(values.contains(&5));
    assert!(values.contains(&10));
    assert_eq!(values.last(), Some(&100));
    assert_monotonic(&values);

    assert_eq!(
        restore_states(&events),
        vec![
            RestoreState::RestoringContacts,
            RestoreState::RestoringMessages,
            RestoreState::RestoreFinished,
        ]
    );
    assert_eq!(h.relay.calls(MockOp::MessagesPage), 0);
    assert_eq!(done.contacts_restored_amount, 20);
    assert_eq!(h.storage.contacts().len(), 20);
}

#[tokio::test]
async fn test_full_restore_with_both_phases() {
    let relay = MockRelay::new()
        .with_contacts(contacts(30))
        .with_messages(messages(1..=45));
    let h = harness(relay, fast_config(10));

    let done = h.courier.start_restore().await.unwrap();

    assert_eq!(done.contacts_restored_amount, 30);
    assert_eq!(done.restored_messages_amount, 45);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(
        h.relay.contact_cursors(),
        vec![None, Some("10".to_string()), Some("20".to_string())]
    );
    assert_eq!(h.storage.read_last_message_index().unwrap(), Some(45));
    assert_eq!(h.courier.owner().unwrap().message_last_index(), Some(45));
    assert!(h.storage.load_checkpoint().unwrap().is_none());
}

#[tokio::test]
async fn test_empty_node_finishes_immediately() {
    let h = harness(MockRelay::new(), fast_config(10));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    assert_eq!(done.progress_percentage, 100);
    assert_eq!(h.relay.calls(MockOp::ContactsPage), 0);
    assert_eq!(h.relay.calls(MockOp::MessagesPage), 0);
    assert_eq!(
        restore_states(&drain_events(&mut events)).last(),
        Some(&RestoreState::RestoreFinished)
    );
}

#[tokio::test]
async fn test_unknown_counts_report_fixed_milestones() {
    let relay = MockRelay::new()
        .with_contacts(contacts(5))
        .with_messages(messages(1..=30))
        .with_counts(None);
    let h = harness(relay, fast_config(10));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    let events = drain_events(&mut events);
    let values = percentages(&events);
    assert!(values.iter().all(|p| [0, 10, 100].contains(p)), "{values:?}");
    assert_eq!(values.last(), Some(&100));
    assert!(events.iter().any(|event| matches!(
        event,
        CourierEvent::ProgressUpdated { progress } if progress.indeterminate
    )));

    assert_eq!(done.restored_messages_amount, 30);
    assert_eq!(done.contacts_restored_amount, 5);
    // Counts are asked for again before the messages phase.
    assert_eq!(h.relay.calls(MockOp::Counts), 2);
}

#[tokio::test]
async fn test_reported_total_lower_than_delivered_is_clamped() {
    let relay = MockRelay::new()
        .with_contacts(contacts(8))
        .with_messages(messages(1..=40))
        .with_counts(Some(MsgsCounts {
            total_contacts: 4,
            total_messages: 20,
        }));
    let h = harness(relay, fast_config(10));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    let values = percentages(&drain_events(&mut events));
    assert!(values.iter().all(|p| *p <= 100));
    assert_monotonic(&values);
    assert_eq!(done.contacts_restored_amount, 4);
    assert_eq!(done.restored_messages_amount, 20);
    // Everything the node served is still stored.
    assert_eq!(h.storage.contacts().len(), 8);
    assert_eq!(h.storage.message_ids().len(), 40);
}

// =============================================================================
// Duplicates
// =============================================================================

#[tokio::test]
async fn test_duplicate_contacts_counted_once() {
    let mut served = contacts(3);
    served.push(served[0].clone());
    served.push(served[1].clone());
    let relay = MockRelay::new().with_contacts(served);
    let h = harness(relay, fast_config(2));

    let done = h.courier.start_restore().await.unwrap();

    assert_eq!(done.contacts_restored_amount, 3);
    assert_eq!(h.storage.contacts().len(), 3);
    assert_eq!(done.progress_percentage, 100);
}

#[tokio::test]
async fn test_duplicate_messages_in_page_counted_once() {
    let mut served = messages(1..=3);
    served.push(served[1].clone());
    let relay = MockRelay::new().with_messages(served);
    let h = harness(relay, fast_config(10));

    let done = h.courier.start_restore().await.unwrap();

    assert_eq!(done.restored_messages_amount, 3);
    assert_eq!(h.storage.message_ids(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_redelivered_page_is_refetched_not_finished() {
    let relay = MockRelay::new().with_messages(messages(1..=10));
    relay.replay_page(Some(5), messages(4..=5));
    let h = harness(relay, fast_config(5));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    assert_eq!(
        h.relay.message_cursors(),
        vec![None, Some(5), Some(5), Some(10)]
    );
    assert_eq!(done.restored_messages_amount, 10);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(h.storage.message_ids(), (1..=10).collect::<Vec<i64>>());

    let events = drain_events(&mut events);
    assert_eq!(
        phase_failures(&events),
        vec![(RestorePhase::Messages, 1, false, 55)]
    );
    assert!(events.iter().any(|event| matches!(
        event,
        CourierEvent::RestorePhaseFailed { cause, .. }
            if cause.kind == TransportErrorKind::Redelivered
    )));
}

#[tokio::test]
async fn test_endless_redelivery_fails_phase_with_progress_frozen() {
    let relay = MockRelay::new().with_messages(messages(1..=10));
    for _ in 0..2 {
        relay.replay_page(Some(5), messages(1..=5));
    }
    let h = harness(relay, fast_config(5).with_max_phase_retries(1));
    let mut events = h.courier.subscribe();

    let err = h.courier.start_restore().await.unwrap_err();
    match &err {
        CourierError::RestorePhaseFailed { phase, cause } => {
            assert_eq!(*phase, RestorePhase::Messages);
            assert_eq!(cause.kind, TransportErrorKind::Redelivered);
        }
        other => panic!("expected RestorePhaseFailed, got {other:?}"),
    }

    let events = drain_events(&mut events);
    assert!(!restore_states(&events).contains(&RestoreState::RestoreFinished));
    assert_eq!(percentages(&events).last(), Some(&55));
    assert_eq!(h.storage.message_ids(), (1..=5).collect::<Vec<i64>>());

    // The replays are used up; the next session serves the rest once.
    let done = h.courier.start_restore().await.unwrap();
    assert_eq!(done.restored_messages_amount, 10);
    assert_eq!(h.storage.message_ids(), (1..=10).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_short_contact_delivery_is_not_fully_credited() {
    let relay = MockRelay::new()
        .with_contacts(contacts(10))
        .with_messages(messages(1..=100))
        .with_counts(Some(MsgsCounts {
            total_contacts: 20,
            total_messages: 100,
        }));
    let h = harness(relay, fast_config(50));
    let mut events = h.courier.subscribe();

    let done = h.courier.start_restore().await.unwrap();

    let values = percentages(&drain_events(&mut events));
    assert_eq!(values, vec![0, 5, 5, 50, 95, 100]);
    assert_eq!(done.contacts_restored_amount, 10);
    assert_eq!(done.progress_percentage, 100);
}

#[tokio::test]
async fn test_stored_index_resumes_after_last_message() {
    let relay = MockRelay::new().with_messages(messages(1..=20));
    let storage = MemoryStorage::new().with_last_message_index(10);
    let h = harness_with_storage(relay, storage, fast_config(50));

    let done = h.courier.start_restore().await.unwrap();

    assert_eq!(h.relay.message_cursors().first(), Some(&Some(10)));
    assert_eq!(h.storage.message_ids(), (11..=20).collect::<Vec<i64>>());
    assert_eq!(done.progress_percentage, 100);
}

// =============================================================================
// Failures and retries
// =============================================================================

#[tokio::test]
async fn test_message_phase_failure_freezes_progress() {
    let relay = MockRelay::new().with_messages(messages(1..=200));
    relay.fail_from(MockOp::MessagesPage, 2, TransportError::timeout("relay stalled"));
    let h = harness(relay, fast_config(20).with_max_phase_retries(2));
    let mut events = h.courier.subscribe();

    let err = h.courier.start_restore().await.unwrap_err();
    match &err {
        CourierError::RestorePhaseFailed { phase, cause } => {
            assert_eq!(*phase, RestorePhase::Messages);
            assert_eq!(cause.kind, TransportErrorKind::Timeout);
        }
        other => panic!("expected RestorePhaseFailed, got {other:?}"),
    }

    let events = drain_events(&mut events);
    assert_eq!(
        phase_failures(&events),
        vec![
            (RestorePhase::Messages, 1, false, 28),
            (RestorePhase::Messages, 2, false, 28),
            (RestorePhase::Messages, 3, true, 28),
        ]
    );
    assert_eq!(percentages(&events).last(), Some(&28));
    assert!(!restore_states(&events).contains(&RestoreState::RestoreFinished));
    assert!(events.iter().any(|event| matches!(
        event,
        CourierEvent::RestoreAborted { retryable: true, .. }
    )));
    assert_eq!(h.storage.message_ids().len(), 40);

    // A new session picks up after the last committed page.
    h.relay.clear_failures();
    let done = h.courier.start_restore().await.unwrap();
    assert_eq!(h.relay.message_cursors().last(), Some(&Some(200)));
    assert!(h.relay.message_cursors().contains(&Some(40)));
    assert_eq!(done.restored_messages_amount, 200);
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(h.storage.message_ids().len(), 200);
}

#[tokio::test]
async fn test_fatal_page_error_is_not_retried() {
    let relay = MockRelay::new().with_contacts(contacts(5));
    relay.fail_always(
        MockOp::ContactsPage,
        TransportError::fatal(TransportErrorKind::Unauthorized, "token expired"),
    );
    let h = harness(relay, fast_config(10));
    let mut events = h.courier.subscribe();

    let err = h.courier.start_restore().await.unwrap_err();

    assert!(matches!(
        err,
        CourierError::RestorePhaseFailed {
            phase: RestorePhase::Contacts,
            ..
        }
    ));
    assert!(!err.is_retryable());
    assert_eq!(h.relay.calls(MockOp::ContactsPage), 1);
    assert_eq!(
        phase_failures(&drain_events(&mut events)),
        vec![(RestorePhase::Contacts, 1, true, 0)]
    );
}

#[tokio::test]
async fn test_counts_failure_fails_before_contacts() {
    let relay = MockRelay::new().with_contacts(contacts(5));
    relay.fail_always(MockOp::Counts, TransportError::timeout("no counts"));
    let h = harness(relay, fast_config(10).with_max_phase_retries(1));

    let err = h.courier.start_restore().await.unwrap_err();

    assert!(matches!(
        err,
        CourierError::RestorePhaseFailed {
            phase: RestorePhase::Contacts,
            ..
        }
    ));
    assert_eq!(h.relay.calls(MockOp::ContactsPage), 0);
}

#[tokio::test]
async fn test_local_write_failure_stops_and_resumes() {
    let relay = MockRelay::new().with_messages(messages(1..=30));
    let h = harness(relay, fast_config(10));
    h.storage.fail_message_writes(1);

    let err = h.courier.start_restore().await.unwrap_err();
    assert!(matches!(err, CourierError::StoragePersistFailed(_)));
    assert!(h.storage.message_ids().is_empty());

    let done = h.courier.start_restore().await.unwrap();
    assert_eq!(done.restored_messages_amount, 30);
    assert_eq!(h.storage.message_ids().len(), 30);
}

// =============================================================================
// Connectivity
// =============================================================================

#[tokio::test]
async fn test_disconnect_pauses_without_spending_retries() {
    let relay = MockRelay::new().with_messages(messages(1..=30));
    for _ in 0..3 {
        relay.fail_next(MockOp::MessagesPage, TransportError::connection_lost("socket closed"));
    }
    let h = harness(relay, fast_config(10).with_max_phase_retries(0));
    h.relay.drop_link_on_failure(h.monitor.clone());

    // Brings the link back each time it drops.
    let monitor = h.monitor.clone();
    let mut status = monitor.subscribe();
    let reconnector = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current == NetworkStatus::Disconnected {
                monitor.report_connected();
            }
        }
    });

    let mut events = h.courier.subscribe();
    let done = h.courier.start_restore().await.unwrap();
    reconnector.abort();

    let events = drain_events(&mut events);
    assert!(phase_failures(&events).is_empty());
    assert!(events.iter().any(|event| matches!(
        event,
        CourierEvent::NetworkStatusChanged {
            status: NetworkStatus::Disconnected
        }
    )));
    assert_eq!(done.restored_messages_amount, 30);
    assert_eq!(h.relay.calls(MockOp::MessagesPage), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restore_waits_for_link() {
    let relay = MockRelay::new().with_messages(messages(1..=5));
    let h = harness(relay, fast_config(10));
    h.monitor.report_disconnected();

    let courier = h.courier.clone();
    let task = tokio::spawn(async move { courier.start_restore().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.relay.calls(MockOp::Counts), 0);

    h.monitor.report_connected();
    let done = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(done.restored_messages_amount, 5);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_restore_is_refused_without_side_effects() {
    let relay = MockRelay::new()
        .with_contacts(contacts(20))
        .with_messages(messages(1..=10));
    relay.hold_pages();
    let h = harness(relay, fast_config(10));

    let courier = h.courier.clone();
    let first = tokio::spawn(async move { courier.start_restore().await });
    wait_for(|| h.relay.contact_cursors().len() == 1).await;

    let before = h.courier.publisher().latest();
    let err = h.courier.start_restore().await.unwrap_err();
    assert!(matches!(err, CourierError::SessionAlreadyActive));
    assert_eq!(h.courier.publisher().latest(), before);
    assert!(h.courier.is_restoring());

    h.relay.open_gate();
    let done = tokio::time::timeout(Duration::from_secs(2), first)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(done.progress_percentage, 100);
    assert_eq!(done.contacts_restored_amount, 20);
    assert!(!h.courier.is_restoring());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_keeps_in_flight_page_and_resumes() {
    let relay = MockRelay::new().with_messages(messages(1..=30));
    relay.hold_pages();
    let h = harness(relay, fast_config(10));
    let mut events = h.courier.subscribe();

    let courier = h.courier.clone();
    let task = tokio::spawn(async move { courier.start_restore().await });

    wait_for(|| h.relay.message_cursors().len() == 1).await;
    h.relay.release_pages(1);
    wait_for(|| h.relay.message_cursors().len() == 2).await;

    // Second page is in flight; cancel, then let it through.
    assert!(h.courier.cancel());
    h.relay.release_pages(1);

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(CourierError::Cancelled)));
    assert_eq!(h.storage.message_ids().len(), 20);

    let events = drain_events(&mut events);
    assert!(!restore_states(&events).contains(&RestoreState::RestoreFinished));
    assert!(!events
        .iter()
        .any(|event| matches!(event, CourierEvent::RestoreAborted { .. })));

    h.relay.open_gate();
    let done = h.courier.start_restore().await.unwrap();
    assert_eq!(h.relay.message_cursors()[2], Some(20));
    assert_eq!(done.restored_messages_amount, 30);
    assert_eq!(h.storage.message_ids().len(), 30);
    // The stashed session was reused, so counts were fetched once.
    assert_eq!(h.relay.calls(MockOp::Counts), 1);
}

#[tokio::test]
async fn test_cancel_without_session_is_noop() {
    let h = harness(MockRelay::new(), fast_config(10));
    assert!(!h.courier.cancel());
}

#[tokio::test]
async fn test_connect_and_restore_runs_both_sessions() {
    let relay = MockRelay::new()
        .with_contacts(contacts(3))
        .with_messages(messages(1..=12));
    let h = harness(relay, fast_config(5));
    let mut events = h.courier.subscribe();

    let done = h.courier.connect_and_restore(None).await.unwrap();

    assert_eq!(done.progress_percentage, 100);
    let events = drain_events(&mut events);
    let registered_at = events
        .iter()
        .position(|event| matches!(
            event,
            CourierEvent::RegistrationStateChanged { state } if state.name() == "owner_registered"
        ))
        .unwrap();
    let restore_at = events
        .iter()
        .position(|event| matches!(event, CourierEvent::RestoreStateChanged { .. }))
        .unwrap();
    assert!(registered_at < restore_at);
    assert_eq!(h.courier.owner().unwrap().message_last_index(), Some(12));
}
