// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Mock Relay
//!
//! In-memory [`RelayTransport`] serving a fixed data set, with per-call
//! error injection and an optional gate that holds page requests until the
//! test releases them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::error::{TransportError, TransportErrorKind};
use super::monitor::ConnectionMonitor;
use super::transport::{
    Challenge, ContactPage, ContactRecord, MessagePage, MessageRecord, MsgsCounts, NodeInfo,
    RelayTransport, SignedChallenge, TransportResult,
};
use crate::crypto::{verify, ChallengeSignature};

/// Relay operations the mock can fail or count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Challenge,
    SubmitSignature,
    InviteCode,
    NodeList,
    Counts,
    ContactsPage,
    MessagesPage,
}

enum CountsMode {
    FromData,
    Fixed(Option<MsgsCounts>),
}

struct MockState {
    challenge: Challenge,
    token_override: Option<String>,
    invite_code: String,
    nodes: Vec<NodeInfo>,
    counts: CountsMode,
    contacts: Vec<ContactRecord>,
    messages: Vec<MessageRecord>,
    next_failures: HashMap<MockOp, VecDeque<TransportError>>,
    fail_from: HashMap<MockOp, (usize, TransportError)>,
    calls: HashMap<MockOp, usize>,
    contact_cursors: Vec<Option<String>>,
    message_cursors: Vec<Option<i64>>,
    replays: HashMap<Option<i64>, VecDeque<Vec<MessageRecord>>>,
    gate: Option<Arc<Semaphore>>,
    link: Option<ConnectionMonitor>,
}

/// Scriptable relay for tests.
///
/// Contacts are paged by offset (the cursor is the offset as a string);
/// messages by index, returning records with `id > after_index`.
pub struct MockRelay {
    state: Mutex<MockState>,
}

impl Default for MockRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRelay {
    /// Creates a relay with one router node and no history.
    pub fn new() -> Self {
        MockRelay {
            state: Mutex::new(MockState {
                challenge: Challenge {
                    id: "challenge-1".to_string(),
                    nonce: b"relay-nonce".to_vec(),
                },
                token_override: None,
                invite_code: "INVITE-0001".to_string(),
                nodes: vec![NodeInfo {
                    alias: "router-1".to_string(),
                    address: "relay.example.net:443".to_string(),
                    pub_key: "11".repeat(32),
                    is_router: true,
                }],
                counts: CountsMode::FromData,
                contacts: Vec::new(),
                messages: Vec::new(),
                next_failures: HashMap::new(),
                fail_from: HashMap::new(),
                calls: HashMap::new(),
                contact_cursors: Vec::new(),
                message_cursors: Vec::new(),
                replays: HashMap::new(),
                gate: None,
                link: None,
            }),
        }
    }

    /// Sets the contacts the relay holds.
    pub fn with_contacts(self, contacts: Vec<ContactRecord>) -> Self {
        self.state.lock().contacts = contacts;
        self
    }

    /// Sets the messages the relay holds. They are served in index order.
    pub fn with_messages(self, mut messages: Vec<MessageRecord>) -> Self {
        messages.sort_by_key(|m| m.id);
        self.state.lock().messages = messages;
        self
    }

    /// Sets the node list.
    pub fn with_nodes(self, nodes: Vec<NodeInfo>) -> Self {
        self.state.lock().nodes = nodes;
        self
    }

    /// Overrides the counts reported by `fetch_counts`. `None` means the
    /// node cannot report counts.
    pub fn with_counts(self, counts: Option<MsgsCounts>) -> Self {
        self.state.lock().counts = CountsMode::Fixed(counts);
        self
    }

    /// Replaces the authorization token returned after a valid signature.
    pub fn with_auth_token(self, token: impl Into<String>) -> Self {
        self.state.lock().token_override = Some(token.into());
        self
    }

    /// Sets the invite code.
    pub fn with_invite_code(self, code: impl Into<String>) -> Self {
        self.state.lock().invite_code = code.into();
        self
    }

    /// Appends messages while a restore may be running.
    pub fn push_messages(&self, messages: Vec<MessageRecord>) {
        let mut state = self.state.lock();
        state.messages.extend(messages);
        state.messages.sort_by_key(|m| m.id);
    }

    /// Serves `messages` instead of the real page on the next request
    /// after `after_index`. Queued replays stack.
    pub fn replay_page(&self, after_index: Option<i64>, messages: Vec<MessageRecord>) {
        self.state
            .lock()
            .replays
            .entry(after_index)
            .or_default()
            .push_back(messages);
    }

    /// Fails the next call of `op` with `error`. Queued failures stack.
    pub fn fail_next(&self, op: MockOp, error: TransportError) {
        self.state
            .lock()
            .next_failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Fails every call of `op` from the `nth` call on (0-based).
    pub fn fail_from(&self, op: MockOp, nth: usize, error: TransportError) {
        self.state.lock().fail_from.insert(op, (nth, error));
    }

    /// Fails every call of `op`.
    pub fn fail_always(&self, op: MockOp, error: TransportError) {
        self.fail_from(op, 0, error);
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.next_failures.clear();
        state.fail_from.clear();
    }

    /// Reports the link down on `monitor` whenever an injected retryable
    /// failure is returned, as a real transport would on a dropped socket.
    pub fn drop_link_on_failure(&self, monitor: ConnectionMonitor) {
        self.state.lock().link = Some(monitor);
    }

    /// Holds every page request until [`release_pages`](Self::release_pages).
    pub fn hold_pages(&self) {
        self.state.lock().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `n` held page requests through.
    pub fn release_pages(&self, n: usize) {
        if let Some(gate) = self.state.lock().gate.as_ref() {
            gate.add_permits(n);
        }
    }

    /// Removes the gate; waiting requests proceed.
    pub fn open_gate(&self) {
        if let Some(gate) = self.state.lock().gate.take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Number of calls made to `op`, failed ones included.
    pub fn calls(&self, op: MockOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Cursors passed to `fetch_contacts_page`, in call order.
    pub fn contact_cursors(&self) -> Vec<Option<String>> {
        self.state.lock().contact_cursors.clone()
    }

    /// `after_index` values passed to `fetch_messages_page`, in call order.
    pub fn message_cursors(&self) -> Vec<Option<i64>> {
        self.state.lock().message_cursors.clone()
    }

    /// The token issued for `public_key_hex` when no override is set.
    pub fn token_for(public_key_hex: &str) -> String {
        BASE64.encode(format!("owner:{public_key_hex}"))
    }

    fn enter(&self, op: MockOp) -> TransportResult<()> {
        let mut state = self.state.lock();
        let nth = {
            let count = state.calls.entry(op).or_insert(0);
            *count += 1;
            *count - 1
        };

        let queued = state
            .next_failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        let injected = queued.or_else(|| {
            state
                .fail_from
                .get(&op)
                .filter(|(from, _)| nth >= *from)
                .map(|(_, error)| error.clone())
        });

        match injected {
            Some(error) => {
                let link = state.link.clone();
                drop(state);
                if error.retryable {
                    if let Some(monitor) = link {
                        monitor.report_disconnected();
                    }
                }
                Err(error)
            }
            None => Ok(()),
        }
    }

    async fn pass_gate(&self) {
        let gate = self.state.lock().gate.clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

#[async_trait]
impl RelayTransport for MockRelay {
    async fn fetch_challenge(&self) -> TransportResult<Challenge> {
        self.enter(MockOp::Challenge)?;
        Ok(self.state.lock().challenge.clone())
    }

    async fn submit_challenge_signature(&self, signed: &SignedChallenge) -> TransportResult<String> {
        self.enter(MockOp::SubmitSignature)?;
        let state = self.state.lock();

        if signed.challenge_id != state.challenge.id {
            return Err(TransportError::new(
                TransportErrorKind::Rejected,
                "unknown challenge",
            ));
        }

        let public_key: [u8; 32] = hex::decode(&signed.public_key)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| TransportError::new(TransportErrorKind::Rejected, "bad public key"))?;
        let signature: [u8; 64] = hex::decode(&signed.signature)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| TransportError::new(TransportErrorKind::Rejected, "bad signature"))?;

        if !verify(&public_key, &state.challenge.nonce, &ChallengeSignature(signature)) {
            return Err(TransportError::new(
                TransportErrorKind::Unauthorized,
                "signature does not verify",
            ));
        }

        Ok(state
            .token_override
            .clone()
            .unwrap_or_else(|| Self::token_for(&signed.public_key)))
    }

    async fn fetch_invite_code(&self) -> TransportResult<String> {
        self.enter(MockOp::InviteCode)?;
        Ok(self.state.lock().invite_code.clone())
    }

    async fn fetch_node_list(&self) -> TransportResult<Vec<NodeInfo>> {
        self.enter(MockOp::NodeList)?;
        Ok(self.state.lock().nodes.clone())
    }

    async fn fetch_counts(&self) -> TransportResult<Option<MsgsCounts>> {
        self.enter(MockOp::Counts)?;
        let state = self.state.lock();
        Ok(match state.counts {
            CountsMode::Fixed(counts) => counts,
            CountsMode::FromData => Some(MsgsCounts {
                total_contacts: state.contacts.len() as u64,
                total_messages: state.messages.len() as u64,
            }),
        })
    }

    async fn fetch_contacts_page(
        &self,
        cursor: Option<String>,
        limit: u32,
    ) -> TransportResult<ContactPage> {
        self.state.lock().contact_cursors.push(cursor.clone());
        self.pass_gate().await;
        self.enter(MockOp::ContactsPage)?;

        let offset = match cursor.as_deref() {
            None => 0,
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                TransportError::new(TransportErrorKind::Rejected, "malformed cursor")
            })?,
        };

        let state = self.state.lock();
        let end = (offset + limit as usize).min(state.contacts.len());
        let contacts = state.contacts.get(offset..end).unwrap_or_default().to_vec();
        let next_cursor = (end < state.contacts.len()).then(|| end.to_string());

        Ok(ContactPage {
            contacts,
            next_cursor,
        })
    }

    async fn fetch_messages_page(
        &self,
        after_index: Option<i64>,
        limit: u32,
    ) -> TransportResult<MessagePage> {
        self.state.lock().message_cursors.push(after_index);
        self.pass_gate().await;
        self.enter(MockOp::MessagesPage)?;

        let mut state = self.state.lock();
        if let Some(replayed) = state
            .replays
            .get_mut(&after_index)
            .and_then(VecDeque::pop_front)
        {
            return Ok(MessagePage { messages: replayed });
        }

        let messages = state
            .messages
            .iter()
            .filter(|m| after_index.map_or(true, |after| m.id > after))
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(MessagePage { messages })
    }
}
