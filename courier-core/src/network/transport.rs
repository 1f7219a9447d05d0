// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Relay Transport Trait
//!
//! Boundary to the HTTP/relay client. The orchestrator only consumes
//! already-decoded values; wire formats belong to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::TransportError;

/// Result type for relay calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Authentication challenge issued by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Relay-side identifier echoed back with the signature.
    pub id: String,
    /// Bytes the owner must sign.
    pub nonce: Vec<u8>,
}

/// A signed challenge submitted back to the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedChallenge {
    /// Challenge identifier.
    pub challenge_id: String,
    /// Owner public key, hex.
    pub public_key: String,
    /// Ed25519 signature over the nonce, hex.
    pub signature: String,
}

/// A relay or router node the owner can route through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Display alias.
    pub alias: String,
    /// Network address (host:port or URL).
    pub address: String,
    /// Node public key, hex.
    pub pub_key: String,
    /// Whether the node acts as a router for the owner.
    #[serde(default)]
    pub is_router: bool,
}

/// Aggregate counts reported by the node before a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MsgsCounts {
    /// Number of contacts held by the node.
    pub total_contacts: u64,
    /// Number of messages held by the node.
    pub total_messages: u64,
}

/// A contact record as delivered by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    /// Contact identity key; unique per contact.
    pub public_key: String,
    /// Display alias, if the node has one.
    pub alias: Option<String>,
    /// Route hint for reaching the contact.
    pub route_hint: Option<String>,
}

/// One page of contacts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactPage {
    /// Contacts in this page. Empty means no more pages.
    pub contacts: Vec<ContactRecord>,
    /// Cursor to request the next page.
    pub next_cursor: Option<String>,
}

/// A historical message as delivered by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Node-assigned message index; unique and increasing.
    pub id: i64,
    /// Sender public key.
    pub sender: String,
    /// Decoded message body.
    pub content: String,
    /// Unix timestamp (seconds).
    pub created_at: u64,
}

/// One page of messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessagePage {
    /// Messages in this page, ordered by index. Empty means end of stream.
    pub messages: Vec<MessageRecord>,
}

impl MessagePage {
    /// Highest message index in the page.
    pub fn last_index(&self) -> Option<i64> {
        self.messages.iter().map(|m| m.id).max()
    }
}

/// Relay client used for registration and restore.
///
/// Every call is a suspension point; implementations report failures as
/// [`TransportError`] with an explicit retryability flag.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Requests an authentication challenge.
    async fn fetch_challenge(&self) -> TransportResult<Challenge>;

    /// Submits the signed challenge; returns the authorization token.
    async fn submit_challenge_signature(&self, signed: &SignedChallenge) -> TransportResult<String>;

    /// Requests an invite code for the owner.
    async fn fetch_invite_code(&self) -> TransportResult<String>;

    /// Lists relay/router nodes.
    async fn fetch_node_list(&self) -> TransportResult<Vec<NodeInfo>>;

    /// Aggregate counts, or `None` when the node cannot report them.
    async fn fetch_counts(&self) -> TransportResult<Option<MsgsCounts>>;

    /// Fetches contacts starting at `cursor` (`None` for the first page).
    async fn fetch_contacts_page(
        &self,
        cursor: Option<String>,
        limit: u32,
    ) -> TransportResult<ContactPage>;

    /// Fetches messages with an index greater than `after_index`.
    async fn fetch_messages_page(
        &self,
        after_index: Option<i64>,
        limit: u32,
    ) -> TransportResult<MessagePage>;
}
