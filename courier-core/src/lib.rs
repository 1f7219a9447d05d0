// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier Core Library
//!
//! Account connect and history restore for a relay-backed chat client:
//! owner registration, paged restore of contacts and messages, and
//! continuous progress publication.
//! All cryptographic operations use the audited `ring` crate.

pub mod api;
pub mod crypto;
pub mod identity;
pub mod network;
pub mod owner;
pub mod registration;
pub mod restore;
pub mod storage;

pub use api::{
    CallbackHandler, Courier, CourierConfig, CourierError, CourierEvent, CourierResult,
    EventHandler, ProgressPublisher, PublishedEvent, PublisherSnapshot, Subscription,
};
pub use crypto::{ChallengeSignature, OwnerKeyPair, SealingKey};
pub use identity::{IdentityError, OwnerIdentity};
pub use network::{
    BackoffConfig, ConnectionMonitor, MockOp, MockRelay, MsgsCounts, NetworkStatus, NodeInfo,
    RelayTransport, TransportError, TransportErrorKind,
};
pub use owner::OwnerInfo;
pub use registration::{OwnerRegistrationState, RegistrationOutcome};
pub use restore::{
    ProgressSnapshot, RestoreCheckpoint, RestorePhase, RestoreProgress, RestoreState,
    FIXED_CONTACT_PERCENTAGE, FIXED_MESSAGES_PERCENTAGE,
};
pub use storage::{MemoryStorage, RestoreStore, SecureStorage, Storage, StorageError};
