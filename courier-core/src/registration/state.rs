// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registration States
//!
//! The owner registration walks a fixed sequence. `GetNodes` and
//! `StoreRouterPubKey` may repeat while the router key is retried; every
//! other state appears at most once per attempt.

use serde::{Deserialize, Serialize};

use crate::api::{CourierError, CourierResult};
use crate::network::NodeInfo;

/// Externally visible registration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OwnerRegistrationState {
    /// A fresh mnemonic was generated and must be shown for backup.
    MnemonicWords { words: Vec<String> },
    /// The relay accepted the signed challenge.
    SignedChallenge { auth_token: String },
    /// The relay issued an invite code.
    NewInviteCode { invite_code: String },
    /// Fetching the node list.
    GetNodes,
    /// Persisting the router public key chosen from `nodes`.
    StoreRouterPubKey { nodes: Vec<NodeInfo> },
    /// Registration complete.
    OwnerRegistered,
}

impl OwnerRegistrationState {
    /// Position in the registration sequence.
    pub fn ordinal(&self) -> u8 {
        match self {
            OwnerRegistrationState::MnemonicWords { .. } => 0,
            OwnerRegistrationState::SignedChallenge { .. } => 1,
            OwnerRegistrationState::NewInviteCode { .. } => 2,
            OwnerRegistrationState::GetNodes => 3,
            OwnerRegistrationState::StoreRouterPubKey { .. } => 4,
            OwnerRegistrationState::OwnerRegistered => 5,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            OwnerRegistrationState::MnemonicWords { .. } => "mnemonic_words",
            OwnerRegistrationState::SignedChallenge { .. } => "signed_challenge",
            OwnerRegistrationState::NewInviteCode { .. } => "new_invite_code",
            OwnerRegistrationState::GetNodes => "get_nodes",
            OwnerRegistrationState::StoreRouterPubKey { .. } => "store_router_pub_key",
            OwnerRegistrationState::OwnerRegistered => "owner_registered",
        }
    }

    fn repeatable(&self) -> bool {
        matches!(
            self,
            OwnerRegistrationState::GetNodes | OwnerRegistrationState::StoreRouterPubKey { .. }
        )
    }
}

/// Rejects registration states that would go backwards.
#[derive(Debug, Default)]
pub struct RegistrationTracker {
    last: Option<OwnerRegistrationState>,
}

impl RegistrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `next` may follow the last accepted state.
    pub fn can_advance_to(&self, next: &OwnerRegistrationState) -> bool {
        let Some(last) = &self.last else {
            return !matches!(next, OwnerRegistrationState::OwnerRegistered);
        };

        if matches!(next, OwnerRegistrationState::OwnerRegistered) {
            return matches!(last, OwnerRegistrationState::StoreRouterPubKey { .. });
        }
        if next.ordinal() > last.ordinal() {
            return true;
        }
        last.repeatable() && next.repeatable()
    }

    /// Accepts `next` or reports the offending edge.
    pub fn advance(&mut self, next: &OwnerRegistrationState) -> CourierResult<()> {
        if !self.can_advance_to(next) {
            let from = self
                .last
                .as_ref()
                .map_or("start", OwnerRegistrationState::name);
            return Err(CourierError::InvalidTransition {
                from: from.to_string(),
                to: next.name().to_string(),
            });
        }
        self.last = Some(next.clone());
        Ok(())
    }
}
