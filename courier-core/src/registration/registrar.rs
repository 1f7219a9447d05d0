// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Owner Registrar
//!
//! Registers the owner with the relay and publishes each step as an
//! [`OwnerRegistrationState`]. Relay calls are retried with backoff; a
//! refused router key write restarts from `StoreRouterPubKey` without
//! repeating the earlier steps.

use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{OwnerRegistrationState, RegistrationTracker};
use crate::api::{CourierError, CourierEvent, CourierResult, ProgressPublisher, RegistrationConfig};
use crate::identity::OwnerIdentity;
use crate::network::{
    retry_transport, ConnectionMonitor, NodeInfo, RelayTransport, RetryPolicy, SignedChallenge,
};
use crate::owner::OwnerInfo;
use crate::storage::SecureStorage;

/// Everything a successful registration produced.
#[derive(Debug)]
pub struct RegistrationOutcome {
    /// Owner info seeded with the stored message index.
    pub owner: OwnerInfo,
    /// Signing identity; holds the mnemonic.
    pub identity: OwnerIdentity,
    /// Relay authorization token.
    pub auth_token: String,
    /// Invite code issued by the relay.
    pub invite_code: String,
    /// Node whose key was stored as the router key.
    pub router: NodeInfo,
}

/// Runs owner registration.
pub struct OwnerRegistrar {
    transport: Arc<dyn RelayTransport>,
    secure: Arc<dyn SecureStorage>,
    monitor: ConnectionMonitor,
    publisher: ProgressPublisher,
    config: RegistrationConfig,
}

impl OwnerRegistrar {
    pub fn new(
        transport: Arc<dyn RelayTransport>,
        secure: Arc<dyn SecureStorage>,
        monitor: ConnectionMonitor,
        publisher: ProgressPublisher,
        config: RegistrationConfig,
    ) -> Self {
        OwnerRegistrar {
            transport,
            secure,
            monitor,
            publisher,
            config,
        }
    }

    /// Registers the owner, generating a mnemonic when none is supplied.
    ///
    /// Failures other than cancellation are also published as
    /// [`CourierEvent::RegistrationFailed`].
    pub async fn register(
        &self,
        existing_mnemonic: Option<&str>,
        cancel: &CancellationToken,
    ) -> CourierResult<RegistrationOutcome> {
        let result = self.run(existing_mnemonic, cancel).await;

        if let Err(e) = &result {
            if !matches!(e, CourierError::Cancelled) && !cancel.is_cancelled() {
                warn!(error = %e, "owner registration failed");
                self.publisher.publish(CourierEvent::RegistrationFailed {
                    reason: e.to_string(),
                    retryable: e.is_retryable(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        existing_mnemonic: Option<&str>,
        cancel: &CancellationToken,
    ) -> CourierResult<RegistrationOutcome> {
        let mut tracker = RegistrationTracker::new();
        let policy = self.config.retry_policy();

        let identity = match existing_mnemonic {
            Some(words) => OwnerIdentity::from_mnemonic(words)?,
            None => {
                let identity = OwnerIdentity::generate()?;
                self.emit(
                    &mut tracker,
                    OwnerRegistrationState::MnemonicWords {
                        words: identity.mnemonic_words(),
                    },
                    cancel,
                )?;
                identity
            }
        };
        info!(public_key = %identity.public_key_hex(), "registering owner");

        let auth_token = self.authenticate(&identity, &policy, cancel).await?;
        self.persist(
            "authorization token",
            self.secure.persist_authorization_token(&auth_token),
        )?;
        self.emit(
            &mut tracker,
            OwnerRegistrationState::SignedChallenge {
                auth_token: auth_token.clone(),
            },
            cancel,
        )?;

        let invite_code = retry_transport(
            &policy,
            &self.monitor,
            cancel,
            "fetch_invite_code",
            || {
                let transport = self.transport.clone();
                async move { transport.fetch_invite_code().await }
            },
            |_| {},
        )
        .await?;
        self.emit(
            &mut tracker,
            OwnerRegistrationState::NewInviteCode {
                invite_code: invite_code.clone(),
            },
            cancel,
        )?;

        self.emit(&mut tracker, OwnerRegistrationState::GetNodes, cancel)?;
        let nodes = retry_transport(
            &policy,
            &self.monitor,
            cancel,
            "fetch_node_list",
            || {
                let transport = self.transport.clone();
                async move { transport.fetch_node_list().await }
            },
            |_| {},
        )
        .await?;
        if nodes.is_empty() {
            return Err(CourierError::NoNodesAvailable);
        }
        debug!(count = nodes.len(), "node list fetched");

        let router = self.store_router_key(&mut tracker, nodes, &policy, cancel).await?;

        self.emit(&mut tracker, OwnerRegistrationState::OwnerRegistered, cancel)?;
        info!(router = %router.alias, "owner registered");

        let owner = OwnerInfo::new(None, self.secure.read_last_message_index()?);
        Ok(RegistrationOutcome {
            owner,
            identity,
            auth_token,
            invite_code,
            router,
        })
    }

    /// Fetches a challenge, signs it locally and exchanges it for a token.
    async fn authenticate(
        &self,
        identity: &OwnerIdentity,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> CourierResult<String> {
        let challenge = retry_transport(
            policy,
            &self.monitor,
            cancel,
            "fetch_challenge",
            || {
                let transport = self.transport.clone();
                async move { transport.fetch_challenge().await }
            },
            |_| {},
        )
        .await?;

        let signed = SignedChallenge {
            challenge_id: challenge.id.clone(),
            public_key: identity.public_key_hex(),
            signature: identity.sign_challenge(&challenge.nonce).to_hex(),
        };

        let token = retry_transport(
            policy,
            &self.monitor,
            cancel,
            "submit_challenge_signature",
            || {
                let transport = self.transport.clone();
                let signed = signed.clone();
                async move { transport.submit_challenge_signature(&signed).await }
            },
            |_| {},
        )
        .await?;

        if !is_valid_token(&token) {
            return Err(CourierError::InvalidAuthToken);
        }
        Ok(token)
    }

    async fn store_router_key(
        &self,
        tracker: &mut RegistrationTracker,
        nodes: Vec<NodeInfo>,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> CourierResult<NodeInfo> {
        let router = select_router(&nodes).cloned().ok_or(CourierError::NoNodesAvailable)?;
        let mut attempt = 0u32;

        loop {
            self.emit(
                tracker,
                OwnerRegistrationState::StoreRouterPubKey {
                    nodes: nodes.clone(),
                },
                cancel,
            )?;

            let error = match self.secure.persist_router_pub_key(&router.pub_key) {
                Ok(true) => return Ok(router),
                Ok(false) => "router key refused".to_string(),
                Err(e) => format!("router key: {e}"),
            };

            attempt += 1;
            if attempt >= self.config.max_persist_attempts {
                return Err(CourierError::StoragePersistFailed(error));
            }

            let delay = policy.backoff.delay_for(attempt - 1);
            warn!(attempt, %error, ?delay, "router key not stored, retrying");
            tokio::select! {
                _ = cancel.cancelled() => return Err(CourierError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn emit(
        &self,
        tracker: &mut RegistrationTracker,
        state: OwnerRegistrationState,
        cancel: &CancellationToken,
    ) -> CourierResult<()> {
        if cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        tracker.advance(&state)?;
        debug!(state = state.name(), "registration state");
        self.publisher
            .publish(CourierEvent::RegistrationStateChanged { state });
        Ok(())
    }

    fn persist(
        &self,
        what: &str,
        result: Result<bool, crate::storage::StorageError>,
    ) -> CourierResult<()> {
        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(CourierError::StoragePersistFailed(format!("{what} refused"))),
            Err(e) => Err(CourierError::StoragePersistFailed(format!("{what}: {e}"))),
        }
    }
}

/// Picks the node whose key becomes the router key.
///
/// Prefers nodes flagged as routers with a 32-byte hex key, then any node
/// with such a key, then any node with a non-empty key.
pub fn select_router(nodes: &[NodeInfo]) -> Option<&NodeInfo> {
    let well_formed = |node: &&NodeInfo| {
        hex::decode(&node.pub_key)
            .map(|bytes| bytes.len() == 32)
            .unwrap_or(false)
    };

    nodes
        .iter()
        .filter(|node| node.is_router)
        .find(well_formed)
        .or_else(|| nodes.iter().find(well_formed))
        .or_else(|| nodes.iter().find(|node| !node.pub_key.is_empty()))
}

fn is_valid_token(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && (STANDARD.decode(token).is_ok() || URL_SAFE_NO_PAD.decode(token).is_ok())
}
