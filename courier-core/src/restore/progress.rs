// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Restore Progress
//!
//! Counters, cursors and the weighted percentage of one restore session.
//! Contacts weigh [`FIXED_CONTACT_PERCENTAGE`], messages
//! [`FIXED_MESSAGES_PERCENTAGE`]:
//!
//! ```text
//! contacts_fraction = total_contacts_key > 0 ? contacts_restored / total_contacts_key : 1.0
//! messages_fraction = total_messages     > 0 ? messages_restored / total_messages     : 0.0
//! percentage        = round(contacts_fraction * 10 + messages_fraction * 90)
//! ```
//!
//! Without counts from the node the percentage is pinned to phase
//! boundaries: 0 while restoring contacts, 10 while restoring messages,
//! 100 when finished.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::state::{RestoreProcessState, RestoreState};
use crate::api::{CourierError, CourierResult};
use crate::network::{ContactRecord, MessageRecord, MsgsCounts};

/// Weight of the contacts phase.
pub const FIXED_CONTACT_PERCENTAGE: u8 = 10;

/// Weight of the messages phase.
pub const FIXED_MESSAGES_PERCENTAGE: u8 = 90;

const _: () = assert!(FIXED_CONTACT_PERCENTAGE as u16 + FIXED_MESSAGES_PERCENTAGE as u16 == 100);

/// Immutable copy of the restore progress handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub progress_percentage: u8,
    pub contacts_restored_amount: u64,
    pub total_contacts_key: u64,
    pub restored_messages_amount: u64,
    pub total_messages: u64,
    pub fixed_contact_percentage: u8,
    pub fixed_messages_percentage: u8,
    pub state: RestoreState,
    /// True when the node did not report counts.
    pub indeterminate: bool,
}

/// Persisted position of an interrupted restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreCheckpoint {
    pub state: RestoreState,
    pub counts_known: bool,
    pub total_contacts_key: u64,
    pub total_messages: u64,
    pub contacts_restored_amount: u64,
    pub restored_messages_amount: u64,
    pub progress_percentage: u8,
    pub contacts_cursor: Option<String>,
    pub last_message_index: Option<i64>,
    /// Identity keys of contacts already counted.
    pub seen_contacts: Vec<String>,
}

/// Mutable progress of one restore session.
///
/// Owned by the coordinator; everyone else reads [`ProgressSnapshot`]s.
#[derive(Debug, Clone)]
pub struct RestoreProgress {
    progress_percentage: u8,
    contacts_restored_amount: u64,
    total_contacts_key: u64,
    total_messages: u64,
    restored_messages_amount: u64,
    counts_known: bool,
    state: RestoreState,
    process_state: RestoreProcessState,
    contacts_cursor: Option<String>,
    last_message_index: Option<i64>,
    seen_contacts: HashSet<String>,
}

impl Default for RestoreProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreProgress {
    /// Fresh progress at the start of the contacts phase, counts unknown.
    pub fn new() -> Self {
        RestoreProgress {
            progress_percentage: 0,
            contacts_restored_amount: 0,
            total_contacts_key: 0,
            total_messages: 0,
            restored_messages_amount: 0,
            counts_known: false,
            state: RestoreState::RestoringContacts,
            process_state: RestoreProcessState::default(),
            contacts_cursor: None,
            last_message_index: None,
            seen_contacts: HashSet::new(),
        }
    }

    /// Rebuilds progress from a checkpoint.
    pub fn from_checkpoint(checkpoint: RestoreCheckpoint) -> Self {
        let mut progress = RestoreProgress {
            progress_percentage: checkpoint.progress_percentage.min(100),
            contacts_restored_amount: checkpoint.contacts_restored_amount,
            total_contacts_key: checkpoint.total_contacts_key,
            total_messages: checkpoint.total_messages,
            restored_messages_amount: checkpoint.restored_messages_amount,
            counts_known: checkpoint.counts_known,
            state: checkpoint.state,
            process_state: RestoreProcessState::default(),
            contacts_cursor: checkpoint.contacts_cursor,
            last_message_index: checkpoint.last_message_index,
            seen_contacts: checkpoint.seen_contacts.into_iter().collect(),
        };
        progress.recompute();
        progress
    }

    /// Position to persist after a committed page.
    pub fn to_checkpoint(&self) -> RestoreCheckpoint {
        let mut seen_contacts: Vec<String> = self.seen_contacts.iter().cloned().collect();
        seen_contacts.sort();
        RestoreCheckpoint {
            state: self.state,
            counts_known: self.counts_known,
            total_contacts_key: self.total_contacts_key,
            total_messages: self.total_messages,
            contacts_restored_amount: self.contacts_restored_amount,
            restored_messages_amount: self.restored_messages_amount,
            progress_percentage: self.progress_percentage,
            contacts_cursor: self.contacts_cursor.clone(),
            last_message_index: self.last_message_index,
            seen_contacts,
        }
    }

    /// Observer copy.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress_percentage: self.progress_percentage,
            contacts_restored_amount: self.contacts_restored_amount,
            total_contacts_key: self.total_contacts_key,
            restored_messages_amount: self.restored_messages_amount,
            total_messages: self.total_messages,
            fixed_contact_percentage: FIXED_CONTACT_PERCENTAGE,
            fixed_messages_percentage: FIXED_MESSAGES_PERCENTAGE,
            state: self.state,
            indeterminate: !self.counts_known,
        }
    }

    /// Seeds the denominators. `None` switches to indeterminate mode.
    pub fn apply_counts(&mut self, counts: Option<MsgsCounts>) {
        match counts {
            Some(counts) => {
                self.total_contacts_key = counts.total_contacts;
                self.total_messages = counts.total_messages;
                self.counts_known = true;
                self.contacts_restored_amount =
                    self.contacts_restored_amount.min(self.total_contacts_key);
                self.restored_messages_amount =
                    self.restored_messages_amount.min(self.total_messages);
            }
            None => self.counts_known = false,
        }
        self.recompute();
    }

    /// Starts the messages cursor after `index`, crediting `already_restored`
    /// messages found locally.
    pub fn resume_messages_after(&mut self, index: Option<i64>, already_restored: u64) {
        self.last_message_index = index;
        self.restored_messages_amount = if self.counts_known {
            already_restored.min(self.total_messages)
        } else {
            already_restored
        };
        self.recompute();
    }

    /// Moves to `next` if the edge is allowed.
    pub fn advance_to(&mut self, next: RestoreState) -> CourierResult<()> {
        if !self.state.can_advance_to(next) {
            return Err(CourierError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", next),
            });
        }
        self.state = next;
        self.recompute();
        Ok(())
    }

    /// Contacts in `page` not yet counted, first occurrence only.
    pub fn new_contacts(&self, page: &[ContactRecord]) -> Vec<ContactRecord> {
        let mut in_page = HashSet::new();
        page.iter()
            .filter(|c| !self.seen_contacts.contains(&c.public_key))
            .filter(|c| in_page.insert(c.public_key.clone()))
            .cloned()
            .collect()
    }

    /// Counts a stored contacts page and moves the cursor.
    pub fn commit_contacts(&mut self, fresh: &[ContactRecord], next_cursor: Option<String>) {
        for contact in fresh {
            if self.seen_contacts.insert(contact.public_key.clone()) {
                self.contacts_restored_amount += 1;
            }
        }
        if self.counts_known {
            self.contacts_restored_amount =
                self.contacts_restored_amount.min(self.total_contacts_key);
        }
        self.contacts_cursor = next_cursor;
        self.recompute();
    }

    /// Messages in `page` past the cursor, first occurrence only.
    pub fn new_messages(&self, page: &[MessageRecord]) -> Vec<MessageRecord> {
        let mut in_page = HashSet::new();
        page.iter()
            .filter(|m| self.last_message_index.map_or(true, |last| m.id > last))
            .filter(|m| in_page.insert(m.id))
            .cloned()
            .collect()
    }

    /// Counts a stored messages page and advances the cursor.
    pub fn commit_messages(&mut self, fresh: &[MessageRecord]) {
        self.restored_messages_amount += fresh.len() as u64;
        if self.counts_known {
            self.restored_messages_amount =
                self.restored_messages_amount.min(self.total_messages);
        }
        if let Some(max) = fresh.iter().map(|m| m.id).max() {
            self.last_message_index = Some(self.last_message_index.map_or(max, |i| i.max(max)));
        }
        self.recompute();
    }

    pub fn progress_percentage(&self) -> u8 {
        self.progress_percentage
    }

    pub fn contacts_restored_amount(&self) -> u64 {
        self.contacts_restored_amount
    }

    pub fn restored_messages_amount(&self) -> u64 {
        self.restored_messages_amount
    }

    pub fn total_contacts_key(&self) -> u64 {
        self.total_contacts_key
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn counts_known(&self) -> bool {
        self.counts_known
    }

    pub fn state(&self) -> RestoreState {
        self.state
    }

    pub fn process_state(&self) -> RestoreProcessState {
        self.process_state
    }

    pub fn set_process_state(&mut self, process_state: RestoreProcessState) {
        self.process_state = process_state;
    }

    /// Cursor for the next contacts page.
    pub fn contacts_cursor(&self) -> Option<String> {
        self.contacts_cursor.clone()
    }

    /// Highest committed message index.
    pub fn last_message_index(&self) -> Option<i64> {
        self.last_message_index
    }

    fn recompute(&mut self) {
        let computed = match (self.state, self.counts_known) {
            (RestoreState::RestoreFinished, _) => 100,
            (RestoreState::RestoringContacts, false) => 0,
            (RestoreState::RestoringMessages, false) => FIXED_CONTACT_PERCENTAGE,
            (_, true) => weighted_percentage(
                self.contacts_restored_amount,
                self.total_contacts_key,
                self.restored_messages_amount,
                self.total_messages,
            ),
        };
        self.progress_percentage = self.progress_percentage.max(computed).min(100);
    }
}

fn weighted_percentage(
    contacts_restored: u64,
    total_contacts: u64,
    messages_restored: u64,
    total_messages: u64,
) -> u8 {
    let contacts_fraction = if total_contacts > 0 {
        contacts_restored as f64 / total_contacts as f64
    } else {
        1.0
    };
    let messages_fraction = if total_messages > 0 {
        messages_restored as f64 / total_messages as f64
    } else {
        0.0
    };

    let value = contacts_fraction * f64::from(FIXED_CONTACT_PERCENTAGE)
        + messages_fraction * f64::from(FIXED_MESSAGES_PERCENTAGE);
    value.round().clamp(0.0, 100.0) as u8
}
