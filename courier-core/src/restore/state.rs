// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Restore states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Restore phase as seen by observers.
///
/// `RestoringContacts -> RestoringMessages -> RestoreFinished`, no other edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreState {
    #[default]
    RestoringContacts,
    RestoringMessages,
    RestoreFinished,
}

impl RestoreState {
    /// Returns true if `next` is the single allowed successor.
    pub fn can_advance_to(self, next: RestoreState) -> bool {
        matches!(
            (self, next),
            (RestoreState::RestoringContacts, RestoreState::RestoringMessages)
                | (RestoreState::RestoringMessages, RestoreState::RestoreFinished)
        )
    }

    /// Returns true once nothing more will be restored.
    pub fn is_terminal(self) -> bool {
        self == RestoreState::RestoreFinished
    }

    /// The phase that does the work in this state.
    pub fn phase(self) -> Option<RestorePhase> {
        match self {
            RestoreState::RestoringContacts => Some(RestorePhase::Contacts),
            RestoreState::RestoringMessages => Some(RestorePhase::Messages),
            RestoreState::RestoreFinished => None,
        }
    }
}

/// Sub-state of the messages phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RestoreProcessState {
    /// Establishing the message denominator.
    MessagesCounts {
        /// Known message total, if any.
        msgs_counts: Option<u64>,
    },
    /// Paging messages.
    #[default]
    RestoreMessages,
}

/// A restore phase that pages data from the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePhase {
    Contacts,
    Messages,
}

impl fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorePhase::Contacts => f.write_str("contacts"),
            RestorePhase::Messages => f.write_str("messages"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RestoreState; 3] = [
        RestoreState::RestoringContacts,
        RestoreState::RestoringMessages,
        RestoreState::RestoreFinished,
    ];

    #[test]
    fn test_only_forward_edges() {
        let mut allowed = Vec::new();
        for from in ALL {
            for to in ALL {
                if from.can_advance_to(to) {
                    allowed.push((from, to));
                }
            }
        }
        assert_eq!(
            allowed,
            vec![
                (RestoreState::RestoringContacts, RestoreState::RestoringMessages),
                (RestoreState::RestoringMessages, RestoreState::RestoreFinished),
            ]
        );
    }

    #[test]
    fn test_finished_is_terminal() {
        assert!(RestoreState::RestoreFinished.is_terminal());
        assert_eq!(RestoreState::RestoreFinished.phase(), None);
        assert_eq!(
            RestoreState::RestoringMessages.phase(),
            Some(RestorePhase::Messages)
        );
    }
}
