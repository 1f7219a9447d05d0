// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Owner profile and resume cursor.

use serde::{Deserialize, Serialize};

/// The registered owner as known to this client.
///
/// Everything except `message_last_index` is fixed once registration
/// completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub alias: Option<String>,
    pub picture: Option<String>,
    pub user_state: Option<String>,
    message_last_index: Option<i64>,
}

impl OwnerInfo {
    /// Creates owner info seeded with a stored message index.
    pub fn new(alias: Option<String>, message_last_index: Option<i64>) -> Self {
        OwnerInfo {
            alias,
            picture: None,
            user_state: None,
            message_last_index,
        }
    }

    /// Highest restored message index.
    pub fn message_last_index(&self) -> Option<i64> {
        self.message_last_index
    }

    /// Moves the cursor forward. Returns false if `index` is not ahead.
    pub fn advance_message_last_index(&mut self, index: i64) -> bool {
        match self.message_last_index {
            Some(current) if current >= index => false,
            _ => {
                self.message_last_index = Some(index);
                true
            }
        }
    }
}
