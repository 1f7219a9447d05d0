// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! History Restore
//!
//! Pulls the owner's contacts and messages back from the node after
//! registration, publishing weighted progress as pages are committed.
//!
//! # Flow
//!
//! 1. [`RestoreCounter`] fetches the totals once per session
//! 2. [`RestoreCoordinator`] pages contacts, then messages
//! 3. Every committed page is checkpointed; the session ends in
//!    [`RestoreState::RestoreFinished`] with 100%

mod coordinator;
mod counter;
mod progress;
mod state;

pub use coordinator::RestoreCoordinator;
pub use counter::RestoreCounter;
pub use progress::{
    ProgressSnapshot, RestoreCheckpoint, RestoreProgress, FIXED_CONTACT_PERCENTAGE,
    FIXED_MESSAGES_PERCENTAGE,
};
pub use state::{RestorePhase, RestoreProcessState, RestoreState};
