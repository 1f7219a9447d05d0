// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Owner Registration
//!
//! Mnemonic, signed challenge, invite code, node discovery and router key
//! persistence, in that order.

mod registrar;
mod state;

pub use registrar::{select_router, OwnerRegistrar, RegistrationOutcome};
pub use state::{OwnerRegistrationState, RegistrationTracker};
