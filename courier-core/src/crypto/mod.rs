// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod sealing;
pub mod signing;

pub use sealing::{open, seal, SealError, SealingKey};
pub use signing::{verify, ChallengeSignature, OwnerKeyPair, SigningError};
