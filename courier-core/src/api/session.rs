// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Single-flight session slots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allows one session of a kind at a time.
#[derive(Debug, Default)]
pub struct SessionSlot {
    active: AtomicBool,
}

impl SessionSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims the slot; `None` if a session already holds it.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SessionGuard> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionGuard { slot: self.clone() })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases the slot when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    slot: Arc<SessionSlot>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::Release);
    }
}
