// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies
//!
//! Restore shapes for property-based tests of the progress math.

use proptest::prelude::*;

/// Totals and page size for a simulated restore.
#[derive(Debug, Clone)]
pub struct RestoreShape {
    pub total_contacts: u64,
    pub total_messages: u64,
    pub page_size: usize,
    /// Extra contacts delivered beyond the reported total.
    pub contact_drift: u64,
}

pub fn restore_shape_strategy() -> impl Strategy<Value = RestoreShape> {
    (0u64..200, 0u64..2_000, 1usize..120, 0u64..5).prop_map(
        |(total_contacts, total_messages, page_size, contact_drift)| RestoreShape {
            total_contacts,
            total_messages,
            page_size,
            contact_drift,
        },
    )
}

/// Page sizes for chunking a stream of records.
pub fn page_sizes_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..40, 1..30)
}
