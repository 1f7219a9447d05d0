// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Network Layer
//!
//! Everything between the orchestrator and the relay node.
//!
//! # Architecture
//!
//! - **Transport trait**: async boundary to the relay's HTTP client
//! - **Connection monitor**: shared `NetworkStatus` with async waiting
//! - **Retry**: bounded exponential backoff that pauses while disconnected
//! - **Mock relay**: scriptable transport for tests
//!
//! # Example
//!
//! ```ignore
//! use courier_core::network::{ConnectionMonitor, MockRelay, RelayTransport};
//!
//! let relay = MockRelay::new();
//! let monitor = ConnectionMonitor::new();
//! monitor.report_connected();
//!
//! let nodes = relay.fetch_node_list().await?;
//! ```

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod mock;
#[cfg(not(feature = "testing"))]
mod mock;

pub mod monitor;

#[cfg(feature = "testing")]
pub mod retry;
#[cfg(not(feature = "testing"))]
mod retry;

#[cfg(feature = "testing")]
pub mod transport;
#[cfg(not(feature = "testing"))]
mod transport;

// Error types
pub use error::{TransportError, TransportErrorKind};

// Transport abstraction
pub use transport::{
    Challenge, ContactPage, ContactRecord, MessagePage, MessageRecord, MsgsCounts, NodeInfo,
    RelayTransport, SignedChallenge, TransportResult,
};

// Connectivity
pub use monitor::{ConnectionMonitor, NetworkStatus, WaitCancelled};

// Retry
pub use retry::{retry_transport, BackoffConfig, FailureReport, RetryError, RetryPolicy};

// Mock relay for testing
pub use mock::{MockOp, MockRelay};
