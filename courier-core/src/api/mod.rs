// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Courier API
//!
//! High-level orchestration of owner registration and history restore.
//!
//! # Components
//!
//! - [`Courier`]: entry point; single-flight sessions and cancellation
//! - [`ProgressPublisher`]: ordered, non-blocking event broadcast
//! - [`CourierConfig`]: page size, retry bounds, backoff, buffer sizes
//! - [`CourierError`]: unified error type

mod config;
mod courier;
mod error;
mod events;
mod session;

pub use config::{CourierConfig, PublisherConfig, RegistrationConfig, RestoreConfig};
pub use courier::Courier;
pub use error::{CourierError, CourierResult};
pub use events::{
    CallbackHandler, CourierEvent, EventHandler, ProgressPublisher, PublishedEvent,
    PublisherSnapshot, Subscription,
};
pub use session::{SessionGuard, SessionSlot};
