//! Subscription entitlement and notification targeting for subscribe-rs.
//!
//! [`engine`] holds the pure time logic; [`services`] wires it to the
//! repositories, the status-check worker and the real-time sink.

pub mod engine;
pub mod services;

pub use services::*;
