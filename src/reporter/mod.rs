//! Reporting module for classified packets.
//!
//! This module defines the `PacketReporter` trait and provides
//! a tracing-backed reporter plus a channel reporter for embedders.

mod channel_reporter;
mod log_reporter;

pub use channel_reporter::ChannelReporter;
pub use log_reporter::LogReporter;

use crate::domain::PacketSummary;

/// Receives one event per classified packet.
///
/// Called from the packet-read task, so implementations must not block
/// for long.
pub trait PacketReporter: Send + Sync {
    /// Report a classified packet.
    fn report(&self, summary: &PacketSummary);

    /// Called when the packet-read task starts on an interface.
    fn on_start(&self, _interface: &str) {}

    /// Called after the packet-read task has exited.
    fn on_stop(&self, _interface: &str) {}
}
