//! Tracing-based packet reporter.

use tracing::{debug, info};

use crate::domain::PacketSummary;
use crate::reporter::PacketReporter;

/// Logs every classified packet as a structured tracing event.
///
/// Output looks like `[PACKET] IPv4: 10.0.0.2 -> 10.0.0.1 (TCP)` with the
/// same fields attached for structured sinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl PacketReporter for LogReporter {
    fn report(&self, summary: &PacketSummary) {
        info!(
            target: "tunwarden::packet",
            ip_version = summary.ip_version.number(),
            source = %summary.source,
            destination = %summary.destination,
            protocol = %summary.protocol,
            "[PACKET] {}",
            summary
        );
    }

    fn on_start(&self, interface: &str) {
        info!("Packet processing started on interface {}", interface);
    }

    fn on_stop(&self, interface: &str) {
        debug!("Packet processing stopped on interface {}", interface);
    }
}
