//! Channel-based packet reporter.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use crate::domain::PacketSummary;
use crate::reporter::PacketReporter;

/// Forwards packet summaries over a std channel.
///
/// Sends after the receiver is dropped are ignored.
pub struct ChannelReporter {
    tx: Mutex<Sender<PacketSummary>>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<PacketSummary>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx: Mutex::new(tx) }, rx)
    }
}

impl PacketReporter for ChannelReporter {
    fn report(&self, summary: &PacketSummary) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(summary.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IpVersion, Protocol};
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_forwards_summary() {
        let (reporter, rx) = ChannelReporter::new();
        let summary = PacketSummary {
            ip_version: IpVersion::V4,
            source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            destination: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            protocol: Protocol::Udp,
        };

        reporter.report(&summary);
        assert_eq!(rx.try_recv().unwrap(), summary);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (reporter, rx) = ChannelReporter::new();
        drop(rx);
        reporter.report(&PacketSummary {
            ip_version: IpVersion::V4,
            source: IpAddr::V4(Ipv4Addr::LOCALHOST),
            destination: IpAddr::V4(Ipv4Addr::LOCALHOST),
            protocol: Protocol::Icmp,
        });
    }
}
