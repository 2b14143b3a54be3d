//! Packet classification module.
//!
//! Turns raw bytes read from the tunnel endpoint into `PacketSummary`
//! values for the reporter.

mod packet_classifier;

pub use packet_classifier::{PacketClassifier, MIN_IPV4_HEADER, MIN_IPV6_HEADER};
