//! IP header classifier.
//!
//! Reads just enough of an IPv4/IPv6 header to summarize a packet
//! for logging. Anything malformed is skipped rather than reported.

use std::net::IpAddr;

use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;

use crate::domain::{IpVersion, PacketSummary, Protocol};

/// Minimum IPv4 header length.
pub const MIN_IPV4_HEADER: usize = 20;

/// Fixed IPv6 header length.
pub const MIN_IPV6_HEADER: usize = 40;

/// Classifier for raw layer-3 payloads read from a tunnel endpoint.
///
/// Stateless: the same bytes always produce the same summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketClassifier;

impl PacketClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Summarize a packet, or `None` if it is too short or not IPv4/IPv6.
    pub fn classify(&self, data: &[u8]) -> Option<PacketSummary> {
        if data.len() < MIN_IPV4_HEADER {
            return None;
        }

        match data[0] >> 4 {
            4 => Self::classify_v4(data),
            6 => Self::classify_v6(data),
            _ => None,
        }
    }

    fn classify_v4(data: &[u8]) -> Option<PacketSummary> {
        let header = Ipv4Packet::new(data)?;

        Some(PacketSummary {
            ip_version: IpVersion::V4,
            source: IpAddr::V4(header.get_source()),
            destination: IpAddr::V4(header.get_destination()),
            protocol: Protocol::from_u8(header.get_next_level_protocol().0),
        })
    }

    fn classify_v6(data: &[u8]) -> Option<PacketSummary> {
        if data.len() < MIN_IPV6_HEADER {
            return None;
        }
        let header = Ipv6Packet::new(data)?;

        Some(PacketSummary {
            ip_version: IpVersion::V6,
            source: IpAddr::V6(header.get_source()),
            destination: IpAddr::V6(header.get_destination()),
            protocol: Protocol::from_u8(header.get_next_header().0),
        })
    }
}
