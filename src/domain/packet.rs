//! Packet observability models.

use std::fmt;
use std::net::IpAddr;

/// IP protocol / IPv6 next-header numbers we label by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    IcmpV6,
    Unknown(u8),
}

impl Protocol {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            58 => Self::IcmpV6,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Icmp => 1,
            Self::Tcp => 6,
            Self::Udp => 17,
            Self::IcmpV6 => 58,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icmp => write!(f, "ICMP"),
            Self::Tcp => write!(f, "TCP"),
            Self::Udp => write!(f, "UDP"),
            Self::IcmpV6 => write!(f, "ICMPv6"),
            Self::Unknown(code) => write!(f, "Unknown({code})"),
        }
    }
}

/// Label for a protocol / next-header code.
pub fn protocol_label(code: u8) -> String {
    Protocol::from_u8(code).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn number(&self) -> u8 {
        match self {
            Self::V4 => 4,
            Self::V6 => 6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// Summary of one packet read from the tunnel endpoint.
///
/// Produced and consumed synchronously per packet; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSummary {
    pub ip_version: IpVersion,
    pub source: IpAddr,
    pub destination: IpAddr,
    pub protocol: Protocol,
}

impl PacketSummary {
    pub fn protocol_label(&self) -> String {
        self.protocol.to_string()
    }
}

impl fmt::Display for PacketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({})",
            self.ip_version, self.source, self.destination, self.protocol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_protocol_labels() {
        let labels: Vec<String> = [1u8, 6, 17, 58, 200].iter().map(|c| protocol_label(*c)).collect();
        assert_eq!(labels, vec!["ICMP", "TCP", "UDP", "ICMPv6", "Unknown(200)"]);
    }

    #[test]
    fn test_protocol_code_is_preserved() {
        for code in 0..=255u8 {
            assert_eq!(Protocol::from_u8(code).code(), code);
        }
    }

    #[test]
    fn test_summary_display() {
        let summary = PacketSummary {
            ip_version: IpVersion::V4,
            source: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            destination: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            protocol: Protocol::Tcp,
        };
        assert_eq!(summary.to_string(), "IPv4: 10.0.0.2 -> 10.0.0.1 (TCP)");
        assert_eq!(summary.ip_version.number(), 4);
    }
}
