//! Interface configuration and lifecycle state.

use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

/// Default name requested for the tunnel endpoint.
pub const DEFAULT_INTERFACE_NAME: &str = "utun9";

/// Addressing and naming for one tunnel endpoint.
///
/// `requested_name` never changes after construction. Once the OS has
/// assigned a name, `effective_name` holds it and every OS command uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    requested_name: String,
    effective_name: Option<String>,
    pub mtu: u32,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl InterfaceConfig {
    pub fn new(requested_name: &str, mtu: u32, address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        let requested_name = if requested_name.is_empty() {
            DEFAULT_INTERFACE_NAME.to_string()
        } else {
            requested_name.to_string()
        };

        Self {
            requested_name,
            effective_name: None,
            mtu,
            address,
            netmask,
        }
    }

    pub fn requested_name(&self) -> &str {
        &self.requested_name
    }

    /// Name to use for OS commands: the assigned name once known.
    pub fn name(&self) -> &str {
        self.effective_name.as_deref().unwrap_or(&self.requested_name)
    }

    pub fn effective_name(&self) -> Option<&str> {
        self.effective_name.as_deref()
    }

    pub fn set_effective_name(&mut self, name: &str) {
        self.effective_name = Some(name.to_string());
    }

    pub fn clear_effective_name(&mut self) {
        self.effective_name = None;
    }

    pub fn name_mismatch(&self) -> bool {
        self.effective_name
            .as_deref()
            .is_some_and(|name| name != self.requested_name)
    }
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_INTERFACE_NAME,
            1500,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(255, 255, 255, 0),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Created,
    Running,
    Stopped,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        };
        write!(f, "{label}")
    }
}
