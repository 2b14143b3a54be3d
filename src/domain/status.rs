//! Status snapshots reported to callers.

use serde::Serialize;

use super::LifecycleState;

/// OS-level link details resolved by interface name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsLinkInfo {
    pub index: u32,
    pub flags: u64,
    pub hardware_addr: Option<String>,
    pub up: bool,
}

/// Fields scraped from interface-status command output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceDetails {
    pub ip: Option<String>,
    pub netmask: Option<String>,
    pub mtu: Option<String>,
    pub status: Option<LinkStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkStatus {
    Up,
    Down,
}

/// Point-in-time view of a managed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceStatus {
    pub name: String,
    pub requested_name: String,
    pub mtu: u32,
    pub address: String,
    pub netmask: String,
    pub state: LifecycleState,
    pub handle_active: bool,
    pub running: bool,
    pub name_mismatch: bool,
    pub intercepting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<OsLinkInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_name_link: Option<OsLinkInfo>,
}
