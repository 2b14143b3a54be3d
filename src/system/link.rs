//! OS link lookup by interface name.

use pnet::datalink;

use crate::domain::OsLinkInfo;

/// Index, flags, hardware address and up state of `name`, if it exists.
pub fn link_info(name: &str) -> Option<OsLinkInfo> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .map(|iface| OsLinkInfo {
            index: iface.index,
            flags: u64::from(iface.flags),
            hardware_addr: iface.mac.map(|mac| mac.to_string()),
            up: iface.is_up(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_interface_has_no_link() {
        assert!(link_info("tunwarden-missing0").is_none());
    }
}
