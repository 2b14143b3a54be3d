//! Platform command syntax.
//!
//! BSD-like systems (macOS, FreeBSD) are driven through `ifconfig`,
//! `route` and `netstat`; Linux through iproute2. The capability object
//! is picked once by `detect_platform` and never branched on again.

use std::fmt;
use std::net::Ipv4Addr;

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: &'static str,
    pub args: Vec<String>,
    /// When false, a failing exit status is ignored.
    pub required: bool,
}

impl Invocation {
    fn new(program: &'static str, args: &[&str]) -> Self {
        Self {
            program,
            args: args.iter().map(|a| a.to_string()).collect(),
            required: true,
        }
    }

    fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Command syntax for one family of operating systems.
pub trait PlatformCommands: Send + Sync {
    /// Short platform label for logs.
    fn name(&self) -> &'static str;

    /// Commands that assign address and netmask, in order.
    fn set_address(&self, interface: &str, address: Ipv4Addr, netmask: Ipv4Addr) -> Vec<Invocation>;

    fn set_mtu(&self, interface: &str, mtu: u32) -> Invocation;

    fn bring_up(&self, interface: &str) -> Invocation;

    fn bring_down(&self, interface: &str) -> Invocation;

    fn destroy(&self, interface: &str) -> Invocation;

    fn add_route(&self, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation;

    fn delete_route(&self, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation;

    /// Delete the host's default route, whichever interface it uses.
    fn delete_default_route(&self) -> Invocation;

    /// Install a plain default route via `gateway`.
    fn add_default_route(&self, gateway: &str) -> Invocation;

    /// Query that prints the current default gateway.
    fn default_gateway_query(&self) -> Invocation;

    /// Field that precedes the gateway address in the query output.
    fn gateway_token(&self) -> &'static str;

    /// Full routing-table dump.
    fn route_table_query(&self) -> Invocation;

    fn status_query(&self, interface: &str) -> Invocation;
}

/// Broadcast address for `address` within `netmask`.
///
/// Computed per octet as `address[i] | (255 ^ netmask[i])`.
pub fn broadcast_address(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    let ip = address.octets();
    let mask = netmask.octets();
    let mut broadcast = [0u8; 4];
    for i in 0..4 {
        broadcast[i] = ip[i] | (255 ^ mask[i]);
    }
    Ipv4Addr::from(broadcast)
}

/// Prefix length of a netmask (number of set bits).
pub fn prefix_len(netmask: Ipv4Addr) -> u32 {
    netmask.octets().iter().map(|b| b.count_ones()).sum()
}

/// `ifconfig`/`route`/`netstat` syntax (macOS and the BSDs).
#[derive(Debug, Default, Clone, Copy)]
pub struct BsdCommands;

impl BsdCommands {
    fn route(verb: &str, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation {
        let mut inv = Invocation::new("route", &[verb, destination]);
        if let Some(gateway) = gateway {
            inv = inv.arg(gateway);
        }
        inv.arg("-interface").arg(interface)
    }
}

impl PlatformCommands for BsdCommands {
    fn name(&self) -> &'static str {
        "bsd"
    }

    fn set_address(&self, interface: &str, address: Ipv4Addr, netmask: Ipv4Addr) -> Vec<Invocation> {
        // The interface must be up before assignment, and an explicit
        // broadcast keeps it from being treated as point-to-point.
        let broadcast = broadcast_address(address, netmask);
        vec![
            self.bring_up(interface).optional(),
            Invocation::new(
                "ifconfig",
                &[
                    interface,
                    "inet",
                    &address.to_string(),
                    "netmask",
                    &netmask.to_string(),
                    "broadcast",
                    &broadcast.to_string(),
                ],
            ),
        ]
    }

    fn set_mtu(&self, interface: &str, mtu: u32) -> Invocation {
        Invocation::new("ifconfig", &[interface, "mtu", &mtu.to_string()])
    }

    fn bring_up(&self, interface: &str) -> Invocation {
        Invocation::new("ifconfig", &[interface, "up"])
    }

    fn bring_down(&self, interface: &str) -> Invocation {
        Invocation::new("ifconfig", &[interface, "down"])
    }

    fn destroy(&self, interface: &str) -> Invocation {
        Invocation::new("ifconfig", &[interface, "destroy"])
    }

    fn add_route(&self, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation {
        Self::route("add", interface, destination, gateway)
    }

    fn delete_route(&self, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation {
        Self::route("delete", interface, destination, gateway)
    }

    fn delete_default_route(&self) -> Invocation {
        Invocation::new("route", &["delete", "default"])
    }

    fn add_default_route(&self, gateway: &str) -> Invocation {
        Invocation::new("route", &["add", "default", gateway])
    }

    fn default_gateway_query(&self) -> Invocation {
        Invocation::new("route", &["-n", "get", "default"])
    }

    fn gateway_token(&self) -> &'static str {
        "gateway:"
    }

    fn route_table_query(&self) -> Invocation {
        Invocation::new("netstat", &["-rn"])
    }

    fn status_query(&self, interface: &str) -> Invocation {
        Invocation::new("ifconfig", &[interface])
    }
}

/// iproute2 syntax.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxCommands;

impl LinuxCommands {
    fn route(verb: &str, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation {
        let mut inv = Invocation::new("ip", &["route", verb, destination]);
        if let Some(gateway) = gateway {
            inv = inv.arg("via").arg(gateway);
        }
        inv.arg("dev").arg(interface)
    }
}

impl PlatformCommands for LinuxCommands {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn set_address(&self, interface: &str, address: Ipv4Addr, netmask: Ipv4Addr) -> Vec<Invocation> {
        let cidr = format!("{}/{}", address, prefix_len(netmask));
        vec![Invocation::new("ip", &["addr", "replace", &cidr, "dev", interface])]
    }

    fn set_mtu(&self, interface: &str, mtu: u32) -> Invocation {
        Invocation::new("ip", &["link", "set", "dev", interface, "mtu", &mtu.to_string()])
    }

    fn bring_up(&self, interface: &str) -> Invocation {
        Invocation::new("ip", &["link", "set", "dev", interface, "up"])
    }

    fn bring_down(&self, interface: &str) -> Invocation {
        Invocation::new("ip", &["link", "set", "dev", interface, "down"])
    }

    fn destroy(&self, interface: &str) -> Invocation {
        Invocation::new("ip", &["link", "delete", "dev", interface])
    }

    fn add_route(&self, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation {
        Self::route("add", interface, destination, gateway)
    }

    fn delete_route(&self, interface: &str, destination: &str, gateway: Option<&str>) -> Invocation {
        Self::route("del", interface, destination, gateway)
    }

    fn delete_default_route(&self) -> Invocation {
        Invocation::new("ip", &["route", "del", "default"])
    }

    fn add_default_route(&self, gateway: &str) -> Invocation {
        Invocation::new("ip", &["route", "add", "default", "via", gateway])
    }

    fn default_gateway_query(&self) -> Invocation {
        Invocation::new("ip", &["route", "show", "default"])
    }

    fn gateway_token(&self) -> &'static str {
        "via"
    }

    fn route_table_query(&self) -> Invocation {
        Invocation::new("ip", &["route", "show"])
    }

    fn status_query(&self, interface: &str) -> Invocation {
        Invocation::new("ip", &["addr", "show", "dev", interface])
    }
}

/// Pick the command syntax for the running OS.
pub fn detect_platform() -> Box<dyn PlatformCommands> {
    if cfg!(target_os = "linux") || cfg!(target_os = "android") {
        Box::new(LinuxCommands)
    } else {
        Box::new(BsdCommands)
    }
}
