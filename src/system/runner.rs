//! High-level network configuration on top of platform commands.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, warn};

use super::platform::{detect_platform, Invocation, PlatformCommands};
use super::{CommandExecutor, CommandOutput};
use crate::domain::{InterfaceDetails, LinkStatus};
use crate::error::CommandError;

/// Translates configuration intents into OS commands.
pub struct SystemCommandRunner {
    executor: Arc<dyn CommandExecutor>,
    platform: Box<dyn PlatformCommands>,
}

impl SystemCommandRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>, platform: Box<dyn PlatformCommands>) -> Self {
        Self { executor, platform }
    }

    /// Runner using the command syntax of the running OS.
    pub fn detect(executor: Arc<dyn CommandExecutor>) -> Self {
        Self::new(executor, detect_platform())
    }

    pub fn platform_name(&self) -> &'static str {
        self.platform.name()
    }

    fn exec(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let output = self.executor.run(invocation.program, &invocation.args)?;
        if output.success || !invocation.required {
            if !output.success {
                debug!("ignoring failure of `{}`: {}", invocation, output);
            }
            return Ok(output);
        }
        Err(CommandError::Failed {
            command: invocation.to_string(),
            output: output.output.trim().to_string(),
        })
    }

    /// Assign address, netmask and MTU, then bring the interface up.
    ///
    /// Not transactional: a failure part-way leaves the earlier steps
    /// applied and the caller decides whether to tear down.
    pub fn configure_interface(
        &self,
        name: &str,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
        mtu: u32,
    ) -> Result<(), CommandError> {
        self.set_address(name, address, netmask)?;
        self.set_mtu(name, mtu)?;
        self.bring_up(name)?;
        Ok(())
    }

    pub fn set_address(&self, name: &str, address: Ipv4Addr, netmask: Ipv4Addr) -> Result<(), CommandError> {
        for invocation in self.platform.set_address(name, address, netmask) {
            self.exec(&invocation)?;
        }
        Ok(())
    }

    pub fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), CommandError> {
        self.exec(&self.platform.set_mtu(name, mtu)).map(|_| ())
    }

    pub fn bring_up(&self, name: &str) -> Result<(), CommandError> {
        self.exec(&self.platform.bring_up(name)).map(|_| ())
    }

    pub fn bring_down(&self, name: &str) -> Result<(), CommandError> {
        self.exec(&self.platform.bring_down(name)).map(|_| ())
    }

    /// Bring the interface down and destroy it.
    ///
    /// The OS often removes the interface on its own once the endpoint
    /// handle is closed, so a failing command is only logged. Errors are
    /// returned only when a command could not be run at all.
    pub fn destroy_interface(&self, name: &str) -> Result<(), CommandError> {
        match self.exec(&self.platform.bring_down(name)) {
            Err(CommandError::Failed { output, .. }) => {
                debug!("could not bring {} down before destroy: {}", name, output);
            }
            Err(e) => return Err(e),
            Ok(_) => {}
        }

        match self.exec(&self.platform.destroy(name)) {
            Err(CommandError::Failed { output, .. }) => {
                warn!("could not destroy interface {}: {}", name, output);
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    /// Add a route. A route that is already present counts as added.
    pub fn add_route(&self, name: &str, destination: &str, gateway: Option<&str>) -> Result<(), CommandError> {
        match self.exec(&self.platform.add_route(name, destination, gateway)) {
            Err(CommandError::Failed { command, output }) if is_route_present(&output) => {
                debug!("`{}` reports an existing route: {}", command, output);
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    pub fn delete_route(&self, name: &str, destination: &str, gateway: Option<&str>) -> Result<(), CommandError> {
        self.exec(&self.platform.delete_route(name, destination, gateway)).map(|_| ())
    }

    pub fn delete_default_route(&self) -> Result<(), CommandError> {
        self.exec(&self.platform.delete_default_route()).map(|_| ())
    }

    pub fn add_default_route(&self, gateway: &str) -> Result<(), CommandError> {
        self.exec(&self.platform.add_default_route(gateway)).map(|_| ())
    }

    /// Current default gateway as printed by the routing table query.
    pub fn default_gateway(&self) -> Result<String, CommandError> {
        let output = self.exec(&self.platform.default_gateway_query())?;
        parse_gateway(&output.output, self.platform.gateway_token()).ok_or_else(|| {
            CommandError::Parse("could not find default gateway in route output".to_string())
        })
    }

    /// Raw routing-table dump.
    pub fn route_table(&self) -> Result<String, CommandError> {
        self.exec(&self.platform.route_table_query()).map(|out| out.output)
    }

    pub fn interface_status(&self, name: &str) -> Result<InterfaceDetails, CommandError> {
        let output = self.exec(&self.platform.status_query(name))?;
        Ok(parse_status_output(&output.output))
    }
}

/// Both iproute2 and the BSD routing socket report an existing route as EEXIST.
fn is_route_present(output: &str) -> bool {
    output.contains("File exists")
}

/// Find the field following `token` on the first line that has one.
pub fn parse_gateway(raw: &str, token: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let pos = fields.iter().position(|f| *f == token)?;
        fields.get(pos + 1).map(|gw| gw.to_string())
    })
}

fn field_after<'a>(fields: &[&'a str], key: &str) -> Option<&'a str> {
    let pos = fields.iter().position(|f| *f == key)?;
    fields.get(pos + 1).copied()
}

/// Extract ip, netmask, mtu and link status from interface-status text.
///
/// Tolerant by intent: formats differ between `ifconfig` flavours and
/// `ip addr`, so unknown lines are skipped and missing fields stay `None`.
pub fn parse_status_output(raw: &str) -> InterfaceDetails {
    let mut details = InterfaceDetails::default();

    for line in raw.lines() {
        let line = line.trim();
        let fields: Vec<&str> = line.split_whitespace().collect();

        if line.starts_with("inet ") && details.ip.is_none() {
            if let Some(addr) = fields.get(1) {
                match addr.split_once('/') {
                    Some((ip, prefix)) => {
                        details.ip = Some(ip.to_string());
                        if let Ok(bits) = prefix.parse::<u32>() {
                            if bits <= 32 {
                                let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
                                details.netmask = Some(Ipv4Addr::from(mask).to_string());
                            }
                        }
                    }
                    None => details.ip = Some(addr.to_string()),
                }
            }
        }

        if details.netmask.is_none() {
            if let Some(mask) = field_after(&fields, "netmask") {
                details.netmask = Some(mask.to_string());
            }
        }

        if details.mtu.is_none() {
            if let Some(mtu) = field_after(&fields, "mtu") {
                details.mtu = Some(mtu.to_string());
            }
        }

        if details.status.is_none() && !line.starts_with("inet") {
            if line.contains("UP") {
                details.status = Some(LinkStatus::Up);
            } else if line.contains("DOWN") {
                details.status = Some(LinkStatus::Down);
            }
        }
    }

    details
}
