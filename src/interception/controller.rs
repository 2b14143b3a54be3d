//! Subnet routing and full-traffic interception.

use std::fs;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::snapshot::{InstalledRoute, RouteSnapshot};
use crate::error::{CommandError, TunnelError, TunnelResult};
use crate::system::SystemCommandRunner;

/// Subnet routed through the interface while it is running.
pub const SUBNET_ROUTE: &str = "10.0.0.0/24";

/// Two half-space routes covering the whole IPv4 space.
///
/// More specific than `default`, so they win over any default route
/// reinstalled by another process while interception is active.
pub const SPLIT_DEFAULT_ROUTES: [&str; 2] = ["0.0.0.0/1", "128.0.0.0/1"];

/// Gateway used for default-route restoration when the recorded one is unusable.
pub const DEFAULT_FALLBACK_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// Owns every route change made on behalf of one interface.
///
/// The subnet route and full interception are independent route sets:
/// stopping the interface removes the former, only `restore` undoes the
/// latter.
pub struct RouteInterceptionController {
    runner: Arc<SystemCommandRunner>,
    backup_dir: PathBuf,
    fallback_gateway: Ipv4Addr,
    subnet_route: Option<InstalledRoute>,
    snapshot: Option<RouteSnapshot>,
}

impl RouteInterceptionController {
    pub fn new(runner: Arc<SystemCommandRunner>) -> Self {
        Self {
            runner,
            backup_dir: std::env::temp_dir(),
            fallback_gateway: DEFAULT_FALLBACK_GATEWAY,
            subnet_route: None,
            snapshot: None,
        }
    }

    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn with_fallback_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.fallback_gateway = gateway;
        self
    }

    pub fn is_intercepting(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn subnet_route(&self) -> Option<&InstalledRoute> {
        self.subnet_route.as_ref()
    }

    pub fn snapshot(&self) -> Option<&RouteSnapshot> {
        self.snapshot.as_ref()
    }

    /// Route the interface subnet through `interface`.
    ///
    /// Tries with the current default gateway first, then without one.
    /// Only the final failure is an error.
    pub fn install_subnet_route(&mut self, interface: &str) -> TunnelResult<()> {
        if let Some(route) = &self.subnet_route {
            debug!("subnet route already installed: {}", route);
            return Ok(());
        }

        let gateway = match self.runner.default_gateway() {
            Ok(gw) => Some(gw),
            Err(e) => {
                warn!("Could not discover default gateway, routing subnet without one: {}", e);
                None
            }
        };

        let route = self
            .add_interface_route(interface, SUBNET_ROUTE, gateway.as_deref())
            .map_err(|e| TunnelError::RouteApply(e.to_string()))?;
        info!("Added route {}", route);
        self.subnet_route = Some(route);
        Ok(())
    }

    /// Add `destination` through `interface`, via `gateway` when given.
    ///
    /// A point-to-point interface cannot reach a gateway that lives on the
    /// uplink, so a rejected gateway route is retried without one. Returns
    /// the form that was installed.
    fn add_interface_route(
        &self,
        interface: &str,
        destination: &str,
        gateway: Option<&str>,
    ) -> Result<InstalledRoute, CommandError> {
        if let Some(gw) = gateway {
            match self.runner.add_route(interface, destination, Some(gw)) {
                Ok(()) => return Ok(InstalledRoute::new(interface, destination, Some(gw))),
                Err(e) => debug!("Gateway route rejected, retrying without gateway: {}", e),
            }
        }
        self.runner.add_route(interface, destination, None)?;
        Ok(InstalledRoute::new(interface, destination, None))
    }

    /// Remove the subnet route if one was installed. Failures are warnings.
    pub fn remove_subnet_route(&mut self) {
        let Some(route) = self.subnet_route.take() else {
            return;
        };

        if self.runner.delete_route(&route.interface, &route.destination, None).is_ok() {
            info!("Removed route {}", route);
            return;
        }

        let gateway = route
            .gateway
            .clone()
            .or_else(|| self.runner.default_gateway().ok());
        match gateway {
            Some(gw) => {
                if let Err(e) = self.runner.delete_route(&route.interface, &route.destination, Some(&gw)) {
                    warn!("Failed to remove route {}: {}", route, e);
                } else {
                    info!("Removed route {}", route);
                }
            }
            None => warn!("Failed to remove route {}", route),
        }
    }

    /// Redirect all IPv4 traffic through `interface`.
    ///
    /// Backs up the routing table, swaps the default route and adds the
    /// split-default routes. If the new default route cannot be installed
    /// the original one is put back before returning the error. A failed
    /// split route is only a warning.
    pub fn intercept_all(&mut self, interface: &str) -> TunnelResult<()> {
        if self.snapshot.is_some() {
            info!("Traffic is already intercepted through {}", interface);
            return Ok(());
        }

        info!("Setting up traffic interception for {}", interface);

        let gateway = self
            .runner
            .default_gateway()
            .map_err(|e| TunnelError::GatewayDiscovery(e.to_string()))?;
        let table = self
            .runner
            .route_table()
            .map_err(|e| TunnelError::RouteBackup(e.to_string()))?;

        let backup_path = RouteSnapshot::backup_path_for(&self.backup_dir, interface);
        fs::create_dir_all(&self.backup_dir)
            .and_then(|_| fs::write(&backup_path, &table))
            .map_err(|e| TunnelError::RouteBackup(format!("{}: {}", backup_path.display(), e)))?;
        debug!("Backed up routing table to {}", backup_path.display());

        let mut snapshot = RouteSnapshot::new(interface, &gateway, table, backup_path);

        match self.runner.delete_default_route() {
            Ok(()) => snapshot.mark_default_deleted(),
            Err(e) => debug!("No default route removed (might not exist): {}", e),
        }

        match self.add_interface_route(interface, "default", Some(&gateway)) {
            Ok(route) => snapshot.record(route),
            Err(e) => {
                if snapshot.deleted_default() {
                    if let Err(undo) = self.runner.add_default_route(&gateway) {
                        warn!("Failed to reinstate default route via {}: {}", gateway, undo);
                    }
                }
                let _ = fs::remove_file(snapshot.backup_path());
                return Err(TunnelError::RouteApply(e.to_string()));
            }
        }

        for destination in SPLIT_DEFAULT_ROUTES {
            match self.add_interface_route(interface, destination, Some(&gateway)) {
                Ok(route) => snapshot.record(route),
                Err(e) => warn!("Failed to add route {}: {}", destination, e),
            }
        }

        info!(
            "Intercepting all traffic through {} ({} routes installed)",
            interface,
            snapshot.installed().len()
        );
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Undo every recorded route change. Never fails; problems are warnings.
    ///
    /// The backup file is read back for diagnostics only. Its entries are
    /// not replayed; the default route is reinstalled instead.
    pub fn restore(&mut self) {
        self.remove_subnet_route();

        let Some(snapshot) = self.snapshot.take() else {
            debug!("No interception snapshot to restore");
            return;
        };

        info!("Restoring original routes for {}", snapshot.interface());

        for route in snapshot.installed().iter().rev() {
            if let Err(e) = self
                .runner
                .delete_route(&route.interface, &route.destination, route.gateway.as_deref())
            {
                warn!("Failed to remove route {}: {}", route, e);
            }
        }

        let dump = match fs::read_to_string(snapshot.backup_path()) {
            Ok(dump) => dump,
            Err(e) => {
                warn!(
                    "Could not read route backup {}: {}",
                    snapshot.backup_path().display(),
                    e
                );
                snapshot.table_dump().to_string()
            }
        };
        debug!("Original routing table had {} lines", dump.lines().count());

        self.reinstall_default_route(snapshot.gateway());

        if let Err(e) = fs::remove_file(snapshot.backup_path()) {
            debug!("Could not remove route backup {}: {}", snapshot.backup_path().display(), e);
        }
        info!("Original routes restored");
    }

    fn reinstall_default_route(&self, gateway: &str) {
        let fallback = self.fallback_gateway.to_string();
        let primary = if gateway.parse::<Ipv4Addr>().is_ok() {
            gateway
        } else {
            fallback.as_str()
        };

        match self.runner.add_default_route(primary) {
            Ok(()) => info!("Restored default route via {}", primary),
            Err(e) if primary != fallback => {
                warn!("Failed to restore default route via {}: {}", primary, e);
                if let Err(e) = self.runner.add_default_route(&fallback) {
                    warn!("Failed to restore default route via fallback {}: {}", fallback, e);
                }
            }
            Err(e) => warn!("Failed to restore default route via {}: {}", primary, e),
        }
    }
}
