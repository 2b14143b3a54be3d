//! Route records kept for reverting interception.

use std::fmt;
use std::path::{Path, PathBuf};

/// A route this process added to the host routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRoute {
    pub interface: String,
    pub destination: String,
    pub gateway: Option<String>,
}

impl InstalledRoute {
    pub fn new(interface: &str, destination: &str, gateway: Option<&str>) -> Self {
        Self {
            interface: interface.to_string(),
            destination: destination.to_string(),
            gateway: gateway.map(str::to_string),
        }
    }
}

impl fmt::Display for InstalledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.gateway {
            Some(gw) => write!(f, "{} via {} dev {}", self.destination, gw, self.interface),
            None => write!(f, "{} dev {}", self.destination, self.interface),
        }
    }
}

/// Routing state captured before full-traffic interception.
///
/// Holds the discovered default gateway, the raw table dump (also
/// persisted to `backup_path`) and every route installed during the
/// episode. Consumed by restoration whether or not it succeeds.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    interface: String,
    gateway: String,
    table_dump: String,
    backup_path: PathBuf,
    deleted_default: bool,
    installed: Vec<InstalledRoute>,
}

impl RouteSnapshot {
    pub fn new(interface: &str, gateway: &str, table_dump: String, backup_path: PathBuf) -> Self {
        Self {
            interface: interface.to_string(),
            gateway: gateway.to_string(),
            table_dump,
            backup_path,
            deleted_default: false,
            installed: Vec::new(),
        }
    }

    /// Backup file location for an interface's routing-table dump.
    pub fn backup_path_for(dir: &Path, interface: &str) -> PathBuf {
        dir.join(format!("original_routes_{interface}.txt"))
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn table_dump(&self) -> &str {
        &self.table_dump
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn deleted_default(&self) -> bool {
        self.deleted_default
    }

    pub(crate) fn mark_default_deleted(&mut self) {
        self.deleted_default = true;
    }

    pub fn installed(&self) -> &[InstalledRoute] {
        &self.installed
    }

    pub(crate) fn record(&mut self, route: InstalledRoute) {
        self.installed.push(route);
    }
}
