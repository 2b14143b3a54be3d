use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::{InterfaceConfig, DEFAULT_INTERFACE_NAME};
use crate::error::ConfigError;
use crate::interception::DEFAULT_FALLBACK_GATEWAY;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tunwarden.conf";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MTU: u32 = 1500;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub interface_name: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub mtu: u32,
    pub bind_address: String,
    pub port: u16,
    pub backup_dir: PathBuf,
    pub fallback_gateway: Ipv4Addr,
    /// 0 disables the timeout.
    pub command_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interface_name: DEFAULT_INTERFACE_NAME.to_string(),
            address: Ipv4Addr::new(10, 0, 0, 1),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            mtu: DEFAULT_MTU,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            backup_dir: std::env::temp_dir(),
            fallback_gateway: DEFAULT_FALLBACK_GATEWAY,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("Invalid {}: {}", key, value)))
}

impl DaemonConfig {
    /// Load `path` (or `TUNWARDEN_CONFIG`, or the default path), then apply
    /// `TUNWARDEN_*` environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("TUNWARDEN_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let mut config = DaemonConfig::default();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    config.apply(key.trim(), value.trim())?;
                }
            }
        }

        // Allow environment variable overrides
        for key in [
            "interface_name",
            "address",
            "netmask",
            "mtu",
            "bind_address",
            "port",
            "backup_dir",
            "fallback_gateway",
            "command_timeout_secs",
            "log_filter",
        ] {
            let var = format!("TUNWARDEN_{}", key.to_uppercase());
            if let Ok(value) = std::env::var(&var) {
                config.apply(key, value.trim())?;
            }
        }

        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "interface_name" => self.interface_name = value.to_string(),
            "address" => self.address = parse(key, value)?,
            "netmask" => self.netmask = parse(key, value)?,
            "mtu" => self.mtu = parse(key, value)?,
            "bind_address" => self.bind_address = value.to_string(),
            "port" => self.port = parse(key, value)?,
            "backup_dir" => self.backup_dir = PathBuf::from(value),
            "fallback_gateway" => self.fallback_gateway = parse(key, value)?,
            "command_timeout_secs" => self.command_timeout_secs = parse(key, value)?,
            "log_filter" => self.log_filter = value.to_string(),
            _ => tracing::debug!("Ignoring unknown config key: {}", key),
        }
        Ok(())
    }

    pub fn interface_config(&self) -> InterfaceConfig {
        InterfaceConfig::new(&self.interface_name, self.mtu, self.address, self.netmask)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
