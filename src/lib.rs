//! Tunwarden - tunnel endpoint lifecycle manager
//!
//! Creates a TUN interface, runs a cancellable packet-read task that
//! classifies every packet, and reversibly rewrites the host routing table
//! to send traffic through the interface.

pub mod api;
pub mod classifier;
pub mod config;
pub mod device;
pub mod domain;
pub mod error;
pub mod interception;
pub mod manager;
pub mod reporter;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

pub use classifier::PacketClassifier;
pub use config::DaemonConfig;
pub use device::{DeviceFactory, SystemDeviceFactory, TunDevice};
pub use domain::{InterfaceConfig, InterfaceStatus, LifecycleState, PacketSummary};
pub use error::{ApiError, CommandError, ConfigError, TunnelError, TunnelResult};
pub use interception::RouteInterceptionController;
pub use manager::{InterfaceManager, ManagerBuilder};
pub use reporter::{ChannelReporter, LogReporter, PacketReporter};
pub use system::{CommandExecutor, ProcessExecutor, SystemCommandRunner};
