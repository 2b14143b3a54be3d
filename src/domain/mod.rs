//! Domain models for tunnel endpoint management.
//!
//! These types carry no OS or I/O concerns; the system, device and
//! manager modules build on them.

mod lifecycle;
mod packet;
mod status;

pub use lifecycle::{InterfaceConfig, LifecycleState, DEFAULT_INTERFACE_NAME};
pub use packet::{protocol_label, IpVersion, PacketSummary, Protocol};
pub use status::{InterfaceDetails, InterfaceStatus, LinkStatus, OsLinkInfo};
