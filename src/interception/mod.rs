//! Host routing-table interception.
//!
//! The routing table is shared with every other process on the host, so
//! each change made here is recorded and paired with a best-effort
//! inverse. There is no transactional rollback from the OS.

mod controller;
mod snapshot;

pub use controller::{RouteInterceptionController, DEFAULT_FALLBACK_GATEWAY, SPLIT_DEFAULT_ROUTES, SUBNET_ROUTE};
pub use snapshot::{InstalledRoute, RouteSnapshot};
