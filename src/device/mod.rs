//! Tunnel endpoint handles.
//!
//! `TunDevice` is the live OS resource the lifecycle manager owns;
//! `DeviceFactory` allocates one. Reads take a timeout so the packet-read
//! task can notice a stop request without the handle being closed under it.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
pub use linux::LinuxTun;
#[cfg(target_os = "macos")]
pub use macos::UtunDevice;

use std::io;
use std::sync::Arc;
use std::time::Duration;

/// An open tunnel endpoint delivering raw IP packets.
pub trait TunDevice: Send + Sync {
    /// Interface name assigned by the OS.
    fn name(&self) -> &str;

    /// Read one packet, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>>;
}

/// Allocates tunnel endpoints.
pub trait DeviceFactory: Send + Sync {
    fn open(&self, requested_name: &str) -> io::Result<Arc<dyn TunDevice>>;
}

/// Factory for the running OS's native TUN driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDeviceFactory;

impl DeviceFactory for SystemDeviceFactory {
    #[cfg(target_os = "linux")]
    fn open(&self, requested_name: &str) -> io::Result<Arc<dyn TunDevice>> {
        Ok(Arc::new(LinuxTun::open(requested_name)?))
    }

    #[cfg(target_os = "macos")]
    fn open(&self, requested_name: &str) -> io::Result<Arc<dyn TunDevice>> {
        Ok(Arc::new(UtunDevice::open(requested_name)?))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn open(&self, requested_name: &str) -> io::Result<Arc<dyn TunDevice>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no TUN driver for this platform (requested {requested_name})"),
        ))
    }
}

/// Wait until `fd` is readable or `timeout` elapses.
#[cfg(any(target_os = "linux", target_os = "macos"))]
pub(crate) fn poll_readable(fd: std::os::fd::RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    if rc == 0 {
        return Ok(false);
    }
    if pfd.revents & libc::POLLIN == 0
        && pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0
    {
        return Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "tunnel device closed",
        ));
    }
    Ok(true)
}
