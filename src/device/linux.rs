//! Linux TUN device via `/dev/net/tun`.

use std::ffi::CStr;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use libc::{c_char, c_short, c_void, IFF_NO_PI, IFF_TUN, O_CLOEXEC, O_RDWR};
use tracing::info;

use super::{poll_readable, TunDevice};

/// TUNSETIFF ioctl number.
const TUNSETIFF: libc::c_ulong = 0x400454ca;

/// Kernel interface name limit, including the trailing NUL.
const IFNAMSIZ: usize = 16;

#[repr(C)]
struct IfReq {
    ifr_name: [c_char; IFNAMSIZ],
    ifr_flags: c_short,
    _pad: [u8; 22],
}

/// Layer-3 TUN interface without packet information header.
pub struct LinuxTun {
    fd: OwnedFd,
    name: String,
}

impl LinuxTun {
    /// Allocate a TUN interface.
    ///
    /// The kernel may assign a different name than requested (for
    /// example when the request contains `%d`).
    pub fn open(requested_name: &str) -> io::Result<Self> {
        let raw = unsafe {
            libc::open(
                b"/dev/net/tun\0".as_ptr() as *const c_char,
                O_RDWR | O_CLOEXEC,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // Owned from here on so every early return closes it
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut ifr = IfReq {
            ifr_name: [0; IFNAMSIZ],
            ifr_flags: (IFF_TUN | IFF_NO_PI) as c_short,
            _pad: [0; 22],
        };
        for (i, byte) in requested_name.bytes().take(IFNAMSIZ - 1).enumerate() {
            ifr.ifr_name[i] = byte as c_char;
        }

        let rc = unsafe { libc::ioctl(fd.as_raw_fd(), TUNSETIFF as _, &mut ifr as *mut _ as *mut c_void) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let name = unsafe { CStr::from_ptr(ifr.ifr_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        info!("Created TUN device: {}", name);

        Ok(Self { fd, name })
    }
}

impl TunDevice for LinuxTun {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        if !poll_readable(self.fd.as_raw_fd(), timeout)? {
            return Ok(None);
        }

        let n = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr() as *mut c_void, buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) {
                return Ok(None);
            }
            return Err(err);
        }
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "tunnel device closed"));
        }
        Ok(Some(n as usize))
    }
}
