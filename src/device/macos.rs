//! macOS utun device via the kernel control socket.

use std::ffi::CStr;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use libc::{c_char, c_int, c_void, sockaddr, sockaddr_ctl, socklen_t, AF_SYSTEM, CTLIOCGINFO, PF_SYSTEM, SOCK_DGRAM, SYSPROTO_CONTROL};
use tracing::info;

use super::{poll_readable, TunDevice};

#[repr(C)]
struct CtlInfo {
    ctl_id: u32,
    ctl_name: [c_char; 96],
}

const UTUN_CONTROL_NAME: &[u8] = b"com.apple.net.utun_control\0";

/// Socket option returning the interface name.
const UTUN_OPT_IFNAME: c_int = 2;

/// AF_SYS_CONTROL sub-family.
const AF_SYS_CONTROL: u16 = 2;

/// Every utun packet carries a 4-byte protocol family header.
const UTUN_HEADER_LEN: usize = 4;

/// macOS utun interface.
///
/// utun names cannot be chosen freely: `utunN` maps to control unit
/// `N + 1`, anything else lets the kernel pick the next free unit.
pub struct UtunDevice {
    fd: OwnedFd,
    name: String,
}

fn requested_unit(requested_name: &str) -> u32 {
    requested_name
        .strip_prefix("utun")
        .and_then(|n| n.parse::<u32>().ok())
        .map(|n| n + 1)
        .unwrap_or(0)
}

impl UtunDevice {
    pub fn open(requested_name: &str) -> io::Result<Self> {
        let raw = unsafe { libc::socket(PF_SYSTEM, SOCK_DGRAM, SYSPROTO_CONTROL) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut ctl_info = CtlInfo {
            ctl_id: 0,
            ctl_name: [0; 96],
        };
        for (i, &byte) in UTUN_CONTROL_NAME.iter().enumerate() {
            ctl_info.ctl_name[i] = byte as c_char;
        }

        if unsafe { libc::ioctl(fd.as_raw_fd(), CTLIOCGINFO, &mut ctl_info as *mut _ as *mut c_void) } < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut addr: sockaddr_ctl = unsafe { std::mem::zeroed() };
        addr.sc_len = std::mem::size_of::<sockaddr_ctl>() as u8;
        addr.sc_family = AF_SYSTEM as u8;
        addr.ss_sysaddr = AF_SYS_CONTROL;
        addr.sc_id = ctl_info.ctl_id;
        addr.sc_unit = requested_unit(requested_name);

        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &addr as *const _ as *const sockaddr,
                std::mem::size_of::<sockaddr_ctl>() as socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut name_buf = [0u8; 32];
        let mut name_len = name_buf.len() as socklen_t;
        let rc = unsafe {
            libc::getsockopt(
                fd.as_raw_fd(),
                SYSPROTO_CONTROL,
                UTUN_OPT_IFNAME,
                name_buf.as_mut_ptr() as *mut c_void,
                &mut name_len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let name = CStr::from_bytes_until_nul(&name_buf)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid interface name"))?
            .to_string_lossy()
            .into_owned();

        info!("Created utun device: {}", name);

        Ok(Self { fd, name })
    }
}

impl TunDevice for UtunDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        if !poll_readable(self.fd.as_raw_fd(), timeout)? {
            return Ok(None);
        }

        let mut frame = vec![0u8; buf.len() + UTUN_HEADER_LEN];
        let n = unsafe { libc::read(self.fd.as_raw_fd(), frame.as_mut_ptr() as *mut c_void, frame.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) {
                return Ok(None);
            }
            return Err(err);
        }

        let n = n as usize;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "tunnel device closed"));
        }
        if n <= UTUN_HEADER_LEN {
            return Ok(None);
        }

        let payload = n - UTUN_HEADER_LEN;
        buf[..payload].copy_from_slice(&frame[UTUN_HEADER_LEN..n]);
        Ok(Some(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_unit() {
        assert_eq!(requested_unit("utun9"), 10);
        assert_eq!(requested_unit("utun0"), 1);
        assert_eq!(requested_unit("tun-test"), 0);
        assert_eq!(requested_unit("utunx"), 0);
    }
}
