//! Background packet-read task.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::classifier::PacketClassifier;
use crate::device::TunDevice;
use crate::reporter::PacketReporter;

/// Smallest read buffer; larger MTUs get a buffer of their own size.
const MIN_BUFFER_SIZE: usize = 2048;

/// Handle to a running packet-read task.
///
/// The task owns a clone of the device handle and polls it with a short
/// timeout, so a stop request is honored within one timeout period and
/// the handle is never closed underneath a pending read.
pub(crate) struct PacketTask {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PacketTask {
    pub(crate) fn spawn(
        device: Arc<dyn TunDevice>,
        reporter: Arc<dyn PacketReporter>,
        mtu: u32,
        read_timeout: Duration,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let buffer_size = (mtu as usize).max(MIN_BUFFER_SIZE);

        let handle = thread::Builder::new()
            .name(format!("packets-{}", device.name()))
            .spawn(move || read_loop(device, reporter, flag, buffer_size, read_timeout))?;

        Ok(Self { running, handle })
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the task and wait for it to exit.
    pub(crate) fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        if self.handle.join().is_err() {
            warn!("Packet-read task panicked");
        }
    }
}

fn read_loop(
    device: Arc<dyn TunDevice>,
    reporter: Arc<dyn PacketReporter>,
    running: Arc<AtomicBool>,
    buffer_size: usize,
    read_timeout: Duration,
) {
    let classifier = PacketClassifier::new();
    let mut buf = vec![0u8; buffer_size];
    let name = device.name().to_string();

    reporter.on_start(&name);

    while running.load(Ordering::SeqCst) {
        match device.read_timeout(&mut buf, read_timeout) {
            Ok(Some(n)) => match classifier.classify(&buf[..n]) {
                Some(summary) => reporter.report(&summary),
                None => debug!("Dropped {} byte packet on {}", n, name),
            },
            Ok(None) => continue,
            Err(e) if is_closed(&e) => {
                info!("Interface {} was closed, stopping packet processing", name);
                break;
            }
            Err(e) => {
                warn!("Error reading from interface {}: {}", name, e);
                thread::sleep(read_timeout);
            }
        }
    }

    reporter.on_stop(&name);
}

fn is_closed(err: &io::Error) -> bool {
    if matches!(err.kind(), io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe) {
        return true;
    }
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::EBADF) {
        return true;
    }
    false
}
