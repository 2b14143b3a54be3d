//! In-process fakes for the OS boundary.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::device::{DeviceFactory, TunDevice};
use crate::domain::PacketSummary;
use crate::error::CommandError;
use crate::reporter::PacketReporter;
use crate::system::{CommandExecutor, CommandOutput};

const SIMULATED_FAILURE: &str = "simulated failure";

enum Failure {
    Always(String),
    Once(String),
}

/// Records every command line and answers from canned responses.
///
/// Unknown commands succeed with empty output.
#[derive(Default)]
pub struct FakeExecutor {
    log: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, Failure>>,
    responses: Mutex<HashMap<String, String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, command: &str) {
        self.fail_with(command, SIMULATED_FAILURE);
    }

    /// Fail `command` with the given diagnostic output.
    pub fn fail_with(&self, command: &str, output: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(command.to_string(), Failure::Always(output.to_string()));
    }

    pub fn fail_once(&self, command: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(command.to_string(), Failure::Once(SIMULATED_FAILURE.to_string()));
    }

    /// Answer route changes on a point-to-point `interface` like the Linux kernel.
    ///
    /// The uplink `gateway` is off-link for the interface, so every
    /// gateway-qualified route is rejected, and the connected route for the
    /// interface subnet already exists once the address is assigned.
    pub fn kernel_routes(&self, interface: &str, gateway: &str) {
        for destination in ["10.0.0.0/24", "default", "0.0.0.0/1", "128.0.0.0/1"] {
            self.fail_with(
                &format!("ip route add {destination} via {gateway} dev {interface}"),
                "Error: Nexthop has invalid gateway.",
            );
        }
        self.fail_with(
            &format!("ip route add 10.0.0.0/24 dev {interface}"),
            "RTNETLINK answers: File exists",
        );
    }

    pub fn succeed(&self, command: &str) {
        self.failures.lock().unwrap().remove(command);
    }

    pub fn respond(&self, command: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

impl CommandExecutor for FakeExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        self.log.lock().unwrap().push(line.clone());

        let mut failures = self.failures.lock().unwrap();
        match failures.get(&line) {
            Some(Failure::Always(output)) => return Ok(CommandOutput::failed(2, output.clone())),
            Some(Failure::Once(_)) => {
                if let Some(Failure::Once(output)) = failures.remove(&line) {
                    return Ok(CommandOutput::failed(2, output));
                }
            }
            None => {}
        }

        let output = self.responses.lock().unwrap().get(&line).cloned().unwrap_or_default();
        Ok(CommandOutput::ok(output))
    }
}

/// Tunnel endpoint fed through a channel.
pub struct FakeDevice {
    name: String,
    rx: Mutex<Receiver<Vec<u8>>>,
}

impl TunDevice for FakeDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<usize>> {
        let rx = self.rx.lock().unwrap();
        match rx.recv_timeout(timeout) {
            Ok(packet) => {
                let n = packet.len().min(buf.len());
                buf[..n].copy_from_slice(&packet[..n]);
                Ok(Some(n))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "fake device closed"))
            }
        }
    }
}

/// Hands out `FakeDevice`s and keeps a way to inject packets into them.
#[derive(Default)]
pub struct FakeDeviceFactory {
    assigned_name: Option<String>,
    fail_open: bool,
    injector: Mutex<Option<Sender<Vec<u8>>>>,
    devices: Mutex<Vec<Weak<FakeDevice>>>,
}

impl FakeDeviceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name` instead of the requested name.
    pub fn assigning(name: &str) -> Self {
        Self {
            assigned_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Send a packet to the most recently opened device.
    pub fn inject(&self, packet: Vec<u8>) -> bool {
        match self.injector.lock().unwrap().as_ref() {
            Some(tx) => tx.send(packet).is_ok(),
            None => false,
        }
    }

    /// Devices still referenced by someone.
    pub fn live_devices(&self) -> usize {
        self.devices
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.strong_count() > 0)
            .count()
    }

    pub fn opened(&self) -> usize {
        self.devices.lock().unwrap().len()
    }
}

impl DeviceFactory for FakeDeviceFactory {
    fn open(&self, requested_name: &str) -> io::Result<Arc<dyn TunDevice>> {
        if self.fail_open {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "operation not permitted"));
        }
        let (tx, rx) = mpsc::channel();
        let device = Arc::new(FakeDevice {
            name: self
                .assigned_name
                .clone()
                .unwrap_or_else(|| requested_name.to_string()),
            rx: Mutex::new(rx),
        });
        *self.injector.lock().unwrap() = Some(tx);
        self.devices.lock().unwrap().push(Arc::downgrade(&device));
        Ok(device)
    }
}

/// Keeps every reported summary.
#[derive(Default)]
pub struct CollectingReporter {
    packets: Mutex<Vec<PacketSummary>>,
    starts: Mutex<Vec<String>>,
    stops: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> Vec<PacketSummary> {
        self.packets.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn stops(&self) -> usize {
        self.stops.lock().unwrap().len()
    }

    /// Poll until `count` packets arrived or `timeout` passed.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.packets.lock().unwrap().len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.packets.lock().unwrap().len() >= count
    }
}

impl PacketReporter for CollectingReporter {
    fn report(&self, summary: &PacketSummary) {
        self.packets.lock().unwrap().push(summary.clone());
    }

    fn on_start(&self, interface: &str) {
        self.starts.lock().unwrap().push(interface.to_string());
    }

    fn on_stop(&self, interface: &str) {
        self.stops.lock().unwrap().push(interface.to_string());
    }
}

/// Minimal IPv4 header with the given addresses and protocol.
pub fn ipv4_packet(source: [u8; 4], destination: [u8; 4], protocol: u8) -> Vec<u8> {
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[3] = 20;
    packet[8] = 64;
    packet[9] = protocol;
    packet[12..16].copy_from_slice(&source);
    packet[16..20].copy_from_slice(&destination);
    packet
}
