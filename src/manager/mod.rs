//! Tunnel endpoint lifecycle.
//!
//! `InterfaceManager` owns one endpoint from creation to teardown: the OS
//! handle, the packet-read task and every route installed for it. All
//! operations serialize on one lock; the packet-read task never takes it.

mod packet_loop;
mod signals;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::device::{DeviceFactory, SystemDeviceFactory, TunDevice};
use crate::domain::{InterfaceConfig, InterfaceDetails, InterfaceStatus, LifecycleState};
use crate::error::{TunnelError, TunnelResult};
use crate::interception::{RouteInterceptionController, DEFAULT_FALLBACK_GATEWAY};
use crate::reporter::{LogReporter, PacketReporter};
use crate::system::{link_info, ProcessExecutor, SystemCommandRunner};

use packet_loop::PacketTask;

/// Default wait per read before the stop flag is checked again.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Builder for `InterfaceManager`.
pub struct ManagerBuilder {
    config: InterfaceConfig,
    runner: Option<SystemCommandRunner>,
    factory: Arc<dyn DeviceFactory>,
    reporter: Arc<dyn PacketReporter>,
    backup_dir: PathBuf,
    fallback_gateway: Ipv4Addr,
    signal_handling: bool,
    read_timeout: Duration,
}

impl ManagerBuilder {
    fn new(config: InterfaceConfig) -> Self {
        Self {
            config,
            runner: None,
            factory: Arc::new(SystemDeviceFactory),
            reporter: Arc::new(LogReporter::new()),
            backup_dir: std::env::temp_dir(),
            fallback_gateway: DEFAULT_FALLBACK_GATEWAY,
            signal_handling: true,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn runner(mut self, runner: SystemCommandRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn device_factory(mut self, factory: Arc<dyn DeviceFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn PacketReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Directory for routing-table backups.
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    pub fn fallback_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.fallback_gateway = gateway;
        self
    }

    /// Run `cleanup` on SIGINT/SIGTERM/SIGHUP and exit. Enabled by default.
    pub fn signal_handling(mut self, enabled: bool) -> Self {
        self.signal_handling = enabled;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn build(self) -> InterfaceManager {
        let runner = Arc::new(
            self.runner
                .unwrap_or_else(|| SystemCommandRunner::detect(Arc::new(ProcessExecutor::new()))),
        );
        let routes = RouteInterceptionController::new(runner.clone())
            .with_backup_dir(self.backup_dir)
            .with_fallback_gateway(self.fallback_gateway);

        InterfaceManager {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    config: self.config,
                    state: LifecycleState::Uninitialized,
                    device: None,
                    task: None,
                    routes,
                    owns_interface: false,
                }),
                runner,
                factory: self.factory,
                reporter: self.reporter,
                signal_handling: self.signal_handling,
                signals_installed: AtomicBool::new(false),
                read_timeout: self.read_timeout,
            }),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    runner: Arc<SystemCommandRunner>,
    factory: Arc<dyn DeviceFactory>,
    reporter: Arc<dyn PacketReporter>,
    signal_handling: bool,
    signals_installed: AtomicBool,
    read_timeout: Duration,
}

struct Inner {
    config: InterfaceConfig,
    state: LifecycleState,
    device: Option<Arc<dyn TunDevice>>,
    task: Option<PacketTask>,
    routes: RouteInterceptionController,
    /// Set while an interface created by this manager may still exist.
    owns_interface: bool,
}

impl Inner {
    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Waiting for packet-read task on {}", self.config.name());
            task.stop();
        }
    }

    fn release(&mut self) {
        if self.state == LifecycleState::Running {
            self.routes.remove_subnet_route();
        }
        self.stop_task();
        if self.device.take().is_some() {
            info!("Closed tunnel endpoint {}", self.config.name());
        }
        self.state = LifecycleState::Closed;
    }
}

/// Lifecycle manager for one tunnel endpoint.
///
/// Cloning yields another handle to the same endpoint.
#[derive(Clone)]
pub struct InterfaceManager {
    shared: Arc<Shared>,
}

impl InterfaceManager {
    pub fn builder(config: InterfaceConfig) -> ManagerBuilder {
        ManagerBuilder::new(config)
    }

    /// Manager for the native TUN driver and OS commands.
    pub fn new(config: InterfaceConfig) -> Self {
        Self::builder(config).build()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> InterfaceConfig {
        self.lock().config.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Create and configure the endpoint with the stored configuration.
    ///
    /// Returns the name the OS assigned. On configuration failure the
    /// endpoint is closed before the error is returned.
    pub fn create(&self) -> TunnelResult<String> {
        let mut inner = self.lock();
        self.create_locked(&mut inner)
    }

    /// Replace the stored configuration, then `create`.
    pub fn create_with(&self, config: InterfaceConfig) -> TunnelResult<String> {
        let mut inner = self.lock();
        if inner.device.is_some() {
            return Err(TunnelError::AlreadyCreated(inner.config.name().to_string()));
        }
        inner.config = config;
        self.create_locked(&mut inner)
    }

    fn create_locked(&self, inner: &mut Inner) -> TunnelResult<String> {
        if inner.device.is_some() {
            return Err(TunnelError::AlreadyCreated(inner.config.name().to_string()));
        }

        let requested = inner.config.requested_name().to_string();
        let device = self
            .shared
            .factory
            .open(&requested)
            .map_err(|e| TunnelError::Creation(e.to_string()))?;

        let actual = device.name().to_string();
        info!("Requested interface name: {}, actual: {}", requested, actual);
        if actual != requested {
            info!("System assigned different name than requested: {}", actual);
        }

        let config = &inner.config;
        if let Err(e) = self
            .shared
            .runner
            .configure_interface(&actual, config.address, config.netmask, config.mtu)
        {
            drop(device);
            inner.config.clear_effective_name();
            return Err(TunnelError::Configuration(e.to_string()));
        }

        inner.config.set_effective_name(&actual);
        inner.device = Some(device);
        inner.owns_interface = true;
        inner.state = LifecycleState::Created;
        info!(
            "Interface {} configured with {}/{} mtu {}",
            actual, inner.config.address, inner.config.netmask, inner.config.mtu
        );

        self.install_signal_handler();
        Ok(actual)
    }

    fn install_signal_handler(&self) {
        if !self.shared.signal_handling || self.shared.signals_installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let weak = Arc::downgrade(&self.shared);
        signals::install_cleanup(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                InterfaceManager { shared }.cleanup();
            }
        }));
        debug!("Signal cleanup installed");
    }

    /// Route the interface subnet and start the packet-read task.
    pub fn start(&self) -> TunnelResult<()> {
        let mut inner = self.lock();
        if inner.state == LifecycleState::Running {
            return Err(TunnelError::AlreadyRunning);
        }
        let device = inner.device.clone().ok_or(TunnelError::NotCreated)?;
        let name = inner.config.name().to_string();

        inner.routes.install_subnet_route(&name)?;

        let task = PacketTask::spawn(
            device,
            self.shared.reporter.clone(),
            inner.config.mtu,
            self.shared.read_timeout,
        );
        match task {
            Ok(task) => inner.task = Some(task),
            Err(e) => {
                inner.routes.remove_subnet_route();
                return Err(TunnelError::TaskSpawn(e));
            }
        }

        inner.state = LifecycleState::Running;
        info!("Interface {} started", name);
        Ok(())
    }

    /// Remove the subnet route and stop the packet-read task.
    ///
    /// Blocks until the task has exited.
    pub fn stop(&self) -> TunnelResult<()> {
        let mut inner = self.lock();
        if inner.state != LifecycleState::Running {
            return Err(TunnelError::NotRunning);
        }

        inner.routes.remove_subnet_route();
        inner.stop_task();
        inner.state = LifecycleState::Stopped;
        info!("Interface {} stopped", inner.config.name());
        Ok(())
    }

    /// Stop the packet-read task if running and release the endpoint handle.
    pub fn close(&self) {
        let mut inner = self.lock();
        info!("Closing interface {}", inner.config.name());
        inner.release();
    }

    /// Tear everything down: routes, packet task, handle and interface.
    ///
    /// Never fails and is safe to call repeatedly or concurrently.
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        let name = inner.config.name().to_string();
        info!("Performing complete cleanup for interface {}", name);

        inner.routes.restore();
        inner.release();

        if inner.owns_interface {
            if let Err(e) = self.shared.runner.destroy_interface(&name) {
                warn!("Failed to delete interface {}: {}", name, e);
            }
            inner.owns_interface = false;
        }

        inner.config.clear_effective_name();
        inner.state = LifecycleState::Uninitialized;
        info!("Cleanup completed for interface {}", name);
    }

    /// Send all IPv4 traffic through the interface.
    pub fn intercept_all_traffic(&self) -> TunnelResult<()> {
        let mut inner = self.lock();
        if inner.device.is_none() {
            return Err(TunnelError::NotCreated);
        }
        let name = inner.config.name().to_string();
        inner.routes.intercept_all(&name)
    }

    /// Revert every route change recorded by this manager.
    pub fn restore_original_routes(&self) {
        self.lock().routes.restore();
    }

    pub fn status(&self) -> InterfaceStatus {
        let inner = self.lock();
        let config = &inner.config;
        let handle_active = inner.device.is_some();

        InterfaceStatus {
            name: config.name().to_string(),
            requested_name: config.requested_name().to_string(),
            mtu: config.mtu,
            address: config.address.to_string(),
            netmask: config.netmask.to_string(),
            state: inner.state,
            handle_active,
            running: inner.state == LifecycleState::Running
                && inner.task.as_ref().is_some_and(|t| !t.is_finished()),
            name_mismatch: config.name_mismatch(),
            intercepting: inner.routes.is_intercepting(),
            link: if handle_active { link_info(config.name()) } else { None },
            requested_name_link: if config.name_mismatch() {
                link_info(config.requested_name())
            } else {
                None
            },
        }
    }

    /// Address, netmask, MTU and link status as reported by the OS.
    pub fn interface_details(&self) -> Option<InterfaceDetails> {
        let inner = self.lock();
        inner.device.as_ref()?;
        let name = inner.config.name();
        match self.shared.runner.interface_status(name) {
            Ok(details) => Some(details),
            Err(e) => {
                warn!("Failed to query interface {}: {}", name, e);
                None
            }
        }
    }
}
