//! Tunwarden daemon
//!
//! Serves the interface control API and tears the interface down on exit.

use tikv_jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tunwarden::api::{self, ApiState};
use tunwarden::{DaemonConfig, InterfaceManager, ProcessExecutor, SystemCommandRunner};

#[derive(Parser)]
#[command(name = "tunwardend")]
#[command(about = "Tunnel interface lifecycle daemon")]
struct Args {
    /// Config file (defaults to $TUNWARDEN_CONFIG or /etc/tunwarden.conf)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log: Option<PathBuf>,

    /// API port, overrides the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Expose the traffic interception endpoint
    #[arg(long = "unsafe")]
    unsafe_mode: bool,

    /// Create the interface at startup
    #[arg(long)]
    create: bool,

    /// Create and start the interface at startup
    #[arg(long)]
    start: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let _guard = init_logging(&config, args.log.as_deref())?;

    tracing::info!("Starting tunwardend");
    tracing::info!(
        "Interface {} {}/{} mtu {}",
        config.interface_name,
        config.address,
        config.netmask,
        config.mtu
    );

    let executor = Arc::new(ProcessExecutor::new().with_timeout(config.command_timeout()));
    let runner = SystemCommandRunner::detect(executor);
    tracing::info!("Using {} network commands", runner.platform_name());

    // Shutdown is driven by tokio signals below; both paths end in the same cleanup
    let manager = InterfaceManager::builder(config.interface_config())
        .runner(runner)
        .backup_dir(config.backup_dir.clone())
        .fallback_gateway(config.fallback_gateway)
        .signal_handling(false)
        .build();

    if args.create || args.start {
        let boot = manager.clone();
        let start = args.start;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let name = boot.create().context("Failed to create interface")?;
            tracing::info!("Interface {} created", name);
            if start {
                if let Err(e) = boot.start() {
                    boot.cleanup();
                    return Err(e).context("Failed to start interface");
                }
            }
            Ok(())
        })
        .await??;
    }

    let served = serve(&config, ApiState::new(manager.clone(), args.unsafe_mode)).await;

    // Cleanup runs whether serving ended by signal or by error
    tokio::task::spawn_blocking(move || manager.cleanup()).await?;
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Serve the control API until a termination signal arrives.
async fn serve(config: &DaemonConfig, state: ApiState) -> Result<()> {
    let app = api::create_router(state);

    let addr = config.listen_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Control API listening on {}", addr);

    let shutdown = Arc::new(Notify::new());
    let shutdown_clone = shutdown.clone();

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigquit = signal(SignalKind::quit()).context("Failed to install SIGQUIT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
            _ = sigquit.recv() => tracing::info!("Received SIGQUIT, shutting down"),
        }
        shutdown_clone.notify_one();
    });

    // ConnectInfo feeds the request logging middleware
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.notified().await;
    })
    .await?;
    Ok(())
}

/// Console logging plus an optional log file.
///
/// `RUST_LOG` overrides the configured filter.
fn init_logging(
    config: &DaemonConfig,
    log_file: Option<&std::path::Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, name));
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    if let Some(path) = log_file {
        tracing::info!("Logs are being written to: {}", path.display());
    }
    Ok(guard)
}
