//! Process-wide termination handling.
//!
//! The OS handler is registered once per process; the cleanup it runs is
//! replaced by each manager that enables signal handling.
//!
//! `ctrlc` covers SIGINT, SIGTERM and SIGHUP. SIGQUIT keeps its default
//! action here; embedders that need it (the daemon does) disable this
//! handler and call `InterfaceManager::cleanup` from their own.

use std::sync::{Mutex, OnceLock};

use tracing::{info, warn};

type CleanupHook = Box<dyn Fn() + Send>;

static CLEANUP: Mutex<Option<CleanupHook>> = Mutex::new(None);
static HANDLER: OnceLock<bool> = OnceLock::new();

/// Run `hook` and exit with status 0 on SIGINT, SIGTERM or SIGHUP.
pub(crate) fn install_cleanup(hook: CleanupHook) {
    match CLEANUP.lock() {
        Ok(mut slot) => *slot = Some(hook),
        Err(_) => {
            warn!("Cleanup hook lock poisoned, signal cleanup not installed");
            return;
        }
    }

    HANDLER.get_or_init(|| match ctrlc::set_handler(on_signal) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to install signal handler: {}", e);
            false
        }
    });
}

fn on_signal() {
    info!("Received termination signal, shutting down gracefully...");

    let hook = CLEANUP.lock().ok().and_then(|mut slot| slot.take());
    if let Some(hook) = hook {
        hook();
    }

    std::process::exit(0);
}
