use anyhow::Result;
use global_hotkey::GlobalHotKeyManager;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigSource, LoadedConfig};
use crate::hotkeys::{Binding, Listener};
use crate::launcher::{wants_console, ProcessLauncher};
use crate::resources;
use crate::tray::{self, TrayController, TrayState};

/// Upper bound on waiting for the listener thread at shutdown.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Running = 1,
    ExitRequested = 2,
    Stopping = 3,
    Terminated = 4,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::ExitRequested,
            3 => Self::Stopping,
            _ => Self::Terminated,
        }
    }
}

/// Program state shared between the tray loop and the main thread.
#[derive(Debug, Default)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn advance(&self, from: Phase, to: Phase) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves to `ExitRequested`. Only the first caller gets true.
    pub fn request_exit(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match Phase::from_u8(current) {
                    Phase::Starting | Phase::Running => Some(Phase::ExitRequested as u8),
                    _ => None,
                }
            })
            .is_ok()
    }

    fn set(&self, phase: Phase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

/// Loads the configuration, starts the hotkey listener and blocks in the
/// tray loop until Exit is chosen.
pub fn run(config_path: Option<&Path>) -> Result<()> {
    let lifecycle = Arc::new(Lifecycle::default());
    let config = Config::load(config_path).config;

    let manager = hotkey_manager(&config);
    let mut listener = match &manager {
        Some(manager) => Listener::start(&config.hotkeys, manager, ProcessLauncher),
        None => Listener::idle(),
    };

    let handle = listener.handle();
    if handle.is_running() {
        handle.install_event_handler();
    }

    let icon_path = resources::resource_path(tray::ICON_FILE);
    let state = TrayState::new(&config.tray, tray::load_icon(&icon_path));
    let result = TrayController::new(state, handle.clone(), lifecycle.clone()).run();

    lifecycle.set(Phase::Stopping);
    if handle.is_running() {
        info!("stopping hotkey listener");
    }
    listener.shutdown(JOIN_TIMEOUT);
    if let Some(manager) = &manager {
        listener.unregister(manager);
    }

    lifecycle.set(Phase::Terminated);
    info!("hotkey launcher stopped");
    result
}

fn hotkey_manager(config: &Config) -> Option<GlobalHotKeyManager> {
    if config.hotkeys.is_empty() {
        warn!("no hotkeys are configured, the tray icon is all that will run");
        return None;
    }

    match GlobalHotKeyManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            error!(error = %e, "failed to create global hotkey manager");
            None
        }
    }
}

/// Prints the configuration source and every binding, then returns.
pub fn list_bindings(config_path: Option<&Path>) {
    let loaded = Config::load(config_path);

    println!("\nconfigured hotkeys");
    println!("========================================");
    for line in binding_report(&loaded) {
        println!("{}", line);
    }
    println!("========================================\n");
}

fn binding_report(loaded: &LoadedConfig) -> Vec<String> {
    let mut lines = vec![match &loaded.source {
        ConfigSource::File(path) => format!("config: {}", path.display()),
        ConfigSource::Missing => "config: none found".to_string(),
        ConfigSource::Invalid { path, reason } => {
            format!("config: {} (invalid: {})", path.display(), reason)
        }
    }];

    if loaded.config.hotkeys.is_empty() {
        lines.push("no hotkeys configured".to_string());
    }

    for (descriptor, command) in &loaded.config.hotkeys {
        let status = match Binding::parse(descriptor, command) {
            Ok(_) => "[ok]",
            Err(_) => "[x]",
        };
        let console = if wants_console(command) {
            " (new console)"
        } else {
            ""
        };
        lines.push(format!("{} {} -> {}{}", status, descriptor, command, console));
    }

    lines
}
