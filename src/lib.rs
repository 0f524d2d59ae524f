//! Global hotkeys that launch programs, with a tray icon to quit.

pub mod app;
pub mod config;
pub mod hotkeys;
pub mod launcher;
pub mod resources;
pub mod tray;

pub use config::{Config, ConfigSource, LoadedConfig, TrayConfig};
pub use hotkeys::{Binding, HotkeyRegistrar, Listener, ListenerHandle};
pub use launcher::{Launch, LaunchError, LaunchPlan, ProcessLauncher};
