use anyhow::{anyhow, Context, Result};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tray_icon::menu::{Menu, MenuEvent, MenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder, TrayIconId};
use winit::application::ApplicationHandler;
use winit::event::{StartCause, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use crate::app::{Lifecycle, Phase};
use crate::config::TrayConfig;
use crate::hotkeys::ListenerHandle;

pub const ICON_FILE: &str = "icon.png";
pub const EXIT_MENU_ID: &str = "exit";
const EXIT_LABEL: &str = "Exit";

/// What the tray shows.
pub struct TrayState {
    pub name: String,
    pub tooltip: String,
    pub icon: Option<Icon>,
}

impl TrayState {
    /// Without an icon the tooltip says so.
    pub fn new(config: &TrayConfig, icon: Result<Icon>) -> Self {
        match icon {
            Ok(icon) => Self {
                name: config.name.clone(),
                tooltip: config.tooltip.clone(),
                icon: Some(icon),
            },
            Err(e) => {
                error!("tray icon unavailable: {e:#}");
                Self {
                    name: config.name.clone(),
                    tooltip: format!("{} (No Icon)", config.tooltip),
                    icon: None,
                }
            }
        }
    }
}

pub fn load_icon(path: &Path) -> Result<Icon> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read icon {:?}", path))?;
    let (rgba, width, height) =
        decode_rgba(&bytes).with_context(|| format!("Failed to decode icon {:?}", path))?;
    Icon::from_rgba(rgba, width, height).context("Failed to build tray icon image")
}

/// Decodes a PNG into 8-bit RGBA.
pub fn decode_rgba(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![
        0;
        reader
            .output_buffer_size()
            .context("PNG has no output buffer size")?
    ];
    let info = reader.next_frame(&mut buf)?;
    let pixels = &buf[..info.buffer_size()];

    let rgba = match info.color_type {
        png::ColorType::Rgba => pixels.to_vec(),
        png::ColorType::Rgb => pixels
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 0xFF])
            .collect(),
        png::ColorType::GrayscaleAlpha => pixels
            .chunks_exact(2)
            .flat_map(|px| [px[0], px[0], px[0], px[1]])
            .collect(),
        png::ColorType::Grayscale => pixels.iter().flat_map(|&v| [v, v, v, 0xFF]).collect(),
        other => return Err(anyhow!("Unsupported icon color type {:?}", other)),
    };

    Ok((rgba, info.width, info.height))
}

fn build_tray(state: TrayState) -> Result<TrayIcon> {
    let menu = Menu::new();
    let exit = MenuItem::with_id(EXIT_MENU_ID, EXIT_LABEL, true, None);
    menu.append(&exit).context("Failed to add exit menu item")?;

    let mut builder = TrayIconBuilder::new()
        .with_id(TrayIconId::new(&state.name))
        .with_menu(Box::new(menu))
        .with_tooltip(&state.tooltip);

    builder = match state.icon {
        Some(icon) => builder.with_icon(icon),
        // keeps the entry visible on platforms that render titles
        None => builder.with_title(&state.name),
    };

    builder.build().context("Failed to build tray icon")
}

/// Handles the Exit menu action. Cloneable and safe to call repeatedly.
#[derive(Clone)]
pub struct ExitController {
    listener: ListenerHandle,
    lifecycle: Arc<Lifecycle>,
}

impl ExitController {
    pub fn new(listener: ListenerHandle, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            listener,
            lifecycle,
        }
    }

    /// Stops the hotkey listener and returns true the first time only; the
    /// caller ends the tray loop on true.
    pub fn request_exit(&self) -> bool {
        self.listener.stop();
        self.lifecycle.request_exit()
    }
}

#[derive(Debug)]
pub enum TrayEvent {
    Menu(MenuEvent),
}

pub struct TrayController {
    state: Option<TrayState>,
    exit: ExitController,
}

impl TrayController {
    pub fn new(state: TrayState, listener: ListenerHandle, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            state: Some(state),
            exit: ExitController::new(listener, lifecycle),
        }
    }

    /// Runs the tray event loop on the calling thread until Exit is chosen.
    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::<TrayEvent>::with_user_event()
            .build()
            .context("Failed to create tray event loop")?;
        event_loop.set_control_flow(ControlFlow::Wait);

        let proxy = event_loop.create_proxy();
        MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
            let _ = proxy.send_event(TrayEvent::Menu(event));
        }));

        #[cfg(target_os = "linux")]
        {
            if let Some(state) = self.state.take() {
                spawn_gtk_tray(state);
            }
        }

        let mut app = TrayApp {
            state: self.state.take(),
            tray: None,
            exit: self.exit,
        };
        event_loop
            .run_app(&mut app)
            .context("Tray event loop failed")?;

        MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
        Ok(())
    }
}

/// `tray-icon` needs a GTK main loop on Linux; the icon lives on its own
/// thread while winit keeps the exit path on the main thread.
#[cfg(target_os = "linux")]
fn spawn_gtk_tray(state: TrayState) {
    let spawned = std::thread::Builder::new()
        .name("tray-gtk".to_string())
        .spawn(move || {
            if let Err(e) = gtk::init() {
                error!(error = %e, "failed to initialize gtk, tray icon disabled");
                return;
            }
            match build_tray(state) {
                Ok(_tray) => {
                    info!("tray icon ready");
                    gtk::main();
                }
                Err(e) => error!("tray icon disabled: {e:#}"),
            }
        });

    if let Err(e) = spawned {
        error!(error = %e, "failed to spawn gtk tray thread");
    }
}

struct TrayApp {
    state: Option<TrayState>,
    tray: Option<TrayIcon>,
    exit: ExitController,
}

impl ApplicationHandler<TrayEvent> for TrayApp {
    fn new_events(&mut self, _event_loop: &ActiveEventLoop, cause: StartCause) {
        if !matches!(cause, StartCause::Init) {
            return;
        }

        // macOS wants the tray created once the loop is running
        if let Some(state) = self.state.take() {
            match build_tray(state) {
                Ok(tray) => {
                    info!("tray icon ready");
                    self.tray = Some(tray);
                }
                Err(e) => error!("tray icon disabled: {e:#}"),
            }
        }

        self.exit.lifecycle.advance(Phase::Starting, Phase::Running);
    }

    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, _event: WindowEvent) {}

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: TrayEvent) {
        match event {
            TrayEvent::Menu(event) if event.id.0 == EXIT_MENU_ID => {
                if self.exit.request_exit() {
                    info!("exit requested from tray");
                    event_loop.exit();
                } else {
                    warn!("exit already requested");
                }
            }
            TrayEvent::Menu(_) => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.tray.take();
    }
}
