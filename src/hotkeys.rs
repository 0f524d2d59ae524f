//! Global hotkey registration and the listener thread that turns key presses
//! into launches.
//!
//! Registration happens on the caller's thread, because `global-hotkey` needs
//! the thread that pumps OS events (the tray loop). The listener thread only
//! waits for pressed events and dispatches them.

use global_hotkey::hotkey::{HotKey, HotKeyParseError};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::launcher::Launch;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid hotkey descriptor '{descriptor}': {source}")]
    InvalidDescriptor {
        descriptor: String,
        #[source]
        source: HotKeyParseError,
    },
    #[error("hotkeys '{first}' and '{second}' name the same key combination")]
    Duplicate { first: String, second: String },
    #[error("failed to register hotkeys: {0}")]
    Register(#[source] global_hotkey::Error),
    #[error("failed to spawn listener thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// OS side of hotkey registration.
pub trait HotkeyRegistrar {
    fn register_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error>;
    fn unregister_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error>;
}

impl HotkeyRegistrar for GlobalHotKeyManager {
    fn register_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error> {
        GlobalHotKeyManager::register_all(self, hotkeys)
    }

    fn unregister_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error> {
        GlobalHotKeyManager::unregister_all(self, hotkeys)
    }
}

/// One configured shortcut and the command it launches.
#[derive(Debug, Clone)]
pub struct Binding {
    pub descriptor: String,
    pub hotkey: HotKey,
    pub command: String,
}

impl Binding {
    pub fn parse(descriptor: &str, command: &str) -> Result<Self, ListenerError> {
        let hotkey = HotKey::from_str(&normalize_descriptor(descriptor)).map_err(|source| {
            ListenerError::InvalidDescriptor {
                descriptor: descriptor.to_string(),
                source,
            }
        })?;

        Ok(Self {
            descriptor: descriptor.to_string(),
            hotkey,
            command: command.to_string(),
        })
    }
}

/// Accepts `<ctrl>+<alt>+t` style descriptors as well as `ctrl+alt+t`.
fn normalize_descriptor(descriptor: &str) -> String {
    descriptor.replace(['<', '>'], "")
}

/// Parses every entry. Fails on the first bad descriptor or on two
/// descriptors resolving to the same chord.
pub fn build_bindings(hotkeys: &BTreeMap<String, String>) -> Result<Vec<Binding>, ListenerError> {
    let mut seen: HashMap<u32, &str> = HashMap::new();
    let mut bindings = Vec::with_capacity(hotkeys.len());

    for (descriptor, command) in hotkeys {
        let binding = Binding::parse(descriptor, command)?;
        if let Some(first) = seen.insert(binding.hotkey.id(), descriptor) {
            return Err(ListenerError::Duplicate {
                first: first.to_string(),
                second: descriptor.clone(),
            });
        }
        bindings.push(binding);
    }

    Ok(bindings)
}

enum Signal {
    Pressed(u32),
    Stop,
}

#[derive(Default)]
struct HandleInner {
    tx: Mutex<Option<Sender<Signal>>>,
    running: AtomicBool,
}

/// Cloneable reference to the listener, used to feed it events and to stop it.
#[derive(Clone, Default)]
pub struct ListenerHandle {
    inner: Arc<HandleInner>,
}

impl ListenerHandle {
    /// A handle with no listener behind it. Stopping it is a no-op.
    pub fn idle() -> Self {
        Self::default()
    }

    fn connected(tx: Sender<Signal>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                tx: Mutex::new(Some(tx)),
                running: AtomicBool::new(true),
            }),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<Sender<Signal>>> {
        self.inner.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Asks the listener to leave its wait loop. Safe to call any number of
    /// times, before or after the listener exits.
    pub fn stop(&self) {
        let tx = self.sender().take();
        if let Some(tx) = tx {
            debug!("requesting hotkey listener stop");
            let _ = tx.send(Signal::Stop);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Delivers a pressed hotkey to the listener. Returns false once stopped.
    pub fn trigger(&self, id: u32) -> bool {
        match self.sender().as_ref() {
            Some(tx) => tx.send(Signal::Pressed(id)).is_ok(),
            None => false,
        }
    }

    pub fn forward(&self, event: GlobalHotKeyEvent) {
        if event.state == HotKeyState::Pressed {
            self.trigger(event.id);
        }
    }

    /// Routes every `global-hotkey` event into this listener.
    pub fn install_event_handler(&self) {
        let handle = self.clone();
        GlobalHotKeyEvent::set_event_handler(Some(move |event: GlobalHotKeyEvent| {
            handle.forward(event);
        }));
    }
}

/// Clears the running flag however the listener thread ends.
struct RunningGuard(ListenerHandle);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.inner.running.store(false, Ordering::Release);
    }
}

pub struct Listener {
    handle: ListenerHandle,
    thread: Option<JoinHandle<()>>,
    registered: Vec<HotKey>,
}

impl Listener {
    pub fn idle() -> Self {
        Self {
            handle: ListenerHandle::idle(),
            thread: None,
            registered: Vec::new(),
        }
    }

    /// Registers every configured hotkey and starts the listener thread.
    ///
    /// An empty mapping or any registration failure leaves the listener
    /// idle: nothing registered, no thread, a handle whose stop is a no-op.
    pub fn start<R, L>(hotkeys: &BTreeMap<String, String>, registrar: &R, launcher: L) -> Self
    where
        R: HotkeyRegistrar,
        L: Launch,
    {
        if hotkeys.is_empty() {
            warn!("no hotkeys are configured, listener will not start");
            return Self::idle();
        }

        match Self::try_start(hotkeys, registrar, launcher) {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, "hotkey listener not started");
                Self::idle()
            }
        }
    }

    fn try_start<R, L>(
        hotkeys: &BTreeMap<String, String>,
        registrar: &R,
        launcher: L,
    ) -> Result<Self, ListenerError>
    where
        R: HotkeyRegistrar,
        L: Launch,
    {
        let bindings = build_bindings(hotkeys)?;
        let registered: Vec<HotKey> = bindings.iter().map(|b| b.hotkey).collect();

        if let Err(e) = registrar.register_all(&registered) {
            // keep it all-or-nothing
            let _ = registrar.unregister_all(&registered);
            return Err(ListenerError::Register(e));
        }

        for binding in &bindings {
            info!(hotkey = %binding.descriptor, command = %binding.command, "hotkey registered");
        }

        let (tx, rx) = channel();
        let handle = ListenerHandle::connected(tx);
        let by_id: HashMap<u32, Binding> = bindings
            .into_iter()
            .map(|binding| (binding.hotkey.id(), binding))
            .collect();

        let guard = RunningGuard(handle.clone());
        let spawned = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                let _guard = guard;
                run(rx, by_id, launcher);
            });

        match spawned {
            Ok(thread) => Ok(Self {
                handle,
                thread: Some(thread),
                registered,
            }),
            Err(e) => {
                let _ = registrar.unregister_all(&registered);
                Err(ListenerError::Thread(e))
            }
        }
    }

    pub fn handle(&self) -> ListenerHandle {
        self.handle.clone()
    }

    pub fn registered(&self) -> &[HotKey] {
        &self.registered
    }

    /// Stops the thread and waits at most `timeout` for it. A thread still
    /// running after that is detached. Returns whether it was joined.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        self.handle.stop();

        let Some(thread) = self.thread.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!(?timeout, "hotkey listener did not stop in time, detaching");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }

        if thread.join().is_err() {
            warn!("hotkey listener thread panicked");
        }
        true
    }

    pub fn unregister<R: HotkeyRegistrar>(&mut self, registrar: &R) {
        if self.registered.is_empty() {
            return;
        }
        if let Err(e) = registrar.unregister_all(&self.registered) {
            warn!(error = %e, "failed to unregister hotkeys");
        }
        self.registered.clear();
    }
}

fn run<L: Launch>(rx: Receiver<Signal>, bindings: HashMap<u32, Binding>, launcher: L) {
    info!(hotkeys = bindings.len(), "hotkey listener started");

    while let Ok(signal) = rx.recv() {
        match signal {
            Signal::Stop => break,
            Signal::Pressed(id) => match bindings.get(&id) {
                Some(binding) => {
                    debug!(hotkey = %binding.descriptor, "hotkey pressed");
                    if let Err(e) = launcher.launch(&binding.command) {
                        error!(hotkey = %binding.descriptor, error = %e, "launch failed");
                    }
                }
                None => debug!(id, "ignoring unknown hotkey id"),
            },
        }
    }

    info!("hotkey listener stopped");
}
