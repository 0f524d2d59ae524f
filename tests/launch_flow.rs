use global_hotkey::hotkey::HotKey;
use hotkey_launcher::app::{Lifecycle, Phase};
use hotkey_launcher::tray::ExitController;
use hotkey_launcher::{Binding, Config, HotkeyRegistrar, Launch, LaunchError, LaunchPlan, Listener};
use std::cell::RefCell;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct RecordingRegistrar {
    calls: RefCell<Vec<Vec<u32>>>,
}

impl HotkeyRegistrar for RecordingRegistrar {
    fn register_all(&self, hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error> {
        self.calls
            .borrow_mut()
            .push(hotkeys.iter().map(HotKey::id).collect());
        Ok(())
    }

    fn unregister_all(&self, _hotkeys: &[HotKey]) -> Result<(), global_hotkey::Error> {
        Ok(())
    }
}

/// Records the plan the real launcher would spawn.
struct PlanRecorder(mpsc::Sender<LaunchPlan>);

impl Launch for PlanRecorder {
    fn launch(&self, command: &str) -> Result<(), LaunchError> {
        let _ = self.0.send(LaunchPlan::new(command));
        Ok(())
    }
}

#[test]
fn xterm_chord_spawns_one_process_without_console() {
    let config = Config::from_json(r#"{"ctrl+alt+t": "/usr/bin/xterm"}"#).unwrap();
    let registrar = RecordingRegistrar::default();
    let (tx, rx) = mpsc::channel();

    let mut listener = Listener::start(&config.hotkeys, &registrar, PlanRecorder(tx));
    let chord = Binding::parse("ctrl+alt+t", "").unwrap().hotkey.id();
    assert_eq!(*registrar.calls.borrow(), vec![vec![chord]]);

    let lifecycle = Arc::new(Lifecycle::default());
    assert!(lifecycle.advance(Phase::Starting, Phase::Running));
    let exit = ExitController::new(listener.handle(), lifecycle.clone());

    assert!(listener.handle().trigger(chord));
    let plan = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        plan,
        LaunchPlan {
            program: "/usr/bin/xterm".to_string(),
            new_console: false,
        }
    );

    assert!(exit.request_exit());
    assert!(listener.shutdown(WAIT));
    assert!(rx.try_recv().is_err());
    assert_eq!(lifecycle.phase(), Phase::ExitRequested);
}

#[test]
fn empty_config_still_exits_cleanly() {
    let config = Config::from_json("{}").unwrap();
    let registrar = RecordingRegistrar::default();
    let (tx, rx) = mpsc::channel();

    let mut listener = Listener::start(&config.hotkeys, &registrar, PlanRecorder(tx));
    assert!(registrar.calls.borrow().is_empty());
    assert!(!listener.handle().is_running());

    let lifecycle = Arc::new(Lifecycle::default());
    assert!(lifecycle.advance(Phase::Starting, Phase::Running));
    let exit = ExitController::new(listener.handle(), lifecycle.clone());

    // double click on Exit
    assert!(exit.request_exit());
    assert!(!exit.request_exit());

    assert!(listener.shutdown(Duration::ZERO));
    assert!(rx.try_recv().is_err());
}
