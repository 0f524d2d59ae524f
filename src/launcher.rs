use std::io;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Shell executables that get their own console when named anywhere in the
/// command.
const CONSOLE_PROGRAMS: &[&str] = &["cmd.exe", "pwsh.exe"];
const CONSOLE_EXTENSIONS: &[&str] = &[".bat", ".cmd", ".ps1"];

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

/// Substring/extension match, so `C:\tools\cmd.exe.lnk` also qualifies.
pub fn wants_console(command: &str) -> bool {
    let lower = command.to_lowercase();
    CONSOLE_PROGRAMS.iter().any(|name| lower.contains(name))
        || CONSOLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub new_console: bool,
}

impl LaunchPlan {
    pub fn new(command: &str) -> Self {
        Self {
            program: command.to_string(),
            new_console: wants_console(command),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            if self.new_console {
                cmd.creation_flags(CREATE_NEW_CONSOLE);
            }
        }

        #[cfg(not(windows))]
        {
            if self.new_console {
                debug!(program = %self.program, "new console requested, ignored on this platform");
            }
        }

        cmd
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("application not found at '{0}'")]
    NotFound(String),
    #[error("permission denied for '{0}'")]
    PermissionDenied(String),
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    fn from_spawn(program: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Spawn {
                program: program.to_string(),
                source: err,
            },
        }
    }
}

/// Runs the command bound to a hotkey.
pub trait Launch: Send + 'static {
    fn launch(&self, command: &str) -> Result<(), LaunchError>;
}

/// Spawns each command as a detached OS process and forgets about it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launch for ProcessLauncher {
    fn launch(&self, command: &str) -> Result<(), LaunchError> {
        let plan = LaunchPlan::new(command);
        info!(
            program = %plan.program,
            new_console = plan.new_console,
            "launching program"
        );

        let child = plan
            .command()
            .spawn()
            .map_err(|e| LaunchError::from_spawn(&plan.program, e))?;

        debug!(program = %plan.program, pid = child.id(), "program spawned");
        Ok(())
    }
}
