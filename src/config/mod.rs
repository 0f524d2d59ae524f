use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::resources;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "HOTKEY_LAUNCHER_CONFIG";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// hotkey descriptor -> program path or command
    pub hotkeys: BTreeMap<String, String>,
    pub tray: TrayConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    pub name: String,
    pub tooltip: String,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            name: "HotkeyApp".to_string(),
            tooltip: "Hotkey Launcher".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Where the loaded settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Missing,
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

impl Config {
    /// Finds and reads the configuration. Never fails: a missing or
    /// malformed source yields the defaults (no hotkeys).
    pub fn load(explicit: Option<&Path>) -> LoadedConfig {
        match Self::locate(explicit) {
            Some(path) => Self::load_from(&path),
            None => {
                error!("no config file found, using empty hotkey configuration");
                LoadedConfig {
                    config: Self::default(),
                    source: ConfigSource::Missing,
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> LoadedConfig {
        match Self::read(path) {
            Ok(config) => {
                info!(
                    path = %path.display(),
                    hotkeys = config.hotkeys.len(),
                    "configuration loaded"
                );
                LoadedConfig {
                    config,
                    source: ConfigSource::File(path.to_path_buf()),
                }
            }
            Err(ConfigError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                error!(
                    path = %path.display(),
                    "config file not found, using empty hotkey configuration"
                );
                LoadedConfig {
                    config: Self::default(),
                    source: ConfigSource::Missing,
                }
            }
            Err(e) => {
                error!(error = %e, "using empty hotkey configuration");
                LoadedConfig {
                    config: Self::default(),
                    source: ConfigSource::Invalid {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json(&content).map_err(|e| e.to_string())
        } else {
            Self::from_toml(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Accepts either the full document (`{"hotkeys": {...}, "tray": {...}}`)
    /// or a bare descriptor -> command object.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let is_document = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("hotkeys") || obj.contains_key("tray"));

        if is_document {
            serde_json::from_value(value)
        } else {
            Ok(Self {
                hotkeys: serde_json::from_value(value)?,
                ..Self::default()
            })
        }
    }

    /// Explicit path, then `$HOTKEY_LAUNCHER_CONFIG`, then `config.toml` next
    /// to the executable, then the platform config directory.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        let user_config = match Self::config_path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "no platform config directory");
                None
            }
        };

        locate_in(
            explicit,
            std::env::var_os(CONFIG_ENV),
            resources::executable_dir().as_deref(),
            user_config,
        )
    }

    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "hotkey-launcher", "hotkey-launcher")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join(CONFIG_FILE))
    }
}

/// The lookup chain behind [`Config::locate`]. Explicit and environment
/// paths are taken as given; the two default locations only when the file
/// exists. An empty environment value counts as unset.
pub fn locate_in(
    explicit: Option<&Path>,
    env: Option<OsString>,
    exe_dir: Option<&Path>,
    user_config: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }

    exe_dir
        .map(|dir| dir.join(CONFIG_FILE))
        .into_iter()
        .chain(user_config)
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn toml_hotkeys_and_tray_labels() {
        let config = Config::from_toml(
            r#"
            [hotkeys]
            "ctrl+alt+t" = "/usr/bin/xterm"
            "ctrl+alt+p" = "C:\\Tools\\pwsh.exe"

            [tray]
            name = "Launcher"
            "#,
        )
        .unwrap();

        assert_eq!(config.hotkeys.len(), 2);
        assert_eq!(config.hotkeys["ctrl+alt+t"], "/usr/bin/xterm");
        assert_eq!(config.tray.name, "Launcher");
        // unspecified fields keep their defaults
        assert_eq!(config.tray.tooltip, "Hotkey Launcher");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn json_bare_mapping() {
        let config = Config::from_json(r#"{"ctrl+alt+t": "/usr/bin/xterm"}"#).unwrap();
        assert_eq!(config.hotkeys.len(), 1);
        assert_eq!(config.hotkeys["ctrl+alt+t"], "/usr/bin/xterm");
        assert_eq!(config.tray, TrayConfig::default());
    }

    #[test]
    fn json_full_document() {
        let config = Config::from_json(
            r#"{"hotkeys": {"super+e": "explorer.exe"}, "tray": {"tooltip": "Keys"}}"#,
        )
        .unwrap();
        assert_eq!(config.hotkeys["super+e"], "explorer.exe");
        assert_eq!(config.tray.tooltip, "Keys");
        assert_eq!(config.tray.name, "HotkeyApp");
    }

    #[test]
    fn json_empty_object_has_no_hotkeys() {
        assert!(Config::from_json("{}").unwrap().hotkeys.is_empty());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[hotkeys]\n\"ctrl+shift+n\" = \"notepad.exe\"\n").unwrap();

        let loaded = Config::load_from(&path);
        assert_eq!(loaded.source, ConfigSource::File(path));
        assert_eq!(loaded.config.hotkeys["ctrl+shift+n"], "notepad.exe");
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(Some(&dir.path().join("absent.toml")));
        assert_eq!(loaded.source, ConfigSource::Missing);
        assert!(loaded.config.hotkeys.is_empty());
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[hotkeys\nnot toml").unwrap();

        let loaded = Config::load_from(&path);
        assert!(matches!(loaded.source, ConfigSource::Invalid { .. }));
        assert!(loaded.config.hotkeys.is_empty());
    }

    #[test]
    fn non_string_command_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"ctrl+alt+t": 42}"#).unwrap();

        assert!(matches!(
            Config::read(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/somewhere/custom.toml");
        assert_eq!(Config::locate(Some(&path)), Some(path));
    }

    #[test]
    fn explicit_path_beats_env() {
        let path = PathBuf::from("/somewhere/custom.toml");
        let found = locate_in(
            Some(&path),
            Some(OsString::from("/from/env.toml")),
            None,
            None,
        );
        assert_eq!(found, Some(path));
    }

    #[test]
    fn env_beats_default_locations() {
        let exe = tempfile::tempdir().unwrap();
        fs::write(exe.path().join("config.toml"), "").unwrap();

        let found = locate_in(
            None,
            Some(OsString::from("/from/env.toml")),
            Some(exe.path()),
            None,
        );
        assert_eq!(found, Some(PathBuf::from("/from/env.toml")));
    }

    #[test]
    fn empty_env_is_ignored() {
        let exe = tempfile::tempdir().unwrap();
        fs::write(exe.path().join("config.toml"), "").unwrap();

        let found = locate_in(None, Some(OsString::new()), Some(exe.path()), None);
        assert_eq!(found, Some(exe.path().join("config.toml")));
    }

    #[test]
    fn exe_dir_beats_user_config() {
        let exe = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        fs::write(exe.path().join("config.toml"), "").unwrap();
        let user_config = user.path().join("config.toml");
        fs::write(&user_config, "").unwrap();

        let found = locate_in(None, None, Some(exe.path()), Some(user_config));
        assert_eq!(found, Some(exe.path().join("config.toml")));
    }

    #[test]
    fn falls_back_to_user_config() {
        let exe = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        let user_config = user.path().join("config.toml");
        fs::write(&user_config, "").unwrap();

        let found = locate_in(None, None, Some(exe.path()), Some(user_config.clone()));
        assert_eq!(found, Some(user_config));
    }

    #[test]
    fn nothing_found_without_files() {
        let exe = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();

        let found = locate_in(None, None, Some(exe.path()), Some(user.path().join("config.toml")));
        assert_eq!(found, None);
    }
}
