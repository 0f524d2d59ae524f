use std::path::{Path, PathBuf};

/// Environment variable pointing at a packaged resource directory.
pub const RESOURCES_ENV: &str = "HOTKEY_LAUNCHER_RESOURCES";

/// Absolute path of a bundled resource such as the tray icon.
pub fn resource_path(name: &str) -> PathBuf {
    resolve(name, bundle_root().as_deref(), executable_dir().as_deref())
}

/// Prefers `bundle_root` when the resource exists there, otherwise the
/// executable's directory. With neither, the bare name is returned.
pub fn resolve(name: &str, bundle_root: Option<&Path>, exe_dir: Option<&Path>) -> PathBuf {
    if let Some(root) = bundle_root {
        let candidate = root.join(name);
        if candidate.exists() {
            return candidate;
        }
    }

    match exe_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

pub fn executable_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    exe.parent().map(Path::to_path_buf)
}

fn bundle_root() -> Option<PathBuf> {
    if let Some(root) = std::env::var_os(RESOURCES_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(root));
    }

    // Foo.app/Contents/MacOS/foo -> Foo.app/Contents/Resources
    if cfg!(target_os = "macos") {
        let resources = executable_dir()?.parent()?.join("Resources");
        if resources.is_dir() {
            return Some(resources);
        }
    }

    None
}
