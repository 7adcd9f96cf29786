use std::{env, io, path::PathBuf};

use anyhow::{Context, Result};

const APPLICATION_DIR: &str = "focustally";

/// Returns the application directory, creating it when missing. The database, logs and the
/// optional `config.toml` all live here.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = default_application_path()?;

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v).with_context(|| format!("Failed to create {path:?}")),
    }
}

fn default_application_path() -> Result<PathBuf> {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            let mut path = PathBuf::from(env::var("APPDATA").context("APPDATA should be present on Windows")?);
            path.push(APPLICATION_DIR);
            Ok(path)
        } else if #[cfg(target_os = "macos")] {
            let mut path = PathBuf::from(env::var("HOME").context("HOME is not set")?);
            path.push("Library/Application Support");
            path.push(APPLICATION_DIR);
            Ok(path)
        } else {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .context("Couldn't find neither XDG_STATE_HOME nor HOME")?;
            path.push(APPLICATION_DIR);
            Ok(path)
        }
    }
}
