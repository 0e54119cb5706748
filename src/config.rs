use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "f2t2f";
pub const APP_AUTHOR: &str = "vovaauer";
pub const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_ENV: &str = "F2T2F_CONFIG";

pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "__pycache__",
    "*.egg-info",
    ".git",
    ".gitignore",
    ".vscode",
    "build",
    "dist",
    ".DS_Store",
];

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

/// Platform config location, laid out the way `platformdirs` does it:
/// `~/.config/f2t2f` (or `$XDG_CONFIG_HOME`) on Linux,
/// `~/Library/Application Support/f2t2f` on macOS and
/// `%LOCALAPPDATA%\vovaauer\f2t2f` on Windows.
pub fn default_config_path() -> Result<PathBuf> {
    let base = if cfg!(windows) {
        dirs::data_local_dir().map(|dir| dir.join(APP_AUTHOR))
    } else {
        dirs::config_dir()
    };
    let base = base.context("Cannot determine the configuration directory")?;
    Ok(base.join(APP_NAME).join(CONFIG_FILENAME))
}

/// Load the config at `path`. A missing file yields the defaults; an
/// unreadable or invalid one also yields the defaults, with a warning.
pub fn load_config(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Config::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read config: {e}; using defaults");
            return Config::default();
        }
    };

    match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), "invalid config: {e}; using defaults");
            Config::default()
        }
    }
}

/// Write the default config to `path`, creating its directory.
/// Returns `false` without touching anything when the file exists and
/// `force` is not set.
pub fn save_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(&Config::default()).context("Failed to serialize default config")?;
    std::fs::write(path, text + "\n")
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(true)
}
