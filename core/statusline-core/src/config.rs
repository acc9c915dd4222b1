//! Runtime configuration for the statusline.
//!
//! Loaded once per invocation from an optional TOML file, then refined by
//! environment overrides. A missing file means defaults; a malformed file is
//! logged and also means defaults, because the prompt must render regardless.
//!
//! ```toml
//! cache_dir = "/dev/shm"
//! git_cache_ttl_ms = 5000
//! sweep_interval_secs = 300
//! stdin_timeout_ms = 50
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, StatuslineError};

pub const CONFIG_ENV: &str = "STATUSLINE_CONFIG";
pub const CACHE_DIR_ENV: &str = "STATUSLINE_CACHE_DIR";
pub const DEBUG_ENV: &str = "STATUSLINE_DEBUG";

const SHARED_MEMORY_DIR: &str = "/dev/shm";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatuslineConfig {
    /// Directory holding session caches, git caches and the sweep sentinel.
    pub cache_dir: PathBuf,
    /// Directory for per-session debug logs.
    pub log_dir: PathBuf,
    pub git_cache_ttl_ms: u64,
    pub sweep_interval_secs: u64,
    pub stdin_timeout_ms: u64,
    pub stdin_max_bytes: usize,
    pub git_capture_bytes: usize,
    pub branch_max_chars: usize,
    /// Only settable through `STATUSLINE_DEBUG`.
    #[serde(skip)]
    pub debug: bool,
}

impl Default for StatuslineConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_dir: default_log_dir(),
            git_cache_ttl_ms: 5_000,
            sweep_interval_secs: 300,
            stdin_timeout_ms: 50,
            stdin_max_bytes: 8_192,
            git_capture_bytes: 4_096,
            branch_max_chars: 20,
            debug: false,
        }
    }
}

impl StatuslineConfig {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Self {
        let path = config_path();
        let mut config = match load_from(path.as_deref()) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load statusline config; using defaults");
                StatuslineConfig::default()
            }
        };
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Applies `STATUSLINE_CACHE_DIR` and `STATUSLINE_DEBUG` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|value| !value.trim().is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        // Presence alone turns debugging on, whatever the value.
        self.debug = lookup(DEBUG_ENV).is_some();
    }

    pub fn git_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.git_cache_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn stdin_timeout(&self) -> Duration {
        Duration::from_millis(self.stdin_timeout_ms)
    }
}

/// Reads a config file. `None` or a missing file yields defaults.
pub fn load_from(path: Option<&Path>) -> Result<StatuslineConfig> {
    let Some(path) = path else {
        return Ok(StatuslineConfig::default());
    };
    if !path.exists() {
        return Ok(StatuslineConfig::default());
    }

    let content = fs_err::read_to_string(path)
        .map_err(|err| StatuslineError::io("read statusline config", err))?;
    toml::from_str::<StatuslineConfig>(&content).map_err(|err| StatuslineError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}

/// `STATUSLINE_CONFIG`, else `<config_dir>/statusline/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|dir| dir.join("statusline").join("config.toml"))
}

fn default_cache_dir() -> PathBuf {
    let shm = Path::new(SHARED_MEMORY_DIR);
    if shm.is_dir() {
        shm.to_path_buf()
    } else {
        env::temp_dir()
    }
}

fn default_log_dir() -> PathBuf {
    env::temp_dir().join(format!("statusline-{}", current_uid()))
}

fn current_uid() -> u32 {
    #[cfg(unix)]
    {
        // SAFETY: getuid() cannot fail and has no side effects.
        #[allow(unsafe_code)]
        let uid = unsafe { libc::getuid() };
        uid
    }
    #[cfg(not(unix))]
    {
        0
    }
}
