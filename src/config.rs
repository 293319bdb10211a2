//! Process configuration read from the environment.
//!
//! | Variable                  | Default          |
//! |---------------------------|------------------|
//! | `HALO_ADDR`               | `127.0.0.1:8080` |
//! | `HALO_FILES_DIR`          | `files`          |
//! | `HALO_IDLE_TIMEOUT_SECS`  | `5`              |
//! | `HALO_STREAM_INTERVAL_MS` | `500`            |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_FILES_DIR: &str = "files";
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Settings fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub addr: String,
    /// Sandbox root for `/files/` resources.
    pub files_dir: PathBuf,
    /// How long a session waits for the next request before closing.
    pub idle_timeout: Duration,
    /// Pause between chunks on `/stream`.
    pub stream_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_owned(),
            files_dir: PathBuf::from(DEFAULT_FILES_DIR),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            stream_interval: DEFAULT_STREAM_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidNumber`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup("HALO_ADDR") {
            config.addr = addr;
        }
        if let Some(dir) = lookup("HALO_FILES_DIR") {
            config.files_dir = PathBuf::from(dir);
        }
        if let Some(secs) = number(&lookup, "HALO_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = number(&lookup, "HALO_STREAM_INTERVAL_MS")? {
            config.stream_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

fn number<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}
