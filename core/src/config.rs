/// Configuration management
use crate::error::{MessagingError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ONLINE_WINDOW_SECS: u64 = 300;
const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory holding `messaging.db` and `directory.json`
    /// (None: temporary store, discarded on drop)
    pub data_dir: Option<PathBuf>,

    /// A user counts as online if their last access is within this window
    pub online_window: Duration,

    /// Maximum entries per search result list
    pub search_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            online_window: Duration::from_secs(DEFAULT_ONLINE_WINDOW_SECS),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl Config {
    /// Create config from command line arguments, then apply `PARLEY_*`
    /// environment overrides.
    pub fn from_args(args: &[String]) -> Result<(Self, Vec<String>)> {
        let (mut config, rest) = Self::parse_args(args)?;
        config.apply_env()?;
        Ok((config, rest))
    }

    /// Flags only, no environment.
    ///
    /// Recognized flags are consumed; everything else is returned in order
    /// as the command and its arguments (program name excluded).
    pub fn parse_args(args: &[String]) -> Result<(Self, Vec<String>)> {
        let mut config = Config::default();
        let mut rest = Vec::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        MessagingError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = Some(PathBuf::from(path));
                    i += 2;
                }
                "--online-window" => {
                    let secs = args.get(i + 1).ok_or_else(|| {
                        MessagingError::Config("--online-window requires seconds".to_string())
                    })?;
                    config.online_window = Duration::from_secs(secs.parse::<u64>().map_err(|_| {
                        MessagingError::Config("--online-window must be a whole number of seconds".to_string())
                    })?);
                    i += 2;
                }
                "--search-limit" => {
                    let n = args.get(i + 1).ok_or_else(|| {
                        MessagingError::Config("--search-limit requires a number".to_string())
                    })?;
                    config.search_limit = parse_limit(n)?;
                    i += 2;
                }
                other => {
                    rest.push(other.to_string());
                    i += 1;
                }
            }
        }

        Ok((config, rest))
    }

    /// Env overrides (nice for scripts)
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("PARLEY_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(secs) = lookup("PARLEY_ONLINE_WINDOW_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.online_window = Duration::from_secs(secs);
        }
        if let Some(n) = lookup("PARLEY_SEARCH_LIMIT") {
            self.search_limit = parse_limit(&n)?;
        }
        Ok(())
    }
}

fn parse_limit(s: &str) -> Result<usize> {
    match s.parse::<usize>() {
        Ok(0) | Err(_) => Err(MessagingError::Config(
            "search limit must be a positive number".to_string(),
        )),
        Ok(n) => Ok(n),
    }
}
