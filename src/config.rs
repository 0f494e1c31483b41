//! Configuration loading and persistence.
//!
//! Handles reading and writing the greenscreen configuration file: which
//! emulator binary to spawn, the arguments it takes, and the session
//! housekeeping knobs. Values layer as file < environment variables, so
//! deployments can pin the emulator path without touching the file.

use std::path::PathBuf;
use std::{env, fs};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the greenscreen gateway.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Emulator binary to spawn (name on PATH or absolute path).
    pub emulator_path: PathBuf,
    /// Arguments passed before the target host.
    pub emulator_args: Vec<String>,
    /// Default telnet port when the caller gives none.
    pub default_port: u16,
    /// Seconds of inactivity before a session is evicted.
    pub session_idle_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            emulator_path: PathBuf::from("s3270"),
            emulator_args: vec!["-model".to_string(), "3279-4".to_string()],
            default_port: 23,
            session_idle_timeout: 3600,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `GREENSCREEN_CONFIG_DIR` overrides the platform config directory,
    /// which keeps tests and containers away from the user's real one.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = env::var("GREENSCREEN_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("could not determine config directory")?
                .join("greenscreen")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let path = Self::config_path()?;
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&raw).context("parsing config JSON")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var("GREENSCREEN_EMULATOR") {
            self.emulator_path = PathBuf::from(path);
        }
        if let Ok(args) = env::var("GREENSCREEN_EMULATOR_ARGS") {
            self.emulator_args = args.split_whitespace().map(str::to_string).collect();
        }
    }

    /// Writes the configuration to its file as pretty JSON.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let json = serde_json::to_string_pretty(self).context("serializing config")?;
        fs::write(&path, json).with_context(|| format!("writing config to {}", path.display()))
    }

    /// The argument vector for one connection: configured arguments with
    /// the target appended last, as the emulator expects.
    #[must_use]
    pub fn emulator_invocation(&self, host: &str, port: u16) -> Vec<String> {
        let mut args = self.emulator_args.clone();
        args.push(format!("{host}:{port}"));
        args
    }
}
