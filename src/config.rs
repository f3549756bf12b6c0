// src/config.rs

//! Manages server configuration: loading from TOML, environment overrides, and validation.

use crate::core::protocol::{CHUNK_SIZE, MAX_DATAGRAM_SIZE, READ_UNIT};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Environment variable that overrides `shared_dir`.
pub const SHARED_DIR_ENV: &str = "SERVER_SHARED_FILES";

/// The main configuration structure for the chat server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory whose regular files are offered by `/files` and `/get`.
    #[serde(default = "default_shared_dir")]
    pub shared_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bytes requested per receive call on client connections.
    #[serde(default = "default_read_unit")]
    pub read_unit: usize,
    /// File chunk size for streaming writes and datagram payloads.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9000
}
fn default_shared_dir() -> PathBuf {
    PathBuf::from("SharedFiles")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_read_unit() -> usize {
    READ_UNIT
}
fn default_chunk_size() -> usize {
    CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shared_dir: default_shared_dir(),
            log_level: default_log_level(),
            read_unit: default_read_unit(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses and validates a TOML document. Missing fields take their defaults.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces `shared_dir` with `value` when it is set and non-empty.
    pub fn apply_shared_dir_override(&mut self, value: Option<String>) {
        if let Some(dir) = value.filter(|v| !v.trim().is_empty()) {
            self.shared_dir = PathBuf::from(dir);
        }
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.shared_dir.as_os_str().is_empty() {
            return Err(anyhow!("shared_dir cannot be empty"));
        }
        if self.read_unit < READ_UNIT {
            return Err(anyhow!("read_unit must be at least {READ_UNIT} bytes"));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_DATAGRAM_SIZE {
            return Err(anyhow!(
                "chunk_size must be between 1 and {MAX_DATAGRAM_SIZE} bytes"
            ));
        }
        if self.chunk_size != CHUNK_SIZE {
            warn!(
                "chunk_size is {} instead of {}. Clients expecting fixed-size datagrams may misbehave.",
                self.chunk_size, CHUNK_SIZE
            );
        }
        Ok(())
    }
}
