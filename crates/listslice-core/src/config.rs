//! Slice transfer configuration.
//!
//! Callers build a `SliceConfig` in code or load one from TOML. Every field
//! has a default, so a partial file (or an empty one) is valid:
//!
//! ```toml
//! max_ipc_size = 65536
//! inline_count_limit = 16
//! log_level = "batches"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::wire::{DEFAULT_MAX_IPC_SIZE, INLINE_TRAILER_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    /// Byte ceiling for any single message, inline or reply.
    pub max_ipc_size: usize,
    /// Max elements written inline. Absent = unbounded.
    /// A per-slice limit takes precedence.
    pub inline_count_limit: Option<usize>,
    /// Diagnostic logging emitted by transfers.
    pub log_level: SliceLogLevel,
}

/// How much a transfer logs, chosen by the caller per transfer.
///
/// Only progress events are gated. The warning that accompanies a
/// heterogeneous or truncated list is emitted at every level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SliceLogLevel {
    #[default]
    Off,
    /// One event per message (inline segment, each remainder batch).
    Batches,
    /// Batches plus one event per element.
    Elements,
}

impl SliceLogLevel {
    pub fn batches(self) -> bool {
        self >= SliceLogLevel::Batches
    }

    pub fn elements(self) -> bool {
        self >= SliceLogLevel::Elements
    }
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            max_ipc_size: DEFAULT_MAX_IPC_SIZE,
            inline_count_limit: None,
            log_level: SliceLogLevel::Off,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl SliceConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SliceConfig = toml::from_str(text).map_err(ConfigError::ParseFailed)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file. A missing file is an error; use
    /// `SliceConfig::default()` when no file is wanted.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        Self::from_toml_str(&text)
    }

    /// Write this config as pretty TOML, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = self.to_toml_string()?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// The ceiling must leave room for the trailer of an incomplete inline
    /// run, otherwise no message could ever point at its remainder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ipc_size <= INLINE_TRAILER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "max_ipc_size {} must exceed {} bytes",
                self.max_ipc_size, INLINE_TRAILER_SIZE
            )));
        }
        Ok(())
    }
}
