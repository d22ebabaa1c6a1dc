//! Runtime configuration: device ids, report lengths, reader timing.
//!
//! Stored as JSON. Every field has a default, so an empty object (or no file at
//! all) yields the stock Buzz! setup.

use crate::channel::DEFAULT_READ_POLL_MS;
use crate::error::{Error, Result};
use crate::report::{MIN_INPUT_REPORT_LEN, MIN_OUTPUT_REPORT_LEN};
use crate::{pids, BUZZ_VID};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "BUZZ_IO_CONFIG";

/// Buzz! controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuzzConfig {
    /// USB vendor id.
    pub vendor_id: u16,
    /// Product ids, tried in order (wired before wireless).
    pub product_ids: Vec<u16>,
    /// Input report length including the report-ID slot.
    pub input_report_len: usize,
    /// Output report length including the report-ID slot.
    pub output_report_len: usize,
    /// Upper bound on one blocking read, in milliseconds.
    pub read_poll_ms: i32,
}

impl Default for BuzzConfig {
    fn default() -> Self {
        Self {
            vendor_id: BUZZ_VID,
            product_ids: vec![pids::BUZZ_WIRED, pids::BUZZ_WIRELESS],
            input_report_len: 6,
            output_report_len: 8,
            read_poll_ms: DEFAULT_READ_POLL_MS,
        }
    }
}

impl BuzzConfig {
    /// Check the values against what the report codec needs.
    pub fn validate(&self) -> Result<()> {
        if self.product_ids.is_empty() {
            return Err(Error::Config("product_ids must not be empty".into()));
        }
        if self.input_report_len < MIN_INPUT_REPORT_LEN {
            return Err(Error::Config(format!(
                "input_report_len {} is below the minimum of {MIN_INPUT_REPORT_LEN}",
                self.input_report_len
            )));
        }
        if self.output_report_len < MIN_OUTPUT_REPORT_LEN {
            return Err(Error::Config(format!(
                "output_report_len {} is below the minimum of {MIN_OUTPUT_REPORT_LEN}",
                self.output_report_len
            )));
        }
        if self.read_poll_ms <= 0 {
            return Err(Error::Config("read_poll_ms must be positive".into()));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_json(&json)
    }

    /// Resolve configuration: explicit path, then [`CONFIG_ENV`], then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match config_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

/// The config file that [`BuzzConfig::resolve`] would read, if any.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}
