//! Configuration file for the `ringtap` inspector.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use ringtap_core::CaptureOptions;
use serde::{Deserialize, Serialize};

/// Inspector configuration (`ringtap.toml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture options
    pub capture: CaptureOptions,
    /// Ring geometry
    pub ring: RingConfig,
}

/// Ring geometry; unset values are filled from flags or the snapshot size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Bytes per slot
    pub slot_size: Option<usize>,
    /// Number of slots
    pub slot_count: Option<usize>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that can never describe a ring.
    pub fn validate(&self) -> Result<()> {
        if self.ring.slot_size == Some(0) {
            bail!("ring.slot_size must be > 0");
        }
        if self.ring.slot_count == Some(0) {
            bail!("ring.slot_count must be > 0");
        }
        Ok(())
    }
}
