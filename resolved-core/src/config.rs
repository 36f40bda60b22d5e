//! Tracker configuration.
//!
//! Loaded from TOML and passed explicitly to the tracker; nothing here reads
//! process-wide state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_READ_PRIVILEGE: &str = "topics:read";
const MAX_CUTOFF_DAYS: u32 = 3650;

/// How the blocked-post scanner treats a page made up only of posts by
/// blocked authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Keep paging until an unblocked post turns up or the unread range is
    /// exhausted.
    #[default]
    Exhaustive,
    /// Decide on the first non-empty page.
    FirstPage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Days of history considered. `None` disables the cutoff entirely.
    pub unresolved_cutoff_days: Option<u32>,
    pub scan_mode: ScanMode,
    /// Privilege checked before topics are surfaced.
    pub read_privilege: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            unresolved_cutoff_days: None,
            scan_mode: ScanMode::default(),
            read_privilege: DEFAULT_READ_PRIVILEGE.to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn with_cutoff_days(mut self, days: u32) -> Self {
        self.unresolved_cutoff_days = Some(days);
        self
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(days) = self.unresolved_cutoff_days {
            if days == 0 || days > MAX_CUTOFF_DAYS {
                return Err(ConfigError::InvalidValue {
                    field: "unresolved_cutoff_days".to_string(),
                    value: days.to_string(),
                });
            }
        }
        if self.read_privilege.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "read_privilege must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
