use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sws_record::SyncMode;
use sws_types::{SwitchError, SwitchResult};

/// Store-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub record: RecordConfig,
    /// Upper bound on dense ids per object type.
    pub max_objects_per_type: u64,
    /// Dispatch `Event::Object` after each successful mutation.
    pub emit_object_events: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record: RecordConfig::default(),
            max_objects_per_type: 1 << 32,
            emit_object_events: true,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> SwitchResult<Self> {
        toml::from_str(text).map_err(|e| SwitchError::invalid(format!("store config: {e}")))
    }

    pub fn from_toml_file(path: &Path) -> SwitchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SwitchError::not_found(format!("store config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

/// Record log settings. Recording is off when `path` is unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordConfig {
    pub path: Option<PathBuf>,
    pub sync_mode: SyncMode,
    /// Also log successful reads as `g` lines.
    pub record_gets: bool,
}
