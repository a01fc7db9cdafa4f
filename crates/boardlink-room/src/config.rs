//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Display name used when a join carries none, or only whitespace.
pub const DEFAULT_NAME: &str = "Player";

/// Settings the [`Registry`](crate::Registry) applies to every join.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Longest display name kept, in characters. Longer names are cut.
    pub max_name_len: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_name_len: 32 }
    }
}

impl RegistryConfig {
    /// Trims `raw`, falls back to [`DEFAULT_NAME`], and caps the length on
    /// a character boundary.
    pub fn normalize_name(&self, raw: Option<&str>) -> String {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        let name = if trimmed.is_empty() { DEFAULT_NAME } else { trimmed };
        name.chars().take(self.max_name_len).collect()
    }
}
