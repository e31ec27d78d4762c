// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command line settings.
//!
//! Stored as RON in `procgraph.ron`. A missing file yields the defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings file format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "procgraph.ron";

/// Host settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// Settings format version
    pub version: u32,
    /// Extra `tracing` filter directive, applied on top of `RUST_LOG`
    pub log_filter: String,
    /// Resize the graph to this width after loading
    pub default_width: Option<u32>,
    /// Resize the graph to this height after loading
    pub default_height: Option<u32>,
    /// Quiet period before a changed document is reloaded
    pub watch_debounce_ms: u64,
    /// Print the value of every output node
    pub print_values: bool,
    /// Print the compiled program for every output node
    pub compile_outputs: bool,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            log_filter: "procgraph_graph=info".to_string(),
            default_width: None,
            default_height: None,
            watch_debounce_ms: 250,
            print_values: true,
            compile_outputs: false,
        }
    }
}

impl CliSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: CliSettings = ron::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Settings version {} is newer than supported version {}",
                    settings.version, SETTINGS_FORMAT_VERSION
                ),
            ));
        }

        Ok(settings)
    }

    /// Load an explicit file, or `procgraph.ron` if present, or the defaults
    pub fn resolve(path: Option<&Path>) -> std::io::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = Path::new(SETTINGS_FILE_NAME);
                if path.exists() {
                    Self::load(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .depth_limit(4)
            .separate_tuple_members(true);

        let content = ron::ser::to_string_pretty(self, config).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(path, content)
    }

    /// Target size when both dimensions are configured
    pub fn target_size(&self) -> Option<(u32, u32)> {
        Some((self.default_width?, self.default_height?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = CliSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert!(settings.print_values);
        assert_eq!(settings.target_size(), None);
    }

    #[test]
    fn test_serialization() {
        let settings = CliSettings {
            default_width: Some(512),
            default_height: Some(256),
            ..CliSettings::default()
        };
        let ron_str =
            ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::default()).unwrap();
        let loaded: CliSettings = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.target_size(), Some((512, 256)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let loaded: CliSettings = ron::from_str("(compile_outputs: true)").unwrap();
        assert!(loaded.compile_outputs);
        assert_eq!(loaded.watch_debounce_ms, 250);
    }

    #[test]
    fn test_newer_version_rejected() {
        let path = std::env::temp_dir().join(format!(
            "procgraph-settings-{}.ron",
            std::process::id()
        ));
        std::fs::write(&path, "(version: 99)").unwrap();
        let err = CliSettings::load(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
