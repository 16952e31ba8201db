//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! layout = "layouts/de.toml"   # optional; built-in PC set 1 when absent
//! events_enabled = true
//! double_click_ms = 500
//! mouse_buttons = 5
//! axis_dead_band = 0
//! client_width = 1280
//! client_height = 720
//! ```
//!
//! A relative `layout` path is resolved against the directory of the config file.

use crate::error::Result;
use crate::keymap::{KeyLayout, KeyMap};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Key layout file (`.toml` or `.json`).
    pub layout: Option<PathBuf>,
    /// Initial state of the per-device events flag.
    pub events_enabled: bool,
    /// Max gap between clicks that still chains into a multi-click.
    pub double_click_ms: u64,
    pub mouse_buttons: u16,
    /// Axis moves up to this size (per component) are not reported.
    pub axis_dead_band: u32,
    /// Client area size; 0 means unknown (every position counts as inside).
    pub client_width: u32,
    pub client_height: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            layout: None,
            events_enabled: true,
            double_click_ms: 500,
            mouse_buttons: 5,
            axis_dead_band: 0,
            client_width: 0,
            client_height: 0,
        }
    }
}

impl InputConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a config file, resolving a relative layout path next to it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(layout), Some(dir)) = (config.layout.as_mut(), path.parent()) {
            if layout.is_relative() {
                *layout = dir.join(&*layout);
            }
        }
        tracing::info!(path = %path.display(), "loaded input config");
        Ok(config)
    }

    pub fn double_click(&self) -> Duration {
        Duration::from_millis(self.double_click_ms)
    }

    pub fn client_size(&self) -> Option<(u32, u32)> {
        (self.client_width > 0 && self.client_height > 0)
            .then_some((self.client_width, self.client_height))
    }

    /// Key map from the configured layout, or the built-in one.
    pub fn key_map(&self) -> Result<KeyMap> {
        match &self.layout {
            Some(path) => KeyMap::from_layout(&KeyLayout::load(path)?),
            None => Ok(KeyMap::pc_set1()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;

    #[test]
    fn empty_config_uses_defaults() {
        let config = InputConfig::from_toml_str("").unwrap();
        assert_eq!(config, InputConfig::default());
        assert_eq!(config.double_click(), Duration::from_millis(500));
        assert_eq!(config.client_size(), None);
        assert_eq!(config.key_map().unwrap().name(), "pc-set1-us");
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = InputConfig::from_toml_str(
            "double_click_ms = 250\nclient_width = 640\nclient_height = 480\n",
        )
        .unwrap();
        assert_eq!(config.double_click_ms, 250);
        assert_eq!(config.client_size(), Some((640, 480)));
        assert!(config.events_enabled);
    }

    #[test]
    fn malformed_config_is_a_toml_error() {
        let err = InputConfig::from_toml_str("mouse_buttons = \"five\"").unwrap_err();
        assert!(matches!(err, InputError::Toml(_)));
    }

    #[test]
    fn relative_layout_resolves_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("mini.toml"),
            "name = \"mini\"\n[[keys]]\nkey_num = 1\npress = 1\nrelease = 129\nnpk = \"Escape\"\n",
        )
        .unwrap();
        let config_path = dir.path().join("input.toml");
        std::fs::write(&config_path, "layout = \"mini.toml\"\n").unwrap();

        let config = InputConfig::load(&config_path).unwrap();
        assert_eq!(config.layout.as_deref(), Some(dir.path().join("mini.toml").as_path()));
        let map = config.key_map().unwrap();
        assert_eq!(map.name(), "mini");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn missing_layout_file_is_an_io_error() {
        let config = InputConfig {
            layout: Some(PathBuf::from("/definitely/not/here.toml")),
            ..InputConfig::default()
        };
        assert!(matches!(config.key_map(), Err(InputError::Io(_))));
    }
}
