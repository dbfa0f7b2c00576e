use crate::environment::{preset, EnvironmentMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "viewer.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Envmap Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Viewer settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub asset_root: PathBuf,
    pub initial_mode: EnvironmentMode,
    pub model: PathBuf,
    /// Overrides of the per-mode env map, keyed by mode label.
    pub env_maps: BTreeMap<EnvironmentMode, PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            asset_root: PathBuf::from("assets"),
            initial_mode: EnvironmentMode::default(),
            model: PathBuf::from("models/pig/pig.glb"),
            env_maps: BTreeMap::new(),
        }
    }
}

impl ViewerConfig {
    pub fn env_map(&self, mode: EnvironmentMode) -> PathBuf {
        self.env_maps
            .get(&mode)
            .cloned()
            .unwrap_or_else(|| PathBuf::from(preset(mode).env_map))
    }

    pub fn from_json(json: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| ConfigError::Json {
            path: origin.to_string(),
            source,
        })
    }
}

pub fn load_config_from_file(path: &Path) -> Result<ViewerConfig> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ViewerConfig::from_json(&json, &path.display().to_string())
}

/// Explicit path if given, else `viewer.json` when present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ViewerConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }
    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    if fallback.is_file() {
        return load_config_from_file(fallback);
    }
    Ok(ViewerConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = ViewerConfig::from_json("{}", "inline").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.initial_mode, EnvironmentMode::Field1);
        assert_eq!(config.model, PathBuf::from("models/pig/pig.glb"));
        assert_eq!(
            config.env_map(EnvironmentMode::RealTime),
            PathBuf::from("environment_maps/field_3/field_2k.hdr")
        );
    }

    #[test]
    fn overrides_use_mode_labels() {
        let json = r#"{
            "window": { "title": "Pig", "width": 800 },
            "initial_mode": "light-studio",
            "env_maps": { "field_2": "hdr/other.hdr" }
        }"#;
        let config = ViewerConfig::from_json(json, "inline").unwrap();
        assert_eq!(config.window.title, "Pig");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.initial_mode, EnvironmentMode::LightStudio);
        assert_eq!(
            config.env_map(EnvironmentMode::Field2),
            PathBuf::from("hdr/other.hdr")
        );
        assert_eq!(
            config.env_map(EnvironmentMode::Field1),
            PathBuf::from("environment_maps/field/field_2k.hdr")
        );
    }

    #[test]
    fn unknown_mode_is_a_json_error() {
        let err = ViewerConfig::from_json(r#"{ "initial_mode": "beach" }"#, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn missing_explicit_file_is_an_io_error() {
        let err = load_config(Some(Path::new("does/not/exist.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn file_round_trip() {
        let mut config = ViewerConfig::default();
        config.asset_root = PathBuf::from("/srv/assets");
        config
            .env_maps
            .insert(EnvironmentMode::LightStudio, PathBuf::from("studio.hdr"));

        let mut path = std::env::temp_dir();
        path.push(format!("envmap_viewer_config_{}.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(path);
    }
}
