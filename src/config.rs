/// TOML session configuration with sensible defaults.
/// No config file is required — defaults give a 4-slot session with Sony
/// features off, the shape most callers want.

use serde::Deserialize;

/// Which Sony-specific feature level to request at session start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SonyFeatures {
    /// Treat Sony pads like any other gamepad.
    #[default]
    Off,
    /// Touchpad, sensors and adaptive triggers, no haptic audio.
    Features,
    /// Everything, including haptic feedback audio (needs an audio backend;
    /// degrades to `Features` if negotiation fails).
    FeaturesAndHaptics,
}

impl SonyFeatures {
    /// True for any level above `Off`.
    pub fn enabled(self) -> bool {
        !matches!(self, SonyFeatures::Off)
    }
}

/// Top-level session configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of controller slots the session tracks.
    pub max_controllers: usize,
    /// Keep the platform's raw-input path enabled. Off by default — raw
    /// input makes some platforms report pads twice.
    pub use_raw_input: bool,
    pub sony_features: SonyFeatures,
    /// Optional controller mapping database (SDL_GameControllerDB format).
    /// Load failures are logged and the session starts with builtin
    /// mappings.
    pub mappings_path: Option<String>,
    /// Read the mapping database into memory and hand the backend a buffer
    /// instead of a path (needed when the database ships inside an archive).
    pub load_mappings_in_memory: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_controllers: 4,
            use_raw_input: false,
            sony_features: SonyFeatures::Off,
            mappings_path: None,
            load_mappings_in_memory: true,
        }
    }
}

impl SessionConfig {
    /// Load config from a TOML file, or return defaults if the file is
    /// missing or malformed. Never fails — a bad config file shouldn't keep
    /// a session from starting.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded session config from {path}");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {path}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file at {path}. Using defaults.");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.max_controllers, 4);
        assert!(!config.use_raw_input);
        assert_eq!(config.sony_features, SonyFeatures::Off);
        assert!(config.mappings_path.is_none());
        assert!(config.load_mappings_in_memory);
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            max_controllers = 2
            sony_features = "features_and_haptics"
        "#;
        let config: SessionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_controllers, 2);
        assert_eq!(config.sony_features, SonyFeatures::FeaturesAndHaptics);
        // Untouched fields keep defaults
        assert!(!config.use_raw_input);
        assert!(config.load_mappings_in_memory);
    }

    #[test]
    fn feature_levels() {
        assert!(!SonyFeatures::Off.enabled());
        assert!(SonyFeatures::Features.enabled());
        assert!(SonyFeatures::FeaturesAndHaptics.enabled());
    }
}
