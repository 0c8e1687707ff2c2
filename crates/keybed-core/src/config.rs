use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use keybed_layout::SizingMode;
use keybed_midi::MidiSettings;
use serde::{Deserialize, Serialize};

/// How the on-screen keyboard sizes itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub mode: SizingMode,
    /// Alignment grid for every derived length, usually one device pixel.
    pub min_pixel_unit: f32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            mode: SizingMode::ExactFit,
            min_pixel_unit: 1.0,
        }
    }
}

/// Startup settings. Read once, never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybedConfig {
    pub midi: MidiSettings,
    pub layout: LayoutSettings,
    /// Malformed messages (and failed sends) logged before going quiet.
    pub malformed_log_limit: u32,
    /// Device messages allowed to wait in the control queue; 0 means
    /// unbounded. Local commands are never refused.
    pub control_queue_capacity: usize,
}

impl Default for KeybedConfig {
    fn default() -> Self {
        Self {
            midi: MidiSettings::default(),
            layout: LayoutSettings::default(),
            malformed_log_limit: 16,
            control_queue_capacity: 1024,
        }
    }
}

impl KeybedConfig {
    pub fn with_midi(mut self, midi: MidiSettings) -> Self {
        self.midi = midi;
        self
    }

    /// `<config dir>/keybed/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        let mut base = dirs::config_dir()?;
        base.push("keybed");
        base.push("settings.json");
        Some(base)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Loads `explicit` when given. Otherwise the default location is used
    /// if a file exists there, falling back to defaults.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading settings");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: KeybedConfig =
            serde_json::from_str(r#"{ "layout": { "mode": "preferred_aspect" } }"#).unwrap();
        assert_eq!(config.layout.mode, SizingMode::PreferredAspect);
        assert_eq!(config.layout.min_pixel_unit, 1.0);
        assert_eq!(config.malformed_log_limit, 16);
        assert_eq!(config.midi, MidiSettings::default());
    }

    #[test]
    fn with_midi_replaces_only_the_midi_section() {
        let config = KeybedConfig {
            malformed_log_limit: 4,
            ..KeybedConfig::default()
        };
        let midi = config.midi.clone().with_virtual_ports(true);
        let config = config.with_midi(midi);
        assert!(config.midi.virtual_ports);
        assert_eq!(config.malformed_log_limit, 4);
        assert_eq!(config.layout, LayoutSettings::default());
    }

    #[test]
    fn load_reads_a_file_and_reports_bad_input() {
        let dir = std::env::temp_dir().join(format!("keybed-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.json");
        fs::write(&good, r#"{ "control_queue_capacity": 8, "midi": { "output_channel": 2 } }"#)
            .unwrap();
        let config = KeybedConfig::load(&good).unwrap();
        assert_eq!(config.control_queue_capacity, 8);
        assert_eq!(config.midi.output_channel, 2);

        let bad = dir.join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        let err = KeybedConfig::load(&bad).unwrap_err();
        assert!(err.to_string().contains("invalid settings"));

        assert!(KeybedConfig::discover(Some(dir.join("missing.json").as_path())).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
