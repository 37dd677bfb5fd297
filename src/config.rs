//! Startup configuration.
//!
//! Loaded from a TOML file next to the binary (or wherever `CONFIG_PATH`
//! points); a missing file means defaults, a malformed one is an error.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    grbl::Axis,
    input::mapper::InputLayout,
    jog::runner::{HomeBindings, LoopSettings},
};

const CONFIG_PATH_VAR: &str = "CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "grbl_jog.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub port: String,
    pub baud: u32,
    /// Stick deflection below this is treated as centered.
    pub deadzone: f64,
    /// Incremental travel per command at full deflection, in mm.
    pub max_step_mm: f64,
    pub feed_mm_per_min: f64,
    /// Minimum spacing between motion commands, in seconds.
    pub command_interval_s: f64,
    /// Input poll cadence, in seconds.
    pub poll_interval_s: f64,
    pub input: InputLayout,
    pub home: HomeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HomeConfig {
    /// Axes restored by go-home; empty falls back to Z.
    pub axes: Vec<Axis>,
    pub save_button: Option<usize>,
    pub go_button: Option<usize>,
}

impl Default for HomeConfig {
    fn default() -> Self {
        // X saves, Y returns, on the usual A/B/X/Y pad numbering.
        HomeConfig {
            axes: vec![Axis::Z],
            save_button: Some(2),
            go_button: Some(3),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: "/dev/ttyACM0".to_string(),
            baud: 115_200,
            deadzone: 0.2,
            max_step_mm: 1.0,
            feed_mm_per_min: 500.0,
            command_interval_s: 0.2,
            poll_interval_s: 0.01,
            input: InputLayout::default(),
            home: HomeConfig::default(),
        }
    }
}

impl Config {
    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            feed_mm_per_min: self.feed_mm_per_min,
            poll_interval: Duration::from_secs_f64(self.poll_interval_s),
            command_interval: Duration::from_secs_f64(self.command_interval_s),
        }
    }

    pub fn home_bindings(&self) -> HomeBindings {
        HomeBindings {
            save_button: self.home.save_button,
            go_button: self.home.go_button,
        }
    }

    fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => PathBuf::from(path),
            Err(_) => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn load(explicit: Option<&Path>) -> io::Result<Config> {
        let path = Self::resolve_path(explicit);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file missing, using defaults");
                return Ok(Config::default());
            }
            Err(e) => return Err(e),
        };
        toml::from_str(&content).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse {}: {e}", path.display()),
            )
        })
    }

    /// Write the default configuration for the operator to edit.
    pub fn write_default(explicit: Option<&Path>) -> io::Result<PathBuf> {
        let path = Self::resolve_path(explicit);
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mapper::ZSource;

    #[test]
    fn defaults_round_trip_through_toml() {
        let rendered = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.port, "/dev/ttyACM0");
        assert_eq!(parsed.baud, 115_200);
        assert_eq!(parsed.home.axes, vec![Axis::Z]);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            r#"
                port = "/dev/ttyUSB0"
                deadzone = 0.4
            "#,
        )
        .unwrap();
        assert_eq!(parsed.port, "/dev/ttyUSB0");
        assert_eq!(parsed.deadzone, 0.4);
        assert_eq!(parsed.max_step_mm, 1.0);
        assert_eq!(parsed.feed_mm_per_min, 500.0);
    }

    #[test]
    fn continuous_layout_with_trigger_z() {
        let parsed: Config = toml::from_str(
            r#"
                [input]
                mode = "continuous"
                x_axis = 0
                y_axis = 1
                invert_y = true

                [input.z_source]
                kind = "triggers"
                left = 4
                right = 5
            "#,
        )
        .unwrap();
        match parsed.input {
            InputLayout::Continuous(layout) => {
                assert_eq!(layout.z_source, ZSource::Triggers { left: 4, right: 5 });
            }
            other => panic!("unexpected layout: {other:?}"),
        }
    }

    #[test]
    fn discrete_layout_parses() {
        let parsed: Config = toml::from_str(
            r#"
                [input]
                mode = "discrete"
                hat = 0

                [input.z_buttons]
                positive = 0
                negative = 1
            "#,
        )
        .unwrap();
        assert!(matches!(parsed.input, InputLayout::Discrete(_)));
    }

    #[test]
    fn loop_settings_convert_seconds() {
        let settings = Config::default().loop_settings();
        assert_eq!(settings.command_interval, Duration::from_millis(200));
        assert_eq!(settings.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn home_bindings_follow_the_button_map() {
        let bindings = Config::default().home_bindings();
        assert_eq!(bindings.save_button, Some(2));
        assert_eq!(bindings.go_button, Some(3));
    }
}
