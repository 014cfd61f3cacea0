use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use physbox_engine::sim::{MAX_STEPS_PER_SECOND, MIN_STEPS_PER_SECOND};
use physbox_engine::{
    resolve_app_paths, validate_sprite_key, BoundaryExtent, BoundarySpec, LoopConfig, Rgba,
    StartupError, Vec2, WorldConfig,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use super::spawner::SpawnerSettings;

pub(crate) const CONFIG_ENV_VAR: &str = "PHYSBOX_CONFIG";
pub(crate) const CONFIG_FILE_NAME: &str = "sandbox.json";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config json in {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WindowSettings {
    pub(crate) title: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) max_render_fps: Option<u32>,
    pub(crate) show_overlay: bool,
}

impl Default for WindowSettings {
    fn default() -> Self {
        let loop_defaults = LoopConfig::default();
        Self {
            title: loop_defaults.window_title,
            width: loop_defaults.window_width,
            height: loop_defaults.window_height,
            max_render_fps: loop_defaults.max_render_fps,
            show_overlay: loop_defaults.show_overlay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct TimingSettings {
    pub(crate) max_frame_delta_ms: u64,
    pub(crate) panic_threshold_ms: u64,
    pub(crate) metrics_log_interval_ms: u64,
    pub(crate) simulated_slow_frame_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let loop_defaults = LoopConfig::default();
        Self {
            max_frame_delta_ms: loop_defaults.max_frame_delta.as_millis() as u64,
            panic_threshold_ms: loop_defaults.panic_threshold.as_millis() as u64,
            metrics_log_interval_ms: loop_defaults.metrics_log_interval.as_millis() as u64,
            simulated_slow_frame_ms: loop_defaults.simulated_slow_frame_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WorldSettings {
    pub(crate) gravity: Vec2,
    pub(crate) pixels_per_unit: f32,
    pub(crate) steps_per_second: u32,
    pub(crate) boundaries: Vec<BoundarySpec>,
    pub(crate) draw_debug_lines: bool,
    pub(crate) use_interpolation: bool,
    pub(crate) bullet_mode: bool,
    pub(crate) background: Rgba,
}

impl Default for WorldSettings {
    fn default() -> Self {
        let world = WorldConfig::default();
        Self {
            gravity: world.gravity,
            pixels_per_unit: world.pixels_per_unit,
            steps_per_second: world.steps_per_second,
            boundaries: world.boundaries,
            draw_debug_lines: world.draw_debug_lines,
            use_interpolation: world.use_interpolation,
            bullet_mode: world.bullet_mode,
            background: world.background,
        }
    }
}

/// Contents of `config/sandbox.json`. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SandboxConfig {
    pub(crate) window: WindowSettings,
    pub(crate) timing: TimingSettings,
    pub(crate) world: WorldSettings,
    pub(crate) spawner: SpawnerSettings,
}

impl SandboxConfig {
    pub(crate) fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            window_title: self.window.title.clone(),
            window_width: self.window.width,
            window_height: self.window.height,
            max_frame_delta: Duration::from_millis(self.timing.max_frame_delta_ms),
            panic_threshold: Duration::from_millis(self.timing.panic_threshold_ms),
            metrics_log_interval: Duration::from_millis(self.timing.metrics_log_interval_ms),
            simulated_slow_frame_ms: self.timing.simulated_slow_frame_ms,
            max_render_fps: self.window.max_render_fps,
            show_overlay: self.window.show_overlay,
        }
    }

    pub(crate) fn world_config(&self) -> WorldConfig {
        WorldConfig {
            gravity: self.world.gravity,
            pixels_per_unit: self.world.pixels_per_unit,
            steps_per_second: self.world.steps_per_second,
            boundaries: self.world.boundaries.clone(),
            draw_debug_lines: self.world.draw_debug_lines,
            use_interpolation: self.world.use_interpolation,
            bullet_mode: self.world.bullet_mode,
            background: self.world.background,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(invalid("window", "width and height must be positive"));
        }
        if self.timing.max_frame_delta_ms == 0 {
            return Err(invalid("timing.max_frame_delta_ms", "must be positive"));
        }
        if self.timing.panic_threshold_ms == 0 {
            return Err(invalid("timing.panic_threshold_ms", "must be positive"));
        }

        let world = &self.world;
        if !(world.gravity.x.is_finite() && world.gravity.y.is_finite()) {
            return Err(invalid("world.gravity", "components must be finite"));
        }
        if !(world.pixels_per_unit.is_finite() && world.pixels_per_unit > 0.0) {
            return Err(invalid("world.pixels_per_unit", "must be a positive number"));
        }
        if !(MIN_STEPS_PER_SECOND..=MAX_STEPS_PER_SECOND).contains(&world.steps_per_second) {
            return Err(invalid(
                "world.steps_per_second",
                format!("must be within {MIN_STEPS_PER_SECOND}..={MAX_STEPS_PER_SECOND}"),
            ));
        }
        for boundary in &world.boundaries {
            let values = [boundary.origin.x, boundary.origin.y, boundary.friction];
            if values.iter().any(|value| !value.is_finite()) {
                return Err(invalid("world.boundaries", "values must be finite"));
            }
            if !(boundary.restitution.is_finite() && boundary.restitution >= 0.0) {
                return Err(invalid(
                    "world.boundaries",
                    "restitution must be a non-negative number",
                ));
            }
            for extent in [boundary.width, boundary.height] {
                if let BoundaryExtent::Pixels(pixels) = extent {
                    if !(pixels.is_finite() && pixels > 0.0) {
                        return Err(invalid(
                            "world.boundaries",
                            "pixel extents must be positive numbers",
                        ));
                    }
                }
            }
        }

        let spawner = &self.spawner;
        if !(spawner.min_half_size > 0.0 && spawner.min_half_size <= spawner.max_half_size) {
            return Err(invalid(
                "spawner.min_half_size",
                "must be positive and not above spawner.max_half_size",
            ));
        }
        if !(spawner.max_impulse.is_finite() && spawner.max_impulse >= 0.0) {
            return Err(invalid("spawner.max_impulse", "must be a non-negative number"));
        }
        for (field, chance) in [
            ("spawner.circle_chance", spawner.circle_chance),
            ("spawner.sprite_chance", spawner.sprite_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(invalid(field, "must be within 0.0..=1.0"));
            }
        }
        if let Some(key) = &spawner.sprite_key {
            validate_sprite_key(key)
                .map_err(|error| invalid("spawner.sprite_key", error.to_string()))?;
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Reads `PHYSBOX_CONFIG` when set, else `<root>/config/sandbox.json`. A
/// missing default file means built-in defaults.
pub(crate) fn load_sandbox_config() -> Result<SandboxConfig, ConfigError> {
    match env::var(CONFIG_ENV_VAR) {
        Ok(value) => load_from_path(Path::new(&value)),
        Err(env::VarError::NotPresent) => {
            let path = resolve_app_paths()?.config_dir.join(CONFIG_FILE_NAME);
            if path.is_file() {
                load_from_path(&path)
            } else {
                info!(path = %path.display(), "config_file_missing_using_defaults");
                Ok(SandboxConfig::default())
            }
        }
        Err(source) => Err(ConfigError::EnvVar {
            var: CONFIG_ENV_VAR,
            source,
        }),
    }
}

pub(crate) fn load_from_path(path: &Path) -> Result<SandboxConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&raw, path)?;
    config.validate()?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

fn parse_config(raw: &str, path: &Path) -> Result<SandboxConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}
