//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where exported artifacts are written.
    pub output_dir: PathBuf,

    /// Cycle timing defaults.
    #[serde(default)]
    pub cycle: CycleDefaults,

    /// Canvas geometry.
    #[serde(default)]
    pub canvas: CanvasDefaults,

    /// Capture/export parameters.
    #[serde(default)]
    pub capture: CaptureDefaults,

    /// Onion-skin overlay parameters.
    #[serde(default)]
    pub onion: OnionDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cycle timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleDefaults {
    /// Cycle duration in seconds.
    pub duration_secs: f64,

    /// Seed for the cycle color palette. `None` picks a fresh seed per session.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Canvas geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasDefaults {
    pub width: u32,
    pub height: u32,

    /// Origin subtracted from incoming pointer coordinates.
    #[serde(default)]
    pub origin_x: f64,
    #[serde(default)]
    pub origin_y: f64,
}

/// Capture/export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureDefaults {
    /// Frame rate pushed into the video stream.
    pub video_fps: u32,

    /// ffmpeg video codec for WebM output.
    pub video_codec: String,

    /// Target video bitrate.
    pub video_bitrate_kbps: u32,

    /// Minimum wall-clock spacing between sampled GIF frames.
    pub gif_frame_interval_ms: u64,

    /// Scale applied to sampled GIF frames.
    pub gif_scale: f64,

    /// Capture stops once elapsed reaches `duration - stop_guard_ms`.
    pub stop_guard_ms: u64,
}

/// Onion-skin overlay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnionDefaults {
    /// Overlay opacity while enabled.
    pub opacity: f32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "loopdraw=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: dirs_default_exports(),
            cycle: CycleDefaults::default(),
            canvas: CanvasDefaults::default(),
            capture: CaptureDefaults::default(),
            onion: OnionDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CycleDefaults {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            seed: None,
        }
    }
}

impl Default for CanvasDefaults {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            video_fps: 30,
            video_codec: "libvpx-vp9".to_string(),
            video_bitrate_kbps: 2500,
            gif_frame_interval_ms: 100,
            gif_scale: 0.5,
            stop_guard_ms: 30,
        }
    }
}

impl Default for OnionDefaults {
    fn default() -> Self {
        Self { opacity: 0.2 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&config_path, json)?;
        Ok(config_path)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("loopdraw").join("config.json")
}

/// Default export directory.
fn dirs_default_exports() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("loopdraw").join("exports")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_loop_parameters() {
        let config = AppConfig::default();
        assert_eq!(config.cycle.duration_secs, 30.0);
        assert_eq!(config.capture.gif_frame_interval_ms, 100);
        assert_eq!(config.capture.stop_guard_ms, 30);
        assert!((config.capture.gif_scale - 0.5).abs() < 1e-9);
        assert!((config.onion.opacity - 0.2).abs() < 1e-6);
        assert!(config.output_dir.ends_with("loopdraw/exports"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = AppConfig::default();
        config.cycle.seed = Some(42);
        config.canvas.width = 320;

        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.cycle.seed, Some(42));
        assert_eq!(parsed.canvas.width, 320);
        assert_eq!(parsed.capture.video_codec, "libvpx-vp9");
    }

    #[test]
    fn test_partial_config_fills_sections_with_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"output_dir": "/tmp/out", "cycle": {"duration_secs": 5.0}}"#)
                .unwrap();

        assert_eq!(parsed.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(parsed.cycle.duration_secs, 5.0);
        assert_eq!(parsed.cycle.seed, None);
        assert_eq!(parsed.canvas.height, 600);
        assert_eq!(parsed.logging.level, "info");
    }
}
