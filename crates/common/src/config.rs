//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ReelgifError, ReelgifResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where finished GIFs are written.
    pub exports_dir: PathBuf,

    /// Default export parameters.
    pub export: ExportDefaults,

    /// Server-side render endpoint.
    pub server: ServerRenderConfig,

    /// Font lookup for text overlays.
    pub text: TextConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters for the in-process renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output width in pixels.
    pub output_width: u32,

    /// Output height in pixels.
    pub output_height: u32,

    /// Output frame rate.
    pub output_fps: u32,

    /// Native timeline frame rate of the editor.
    pub timeline_fps: u32,

    /// Editor canvas size sent to the server renderer.
    pub editor_width: u32,
    pub editor_height: u32,

    /// GIF quantiser speed, 1 (best) to 30 (fastest).
    pub quality: u32,

    /// Upper bound on encoder worker threads.
    pub max_workers: usize,

    /// Per-video load timeout.
    pub preload_timeout_secs: u64,

    /// Per-frame seek timeout; 0 waits indefinitely.
    pub seek_timeout_secs: u64,

    /// Yield to the runtime after this many frames.
    pub yield_every_frames: u32,

    /// Canvas background colour (hex).
    pub background: String,
}

/// Server-side render endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRenderConfig {
    /// Whether to try the server renderer before rendering locally.
    pub enabled: bool,

    /// Render endpoint URL.
    pub endpoint: String,

    /// Request timeout for the render call and the artifact download.
    pub timeout_secs: u64,
}

/// Font configuration for text overlays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Regular weight font file.
    pub font_path: Option<PathBuf>,

    /// Bold weight font file.
    pub bold_font_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelgif=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exports_dir: dirs_default_exports(),
            export: ExportDefaults::default(),
            server: ServerRenderConfig::default(),
            text: TextConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_width: 480,
            output_height: 270,
            output_fps: 15,
            timeline_fps: 30,
            editor_width: 1920,
            editor_height: 1080,
            quality: 10,
            max_workers: 4,
            preload_timeout_secs: 10,
            seek_timeout_secs: 15,
            yield_every_frames: 3,
            background: "#000000".to_string(),
        }
    }
}

impl Default for ServerRenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:3000/api/render-gif".to_string(),
            timeout_secs: 300,
        }
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

    /// Reject settings the renderer cannot work with.
    pub fn validate(&self) -> ReelgifResult<()> {
        let export = &self.export;
        if export.output_width == 0 || export.output_height == 0 {
            return Err(ReelgifError::config("output dimensions must be non-zero"));
        }
        if export.output_width > u16::MAX as u32 || export.output_height > u16::MAX as u32 {
            return Err(ReelgifError::config("GIF dimensions cannot exceed 65535"));
        }
        if export.output_fps == 0 || export.timeline_fps == 0 {
            return Err(ReelgifError::config("frame rates must be non-zero"));
        }
        if !(1..=30).contains(&export.quality) {
            return Err(ReelgifError::config(format!(
                "quality must be within 1..=30, got {}",
                export.quality
            )));
        }
        if export.max_workers == 0 {
            return Err(ReelgifError::config("max_workers must be at least 1"));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelgif").join("config.json")
}

/// Default exports directory.
fn dirs_default_exports() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("reelgif").join("exports")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reduced_output() {
        let config = AppConfig::default();
        assert_eq!(config.export.output_width, 480);
        assert_eq!(config.export.output_height, 270);
        assert_eq!(config.export.output_fps, 15);
        assert_eq!(config.export.preload_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "export": { "output_fps": 10 } }"#).unwrap();
        assert_eq!(parsed.export.output_fps, 10);
        assert_eq!(parsed.export.output_width, 480);
        assert!(parsed.server.enabled);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let mut config = AppConfig::default();
        config.export.quality = 0;
        assert!(config.validate().is_err());
        config.export.quality = 31;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = AppConfig::default();
        config.export.max_workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ReelgifError::Config { .. })
        ));
    }
}
