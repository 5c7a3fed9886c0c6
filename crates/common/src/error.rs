//! Error types shared across Reelgif crates.

use std::path::PathBuf;

/// Top-level error type for Reelgif operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelgifError {
    #[error("No video clips to export.")]
    NoContent,

    #[error("Video {index} load timeout")]
    PreloadTimeout { index: usize, clip_id: String },

    #[error("Failed to load video {index}: {message}")]
    PreloadFailure { index: usize, message: String },

    #[error("Seek timed out on clip {clip_id} at {secs:.3}s")]
    SeekTimeout { clip_id: String, secs: f64 },

    #[error("Seek error: {message}")]
    Seek { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Server render error: {message}")]
    ServerRender { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Delivery error: {message}")]
    Delivery { message: String },

    #[error("{message}")]
    Export { message: String },

    #[error("Invalid composition: {message}")]
    Composition { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Export cancelled")]
    Cancelled,

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelgifError.
pub type ReelgifResult<T> = Result<T, ReelgifError>;

impl ReelgifError {
    pub fn seek(msg: impl Into<String>) -> Self {
        Self::Seek {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn server_render(msg: impl Into<String>) -> Self {
        Self::ServerRender {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery {
            message: msg.into(),
        }
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a failure surfaced by the top-level export entry point.
    pub fn export(prefix: &str, cause: &ReelgifError) -> Self {
        Self::Export {
            message: format!("{prefix}: {cause}"),
        }
    }

    /// Whether the export can continue after this error by switching strategy.
    ///
    /// Only a failed server render is recoverable; the client renderer takes over.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ServerRender { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_content_message() {
        assert_eq!(
            ReelgifError::NoContent.to_string(),
            "No video clips to export."
        );
    }

    #[test]
    fn test_preload_messages_use_index() {
        let timeout = ReelgifError::PreloadTimeout {
            index: 2,
            clip_id: "clip-b".to_string(),
        };
        assert_eq!(timeout.to_string(), "Video 2 load timeout");

        let failure = ReelgifError::PreloadFailure {
            index: 1,
            message: "404".to_string(),
        };
        assert_eq!(failure.to_string(), "Failed to load video 1: 404");
    }

    #[test]
    fn test_export_wraps_cause_with_prefix() {
        let err = ReelgifError::export("Failed to export GIF", &ReelgifError::encode("boom"));
        assert_eq!(err.to_string(), "Failed to export GIF: Encode error: boom");
    }

    #[test]
    fn test_only_server_render_is_recoverable() {
        assert!(ReelgifError::server_render("500").is_recoverable());
        assert!(!ReelgifError::NoContent.is_recoverable());
        assert!(!ReelgifError::Cancelled.is_recoverable());
        assert!(!ReelgifError::encode("x").is_recoverable());
    }
}
