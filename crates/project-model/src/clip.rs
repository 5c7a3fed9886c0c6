//! Media clips placed on the timeline.

use serde::{Deserialize, Serialize};

use crate::geometry::PercentRect;

/// Kind of media a clip references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Video,
    Image,
}

/// One media asset placed on the timeline.
///
/// `start`, `duration`, and `start_from` are timeline frames. Spatial fields
/// are percentages of the output canvas and only apply to image clips; video
/// clips are always drawn cover-fit across the whole canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: ClipKind,

    /// Local path or http(s) URL of the media.
    pub src: String,

    /// First timeline frame the clip occupies.
    pub start: i64,

    /// Number of timeline frames the clip occupies.
    pub duration: i64,

    /// Offset into the source media, in timeline frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_from: Option<i64>,

    /// Editor row (track) the clip sits on.
    #[serde(default)]
    pub row: u32,

    /// Center X (percent of canvas width).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,

    /// Center Y (percent of canvas height).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,

    /// Rotation in degrees, clockwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl Clip {
    /// Create a full-canvas video clip.
    pub fn video(id: impl Into<String>, src: impl Into<String>, start: i64, duration: i64) -> Self {
        Self::new(id, ClipKind::Video, src, start, duration)
    }

    /// Create a full-canvas image clip.
    pub fn image(id: impl Into<String>, src: impl Into<String>, start: i64, duration: i64) -> Self {
        Self::new(id, ClipKind::Image, src, start, duration)
    }

    fn new(
        id: impl Into<String>,
        kind: ClipKind,
        src: impl Into<String>,
        start: i64,
        duration: i64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            src: src.into(),
            start,
            duration,
            start_from: None,
            row: 0,
            x: None,
            y: None,
            width: None,
            height: None,
            rotation: None,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == ClipKind::Video
    }

    pub fn is_image(&self) -> bool {
        self.kind == ClipKind::Image
    }

    /// First timeline frame after the clip.
    pub fn end(&self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    /// Whether the clip is visible on the given timeline frame.
    pub fn contains_frame(&self, frame: i64) -> bool {
        frame >= self.start && frame < self.end()
    }

    /// Source media time (seconds) shown on the given timeline frame.
    pub fn source_secs_at(&self, frame: i64, timeline_fps: f64) -> f64 {
        let offset = frame
            .saturating_sub(self.start)
            .saturating_add(self.start_from.unwrap_or(0));
        (offset.max(0) as f64) / timeline_fps
    }

    /// Placement on the canvas, defaulting to a centred full-canvas rect.
    pub fn placement(&self) -> PercentRect {
        PercentRect {
            x: self.x.unwrap_or(50.0),
            y: self.y.unwrap_or(50.0),
            width: self.width.unwrap_or(100.0),
            height: self.height.unwrap_or(100.0),
            rotation: self.rotation.unwrap_or(0.0),
        }
    }

    /// Whether two clips on the same row share at least one frame.
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.row == other.row && self.start < other.end() && other.start < self.end()
    }
}
