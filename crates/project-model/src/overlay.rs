//! Text and blur overlays.

use serde::{Deserialize, Serialize};

use crate::geometry::PercentRect;

/// Smallest font size the renderer will draw, in pixels.
pub const MIN_FONT_PX: f32 = 10.0;

/// Blur intensity bounds.
pub const MIN_BLUR_INTENSITY: f64 = 1.0;
pub const MAX_BLUR_INTENSITY: f64 = 50.0;

/// Horizontal alignment of multi-line text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// A caption drawn on top of everything else, centred at `(x%, y%)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    pub id: String,
    pub text: String,
    pub start: i64,
    pub duration: i64,
    pub x: f64,
    pub y: f64,

    /// Size in rem; one rem renders as 16 px.
    pub font_size: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,

    /// CSS-style hex colour (`#fff`, `#ffffff`, `#ffffffcc`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// CSS font weight (`bold`, `normal`, `700`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
}

impl TextOverlay {
    pub fn new(id: impl Into<String>, text: impl Into<String>, start: i64, duration: i64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            start,
            duration,
            x: 50.0,
            y: 50.0,
            font_size: 2.0,
            rotation: None,
            color: None,
            font_weight: None,
            text_align: None,
        }
    }

    pub fn end(&self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    pub fn contains_frame(&self, frame: i64) -> bool {
        frame >= self.start && frame < self.end()
    }

    /// Rendered font size in pixels.
    pub fn font_px(&self) -> f32 {
        ((self.font_size * 16.0) as f32).max(MIN_FONT_PX)
    }

    /// Fill colour as RGBA, white when unset or unparseable.
    pub fn rgba(&self) -> [u8; 4] {
        self.color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or([255, 255, 255, 255])
    }

    /// Text renders bold unless a lighter weight is requested.
    pub fn is_bold(&self) -> bool {
        match self.font_weight.as_deref().map(str::trim) {
            None => true,
            Some("normal") | Some("lighter") => false,
            Some(weight) => weight.parse::<u32>().map(|w| w >= 600).unwrap_or(true),
        }
    }

    pub fn align(&self) -> TextAlign {
        self.text_align.unwrap_or_default()
    }

    pub fn rotation_deg(&self) -> f64 {
        self.rotation.unwrap_or(0.0)
    }
}

/// Clip shape of a blur region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurShape {
    #[default]
    Rect,
    Circle,
}

/// A region whose already-composited pixels are re-blurred.
///
/// `(x, y)` is the top-left corner of the bounding box; all four values are
/// percentages of the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlurOverlay {
    pub id: String,
    pub start: i64,
    pub duration: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    #[serde(alias = "blurIntensity", default = "default_intensity")]
    pub intensity: f64,

    #[serde(default)]
    pub shape: BlurShape,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

fn default_intensity() -> f64 {
    10.0
}

impl BlurOverlay {
    pub fn new(id: impl Into<String>, start: i64, duration: i64, region: PercentRect) -> Self {
        Self {
            id: id.into(),
            start,
            duration,
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            intensity: default_intensity(),
            shape: BlurShape::Rect,
            rotation: (region.rotation != 0.0).then_some(region.rotation),
        }
    }

    pub fn end(&self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    pub fn contains_frame(&self, frame: i64) -> bool {
        frame >= self.start && frame < self.end()
    }

    /// Intensity clamped to the supported range.
    pub fn clamped_intensity(&self) -> f64 {
        if self.intensity.is_finite() {
            self.intensity.clamp(MIN_BLUR_INTENSITY, MAX_BLUR_INTENSITY)
        } else {
            MIN_BLUR_INTENSITY
        }
    }

    pub fn region(&self) -> PercentRect {
        PercentRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            rotation: self.rotation.unwrap_or(0.0),
        }
    }
}

/// Parse `#rgb`, `#rrggbb`, or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Option<[u8; 4]> {
    let hex = value.trim().strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut rgba = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgba[i] = v * 17;
            }
            Some(rgba)
        }
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ]),
        8 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            channel(&hex[6..8])?,
        ]),
        _ => None,
    }
}
