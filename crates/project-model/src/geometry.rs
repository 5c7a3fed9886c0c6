//! Placement math for drawing media onto the output canvas.
//!
//! Timeline items describe position and size as percentages of the canvas;
//! the renderer converts them to pixel rects here.

use serde::{Deserialize, Serialize};

/// A rectangle expressed in percentages of the canvas (`0.0..=100.0`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation in degrees about the rect centre.
    #[serde(default)]
    pub rotation: f64,
}

/// A rectangle in output pixel coordinates. May extend past the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl PercentRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Interpret `(x, y)` as the centre of the rect.
    pub fn to_centered_pixels(&self, canvas_w: u32, canvas_h: u32) -> DrawRect {
        let w = (self.width / 100.0 * canvas_w as f64) as f32;
        let h = (self.height / 100.0 * canvas_h as f64) as f32;
        let cx = (self.x / 100.0 * canvas_w as f64) as f32;
        let cy = (self.y / 100.0 * canvas_h as f64) as f32;
        DrawRect {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }

    /// Interpret `(x, y)` as the top-left corner of the rect.
    pub fn to_top_left_pixels(&self, canvas_w: u32, canvas_h: u32) -> DrawRect {
        DrawRect {
            x: (self.x / 100.0 * canvas_w as f64) as f32,
            y: (self.y / 100.0 * canvas_h as f64) as f32,
            w: (self.width / 100.0 * canvas_w as f64) as f32,
            h: (self.height / 100.0 * canvas_h as f64) as f32,
        }
    }
}

impl DrawRect {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Whether the rect covers `[0, w] x [0, h]` entirely.
    pub fn covers(&self, canvas_w: u32, canvas_h: u32) -> bool {
        const EPS: f32 = 1e-2;
        self.x <= EPS
            && self.y <= EPS
            && self.right() >= canvas_w as f32 - EPS
            && self.bottom() >= canvas_h as f32 - EPS
    }

    /// Axis-aligned bounds after rotating the rect about its centre.
    pub fn rotated_bounds(&self, degrees: f64) -> DrawRect {
        if degrees.abs() <= 0.01 {
            return *self;
        }
        let (sin, cos) = (degrees.to_radians() as f32).sin_cos();
        let w = self.w * cos.abs() + self.h * sin.abs();
        let h = self.w * sin.abs() + self.h * cos.abs();
        let (cx, cy) = self.center();
        DrawRect {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }
}

/// Scale a source to fully cover the destination, centre-cropping overflow.
///
/// A source wider than the destination fits its height and overflows width;
/// otherwise it fits width and overflows height. The returned rect is centred
/// on the destination and never letterboxes.
pub fn cover_fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> DrawRect {
    let dst_wf = dst_w as f32;
    let dst_hf = dst_h as f32;
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return DrawRect {
            x: 0.0,
            y: 0.0,
            w: dst_wf,
            h: dst_hf,
        };
    }

    let src_aspect = src_w as f32 / src_h as f32;
    let dst_aspect = dst_wf / dst_hf;

    let (w, h) = if src_aspect > dst_aspect {
        (dst_hf * src_aspect, dst_hf)
    } else {
        (dst_wf, dst_wf / src_aspect)
    };

    DrawRect {
        x: (dst_wf - w) / 2.0,
        y: (dst_hf - h) / 2.0,
        w,
        h,
    }
}
