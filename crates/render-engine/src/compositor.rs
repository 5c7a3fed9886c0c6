//! Frame compositor: draws one output frame from the active timeline items.
//!
//! Layering is fixed: background fill, then at most one cover-fit video,
//! then image clips, then blur regions (which re-blur whatever is already on
//! the canvas), and finally text on top of everything.

use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use reelgif_common::clock::FrameClock;
use reelgif_project_model::{
    cover_fit, BlurOverlay, BlurShape, Clip, Composition, DrawRect, PercentRect, TextOverlay,
};

use crate::text::TextRenderer;

/// Everything visible on one output frame.
#[derive(Debug, Clone)]
pub struct FramePlan<'a> {
    /// Output frame index.
    pub output_frame: u64,

    /// Timeline frame sampled by this output frame.
    pub timeline_frame: i64,

    /// The single video drawn full-canvas, if any.
    pub video: Option<&'a Clip>,

    /// Image clips in draw order.
    pub images: Vec<&'a Clip>,

    /// Blur regions in application order.
    pub blurs: Vec<&'a BlurOverlay>,

    /// Text overlays in draw order.
    pub texts: Vec<&'a TextOverlay>,
}

impl<'a> FramePlan<'a> {
    /// The active video and the source time it shows on this frame.
    pub fn video_sample(&self, timeline_fps: f64) -> Option<(&'a Clip, f64)> {
        self.video
            .map(|clip| (clip, clip.source_secs_at(self.timeline_frame, timeline_fps)))
    }
}

/// Resolve the active items for one output frame.
pub fn plan_frame<'a>(
    composition: &'a Composition,
    clock: &FrameClock,
    output_frame: u64,
) -> FramePlan<'a> {
    let timeline_frame = clock.timeline_frame(output_frame) as i64;
    FramePlan {
        output_frame,
        timeline_frame,
        video: composition.active_video_at(timeline_frame),
        images: composition.active_images_at(timeline_frame),
        blurs: composition.active_blurs_at(timeline_frame),
        texts: composition.active_text_at(timeline_frame),
    }
}

/// Plans for every output frame of an export, in order.
pub fn plan_frames<'a>(composition: &'a Composition, clock: &FrameClock) -> Vec<FramePlan<'a>> {
    let total = clock.total_output_frames(composition.content_duration());
    (0..total)
        .map(|frame| plan_frame(composition, clock, frame))
        .collect()
}

/// Draws planned frames onto a fixed-size canvas.
#[derive(Clone)]
pub struct Compositor {
    width: u32,
    height: u32,
    background: Rgba<u8>,
    text: Option<Arc<TextRenderer>>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("background", &self.background)
            .field("text", &self.text.is_some())
            .finish()
    }
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            background: Rgba([0, 0, 0, 255]),
            text: None,
        }
    }

    pub fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = background;
        self
    }

    pub fn with_text_renderer(mut self, text: Option<Arc<TextRenderer>>) -> Self {
        self.text = text;
        self
    }

    /// A canvas of the output size filled with the background colour.
    pub fn new_canvas(&self) -> RgbaImage {
        RgbaImage::from_pixel(self.width, self.height, self.background)
    }

    /// Draw one frame. `video_frame` is the decoded frame of `plan.video`;
    /// images missing from `images` (failed preloads) are skipped.
    pub fn compose(
        &self,
        canvas: &mut RgbaImage,
        plan: &FramePlan<'_>,
        video_frame: Option<&RgbaImage>,
        images: &HashMap<String, RgbaImage>,
    ) {
        for pixel in canvas.pixels_mut() {
            *pixel = self.background;
        }

        if plan.video.is_some() {
            if let Some(frame) = video_frame {
                draw_cover(canvas, frame);
            }
        }

        for clip in &plan.images {
            if let Some(image) = images.get(&clip.id) {
                draw_placed(canvas, image, clip.placement());
            }
        }

        for blur in &plan.blurs {
            apply_blur(canvas, blur, self.blur_sigma(blur));
        }

        if let Some(text) = &self.text {
            for overlay in &plan.texts {
                text.draw(canvas, overlay);
            }
        }
    }

    /// Blur radius in canvas pixels: the intensity, clamped to [1, 50].
    fn blur_sigma(&self, blur: &BlurOverlay) -> f32 {
        blur.clamped_intensity() as f32
    }
}

/// Draw `frame` so it covers the whole canvas, cropping the overflow evenly.
pub fn draw_cover(canvas: &mut RgbaImage, frame: &RgbaImage) {
    let (cw, ch) = canvas.dimensions();
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 || cw == 0 || ch == 0 {
        return;
    }

    let rect = cover_fit(fw, fh, cw, ch);
    let scale = rect.w / fw as f32;

    // visible window in source pixels
    let crop_w = ((cw as f32 / scale).round() as u32).clamp(1, fw);
    let crop_h = ((ch as f32 / scale).round() as u32).clamp(1, fh);
    let crop_x = (fw - crop_w) / 2;
    let crop_y = (fh - crop_h) / 2;

    let visible = imageops::crop_imm(frame, crop_x, crop_y, crop_w, crop_h).to_image();
    let scaled = if (crop_w, crop_h) == (cw, ch) {
        visible
    } else {
        imageops::resize(&visible, cw, ch, FilterType::Triangle)
    };
    imageops::replace(canvas, &scaled, 0, 0);
}

/// Draw an image centred at its placement, sized and rotated about its centre.
pub fn draw_placed(canvas: &mut RgbaImage, image: &RgbaImage, placement: PercentRect) {
    let (cw, ch) = canvas.dimensions();
    let rect = placement.to_centered_pixels(cw, ch);
    let w = rect.w.round() as u32;
    let h = rect.h.round() as u32;
    if w == 0 || h == 0 || image.width() == 0 || image.height() == 0 {
        return;
    }

    let resized = imageops::resize(image, w, h, FilterType::Triangle);
    if placement.rotation.abs() <= 0.01 {
        imageops::overlay(canvas, &resized, rect.x.round() as i64, rect.y.round() as i64);
        return;
    }

    let rotated = rotate_rgba(&resized, placement.rotation as f32);
    let (cx, cy) = rect.center();
    let dest_x = (cx - rotated.width() as f32 * 0.5).round() as i64;
    let dest_y = (cy - rotated.height() as f32 * 0.5).round() as i64;
    imageops::overlay(canvas, &rotated, dest_x, dest_y);
}

/// Rotate clockwise by `rotation_deg`, growing the image so no corner is cut.
pub fn rotate_rgba(image: &RgbaImage, rotation_deg: f32) -> RgbaImage {
    let angle = rotation_deg.to_radians();
    let (sin, cos) = angle.sin_cos();
    let src_w = image.width().max(1) as f32;
    let src_h = image.height().max(1) as f32;
    // trim float noise so right angles don't grow a pixel
    let new_w = (src_w * cos.abs() + src_h * sin.abs() - 1e-3).ceil().max(1.0) as u32;
    let new_h = (src_w * sin.abs() + src_h * cos.abs() - 1e-3).ceil().max(1.0) as u32;

    let mut expanded = RgbaImage::from_pixel(new_w, new_h, Rgba([0, 0, 0, 0]));
    let offset_x = ((new_w as f32 - src_w) * 0.5).round() as i64;
    let offset_y = ((new_h as f32 - src_h) * 0.5).round() as i64;
    imageops::overlay(&mut expanded, image, offset_x, offset_y);

    rotate_about_center(&expanded, angle, Interpolation::Bilinear, Rgba([0, 0, 0, 0]))
}

/// Pixel-membership test for a blur region.
#[derive(Debug, Clone, Copy)]
struct BlurMask {
    cx: f32,
    cy: f32,
    half_w: f32,
    half_h: f32,
    radius: f32,
    sin: f32,
    cos: f32,
    shape: BlurShape,
}

impl BlurMask {
    fn new(rect: DrawRect, shape: BlurShape, rotation_deg: f64) -> Self {
        let (cx, cy) = rect.center();
        let (sin, cos) = (rotation_deg.to_radians() as f32).sin_cos();
        Self {
            cx,
            cy,
            half_w: rect.w / 2.0,
            half_h: rect.h / 2.0,
            radius: rect.w.min(rect.h) / 2.0,
            sin,
            cos,
            shape,
        }
    }

    fn contains(&self, px: f32, py: f32) -> bool {
        let dx = px - self.cx;
        let dy = py - self.cy;
        // undo the region rotation
        let lx = dx * self.cos + dy * self.sin;
        let ly = -dx * self.sin + dy * self.cos;
        match self.shape {
            BlurShape::Rect => lx.abs() <= self.half_w && ly.abs() <= self.half_h,
            BlurShape::Circle => lx * lx + ly * ly <= self.radius * self.radius,
        }
    }
}

/// Re-blur the pixels already on the canvas inside the overlay's shape.
///
/// The region (plus a 3σ margin so edges sample real neighbours) is copied
/// off-canvas, blurred, and written back only where the pixel centre falls
/// inside the shape. Pixels outside the shape are never modified.
pub fn apply_blur(canvas: &mut RgbaImage, blur: &BlurOverlay, sigma: f32) {
    let (cw, ch) = canvas.dimensions();
    let region = blur.region();
    let rect = region.to_top_left_pixels(cw, ch);
    if rect.w < 1.0 || rect.h < 1.0 {
        return;
    }

    let bounds = rect.rotated_bounds(region.rotation);
    let margin = (sigma * 3.0).ceil();
    let snap_x0 = (bounds.x - margin).floor().max(0.0) as u32;
    let snap_y0 = (bounds.y - margin).floor().max(0.0) as u32;
    let snap_x1 = ((bounds.right() + margin).ceil().max(0.0) as u32).min(cw);
    let snap_y1 = ((bounds.bottom() + margin).ceil().max(0.0) as u32).min(ch);
    if snap_x0 >= snap_x1 || snap_y0 >= snap_y1 {
        return;
    }

    let snapshot = imageops::crop_imm(
        &*canvas,
        snap_x0,
        snap_y0,
        snap_x1 - snap_x0,
        snap_y1 - snap_y0,
    )
    .to_image();
    let blurred = imageops::blur(&snapshot, sigma);

    let mask = BlurMask::new(rect, blur.shape, region.rotation);
    let x0 = bounds.x.floor().max(0.0) as u32;
    let y0 = bounds.y.floor().max(0.0) as u32;
    let x1 = (bounds.right().ceil().max(0.0) as u32).min(cw);
    let y1 = (bounds.bottom().ceil().max(0.0) as u32).min(ch);

    for py in y0..y1 {
        for px in x0..x1 {
            if mask.contains(px as f32 + 0.5, py as f32 + 0.5) {
                let source = blurred.get_pixel(px - snap_x0, py - snap_y0);
                canvas.put_pixel(px, py, *source);
            }
        }
    }
}
