//! Caption rasterisation.
//!
//! Each overlay is drawn into its own transparent layer (drop shadow first,
//! then the fill), rotated about its centre and composited so the block is
//! centred at the overlay's `(x%, y%)`.

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::imageops;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};

use reelgif_common::config::TextConfig;
use reelgif_project_model::{TextAlign, TextOverlay};

use crate::compositor::rotate_rgba;

const LINE_HEIGHT: f32 = 1.2;
const SHADOW_RGBA: [u8; 4] = [0, 0, 0, 204];
const SHADOW_OFFSET: i64 = 2;
const SHADOW_SIGMA: f32 = 2.0;

const REGULAR_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Draws text overlays with a regular and an optional bold face.
#[derive(Clone)]
pub struct TextRenderer {
    regular: FontArc,
    bold: Option<FontArc>,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("bold", &self.bold.is_some())
            .finish_non_exhaustive()
    }
}

impl TextRenderer {
    pub fn from_fonts(regular: FontArc, bold: Option<FontArc>) -> Self {
        Self { regular, bold }
    }

    /// Load the configured fonts, falling back to well-known system fonts.
    ///
    /// Returns `None` when no usable face is found; captions are then skipped.
    pub fn load(config: &TextConfig) -> Option<Self> {
        let regular = load_font(config.font_path.as_deref(), REGULAR_CANDIDATES);
        let bold = load_font(config.bold_font_path.as_deref(), BOLD_CANDIDATES);

        match (regular, bold) {
            (Some(regular), bold) => Some(Self::from_fonts(regular, bold)),
            (None, Some(bold)) => Some(Self::from_fonts(bold, None)),
            (None, None) => {
                tracing::warn!("No usable font found, text overlays will not be drawn");
                None
            }
        }
    }

    fn face_for(&self, overlay: &TextOverlay) -> &FontArc {
        if overlay.is_bold() {
            self.bold.as_ref().unwrap_or(&self.regular)
        } else {
            &self.regular
        }
    }

    /// Draw one overlay onto the canvas.
    pub fn draw(&self, canvas: &mut RgbaImage, overlay: &TextOverlay) {
        let Some(layer) = self.render_layer(overlay) else {
            return;
        };

        let rotation = overlay.rotation_deg();
        let layer = if rotation.abs() > 0.01 {
            rotate_rgba(&layer, rotation as f32)
        } else {
            layer
        };

        let (cw, ch) = canvas.dimensions();
        let cx = overlay.x / 100.0 * cw as f64;
        let cy = overlay.y / 100.0 * ch as f64;
        let dest_x = (cx - layer.width() as f64 / 2.0).round() as i64;
        let dest_y = (cy - layer.height() as f64 / 2.0).round() as i64;
        imageops::overlay(canvas, &layer, dest_x, dest_y);
    }

    /// Rasterise the text block with its shadow into a padded layer.
    fn render_layer(&self, overlay: &TextOverlay) -> Option<RgbaImage> {
        let font = self.face_for(overlay);
        let font_px = overlay.font_px();
        let scale = PxScale::from(font_px);
        let lines: Vec<&str> = overlay.text.lines().collect();
        if lines.iter().all(|line| line.trim().is_empty()) {
            return None;
        }

        let widths: Vec<u32> = lines
            .iter()
            .map(|line| text_size(scale, font, line).0)
            .collect();
        let block_w = widths.iter().copied().max().unwrap_or(0);
        let line_h = (font_px * LINE_HEIGHT).ceil() as u32;
        let block_h = line_h * lines.len() as u32;

        let pad = SHADOW_OFFSET as u32 + (SHADOW_SIGMA * 3.0).ceil() as u32;
        let layer_w = block_w + pad * 2;
        let layer_h = block_h + pad * 2;
        let [r, g, b, a] = overlay.rgba();
        let [sr, sg, sb, sa] = SHADOW_RGBA;

        // transparent layers keep the ink colour so glyph edges blend cleanly
        let mut shadow = RgbaImage::from_pixel(layer_w, layer_h, Rgba([sr, sg, sb, 0]));
        let mut fill = RgbaImage::from_pixel(layer_w, layer_h, Rgba([r, g, b, 0]));
        let baseline_gap = ((line_h as f32 - font_px) / 2.0).max(0.0) as u32;

        for (i, (line, width)) in lines.iter().zip(&widths).enumerate() {
            let x = (pad + align_offset(overlay.align(), block_w, *width)) as i32;
            let y = (pad + i as u32 * line_h + baseline_gap) as i32;
            draw_text_mut(&mut shadow, Rgba([sr, sg, sb, sa]), x, y, scale, font, line);
            draw_text_mut(&mut fill, Rgba([r, g, b, a]), x, y, scale, font, line);
        }

        let mut layer = RgbaImage::new(layer_w, layer_h);
        let shadow = imageops::blur(&shadow, SHADOW_SIGMA);
        imageops::overlay(&mut layer, &shadow, SHADOW_OFFSET, SHADOW_OFFSET);
        imageops::overlay(&mut layer, &fill, 0, 0);
        Some(layer)
    }
}

/// Horizontal offset of a line inside a block of `block_w` pixels.
fn align_offset(align: TextAlign, block_w: u32, line_w: u32) -> u32 {
    let slack = block_w.saturating_sub(line_w);
    match align {
        TextAlign::Left => 0,
        TextAlign::Center => slack / 2,
        TextAlign::Right => slack,
    }
}

fn load_font(configured: Option<&Path>, candidates: &[&str]) -> Option<FontArc> {
    let paths = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(candidates.iter().map(PathBuf::from));

    for path in paths {
        if !path.exists() {
            continue;
        }
        match std::fs::read(&path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    tracing::debug!(path = %path.display(), "Loaded font");
                    return Some(font);
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Invalid font file"),
            },
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to read font"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_renderer() -> Option<TextRenderer> {
        TextRenderer::load(&TextConfig::default())
    }

    #[test]
    fn test_align_offsets() {
        assert_eq!(align_offset(TextAlign::Left, 100, 40), 0);
        assert_eq!(align_offset(TextAlign::Center, 100, 40), 30);
        assert_eq!(align_offset(TextAlign::Right, 100, 40), 60);
        assert_eq!(align_offset(TextAlign::Right, 40, 100), 0);
    }

    #[test]
    fn test_missing_configured_font_falls_through() {
        let font = load_font(Some(Path::new("/nonexistent/font.ttf")), &[]);
        assert!(font.is_none());
    }

    #[test]
    fn test_text_is_drawn_centred() {
        // Skip when the host has no system fonts
        let Some(renderer) = system_renderer() else {
            return;
        };
        let mut canvas = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
        let mut overlay = TextOverlay::new("t", "HELLO", 0, 30);
        overlay.color = Some("#ff0000".into());
        renderer.draw(&mut canvas, &overlay);

        let red: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 200 && p.0[1] < 50)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!red.is_empty());
        let mean_x = red.iter().map(|(x, _)| *x as f64).sum::<f64>() / red.len() as f64;
        assert!((mean_x - 100.0).abs() < 15.0, "mean x {mean_x}");
        // nothing drawn in the corners
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_blank_text_draws_nothing() {
        let Some(renderer) = system_renderer() else {
            return;
        };
        let mut canvas = RgbaImage::from_pixel(50, 50, Rgba([5, 5, 5, 255]));
        renderer.draw(&mut canvas, &TextOverlay::new("t", "  \n ", 0, 30));
        assert!(canvas.pixels().all(|p| p.0 == [5, 5, 5, 255]));
    }
}
