//! Show composition information.

use std::path::PathBuf;

use reelgif_common::clock::FrameClock;
use reelgif_common::config::AppConfig;
use reelgif_project_model::Composition;

const SPEEDS: [f64; 4] = [0.5, 1.0, 1.5, 2.0];

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let composition = Composition::load(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load composition: {e}"))?;

    let export = &config.export;
    let duration = composition.content_duration();
    let timeline_fps = export.timeline_fps as f64;

    println!("Composition: {}", path.display());
    println!(
        "  Content: {duration} frames ({:.2}s @ {}fps)",
        duration as f64 / timeline_fps,
        export.timeline_fps
    );
    println!("  Playback speed: {}x", composition.playback_speed());
    println!();

    println!("Clips:");
    for clip in &composition.clips {
        println!(
            "  [{:?}] {} frames {}..{} (row {}) {}",
            clip.kind,
            clip.id,
            clip.start,
            clip.end(),
            clip.row,
            clip.src
        );
    }
    println!();

    println!("Overlays:");
    for overlay in &composition.text_overlays {
        println!(
            "  [Text] {} frames {}..{} {:?}",
            overlay.id,
            overlay.start,
            overlay.end(),
            overlay.text
        );
    }
    for overlay in &composition.blur_overlays {
        println!(
            "  [Blur] {} frames {}..{} {:?} intensity {}",
            overlay.id,
            overlay.start,
            overlay.end(),
            overlay.shape,
            overlay.clamped_intensity()
        );
    }
    if !composition.clip_effects.is_empty() {
        println!("  Clip effects: {} (server render only)", composition.clip_effects.len());
    }
    println!();

    println!(
        "Export @ {}x{} {}fps:",
        export.output_width, export.output_height, export.output_fps
    );
    for speed in SPEEDS {
        let clock = FrameClock::new(timeline_fps, export.output_fps as f64, speed);
        println!(
            "  {speed:>4}x: {} frames, {}ms per frame",
            clock.total_output_frames(duration),
            clock.frame_delay_ms()
        );
    }

    Ok(())
}
