//! Check system capabilities.

use reelgif_common::config::AppConfig;
use reelgif_render_engine::ffmpeg::command_exists;
use reelgif_render_engine::text::TextRenderer;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelgif System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for binary in ["ffmpeg", "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary}: required to decode video locally");
            ready = false;
        }
    }

    if TextRenderer::load(&config.text).is_some() {
        println!("[OK] Font available for text overlays");
    } else {
        println!("[WARN] No font found; text overlays will be skipped");
        println!("       Set text.font_path in the config file");
    }

    if config.server.enabled {
        println!("[OK] Render endpoint: {}", config.server.endpoint);
    } else {
        println!("[INFO] Server rendering disabled");
    }
    println!("[OK] Exports directory: {}", config.exports_dir.display());

    if let Err(e) = config.validate() {
        println!("[ERROR] {e}");
        ready = false;
    }

    println!();
    if ready {
        println!("Local rendering is available. Reelgif is ready.");
    } else {
        println!("Local rendering is unavailable; exports rely on the render endpoint.");
    }

    Ok(())
}
