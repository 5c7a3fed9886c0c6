//! Export a composition to an animated GIF.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use reelgif_common::config::AppConfig;
use reelgif_common::error::ReelgifError;
use reelgif_project_model::Composition;
use reelgif_render_engine::ffmpeg::FfmpegMediaLoader;
use reelgif_render_engine::server::ServerRenderClient;
use reelgif_render_engine::text::TextRenderer;
use reelgif_render_engine::{ExportOptions, ExportRequest, ExportSession, ExportStage, GifExporter};
use tokio_util::sync::CancellationToken;

use crate::ExportArgs;

pub async fn run(args: ExportArgs, mut config: AppConfig) -> anyhow::Result<()> {
    println!("Exporting composition: {}", args.path.display());

    let mut composition = Composition::load(&args.path)
        .map_err(|e| anyhow::anyhow!("Failed to load composition: {e}"))?;
    if let Some(base) = args.path.parent() {
        composition.resolve_sources(base);
    }

    if let Some(fps) = args.fps {
        config.export.output_fps = fps;
    }
    if let Some(width) = args.width {
        config.export.output_width = width;
    }
    if let Some(height) = args.height {
        config.export.output_height = height;
    }
    if let Some(quality) = args.quality {
        config.export.quality = quality;
    }
    if let Some(server) = args.server {
        config.server.endpoint = server;
        config.server.enabled = true;
    }
    if args.no_server {
        config.server.enabled = false;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let speed = args.speed.unwrap_or_else(|| composition.playback_speed());
    let mut options = ExportOptions::from_config(&config.export, speed);
    options.server_enabled = config.server.enabled;
    let exports_dir = args.output.unwrap_or_else(|| config.exports_dir.clone());

    let total = options
        .clock
        .total_output_frames(composition.content_duration());
    println!("  Output: {}", exports_dir.display());
    println!(
        "  Resolution: {}x{} @ {}fps (speed {speed}x, {total} frames)",
        options.output_width,
        options.output_height,
        options.clock.output_fps()
    );

    let server = if config.server.enabled {
        println!("  Render endpoint: {}", config.server.endpoint);
        Some(ServerRenderClient::new(
            &config.server.endpoint,
            Duration::from_secs(config.server.timeout_secs),
        )?)
    } else {
        None
    };

    if !FfmpegMediaLoader::is_available() {
        tracing::warn!("ffmpeg/ffprobe not found; local rendering will fail");
    }

    let exporter = GifExporter::new(Arc::new(FfmpegMediaLoader::new()))
        .with_server(server)
        .with_text_renderer(TextRenderer::load(&config.text).map(Arc::new));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling export...");
            ctrl_c.cancel();
        }
    });

    let progress_cb: Box<dyn Fn(ExportSession) + Send + Sync> = Box::new(|s| {
        let label = match s.stage {
            ExportStage::RequestingServerRender => "server render",
            ExportStage::Preloading => "loading media",
            ExportStage::Rendering => "rendering",
            ExportStage::Encoding => "encoding",
            ExportStage::Delivering => "saving",
            ExportStage::Complete => "done",
            ExportStage::Failed => "failed",
            ExportStage::Idle => "idle",
        };
        print!(
            "\r  Progress: {:>3}% ({}/{} frames, {label})          ",
            s.progress, s.frames_rendered, s.total_frames,
        );
        let _ = std::io::stdout().flush();
    });

    let request = ExportRequest::new(composition, exports_dir).with_options(options);
    match exporter.export_to_gif(&request, Some(progress_cb), &cancel).await {
        Ok(path) => {
            println!("\nExport complete: {}", path.display());
            Ok(())
        }
        Err(ReelgifError::Cancelled) => {
            println!("\nExport cancelled.");
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
