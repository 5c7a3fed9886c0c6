//! Export orchestration.
//!
//! `export_to_gif` tries the backend renderer first and falls back to the
//! in-process pipeline (preload, frame loop, encode) when it fails. Either
//! way the result is delivered as a timestamped file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tokio_util::sync::CancellationToken;

use reelgif_common::clock::FrameClock;
use reelgif_common::config::ExportDefaults;
use reelgif_common::error::{ReelgifError, ReelgifResult};
use reelgif_project_model::{parse_hex_color, Clip, Composition};

use crate::compositor::{plan_frame, Compositor};
use crate::delivery::deliver;
use crate::encoder::{worker_count, EncoderSettings, GifEncoderAdapter};
use crate::preload::{preload_assets, MediaLoader, VideoSource};
use crate::server::{ServerRenderClient, ServerRenderRequest};
use crate::text::TextRenderer;

/// Progress callback for GIF exports.
pub type ProgressCallback = Box<dyn Fn(ExportSession) + Send + Sync>;

/// Stages of a GIF export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Idle,
    RequestingServerRender,
    Preloading,
    Rendering,
    Encoding,
    Delivering,
    Complete,
    Failed,
}

/// Observable state of one export invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSession {
    pub is_exporting: bool,

    /// Percent complete, `0..=100`. Never decreases within a session.
    pub progress: u8,

    pub stage: ExportStage,
    pub frames_rendered: u64,
    pub total_frames: u64,
}

impl ExportSession {
    pub fn idle() -> Self {
        Self {
            is_exporting: false,
            progress: 0,
            stage: ExportStage::Idle,
            frames_rendered: 0,
            total_frames: 0,
        }
    }
}

impl Default for ExportSession {
    fn default() -> Self {
        Self::idle()
    }
}

/// Percent of frames done; 100 is reserved for the final frame.
pub fn frame_progress(done: u64, total: u64) -> u8 {
    if total == 0 || done >= total {
        return 100;
    }
    ((done as f64 / total as f64 * 100.0).round() as u8).min(99)
}

/// Owns the session of one invocation and forwards every change.
struct SessionReporter {
    session: ExportSession,
    callback: Option<ProgressCallback>,
}

impl SessionReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            session: ExportSession::idle(),
            callback,
        }
    }

    fn emit(&self) {
        if let Some(cb) = &self.callback {
            cb(self.session.clone());
        }
    }

    fn stage(&mut self, stage: ExportStage) {
        self.session.is_exporting = !matches!(
            stage,
            ExportStage::Idle | ExportStage::Complete | ExportStage::Failed
        );
        self.session.stage = stage;
        self.emit();
    }

    fn begin_frames(&mut self, total: u64) {
        self.session.total_frames = total;
        self.session.frames_rendered = 0;
        self.stage(ExportStage::Rendering);
    }

    fn frame_done(&mut self, done: u64) {
        self.session.frames_rendered = done;
        let progress = frame_progress(done, self.session.total_frames);
        self.session.progress = self.session.progress.max(progress);
        self.emit();
    }

    fn complete(&mut self) {
        self.session.progress = 100;
        self.stage(ExportStage::Complete);
    }

    fn fail(&mut self) {
        self.stage(ExportStage::Failed);
    }
}

/// Knobs for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub clock: FrameClock,
    pub output_width: u32,
    pub output_height: u32,
    pub quality: u32,
    pub max_workers: usize,
    pub preload_timeout: Duration,

    /// Upper bound on a single seek; `None` waits indefinitely.
    pub seek_timeout: Option<Duration>,

    /// Yield to the runtime after this many frames; 0 never yields.
    pub yield_every: u32,
    pub background: Rgba<u8>,
    pub editor_width: u32,
    pub editor_height: u32,
    pub server_enabled: bool,
}

impl ExportOptions {
    pub fn from_config(defaults: &ExportDefaults, playback_speed: f64) -> Self {
        Self {
            clock: FrameClock::new(
                defaults.timeline_fps as f64,
                defaults.output_fps as f64,
                playback_speed,
            ),
            output_width: defaults.output_width,
            output_height: defaults.output_height,
            quality: defaults.quality,
            max_workers: defaults.max_workers,
            preload_timeout: Duration::from_secs(defaults.preload_timeout_secs),
            seek_timeout: (defaults.seek_timeout_secs > 0)
                .then(|| Duration::from_secs(defaults.seek_timeout_secs)),
            yield_every: defaults.yield_every_frames,
            background: parse_hex_color(&defaults.background)
                .map(Rgba)
                .unwrap_or(Rgba([0, 0, 0, 255])),
            editor_width: defaults.editor_width,
            editor_height: defaults.editor_height,
            server_enabled: true,
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&ExportDefaults::default(), 1.0)
    }
}

/// A composition to export and where the result goes.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub composition: Composition,
    pub options: ExportOptions,
    pub exports_dir: PathBuf,
}

impl ExportRequest {
    /// Default options at the composition's own playback speed.
    pub fn new(composition: Composition, exports_dir: impl Into<PathBuf>) -> Self {
        let options =
            ExportOptions::from_config(&ExportDefaults::default(), composition.playback_speed());
        Self {
            composition,
            options,
            exports_dir: exports_dir.into(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }
}

/// Runs GIF exports. Cheap to share; every call owns its own session.
#[derive(Clone)]
pub struct GifExporter {
    loader: Arc<dyn MediaLoader>,
    server: Option<ServerRenderClient>,
    text: Option<Arc<TextRenderer>>,
}

impl std::fmt::Debug for GifExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifExporter")
            .field("server", &self.server.as_ref().map(|s| s.endpoint().as_str()))
            .field("text", &self.text.is_some())
            .finish_non_exhaustive()
    }
}

impl GifExporter {
    pub fn new(loader: Arc<dyn MediaLoader>) -> Self {
        Self {
            loader,
            server: None,
            text: None,
        }
    }

    pub fn with_server(mut self, server: Option<ServerRenderClient>) -> Self {
        self.server = server;
        self
    }

    pub fn with_text_renderer(mut self, text: Option<Arc<TextRenderer>>) -> Self {
        self.text = text;
        self
    }

    /// Export the composition as a GIF and return the delivered file.
    ///
    /// Errors are logged once here and returned with a `Failed to export GIF`
    /// prefix; cancellation is returned unchanged.
    pub async fn export_to_gif(
        &self,
        request: &ExportRequest,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> ReelgifResult<PathBuf> {
        let mut reporter = SessionReporter::new(progress);
        let started = std::time::Instant::now();

        match self.run(request, &mut reporter, cancel).await {
            Ok(path) => {
                reporter.complete();
                tracing::info!(
                    path = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "GIF export complete"
                );
                Ok(path)
            }
            Err(ReelgifError::Cancelled) => {
                reporter.fail();
                tracing::warn!("GIF export cancelled");
                Err(ReelgifError::Cancelled)
            }
            Err(e) => {
                reporter.fail();
                tracing::error!(error = %e, "GIF export failed");
                Err(ReelgifError::export("Failed to export GIF", &e))
            }
        }
    }

    async fn run(
        &self,
        request: &ExportRequest,
        reporter: &mut SessionReporter,
        cancel: &CancellationToken,
    ) -> ReelgifResult<PathBuf> {
        if let Some(bytes) = self.try_server_render(request, reporter, cancel).await? {
            reporter.stage(ExportStage::Delivering);
            return deliver(&bytes, &request.exports_dir).await;
        }

        let bytes = self.client_side(request, reporter, cancel).await?;
        reporter.stage(ExportStage::Delivering);
        deliver(&bytes, &request.exports_dir).await
    }

    /// `Ok(None)` means the client renderer should take over.
    async fn try_server_render(
        &self,
        request: &ExportRequest,
        reporter: &mut SessionReporter,
        cancel: &CancellationToken,
    ) -> ReelgifResult<Option<Vec<u8>>> {
        let Some(server) = self.server.as_ref().filter(|_| request.options.server_enabled) else {
            return Ok(None);
        };

        reporter.stage(ExportStage::RequestingServerRender);
        let options = &request.options;
        let body = ServerRenderRequest::new(
            &request.composition,
            options.clock.timeline_fps().round() as u32,
            options.editor_width,
            options.editor_height,
        );

        let rendered = tokio::select! {
            _ = cancel.cancelled() => return Err(ReelgifError::Cancelled),
            rendered = server.render(&body) => rendered,
        };

        match rendered {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    error = %e,
                    "Server render failed, falling back to client rendering"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Render and encode in-process, returning the GIF bytes.
    pub async fn export_client_side(
        &self,
        request: &ExportRequest,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> ReelgifResult<Vec<u8>> {
        let mut reporter = SessionReporter::new(progress);
        self.client_side(request, &mut reporter, cancel).await
    }

    async fn client_side(
        &self,
        request: &ExportRequest,
        reporter: &mut SessionReporter,
        cancel: &CancellationToken,
    ) -> ReelgifResult<Vec<u8>> {
        let options = &request.options;
        let (width, height) = (options.output_width, options.output_height);
        let settings = EncoderSettings::for_clock(width, height, &options.clock)
            .with_quality(options.quality)
            .with_workers(worker_count(options.max_workers));
        let mut encoder = GifEncoderAdapter::new(settings)?;

        self.drive_frames(request, reporter, cancel, |canvas| encoder.add_frame(canvas))
            .await?;

        reporter.stage(ExportStage::Encoding);
        tracing::info!(frames = encoder.frame_count(), workers = settings.workers, "Encoding GIF");
        encoder.finish().await
    }

    /// Composite every output frame without encoding.
    pub async fn render_frames(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> ReelgifResult<Vec<RgbaImage>> {
        let mut reporter = SessionReporter::new(None);
        let mut frames = Vec::new();
        self.drive_frames(request, &mut reporter, cancel, |canvas| {
            frames.push(canvas.clone());
            Ok(())
        })
        .await?;
        Ok(frames)
    }

    /// The frame loop. Frames are produced strictly in output order and each
    /// is handed to `sink` before the next one is started.
    async fn drive_frames<F>(
        &self,
        request: &ExportRequest,
        reporter: &mut SessionReporter,
        cancel: &CancellationToken,
        mut sink: F,
    ) -> ReelgifResult<u64>
    where
        F: FnMut(&RgbaImage) -> ReelgifResult<()> + Send,
    {
        let composition = &request.composition;
        let options = &request.options;
        if composition.video_clips().is_empty() {
            return Err(ReelgifError::NoContent);
        }
        let problems: Vec<String> = composition
            .validate()
            .into_iter()
            .filter(|issue| issue.is_error())
            .map(|issue| issue.message)
            .collect();
        if !problems.is_empty() {
            return Err(ReelgifError::composition(problems.join("; ")));
        }

        reporter.stage(ExportStage::Preloading);
        let mut assets =
            preload_assets(composition, self.loader.as_ref(), options.preload_timeout, cancel)
                .await?;

        let clock = options.clock;
        let total = clock.total_output_frames(composition.content_duration());
        tracing::info!(
            total_frames = total,
            output_fps = clock.output_fps(),
            playback_speed = clock.playback_speed(),
            width = options.output_width,
            height = options.output_height,
            "Rendering frames"
        );
        reporter.begin_frames(total);

        let compositor = Compositor::new(options.output_width, options.output_height)
            .with_background(options.background)
            .with_text_renderer(self.text.clone());
        let mut canvas = compositor.new_canvas();

        for output_frame in 0..total {
            if cancel.is_cancelled() {
                return Err(ReelgifError::Cancelled);
            }

            let plan = plan_frame(composition, &clock, output_frame);
            let video_frame = match plan.video_sample(clock.timeline_fps()) {
                Some((clip, secs)) => {
                    let source = assets.videos.get_mut(&clip.id).ok_or_else(|| {
                        ReelgifError::render(format!("Video {} was not preloaded", clip.id))
                    })?;
                    let frame =
                        seek_frame(source.as_mut(), clip, secs, options.seek_timeout, cancel)
                            .await?;
                    Some(frame)
                }
                None => None,
            };

            compositor.compose(&mut canvas, &plan, video_frame.as_ref(), &assets.images);
            sink(&canvas)?;

            let done = output_frame + 1;
            reporter.frame_done(done);
            tracing::trace!(
                frame = output_frame,
                timeline_frame = plan.timeline_frame,
                "Frame composited"
            );

            if options.yield_every > 0 && done % options.yield_every as u64 == 0 {
                tokio::task::yield_now().await;
            }
        }

        Ok(total)
    }
}

/// Seek a video, bounded by `limit` and the cancellation token.
async fn seek_frame(
    source: &mut dyn VideoSource,
    clip: &Clip,
    secs: f64,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> ReelgifResult<RgbaImage> {
    let seek = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, source.frame_at(secs))
                .await
                .map_err(|_| ReelgifError::SeekTimeout {
                    clip_id: clip.id.clone(),
                    secs,
                })?,
            None => source.frame_at(secs).await,
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(ReelgifError::Cancelled),
        frame = seek => frame,
    }
}
