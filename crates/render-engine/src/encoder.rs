//! GIF encoding.
//!
//! Frames are buffered as they are rendered. `finish` quantises them to
//! 256-colour palettes on a bounded set of worker threads and writes an
//! infinitely looping GIF with a uniform frame delay.

use std::num::NonZeroUsize;

use gif::{Encoder, Frame, Repeat};
use image::RgbaImage;

use reelgif_common::clock::FrameClock;
use reelgif_common::error::{ReelgifError, ReelgifResult};

/// Encoder parameters fixed for the lifetime of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,

    /// Quantiser speed, 1 (best) to 30 (fastest).
    pub quality: u32,

    /// Quantiser threads.
    pub workers: usize,

    /// Delay between frames in milliseconds.
    pub delay_ms: u32,
}

impl EncoderSettings {
    pub fn new(width: u32, height: u32, delay_ms: u32) -> Self {
        Self {
            width,
            height,
            quality: 10,
            workers: worker_count(4),
            delay_ms,
        }
    }

    /// Settings whose frame delay matches the clock's output rate.
    pub fn for_clock(width: u32, height: u32, clock: &FrameClock) -> Self {
        Self::new(width, height, clock.frame_delay_ms())
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality.clamp(1, 30);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// GIF delays are stored in hundredths of a second.
    pub fn delay_centis(&self) -> u16 {
        ((self.delay_ms as f64 / 10.0).round() as u64).min(u16::MAX as u64) as u16
    }
}

/// Hardware concurrency capped at `max`.
pub fn worker_count(max: usize) -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .min(max.max(1))
}

/// Collects rendered frames and produces the final GIF bytes.
#[derive(Debug)]
pub struct GifEncoderAdapter {
    settings: EncoderSettings,
    frames: Vec<RgbaImage>,
}

impl GifEncoderAdapter {
    pub fn new(settings: EncoderSettings) -> ReelgifResult<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(ReelgifError::encode("GIF dimensions must be non-zero"));
        }
        if settings.width > u16::MAX as u32 || settings.height > u16::MAX as u32 {
            return Err(ReelgifError::encode(format!(
                "GIF dimensions {}x{} exceed 65535",
                settings.width, settings.height
            )));
        }
        Ok(Self {
            settings,
            frames: Vec::new(),
        })
    }

    /// Snapshot the canvas as the next frame.
    pub fn add_frame(&mut self, canvas: &RgbaImage) -> ReelgifResult<()> {
        if canvas.dimensions() != (self.settings.width, self.settings.height) {
            return Err(ReelgifError::encode(format!(
                "Frame is {}x{}, encoder expects {}x{}",
                canvas.width(),
                canvas.height(),
                self.settings.width,
                self.settings.height
            )));
        }
        self.frames.push(canvas.clone());
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Encode off the async runtime and return the GIF bytes.
    pub async fn finish(self) -> ReelgifResult<Vec<u8>> {
        let Self { settings, frames } = self;
        tokio::task::spawn_blocking(move || encode_frames(&settings, frames))
            .await
            .map_err(|e| ReelgifError::encode(format!("Encoder task failed: {e}")))?
    }
}

/// Quantise and write `frames` as a looping GIF.
pub fn encode_frames(settings: &EncoderSettings, frames: Vec<RgbaImage>) -> ReelgifResult<Vec<u8>> {
    if frames.is_empty() {
        return Err(ReelgifError::encode("No frames to encode"));
    }

    let width = settings.width as u16;
    let height = settings.height as u16;
    let speed = settings.quality.clamp(1, 30) as i32;
    let delay = settings.delay_centis();
    let started = std::time::Instant::now();

    let quantised = quantise_parallel(frames, width, height, speed, settings.workers.max(1));

    let mut buffer = Vec::new();
    {
        let mut encoder = Encoder::new(&mut buffer, width, height, &[])
            .map_err(|e| ReelgifError::encode(format!("Failed to create GIF encoder: {e}")))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ReelgifError::encode(format!("Failed to set GIF repeat: {e}")))?;

        for mut frame in quantised {
            frame.delay = delay;
            encoder
                .write_frame(&frame)
                .map_err(|e| ReelgifError::encode(format!("Failed to write GIF frame: {e}")))?;
        }
    }

    tracing::info!(
        bytes = buffer.len(),
        delay_centis = delay,
        workers = settings.workers,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "GIF encoded"
    );
    Ok(buffer)
}

/// Palette-quantise frames on up to `workers` threads, preserving order.
fn quantise_parallel(
    frames: Vec<RgbaImage>,
    width: u16,
    height: u16,
    speed: i32,
    workers: usize,
) -> Vec<Frame<'static>> {
    let chunk_len = frames.len().div_ceil(workers).max(1);
    let mut chunks: Vec<Vec<RgbaImage>> = Vec::new();
    let mut frames = frames.into_iter().peekable();
    while frames.peek().is_some() {
        chunks.push(frames.by_ref().take(chunk_len).collect());
    }

    std::thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .into_iter()
                        .map(|image| {
                            let mut pixels = image.into_raw();
                            Frame::from_rgba_speed(width, height, &mut pixels, speed)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(frames) => frames,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    })
}
