//! Asset preloading: media handles that are ready before the first frame.
//!
//! Video loading is an atomic precondition: every video clip must become
//! ready within the timeout or the whole export fails. Image loading is best
//! effort; an image that fails or outlives the same timeout is skipped when
//! rendering.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::{join_all, try_join_all};
use image::RgbaImage;
use tokio_util::sync::CancellationToken;

use reelgif_common::error::{ReelgifError, ReelgifResult};
use reelgif_project_model::{Clip, Composition};

/// A seekable video that can produce decoded frames.
#[async_trait::async_trait]
pub trait VideoSource: Send + Sync {
    /// Native frame size in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Media duration, when known.
    fn duration_secs(&self) -> Option<f64>;

    /// Seek to `secs` and decode the frame shown at that time.
    async fn frame_at(&mut self, secs: f64) -> ReelgifResult<RgbaImage>;
}

/// Opens media referenced by clips.
#[async_trait::async_trait]
pub trait MediaLoader: Send + Sync {
    /// Open a video and wait until it can be sampled.
    async fn load_video(&self, clip: &Clip) -> ReelgifResult<Box<dyn VideoSource>>;

    /// Load and decode an image.
    async fn load_image(&self, clip: &Clip) -> ReelgifResult<RgbaImage>;
}

/// Media handles keyed by clip id.
#[derive(Default)]
pub struct PreloadedAssets {
    pub videos: HashMap<String, Box<dyn VideoSource>>,
    pub images: HashMap<String, RgbaImage>,
}

impl std::fmt::Debug for PreloadedAssets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadedAssets")
            .field("videos", &self.videos.keys().collect::<Vec<_>>())
            .field("images", &self.images.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Load every clip's media concurrently.
///
/// Fails with [`ReelgifError::NoContent`] before touching any media when the
/// composition has no video clips. Video errors are reported with the
/// 1-based position of the clip among video clips in start order.
pub async fn preload_assets(
    composition: &Composition,
    loader: &dyn MediaLoader,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ReelgifResult<PreloadedAssets> {
    let video_clips = composition.video_clips();
    if video_clips.is_empty() {
        return Err(ReelgifError::NoContent);
    }

    let started = std::time::Instant::now();
    let video_loads = video_clips.iter().enumerate().map(|(i, clip)| async move {
        let index = i + 1;
        match tokio::time::timeout(timeout, loader.load_video(clip)).await {
            Ok(Ok(source)) => {
                tracing::debug!(
                    clip_id = %clip.id,
                    dimensions = ?source.dimensions(),
                    "Video ready"
                );
                Ok((clip.id.clone(), source))
            }
            Ok(Err(e)) => Err(ReelgifError::PreloadFailure {
                index,
                message: e.to_string(),
            }),
            Err(_) => Err(ReelgifError::PreloadTimeout {
                index,
                clip_id: clip.id.clone(),
            }),
        }
    });

    let image_loads = composition.image_clips().map(|clip| async move {
        match tokio::time::timeout(timeout, loader.load_image(clip)).await {
            Ok(Ok(image)) => Some((clip.id.clone(), image)),
            Ok(Err(e)) => {
                tracing::warn!(
                    clip_id = %clip.id,
                    src = %clip.src,
                    error = %e,
                    "Image failed to load, skipping"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    clip_id = %clip.id,
                    src = %clip.src,
                    "Image load timed out, skipping"
                );
                None
            }
        }
    });
    let images = async { Ok::<_, ReelgifError>(join_all(image_loads).await) };

    // The first video failure drops the pending image loads.
    let (videos, images) = tokio::select! {
        _ = cancel.cancelled() => return Err(ReelgifError::Cancelled),
        loaded = async { tokio::try_join!(try_join_all(video_loads), images) } => loaded?,
    };

    let assets = PreloadedAssets {
        videos: videos.into_iter().collect(),
        images: images.into_iter().flatten().collect(),
    };

    tracing::info!(
        videos = assets.videos.len(),
        images = assets.images.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Assets preloaded"
    );

    Ok(assets)
}
