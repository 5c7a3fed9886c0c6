//! Frame clock: maps output frames onto the shared timeline axis.
//!
//! Clips and overlays are positioned in timeline frames at the editor's
//! native rate (30 fps). Exports render at a lower output rate and may be
//! sped up or slowed down; playback speed uniformly stretches timeline time
//! without per-clip resampling.

/// Native frame rate of the editor timeline.
pub const TIMELINE_FPS: f64 = 30.0;

/// Mapping between output frames and timeline frames for one export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    timeline_fps: f64,
    output_fps: f64,
    playback_speed: f64,
}

impl FrameClock {
    /// Create a clock. Non-positive or non-finite rates fall back to sane values.
    pub fn new(timeline_fps: f64, output_fps: f64, playback_speed: f64) -> Self {
        Self {
            timeline_fps: sanitize(timeline_fps, TIMELINE_FPS),
            output_fps: sanitize(output_fps, 15.0),
            playback_speed: sanitize(playback_speed, 1.0),
        }
    }

    /// Clock for the native timeline rate.
    pub fn with_output_fps(output_fps: f64, playback_speed: f64) -> Self {
        Self::new(TIMELINE_FPS, output_fps, playback_speed)
    }

    pub fn timeline_fps(&self) -> f64 {
        self.timeline_fps
    }

    pub fn output_fps(&self) -> f64 {
        self.output_fps
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
    }

    /// Number of output frames needed to cover `content_duration` timeline frames.
    pub fn total_output_frames(&self, content_duration: u64) -> u64 {
        let secs = content_duration as f64 / self.timeline_fps;
        ((secs * self.output_fps) / self.playback_speed).round() as u64
    }

    /// Timeline frame sampled by the given output frame.
    pub fn timeline_frame(&self, output_frame: u64) -> u64 {
        let frame =
            output_frame as f64 * self.playback_speed * self.timeline_fps / self.output_fps;
        // absorb float noise so exact multiples never floor one frame short
        (frame + 1e-9).floor() as u64
    }

    /// Per-frame delay of the output in milliseconds.
    pub fn frame_delay_ms(&self) -> u32 {
        (1000.0 / self.output_fps).round() as u32
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::with_output_fps(15.0, 1.0)
    }
}

fn sanitize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
