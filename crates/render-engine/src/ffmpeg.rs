//! ffmpeg-backed media loading.
//!
//! Videos are probed with `ffprobe` and decoded one frame per seek by an
//! `ffmpeg` child writing raw RGBA to stdout. Children are killed when their
//! future is dropped, so an abandoned or cancelled seek never leaks a process.

use std::process::Stdio;

use image::RgbaImage;
use serde::Deserialize;
use tokio::process::Command;

use reelgif_common::error::{ReelgifError, ReelgifResult};
use reelgif_project_model::Clip;

use crate::preload::{MediaLoader, VideoSource};

/// Default loader for local files and http(s) URLs.
#[derive(Debug, Clone, Default)]
pub struct FfmpegMediaLoader {
    http: reqwest::Client,
}

impl FfmpegMediaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both `ffmpeg` and `ffprobe` are on `PATH`.
    pub fn is_available() -> bool {
        command_exists("ffmpeg") && command_exists("ffprobe")
    }
}

#[async_trait::async_trait]
impl MediaLoader for FfmpegMediaLoader {
    async fn load_video(&self, clip: &Clip) -> ReelgifResult<Box<dyn VideoSource>> {
        let probe = probe_video(&clip.src).await?;
        Ok(Box::new(FfmpegVideoSource {
            src: clip.src.clone(),
            width: probe.width,
            height: probe.height,
            duration_secs: probe.duration_secs,
            last_frame: None,
        }))
    }

    async fn load_image(&self, clip: &Clip) -> ReelgifResult<RgbaImage> {
        let bytes = if is_remote(&clip.src) {
            let response = self
                .http
                .get(&clip.src)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| ReelgifError::render(format!("Failed to fetch {}: {e}", clip.src)))?;
            response
                .bytes()
                .await
                .map_err(|e| ReelgifError::render(format!("Failed to read {}: {e}", clip.src)))?
                .to_vec()
        } else {
            tokio::fs::read(&clip.src).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ReelgifError::FileNotFound {
                        path: clip.src.clone().into(),
                    }
                } else {
                    ReelgifError::Io(e)
                }
            })?
        };

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| ReelgifError::render(format!("Failed to decode {}: {e}", clip.src)))?;
        Ok(decoded.to_rgba8())
    }
}

/// A video decoded on demand by short-lived `ffmpeg` processes.
#[derive(Debug)]
pub struct FfmpegVideoSource {
    src: String,
    width: u32,
    height: u32,
    duration_secs: Option<f64>,
    last_frame: Option<(u64, RgbaImage)>,
}

#[async_trait::async_trait]
impl VideoSource for FfmpegVideoSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    async fn frame_at(&mut self, secs: f64) -> ReelgifResult<RgbaImage> {
        // seeking exactly to the end yields no frame
        let secs = match self.duration_secs {
            Some(duration) => secs.clamp(0.0, (duration - 0.05).max(0.0)),
            None => secs.max(0.0),
        };
        let key = (secs * 1000.0).round() as u64;
        if let Some((cached_key, frame)) = &self.last_frame {
            if *cached_key == key {
                return Ok(frame.clone());
            }
        }

        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-noautorotate", "-ss"])
            .arg(format!("{secs:.3}"))
            .arg("-i")
            .arg(&self.src)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelgifError::seek(format!("Failed to launch ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ReelgifError::seek(format!(
                "ffmpeg failed seeking {} to {secs:.3}s (status {}): {}",
                self.src,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let expected = self.width as usize * self.height as usize * 4;
        if output.stdout.len() < expected {
            return Err(ReelgifError::seek(format!(
                "ffmpeg returned {} bytes for {}x{} frame at {secs:.3}s",
                output.stdout.len(),
                self.width,
                self.height
            )));
        }

        let mut raw = output.stdout;
        raw.truncate(expected);
        let frame = RgbaImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| ReelgifError::seek("Decoded frame has unexpected size"))?;
        self.last_frame = Some((key, frame.clone()));
        Ok(frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProbeInfo {
    width: u32,
    height: u32,
    duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

async fn probe_video(src: &str) -> ReelgifResult<ProbeInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(src)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ReelgifError::render(format!("Failed to launch ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ReelgifError::render(format!(
            "ffprobe rejected {src}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_output(&output.stdout)
        .ok_or_else(|| ReelgifError::render(format!("{src} has no decodable video stream")))
}

fn parse_probe_output(raw: &[u8]) -> Option<ProbeInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(raw).ok()?;
    let stream = parsed.streams.first()?;
    let width = stream.width.filter(|w| *w > 0)?;
    let height = stream.height.filter(|h| *h > 0)?;
    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    Some(ProbeInfo {
        width,
        height,
        duration_secs,
    })
}

fn is_remote(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Whether a binary is resolvable through the shell.
pub fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
