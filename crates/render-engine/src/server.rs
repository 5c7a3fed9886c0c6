//! Client for the backend render endpoint.
//!
//! The server receives the full clip and overlay graph, renders the GIF
//! itself and answers with a URL to the result. Every failure here is
//! reported as [`ReelgifError::ServerRender`] so the caller can fall back to
//! rendering in-process.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use reelgif_common::error::{ReelgifError, ReelgifResult};
use reelgif_project_model::{BlurOverlay, Clip, Composition, TextOverlay};

/// Body of the render POST.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRenderRequest<'a> {
    pub clips: &'a [Clip],
    pub text_overlays: &'a [TextOverlay],
    pub blur_overlays: &'a [BlurOverlay],
    pub clip_effects: &'a BTreeMap<String, serde_json::Value>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub duration_in_frames: u64,
    #[serde(skip_serializing_if = "is_normal_speed")]
    pub playback_speed: f64,
}

fn is_normal_speed(speed: &f64) -> bool {
    (*speed - 1.0).abs() < f64::EPSILON
}

impl<'a> ServerRenderRequest<'a> {
    /// Describe `composition` at the editor's native rate and size.
    pub fn new(composition: &'a Composition, fps: u32, width: u32, height: u32) -> Self {
        Self {
            clips: &composition.clips,
            text_overlays: &composition.text_overlays,
            blur_overlays: &composition.blur_overlays,
            clip_effects: &composition.clip_effects,
            fps,
            width,
            height,
            duration_in_frames: composition.content_duration(),
            playback_speed: composition.playback_speed(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerRenderResponse {
    gif_url: Option<String>,
}

/// POSTs render jobs and downloads the finished GIF.
#[derive(Debug, Clone)]
pub struct ServerRenderClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ServerRenderClient {
    pub fn new(endpoint: &str, timeout: Duration) -> ReelgifResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| {
                ReelgifError::config(format!("Invalid render endpoint {endpoint:?}: {e}"))
            })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReelgifError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Render on the server and return the GIF bytes.
    pub async fn render(&self, request: &ServerRenderRequest<'_>) -> ReelgifResult<Vec<u8>> {
        tracing::info!(
            endpoint = %self.endpoint,
            clips = request.clips.len(),
            duration_in_frames = request.duration_in_frames,
            "Requesting server render"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| ReelgifError::server_render(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReelgifError::server_render(format!(
                "Endpoint returned HTTP {status}"
            )));
        }

        let body: ServerRenderResponse = response
            .json()
            .await
            .map_err(|e| ReelgifError::server_render(format!("Invalid response body: {e}")))?;
        let gif_url = body
            .gif_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ReelgifError::server_render("Response has no gifUrl"))?;
        let gif_url = self
            .endpoint
            .join(&gif_url)
            .map_err(|e| ReelgifError::server_render(format!("Invalid gifUrl {gif_url:?}: {e}")))?;

        tracing::debug!(gif_url = %gif_url, "Downloading server render");
        let bytes = self
            .http
            .get(gif_url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReelgifError::server_render(format!("Download of {gif_url} failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| {
                ReelgifError::server_render(format!("Download of {gif_url} failed: {e}"))
            })?;

        if bytes.is_empty() {
            return Err(ReelgifError::server_render("Server returned an empty GIF"));
        }
        Ok(bytes.to_vec())
    }
}
