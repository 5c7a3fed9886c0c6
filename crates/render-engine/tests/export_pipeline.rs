//! End-to-end export scenarios against an in-memory media loader.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use reelgif_common::clock::FrameClock;
use reelgif_common::error::{ReelgifError, ReelgifResult};
use reelgif_project_model::{Clip, Composition, TextOverlay};
use reelgif_render_engine::preload::{MediaLoader, VideoSource};
use reelgif_render_engine::server::ServerRenderClient;
use reelgif_render_engine::{ExportOptions, ExportRequest, ExportSession, ExportStage, GifExporter};

/// Video whose frames encode the requested source time in the red channel.
struct TimecodeVideo {
    seeks: Arc<Mutex<Vec<f64>>>,
    stall: bool,
}

#[async_trait::async_trait]
impl VideoSource for TimecodeVideo {
    fn dimensions(&self) -> (u32, u32) {
        (64, 36)
    }

    fn duration_secs(&self) -> Option<f64> {
        Some(10.0)
    }

    async fn frame_at(&mut self, secs: f64) -> ReelgifResult<RgbaImage> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.seeks.lock().unwrap().push(secs);
        let code = ((secs * 30.0).round() as u64 % 256) as u8;
        Ok(RgbaImage::from_pixel(64, 36, Rgba([code, 40, 80, 255])))
    }
}

#[derive(Default)]
struct FakeLoader {
    seeks: Arc<Mutex<Vec<f64>>>,
    loads: AtomicUsize,
    stall_seeks: bool,
}

impl FakeLoader {
    fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MediaLoader for FakeLoader {
    async fn load_video(&self, _clip: &Clip) -> ReelgifResult<Box<dyn VideoSource>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TimecodeVideo {
            seeks: self.seeks.clone(),
            stall: self.stall_seeks,
        }))
    }

    async fn load_image(&self, _clip: &Clip) -> ReelgifResult<RgbaImage> {
        Ok(RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255])))
    }
}

fn ten_second_clip() -> Composition {
    Composition {
        clips: vec![Clip::video("main", "clip.mp4", 0, 300)],
        text_overlays: vec![TextOverlay::new("caption", "Hello", 30, 60)],
        ..Default::default()
    }
}

fn small_options(speed: f64) -> ExportOptions {
    ExportOptions {
        clock: FrameClock::with_output_fps(15.0, speed),
        output_width: 48,
        output_height: 27,
        ..ExportOptions::default()
    }
}

fn request(composition: Composition, speed: f64, dir: &std::path::Path) -> ExportRequest {
    ExportRequest::new(composition, dir).with_options(small_options(speed))
}

/// Serve canned HTTP responses keyed by request method and path.
async fn spawn_endpoint(routes: Vec<(&'static str, &'static str, u16, Vec<u8>)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut raw = Vec::new();
                let mut buf = [0u8; 4096];
                let header_end = loop {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        return;
                    }
                    raw.extend_from_slice(&buf[..n]);
                    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        break pos + 4;
                    }
                };
                let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                while raw.len() < header_end + content_length {
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    raw.extend_from_slice(&buf[..n]);
                }

                let mut first = head.lines().next().unwrap_or("").split_whitespace();
                let method = first.next().unwrap_or("");
                let path = first.next().unwrap_or("");
                let (status, body) = routes
                    .iter()
                    .find(|(m, p, _, _)| *m == method && *p == path)
                    .map(|(_, _, s, b)| (*s, b.clone()))
                    .unwrap_or((404, Vec::new()));

                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}/api/render-gif")
}

#[tokio::test]
async fn test_frame_count_at_normal_speed() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let frames = exporter
        .render_frames(&request(ten_second_clip(), 1.0, dir.path()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(frames.len(), 150);
    assert_eq!(loader.seeks().len(), 150);
}

#[tokio::test]
async fn test_double_speed_halves_frames_and_samples_every_fourth_timeline_frame() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let frames = exporter
        .render_frames(&request(ten_second_clip(), 2.0, dir.path()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(frames.len(), 75);

    let seeks = loader.seeks();
    assert_eq!(seeks.len(), 75);
    for (i, secs) in seeks.iter().enumerate() {
        let expected = (i * 4) as f64 / 30.0;
        assert!((secs - expected).abs() < 1e-9, "frame {i}: {secs} != {expected}");
    }

    // frame pixels carry the sampled timecode
    assert_eq!(frames[10].get_pixel(0, 0).0[0], 40);
}

#[tokio::test]
async fn test_trimmed_clip_offsets_source_time() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let mut comp = ten_second_clip();
    comp.clips = vec![Clip::video("a", "a.mp4", 0, 30), {
        let mut b = Clip::video("b", "b.mp4", 30, 30);
        b.start_from = Some(60);
        b
    }];
    exporter
        .render_frames(&request(comp, 1.0, dir.path()), &CancellationToken::new())
        .await
        .unwrap();

    let seeks = loader.seeks();
    assert_eq!(seeks.len(), 30);
    // output frame 15 is timeline frame 30, the first frame of clip b
    assert!((seeks[15] - 2.0).abs() < 1e-9);
    assert!((seeks[14] - 28.0 / 30.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_gap_without_video_shows_background() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let comp = Composition {
        clips: vec![Clip::video("late", "late.mp4", 30, 30)],
        ..Default::default()
    };
    let frames = exporter
        .render_frames(&request(comp, 1.0, dir.path()), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(frames.len(), 30);
    assert_eq!(frames[0].get_pixel(10, 10).0, [0, 0, 0, 255]);
    assert_eq!(loader.seeks().len(), 15);
}

#[tokio::test]
async fn test_rendering_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = GifExporter::new(Arc::new(FakeLoader::default()));
    let req = request(ten_second_clip(), 1.0, dir.path());

    let first = exporter.render_frames(&req, &CancellationToken::new()).await.unwrap();
    let second = exporter.render_frames(&req, &CancellationToken::new()).await.unwrap();
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a == b));
}

#[tokio::test]
async fn test_export_without_video_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let comp = Composition {
        clips: vec![Clip::image("logo", "logo.png", 0, 30)],
        ..Default::default()
    };
    let err = exporter
        .export_to_gif(&request(comp, 1.0, dir.path()), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to export GIF: No video clips to export.");
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_client_side_export_rejects_before_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let comp = Composition {
        text_overlays: vec![TextOverlay::new("t", "Only text", 0, 30)],
        ..Default::default()
    };
    let err = exporter
        .export_client_side(&request(comp, 1.0, dir.path()), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No video clips to export.");
    assert!(loader.seeks().is_empty());
}

#[tokio::test]
async fn test_invalid_composition_is_rejected_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone());

    let comp = Composition {
        clips: vec![Clip::video("v", "v.mp4", i64::MAX - 5, 10)],
        ..Default::default()
    };
    let err = exporter
        .export_to_gif(&request(comp, 1.0, dir.path()), None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Failed to export GIF: Invalid composition:"));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_client_export_delivers_gif_with_monotonic_progress() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = GifExporter::new(Arc::new(FakeLoader::default()));
    let sessions: Arc<Mutex<Vec<ExportSession>>> = Arc::default();
    let sink = sessions.clone();

    let path = exporter
        .export_to_gif(
            &request(ten_second_clip(), 2.0, dir.path()),
            Some(Box::new(move |s: ExportSession| sink.lock().unwrap().push(s))),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..6], b"GIF89a");
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("export_") && name.ends_with(".gif"));

    let sessions = sessions.lock().unwrap();
    let percents: Vec<u8> = sessions.iter().map(|s| s.progress).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");

    let first_hundred = sessions.iter().position(|s| s.progress == 100).unwrap();
    assert_eq!(sessions[first_hundred].frames_rendered, 75);
    assert_eq!(sessions[first_hundred].total_frames, 75);
    assert!(sessions.iter().any(|s| s.stage == ExportStage::Encoding));

    let last = sessions.last().unwrap();
    assert_eq!(last.stage, ExportStage::Complete);
    assert!(!last.is_exporting);
}

#[tokio::test]
async fn test_server_error_falls_back_to_client_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = spawn_endpoint(vec![("POST", "/api/render-gif", 500, b"{}".to_vec())]).await;
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone())
        .with_server(Some(ServerRenderClient::new(&endpoint, Duration::from_secs(5)).unwrap()));
    let stages: Arc<Mutex<Vec<ExportStage>>> = Arc::default();
    let sink = stages.clone();

    let path = exporter
        .export_to_gif(
            &request(ten_second_clip(), 2.0, dir.path()),
            Some(Box::new(move |s: ExportSession| sink.lock().unwrap().push(s.stage))),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(path.exists());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    let stages = stages.lock().unwrap();
    assert_eq!(stages[0], ExportStage::RequestingServerRender);
    assert!(stages.contains(&ExportStage::Rendering));
}

#[tokio::test]
async fn test_server_success_skips_client_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let gif = b"GIF89a-from-server".to_vec();
    let endpoint = spawn_endpoint(vec![
        (
            "POST",
            "/api/render-gif",
            200,
            br#"{"gifUrl":"/renders/out.gif"}"#.to_vec(),
        ),
        ("GET", "/renders/out.gif", 200, gif.clone()),
    ])
    .await;
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone())
        .with_server(Some(ServerRenderClient::new(&endpoint, Duration::from_secs(5)).unwrap()));

    let path = exporter
        .export_to_gif(
            &request(ten_second_clip(), 1.0, dir.path()),
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), gif);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_server_reply_without_url_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = spawn_endpoint(vec![("POST", "/api/render-gif", 200, b"{}".to_vec())]).await;
    let loader = Arc::new(FakeLoader::default());
    let exporter = GifExporter::new(loader.clone())
        .with_server(Some(ServerRenderClient::new(&endpoint, Duration::from_secs(5)).unwrap()));

    let mut comp = ten_second_clip();
    comp.clips[0].duration = 30;
    comp.text_overlays.clear();
    exporter
        .export_to_gif(&request(comp, 1.0, dir.path()), None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancellation_stops_export() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = GifExporter::new(Arc::new(FakeLoader::default()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = exporter
        .export_to_gif(&request(ten_second_clip(), 1.0, dir.path()), None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ReelgifError::Cancelled));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_stalled_seek_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Arc::new(FakeLoader {
        stall_seeks: true,
        ..Default::default()
    });
    let exporter = GifExporter::new(loader);
    let mut req = request(ten_second_clip(), 1.0, dir.path());
    req.options.seek_timeout = Some(Duration::from_millis(50));

    let err = exporter
        .export_to_gif(&req, None, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(
        err.to_string().starts_with("Failed to export GIF: Seek timed out on clip main"),
        "{err}"
    );
}
