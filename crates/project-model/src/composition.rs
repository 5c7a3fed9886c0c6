//! The composition: every clip and overlay on the shared timeline axis.
//!
//! Items are independent and matched to frames purely by temporal
//! containment (`start <= frame < start + duration`). There are no foreign
//! keys; `clip_effects` is keyed by clip id but opaque to this crate.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::overlay::{BlurOverlay, TextOverlay, MAX_BLUR_INTENSITY, MIN_BLUR_INTENSITY};

/// Everything the export pipeline needs from the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    #[serde(default)]
    pub clips: Vec<Clip>,

    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,

    #[serde(default)]
    pub blur_overlays: Vec<BlurOverlay>,

    /// Per-clip effect settings, forwarded verbatim to the server renderer.
    #[serde(default)]
    pub clip_effects: BTreeMap<String, serde_json::Value>,

    /// Total length in timeline frames. Derived from the items when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_duration: Option<u64>,

    /// Uniform speed multiplier applied at export time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_speed: Option<f64>,
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// A problem found by [`Composition::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl CompositionIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

impl std::fmt::Display for CompositionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        };
        write!(f, "{label}: {}", self.message)
    }
}

impl Composition {
    /// Load a composition from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ProjectError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save the composition as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProjectError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ProjectError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ProjectError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve relative local `src` paths against `base`. URLs are left alone.
    pub fn resolve_sources(&mut self, base: &Path) {
        for clip in &mut self.clips {
            let is_url = clip.src.starts_with("http://") || clip.src.starts_with("https://");
            if !is_url && Path::new(&clip.src).is_relative() {
                clip.src = base.join(&clip.src).to_string_lossy().into_owned();
            }
        }
    }

    /// Length of the content in timeline frames.
    pub fn content_duration(&self) -> u64 {
        if let Some(duration) = self.content_duration {
            return duration;
        }
        let clip_ends = self.clips.iter().map(Clip::end);
        let text_ends = self.text_overlays.iter().map(TextOverlay::end);
        let blur_ends = self.blur_overlays.iter().map(BlurOverlay::end);
        clip_ends
            .chain(text_ends)
            .chain(blur_ends)
            .max()
            .unwrap_or(0)
            .max(0) as u64
    }

    pub fn playback_speed(&self) -> f64 {
        self.playback_speed
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(1.0)
    }

    /// Video clips in start order; ties keep declaration order.
    pub fn video_clips(&self) -> Vec<&Clip> {
        let mut videos: Vec<&Clip> = self.clips.iter().filter(|c| c.is_video()).collect();
        videos.sort_by_key(|c| c.start);
        videos
    }

    pub fn image_clips(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter().filter(|c| c.is_image())
    }

    /// The single video drawn on `frame`: first match in start order.
    pub fn active_video_at(&self, frame: i64) -> Option<&Clip> {
        self.video_clips()
            .into_iter()
            .find(|clip| clip.contains_frame(frame))
    }

    /// All image clips visible on `frame`, in declaration order.
    pub fn active_images_at(&self, frame: i64) -> Vec<&Clip> {
        self.image_clips()
            .filter(|clip| clip.contains_frame(frame))
            .collect()
    }

    pub fn active_text_at(&self, frame: i64) -> Vec<&TextOverlay> {
        self.text_overlays
            .iter()
            .filter(|overlay| overlay.contains_frame(frame))
            .collect()
    }

    pub fn active_blurs_at(&self, frame: i64) -> Vec<&BlurOverlay> {
        self.blur_overlays
            .iter()
            .filter(|overlay| overlay.contains_frame(frame))
            .collect()
    }

    /// Check the composition for problems. Errors make an export meaningless;
    /// warnings describe tolerated oddities (e.g. overlapping clips).
    pub fn validate(&self) -> Vec<CompositionIssue> {
        let mut issues = vec![];
        let mut seen_ids = HashSet::new();

        let mut check_item = |kind: &str, id: &str, start: i64, duration: i64| {
            if id.trim().is_empty() {
                issues.push(CompositionIssue::error(format!("{kind} has an empty id")));
            } else if !seen_ids.insert(id.to_string()) {
                issues.push(CompositionIssue::error(format!("duplicate id '{id}'")));
            }
            if start < 0 {
                issues.push(CompositionIssue::error(format!(
                    "{kind} '{id}' starts before frame 0 ({start})"
                )));
            }
            if duration <= 0 {
                issues.push(CompositionIssue::error(format!(
                    "{kind} '{id}' has non-positive duration ({duration})"
                )));
            } else if start.checked_add(duration).is_none() {
                issues.push(CompositionIssue::error(format!(
                    "{kind} '{id}' ends past the last representable frame"
                )));
            }
        };

        for clip in &self.clips {
            check_item("clip", &clip.id, clip.start, clip.duration);
        }
        for overlay in &self.text_overlays {
            check_item("text overlay", &overlay.id, overlay.start, overlay.duration);
        }
        for overlay in &self.blur_overlays {
            check_item("blur overlay", &overlay.id, overlay.start, overlay.duration);
        }

        for (i, a) in self.clips.iter().enumerate() {
            for b in &self.clips[i + 1..] {
                if a.overlaps(b) {
                    issues.push(CompositionIssue::warning(format!(
                        "clips '{}' and '{}' overlap on row {}",
                        a.id, b.id, a.row
                    )));
                }
            }
        }

        let videos = self.video_clips();
        for (i, a) in videos.iter().enumerate() {
            for b in &videos[i + 1..] {
                if a.row != b.row && a.start < b.end() && b.start < a.end() {
                    issues.push(CompositionIssue::warning(format!(
                        "videos '{}' and '{}' overlap across rows; '{}' wins",
                        a.id, b.id, a.id
                    )));
                }
            }
        }

        for overlay in &self.blur_overlays {
            if overlay.intensity < MIN_BLUR_INTENSITY || overlay.intensity > MAX_BLUR_INTENSITY {
                issues.push(CompositionIssue::warning(format!(
                    "blur overlay '{}' intensity {} will be clamped to [{MIN_BLUR_INTENSITY}, {MAX_BLUR_INTENSITY}]",
                    overlay.id, overlay.intensity
                )));
            }
        }

        if let Some(speed) = self.playback_speed {
            if !(speed.is_finite() && speed > 0.0) {
                issues.push(CompositionIssue::error(format!(
                    "playback speed must be positive, got {speed}"
                )));
            }
        }

        issues
    }
}

/// Errors that can occur when loading or saving compositions.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Composition {
        Composition {
            clips: vec![
                Clip::video("late", "b.mp4", 100, 100),
                Clip::video("early", "a.mp4", 0, 150),
                Clip::image("logo", "logo.png", 0, 300),
            ],
            text_overlays: vec![TextOverlay::new("title", "Hello", 30, 60)],
            ..Default::default()
        }
    }

    #[test]
    fn test_first_video_in_start_order_wins() {
        let comp = sample();
        assert_eq!(comp.active_video_at(0).map(|c| c.id.as_str()), Some("early"));
        // both cover frame 120; earlier start wins regardless of declaration order
        assert_eq!(comp.active_video_at(120).map(|c| c.id.as_str()), Some("early"));
        assert_eq!(comp.active_video_at(150).map(|c| c.id.as_str()), Some("late"));
        assert!(comp.active_video_at(200).is_none());
    }

    #[test]
    fn test_content_duration_survives_extreme_offsets() {
        let comp = Composition {
            clips: vec![Clip::video("v", "a.mp4", i64::MAX - 5, 10)],
            text_overlays: vec![TextOverlay::new("t", "hi", i64::MAX - 1, 10)],
            ..Default::default()
        };
        assert_eq!(comp.content_duration(), i64::MAX as u64);
    }

    #[test]
    fn test_content_duration_is_derived() {
        let comp = sample();
        assert_eq!(comp.content_duration(), 300);

        let explicit = Composition {
            content_duration: Some(90),
            ..sample()
        };
        assert_eq!(explicit.content_duration(), 90);
    }

    #[test]
    fn test_text_activity_window() {
        let comp = sample();
        assert!(comp.active_text_at(29).is_empty());
        assert_eq!(comp.active_text_at(30).len(), 1);
        assert_eq!(comp.active_text_at(89).len(), 1);
        assert!(comp.active_text_at(90).is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut comp = sample();
        comp.clips.push(Clip::video("early", "dup.mp4", -5, 0));
        let issues = comp.validate();
        assert!(issues.iter().any(|i| i.is_error() && i.message.contains("duplicate id")));
        assert!(issues.iter().any(|i| i.message.contains("starts before frame 0")));
        assert!(issues.iter().any(|i| i.message.contains("non-positive duration")));
        assert!(issues
            .iter()
            .any(|i| !i.is_error() && i.message.contains("overlap")));
    }

    #[test]
    fn test_validate_rejects_overflowing_end() {
        let comp = Composition {
            clips: vec![Clip::video("v", "v.mp4", i64::MAX - 5, 10)],
            ..Default::default()
        };
        let issues = comp.validate();
        assert!(issues
            .iter()
            .any(|i| i.is_error() && i.message.contains("last representable frame")));
    }

    #[test]
    fn test_valid_composition_has_no_errors() {
        let comp = Composition {
            clips: vec![Clip::video("v", "v.mp4", 0, 300)],
            ..Default::default()
        };
        assert!(comp.validate().iter().all(|i| !i.is_error()));
    }

    #[test]
    fn test_parses_editor_payload() {
        let json = r##"{
            "clips": [{"id":"v1","type":"video","src":"clip.mp4","start":0,"duration":300,"row":0}],
            "textOverlays": [{"id":"t1","text":"Hi","start":30,"duration":60,"x":50,"y":80,"fontSize":2,"color":"#ffcc00"}],
            "blurOverlays": [{"id":"b1","start":0,"duration":300,"x":10,"y":10,"width":20,"height":20,"blurIntensity":12,"shape":"rect"}],
            "clipEffects": {"v1": {"brightness": 1.2}},
            "playbackSpeed": 2
        }"##;
        let comp: Composition = serde_json::from_str(json).unwrap();
        assert_eq!(comp.clips.len(), 1);
        assert_eq!(comp.text_overlays[0].rgba(), [255, 204, 0, 255]);
        assert!((comp.playback_speed() - 2.0).abs() < 1e-9);
        assert_eq!(comp.clip_effects["v1"]["brightness"], 1.2);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("composition.json");
        let comp = sample();
        comp.save(&path).unwrap();
        let loaded = Composition::load(&path).unwrap();
        assert_eq!(loaded, comp);
    }

    #[test]
    fn test_resolve_sources_leaves_urls() {
        let mut comp = Composition {
            clips: vec![
                Clip::video("a", "media/a.mp4", 0, 10),
                Clip::image("b", "https://cdn.example.com/b.png", 0, 10),
            ],
            ..Default::default()
        };
        comp.resolve_sources(Path::new("/projects/demo"));
        assert_eq!(comp.clips[0].src, "/projects/demo/media/a.mp4");
        assert_eq!(comp.clips[1].src, "https://cdn.example.com/b.png");
    }

    proptest! {
        #[test]
        fn prop_at_most_one_active_video_and_it_is_first(
            spans in proptest::collection::vec((0i64..500, 1i64..200), 1..8),
            frame in 0i64..700,
        ) {
            let comp = Composition {
                clips: spans
                    .iter()
                    .enumerate()
                    .map(|(i, (start, duration))| {
                        let mut clip = Clip::video(format!("v{i}"), "v.mp4", *start, *duration);
                        clip.row = i as u32;
                        clip
                    })
                    .collect(),
                ..Default::default()
            };

            let matching: Vec<&Clip> = comp
                .video_clips()
                .into_iter()
                .filter(|c| c.contains_frame(frame))
                .collect();

            match comp.active_video_at(frame) {
                None => prop_assert!(matching.is_empty()),
                Some(active) => {
                    prop_assert!(active.contains_frame(frame));
                    prop_assert!(matching.iter().all(|c| c.start >= active.start));
                    prop_assert_eq!(&active.id, &matching[0].id);
                }
            }
        }
    }
}
