//! Reelgif Render Engine
//!
//! Turns a [`Composition`](reelgif_project_model::Composition) into an
//! animated GIF. A server-side render is attempted first; when it fails the
//! frames are composited and encoded in-process.
//!
//! # Pipeline Architecture
//!
//! ```text
//! composition.json ──┬── Server render (POST) ── gifUrl ── download ──┐
//!                    │        (any failure falls through)             │
//!                    ▼                                                │
//!              Asset preload                                          │
//!      (videos: all-or-nothing, 10s each;                             │
//!       images: best effort)                                          │
//!                    │                                                │
//!                    ▼                                                │
//!        Frame loop (strictly in order)                               │
//!   background → cover-fit video → images                             │
//!        → blur regions → text                                        │
//!                    │                                                │
//!                    ▼                                                │
//!        GIF encoder (≤4 quantiser threads)                           │
//!                    │                                                │
//!                    ▼                                                ▼
//!             Delivery: exports/export_<unix_ms>.gif
//! ```

pub mod compositor;
pub mod delivery;
pub mod encoder;
pub mod export;
pub mod ffmpeg;
pub mod preload;
pub mod server;
pub mod text;

pub use export::*;
