//! Reelgif Common Utilities
//!
//! Shared infrastructure for all Reelgif crates:
//! - Error types and result aliases
//! - Frame clock mapping timeline frames to output frames
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
