//! Reelgif Project Model
//!
//! Defines the data contracts consumed by the export pipeline:
//! - **Clips:** Video and image assets placed on the timeline
//! - **Overlays:** Text and blur regions independent of clips
//! - **Composition:** The full time-indexed graph plus selection rules
//! - **Geometry:** Cover-fit and percentage placement math
//!
//! All items share one time axis: timeline frames at the editor's native
//! 30 fps. Spatial values on clips and overlays are percentages of the
//! output canvas (`0.0..=100.0`) so they survive resolution changes.

pub mod clip;
pub mod composition;
pub mod geometry;
pub mod overlay;

pub use clip::*;
pub use composition::*;
pub use geometry::*;
pub use overlay::*;
