pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod event;
pub mod geometry;
pub mod logging;
pub mod region;
pub mod report;
pub mod timecode;
pub mod track;

// Re-export main types
pub use crate::config::Config;
pub use crate::detection::{Detection, TrackId};
pub use crate::engine::{CrossingEngine, ExitPolicy};
pub use crate::error::{CrossingError, Result};
pub use crate::event::{Event, EventKind, RunningCount};
pub use crate::geometry::{footprint, intersects, BBox, FootprintMode, Shape};
pub use crate::region::{Region, RegionConfig, RegionKind, RegionSet};
pub use crate::report::{ObjectKind, Report, ReportAssembler};
pub use crate::timecode::{frame_to_timecode, TimeCodec};
