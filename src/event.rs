use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detection::TrackId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Crossed,
    EnteredArea,
    ExitedArea,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Crossed => "crossed",
            EventKind::EnteredArea => "entered_area",
            EventKind::ExitedArea => "exited_area",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crossing, entry or exit emitted by the engine. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub track_id: TrackId,
    pub region_name: String,
    pub frame_index: u64,
    pub timecode: String,
}

/// Distinct tracks that ever triggered each region, keyed by region name.
pub type RunningCount = BTreeMap<String, u64>;
