use serde::{Deserialize, Serialize};

use crate::error::{CrossingError, Result};
use crate::geometry::BBox;

pub type TrackId = u64;

/// A single tracked detection: one box for one track on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    pub frame_index: u64,
    pub confidence: f64,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(track_id: TrackId, frame_index: u64, confidence: f64, bbox: BBox) -> Self {
        Self {
            track_id,
            frame_index,
            confidence,
            bbox,
        }
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Reject records the engine cannot reason about.
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: &str| Err(CrossingError::invalid_detection(self.track_id, self.frame_index, reason));

        if !self.bbox.is_finite() {
            return reject("non-finite box coordinates");
        }
        if !self.confidence.is_finite() {
            return reject("non-finite confidence");
        }
        if self.bbox.xmin > self.bbox.xmax {
            return reject("xmin is greater than xmax");
        }
        if self.bbox.ymin > self.bbox.ymax {
            return reject("ymin is greater than ymax");
        }
        Ok(())
    }
}
