//! Event tables, per-region summaries and the row-oriented detection export.
use std::fmt;
use std::io::{Read, Write};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, TrackId};
use crate::event::{Event, EventKind, RunningCount};
use crate::geometry::BBox;
use crate::region::{RegionKind, RegionSet};

/// What the tracked objects are. Only affects wording and input headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[default]
    Pedestrian,
    Vehicle,
}

impl ObjectKind {
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Pedestrian => "pedestrian",
            ObjectKind::Vehicle => "vehicle",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the detection export.
///
/// Reading also accepts the `pedestrian Id` / `vehicle Id` / `frame ID` headers
/// written by older exports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(alias = "pedestrian Id", alias = "predestrian Id", alias = "vehicle Id")]
    pub track_id: TrackId,
    #[serde(alias = "frame ID")]
    pub frame_index: u64,
    pub confidence: f64,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        Detection::new(r.track_id, r.frame_index, r.confidence, BBox::new(r.xmin, r.ymin, r.xmax, r.ymax))
    }
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        DetectionRecord {
            track_id: d.track_id,
            frame_index: d.frame_index,
            confidence: d.confidence,
            xmin: d.bbox.xmin,
            ymin: d.bbox.ymin,
            xmax: d.bbox.xmax,
            ymax: d.bbox.ymax,
        }
    }
}

/// Read a detection export with a header row, failing on the first malformed row.
pub fn read_detections_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Detection>> {
    detection_rows(reader).map(|(_, record)| record).collect()
}

/// Iterate a detection export row by row.
///
/// Each item carries the 1-based data row number, so a caller can report and
/// skip a malformed row without losing the rest of the file.
pub fn detection_rows<R: Read>(reader: R) -> impl Iterator<Item = (usize, anyhow::Result<Detection>)> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize::<DetectionRecord>()
        .enumerate()
        .map(|(idx, record)| {
            let row = idx + 1;
            let record = record
                .map(Detection::from)
                .with_context(|| format!("malformed detection row {}", row));
            (row, record)
        })
}

pub fn write_detections_csv<W: Write>(writer: W, detections: &[Detection]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for det in detections {
        wtr.serialize(DetectionRecord::from(det))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Final count for one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionTotal {
    pub name: String,
    pub kind: RegionKind,
    pub count: u64,
}

/// Aggregate view of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub object_kind: ObjectKind,
    pub regions: Vec<RegionTotal>,
    pub total: u64,
    pub events: Vec<Event>,
}

impl Report {
    /// `"<N> <kind>s steps in the <region>"` per region, then the overall total.
    pub fn summary_lines(&self) -> Vec<String> {
        let kind = self.object_kind.label();
        let mut lines: Vec<String> = self
            .regions
            .iter()
            .map(|r| format!("{} {}s steps in the {}", r.count, kind, r.name))
            .collect();
        lines.push(format!("{} {} in total", self.total, kind));
        lines
    }
}

/// Collects engine events and turns them into tables and summaries.
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    object_kind: ObjectKind,
    events: Vec<Event>,
}

impl ReportAssembler {
    pub fn new(object_kind: ObjectKind) -> Self {
        Self {
            object_kind,
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_for_track(&self, track_id: TrackId) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.track_id == track_id)
    }

    pub fn count_of(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// One row per event, in emission order.
    pub fn write_events_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for event in &self.events {
            wtr.serialize(event)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Regions follow configuration order; regions missing from `counts` report zero.
    pub fn finish(self, regions: &RegionSet, counts: &RunningCount) -> Report {
        let regions: Vec<RegionTotal> = regions
            .iter()
            .map(|r| RegionTotal {
                name: r.name().to_string(),
                kind: r.kind(),
                count: counts.get(r.name()).copied().unwrap_or(0),
            })
            .collect();
        let total = regions.iter().map(|r| r.count).sum();
        Report {
            object_kind: self.object_kind,
            regions,
            total,
            events: self.events,
        }
    }
}
