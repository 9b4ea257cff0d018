use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detection::{Detection, TrackId};
use crate::error::{CrossingError, Result};
use crate::event::{Event, EventKind, RunningCount};
use crate::geometry::{intersects, FootprintMode, DEFAULT_FOOTPRINT_SCALE};
use crate::region::{Region, RegionKind, RegionSet};
use crate::timecode::TimeCodec;
use crate::track::CrossingState;

/// How an area exit is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// The occupant exits when the next detection processed for the area
    /// belongs to a different track.
    #[default]
    TrackSwitch,
    /// The occupant exits on its first detection that no longer intersects the area.
    NoIntersection,
}

/// Turns an ordered stream of tracked detections into crossing, entry and exit events.
pub struct CrossingEngine {
    /// Regions evaluated for every detection, in order
    regions: Arc<RegionSet>,
    /// Frame index to timecode conversion
    codec: TimeCodec,
    /// Scale passed to the footprint builder
    footprint_scale: f64,
    /// Part of the box tested against regions
    footprint_mode: FootprintMode,
    exit_policy: ExitPolicy,
    /// Evict tracks absent from more than this many consecutive accepted detections
    max_idle_detections: Option<u64>,
    /// State per (track, region index)
    states: HashMap<(TrackId, usize), CrossingState>,
    /// Last accepted frame per track
    last_frame_by_track: HashMap<TrackId, u64>,
    /// Value of `tick` when each track was last accepted
    last_tick_by_track: HashMap<TrackId, u64>,
    /// Track of the previous detection processed, per region index
    previous_track: Vec<Option<TrackId>>,
    /// Running count per region index
    counts: Vec<u64>,
    /// Accepted detections so far
    tick: u64,
    next_sweep: u64,
}

impl CrossingEngine {
    /// Create a new engine over `regions` at `fps`.
    ///
    /// `footprint_scale` must lie in (0, 0.5); see [`crate::geometry::footprint`].
    pub fn new(regions: impl Into<Arc<RegionSet>>, fps: f64, footprint_scale: f64) -> Result<Self> {
        let codec = TimeCodec::new(fps)?;
        if !(footprint_scale.is_finite() && footprint_scale > 0.0 && footprint_scale < 0.5) {
            return Err(CrossingError::config(format!(
                "footprint scale must be in (0, 0.5), got {}",
                footprint_scale
            )));
        }
        let regions = regions.into();
        let n = regions.len();

        Ok(CrossingEngine {
            regions,
            codec,
            footprint_scale,
            footprint_mode: FootprintMode::default(),
            exit_policy: ExitPolicy::default(),
            max_idle_detections: None,
            states: HashMap::new(),
            last_frame_by_track: HashMap::new(),
            last_tick_by_track: HashMap::new(),
            previous_track: vec![None; n],
            counts: vec![0; n],
            tick: 0,
            next_sweep: 0,
        })
    }

    /// Engine with the default footprint scale.
    pub fn with_defaults(regions: impl Into<Arc<RegionSet>>, fps: f64) -> Result<Self> {
        Self::new(regions, fps, DEFAULT_FOOTPRINT_SCALE)
    }

    pub fn with_footprint_mode(mut self, mode: FootprintMode) -> Self {
        self.footprint_mode = mode;
        self
    }

    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    /// Drop state for tracks absent from more than `max_idle_detections`
    /// consecutive accepted detections. Idleness is measured per track in
    /// stream order, never against other tracks' frame numbers.
    /// Evicted tracks are counted again if they reappear.
    pub fn with_retention(mut self, max_idle_detections: Option<u64>) -> Self {
        self.max_idle_detections = max_idle_detections;
        self
    }

    pub fn regions(&self) -> &Arc<RegionSet> {
        &self.regions
    }

    pub fn fps(&self) -> f64 {
        self.codec.fps()
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        self.exit_policy
    }

    /// Number of live (track, region) states.
    pub fn tracked_pairs(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, track_id: TrackId, region: &str) -> Option<&CrossingState> {
        let idx = self.regions.position(region)?;
        self.states.get(&(track_id, idx))
    }

    /// Snapshot of the running count for every region.
    pub fn counts(&self) -> RunningCount {
        self.regions
            .names()
            .zip(self.counts.iter())
            .map(|(name, &n)| (name.to_string(), n))
            .collect()
    }

    /// Evaluate one detection against every region.
    ///
    /// A rejected detection leaves the engine untouched.
    pub fn process(&mut self, det: &Detection) -> Result<Vec<Event>> {
        if let Err(err) = self.check(det) {
            warn!(track_id = det.track_id, frame = det.frame_index, error = %err, "detection rejected");
            return Err(err);
        }

        let shape = self.footprint_mode.shape(det.bbox(), self.footprint_scale);
        let regions = Arc::clone(&self.regions);
        let mut events = Vec::new();

        for (idx, region) in regions.iter().enumerate() {
            let hit = intersects(region.shape(), &shape);
            match region.kind() {
                RegionKind::Line => self.process_line(idx, region, det, hit, &mut events),
                RegionKind::Area => match self.exit_policy {
                    ExitPolicy::TrackSwitch => self.process_area_track_switch(idx, region, det, hit, &mut events),
                    ExitPolicy::NoIntersection => {
                        self.process_area_no_intersection(idx, region, det, hit, &mut events)
                    }
                },
            }
        }

        self.tick += 1;
        self.last_frame_by_track.insert(det.track_id, det.frame_index);
        self.last_tick_by_track.insert(det.track_id, self.tick);
        self.evict_idle();

        Ok(events)
    }

    fn check(&self, det: &Detection) -> Result<()> {
        det.validate()?;
        if let Some(&last) = self.last_frame_by_track.get(&det.track_id) {
            if det.frame_index < last {
                return Err(CrossingError::invalid_detection(
                    det.track_id,
                    det.frame_index,
                    format!("frame goes backwards (last accepted frame {})", last),
                ));
            }
        }
        Ok(())
    }

    fn process_line(&mut self, idx: usize, region: &Region, det: &Detection, hit: bool, events: &mut Vec<Event>) {
        let state = self.states.entry((det.track_id, idx)).or_default();
        state.mark_seen(det.frame_index);
        if !hit || state.is_entered() {
            return;
        }
        if state.enter(det.frame_index) {
            self.counts[idx] += 1;
        }
        events.push(self.emit(EventKind::Crossed, det.track_id, region, det.frame_index));
    }

    fn process_area_track_switch(
        &mut self,
        idx: usize,
        region: &Region,
        det: &Detection,
        hit: bool,
        events: &mut Vec<Event>,
    ) {
        let state = self.states.entry((det.track_id, idx)).or_default();
        if hit && !state.is_entered() {
            let first = state.enter(det.frame_index);
            state.mark_seen(det.frame_index);
            if first {
                self.counts[idx] += 1;
            }
            events.push(self.emit(EventKind::EnteredArea, det.track_id, region, det.frame_index));
        } else {
            state.mark_seen(det.frame_index);
            if let Some(prev) = self.previous_track[idx].filter(|&t| t != det.track_id) {
                if let Some(prev_state) = self.states.get_mut(&(prev, idx)) {
                    if prev_state.is_entered() {
                        let frame = prev_state.last_frame.unwrap_or(det.frame_index);
                        prev_state.exit();
                        events.push(self.emit(EventKind::ExitedArea, prev, region, frame));
                    }
                }
            }
        }
        self.previous_track[idx] = Some(det.track_id);
    }

    fn process_area_no_intersection(
        &mut self,
        idx: usize,
        region: &Region,
        det: &Detection,
        hit: bool,
        events: &mut Vec<Event>,
    ) {
        let state = self.states.entry((det.track_id, idx)).or_default();
        let last_frame = state.last_frame;
        state.mark_seen(det.frame_index);

        if hit && !state.is_entered() {
            if state.enter(det.frame_index) {
                self.counts[idx] += 1;
            }
            events.push(self.emit(EventKind::EnteredArea, det.track_id, region, det.frame_index));
        } else if !hit && state.is_entered() {
            state.exit();
            let frame = last_frame.unwrap_or(det.frame_index);
            events.push(self.emit(EventKind::ExitedArea, det.track_id, region, frame));
        }
    }

    fn emit(&self, kind: EventKind, track_id: TrackId, region: &Region, frame_index: u64) -> Event {
        let timecode = self.codec.timecode(frame_index);
        info!(
            track_id,
            region = region.name(),
            frame = frame_index,
            timecode = %timecode,
            kind = %kind,
            "region event"
        );
        Event {
            kind,
            track_id,
            region_name: region.name().to_string(),
            frame_index,
            timecode,
        }
    }

    fn evict_idle(&mut self) {
        let Some(max_idle) = self.max_idle_detections else {
            return;
        };
        if self.tick < self.next_sweep {
            return;
        }
        self.next_sweep = self.tick.saturating_add(max_idle.max(1));

        let now = self.tick;
        let stale: HashSet<TrackId> = self
            .last_tick_by_track
            .iter()
            .filter(|(_, &seen)| now - seen > max_idle)
            .map(|(&track, _)| track)
            .collect();
        if stale.is_empty() {
            return;
        }

        for track in &stale {
            self.last_frame_by_track.remove(track);
            self.last_tick_by_track.remove(track);
        }
        self.states.retain(|(track, _), _| !stale.contains(track));
        for prev in self.previous_track.iter_mut() {
            if prev.is_some_and(|t| stale.contains(&t)) {
                *prev = None;
            }
        }
        debug!(evicted = stale.len(), tick = now, "evicted idle tracks");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::region::RegionConfig;

    // Footprints use scale 0.15, so a box spanning y in [0, 100] tests y in [0, 15].
    fn det(track_id: TrackId, frame_index: u64, xmin: f64, xmax: f64) -> Detection {
        Detection::new(track_id, frame_index, 0.9, BBox::new(xmin, 0.0, xmax, 100.0))
    }

    fn gate_engine() -> CrossingEngine {
        let regions = RegionSet::build(vec![RegionConfig::line("gate", &[[50.0, 0.0], [50.0, 200.0]])]).unwrap();
        CrossingEngine::with_defaults(regions, 30.0).unwrap()
    }

    fn zone_engine(policy: ExitPolicy) -> CrossingEngine {
        let regions = RegionSet::build(vec![RegionConfig::area(
            "zone",
            &[[100.0, 0.0], [200.0, 0.0], [200.0, 50.0], [100.0, 50.0]],
        )])
        .unwrap();
        CrossingEngine::with_defaults(regions, 30.0).unwrap().with_exit_policy(policy)
    }

    #[test]
    fn test_line_crossed_once_per_track() {
        let mut engine = gate_engine();

        let mut events = Vec::new();
        for frame in [10, 20, 30] {
            events.extend(engine.process(&det(7, frame, 40.0, 60.0)).unwrap());
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Crossed);
        assert_eq!(events[0].track_id, 7);
        assert_eq!(events[0].region_name, "gate");
        assert_eq!(events[0].frame_index, 10);
        assert_eq!(events[0].timecode, "0:0:0.33");
        assert_eq!(engine.counts()["gate"], 1);
    }

    #[test]
    fn test_line_crossing_after_approach() {
        let mut engine = gate_engine();
        assert!(engine.process(&det(1, 0, 0.0, 20.0)).unwrap().is_empty());
        assert!(engine.process(&det(1, 5, 20.0, 45.0)).unwrap().is_empty());
        let events = engine.process(&det(1, 9, 45.0, 70.0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame_index, 9);
        assert!(engine.process(&det(1, 12, 48.0, 52.0)).unwrap().is_empty());
        assert!(engine.state(1, "gate").unwrap().is_entered());
    }

    #[test]
    fn test_counts_distinct_tracks() {
        let mut engine = gate_engine();
        for (track, frame) in [(1, 0), (2, 0), (1, 1), (3, 2), (2, 3)] {
            engine.process(&det(track, frame, 40.0, 60.0)).unwrap();
        }
        assert_eq!(engine.counts()["gate"], 3);
    }

    #[test]
    fn test_invalid_detection_leaves_counts_unchanged() {
        let mut engine = gate_engine();
        engine.process(&det(1, 0, 40.0, 60.0)).unwrap();
        let before = engine.counts();
        let pairs = engine.tracked_pairs();

        let bad = Detection::new(2, 1, 0.9, BBox::new(5.0, 0.0, 2.0, 100.0));
        assert!(matches!(engine.process(&bad), Err(CrossingError::InvalidDetection { .. })));
        assert_eq!(engine.counts(), before);
        assert_eq!(engine.tracked_pairs(), pairs);

        // processing continues after a bad record
        let events = engine.process(&det(2, 2, 40.0, 60.0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(engine.counts()["gate"], 2);
    }

    #[test]
    fn test_backwards_frame_rejected() {
        let mut engine = gate_engine();
        engine.process(&det(1, 10, 0.0, 10.0)).unwrap();
        assert!(engine.process(&det(1, 9, 40.0, 60.0)).is_err());
        assert_eq!(engine.counts()["gate"], 0);
        // other tracks are unaffected by track 1's history
        assert_eq!(engine.process(&det(2, 3, 40.0, 60.0)).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_construction() {
        let regions = Arc::new(RegionSet::default());
        assert!(matches!(
            CrossingEngine::new(Arc::clone(&regions), 0.0, 0.15),
            Err(CrossingError::InvalidFps(_))
        ));
        assert!(matches!(
            CrossingEngine::new(Arc::clone(&regions), 30.0, 0.5),
            Err(CrossingError::Config(_))
        ));
        assert!(CrossingEngine::new(regions, 30.0, 0.0).is_err());
    }

    #[test]
    fn test_area_enter_then_exit_on_track_switch() {
        let mut engine = zone_engine(ExitPolicy::TrackSwitch);

        let entered = engine.process(&det(1, 5, 120.0, 140.0)).unwrap();
        assert_eq!(entered.len(), 1);
        assert_eq!(entered[0].kind, EventKind::EnteredArea);
        assert_eq!(engine.state(1, "zone").unwrap().entered_at_frame, Some(5));

        // still inside, same track: nothing
        assert!(engine.process(&det(1, 6, 120.0, 140.0)).unwrap().is_empty());

        // a different track outside the zone triggers the exit of track 1
        let exited = engine.process(&det(2, 7, 0.0, 10.0)).unwrap();
        assert_eq!(exited.len(), 1);
        assert_eq!(exited[0].kind, EventKind::ExitedArea);
        assert_eq!(exited[0].track_id, 1);
        assert_eq!(exited[0].frame_index, 6);
        assert_eq!(exited[0].timecode, "0:0:0.2");

        // no second exit for track 1
        assert!(engine.process(&det(3, 8, 0.0, 10.0)).unwrap().is_empty());
        assert_eq!(engine.counts()["zone"], 1);
    }

    #[test]
    fn test_area_entry_takes_precedence_over_exit() {
        let mut engine = zone_engine(ExitPolicy::TrackSwitch);
        engine.process(&det(1, 0, 120.0, 140.0)).unwrap();

        // track 2 enters right after track 1: only the entry is emitted
        let events = engine.process(&det(2, 0, 150.0, 160.0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::EnteredArea);
        assert_eq!(events[0].track_id, 2);

        // track 1 again, still inside: exit of track 2 is inferred
        let events = engine.process(&det(1, 1, 120.0, 140.0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ExitedArea);
        assert_eq!(events[0].track_id, 2);
        assert_eq!(engine.counts()["zone"], 2);
    }

    #[test]
    fn test_area_reentry_not_counted_twice() {
        let mut engine = zone_engine(ExitPolicy::TrackSwitch);
        engine.process(&det(1, 0, 120.0, 140.0)).unwrap();
        engine.process(&det(2, 1, 0.0, 10.0)).unwrap();
        let events = engine.process(&det(1, 2, 120.0, 140.0)).unwrap();
        assert_eq!(events[0].kind, EventKind::EnteredArea);
        assert_eq!(engine.counts()["zone"], 1);
    }

    #[test]
    fn test_area_no_intersection_policy() {
        let mut engine = zone_engine(ExitPolicy::NoIntersection);
        engine.process(&det(1, 10, 120.0, 140.0)).unwrap();

        // interleaved track does not cause an exit
        assert!(engine.process(&det(2, 11, 0.0, 10.0)).unwrap().is_empty());
        assert!(engine.process(&det(1, 12, 130.0, 150.0)).unwrap().is_empty());

        let events = engine.process(&det(1, 13, 300.0, 320.0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::ExitedArea);
        assert_eq!(events[0].track_id, 1);
        assert_eq!(events[0].frame_index, 12);
    }

    #[test]
    fn test_no_intersection_policy_ignores_other_occupants() {
        let mut engine = zone_engine(ExitPolicy::NoIntersection);
        engine.process(&det(1, 0, 120.0, 140.0)).unwrap();
        engine.process(&det(2, 0, 150.0, 170.0)).unwrap();

        for frame in 1..5 {
            assert!(engine.process(&det(1, frame, 120.0, 140.0)).unwrap().is_empty());
            assert!(engine.process(&det(2, frame, 150.0, 170.0)).unwrap().is_empty());
        }
        assert!(engine.state(1, "zone").unwrap().is_entered());
        assert!(engine.state(2, "zone").unwrap().is_entered());
        assert_eq!(engine.counts()["zone"], 2);
    }

    #[test]
    fn test_detection_inside_area_without_touching_edges() {
        let regions = RegionSet::build(vec![RegionConfig::area(
            "hall",
            &[[0.0, -100.0], [1000.0, -100.0], [1000.0, 1000.0], [0.0, 1000.0]],
        )])
        .unwrap();
        let mut engine = CrossingEngine::with_defaults(regions, 25.0).unwrap();
        let events = engine.process(&det(4, 50, 400.0, 420.0)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::EnteredArea);
    }

    #[test]
    fn test_one_detection_multiple_regions() {
        let regions = RegionSet::build(vec![
            RegionConfig::line("gate", &[[50.0, 0.0], [50.0, 200.0]]),
            RegionConfig::area("zone", &[[0.0, 0.0], [100.0, 0.0], [100.0, 50.0], [0.0, 50.0]]),
            RegionConfig::line("far", &[[500.0, 0.0], [500.0, 200.0]]),
        ])
        .unwrap();
        let mut engine = CrossingEngine::with_defaults(regions, 30.0).unwrap();

        let events = engine.process(&det(1, 0, 40.0, 60.0)).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| (e.region_name.as_str(), e.kind)).collect();
        assert_eq!(kinds, vec![("gate", EventKind::Crossed), ("zone", EventKind::EnteredArea)]);

        let counts = engine.counts();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts["far"], 0);
    }

    #[test]
    fn test_retention_evicts_idle_tracks() {
        let mut engine = gate_engine().with_retention(Some(10));
        engine.process(&det(1, 0, 40.0, 60.0)).unwrap();
        engine.process(&det(2, 1, 0.0, 10.0)).unwrap();
        assert_eq!(engine.tracked_pairs(), 2);

        // track 1 stays absent while track 2 keeps reporting
        for frame in 2..=20 {
            engine.process(&det(2, frame, 0.0, 10.0)).unwrap();
        }
        assert_eq!(engine.tracked_pairs(), 1);
        assert!(engine.state(1, "gate").is_none());
        // counts survive eviction
        assert_eq!(engine.counts()["gate"], 1);
    }

    #[test]
    fn test_retention_ignores_frame_skew_between_tracks() {
        let mut engine = gate_engine().with_retention(Some(10));

        // track 1 runs far ahead in frame numbering, track 2 sits on the gate
        let mut crossed = 0;
        for i in 0..30u64 {
            engine.process(&det(1, 1000 + 20 * i, 0.0, 10.0)).unwrap();
            crossed += engine
                .process(&det(2, i, 40.0, 60.0))
                .unwrap()
                .iter()
                .filter(|e| e.kind == EventKind::Crossed)
                .count();
        }

        assert_eq!(crossed, 1);
        assert_eq!(engine.counts()["gate"], 1);
        assert_eq!(engine.tracked_pairs(), 2);
    }

    #[test]
    fn test_no_retention_by_default() {
        let mut engine = gate_engine();
        engine.process(&det(1, 0, 0.0, 10.0)).unwrap();
        engine.process(&det(2, 100_000, 0.0, 10.0)).unwrap();
        assert_eq!(engine.tracked_pairs(), 2);
    }

    #[test]
    fn test_shared_region_set() {
        let regions = Arc::new(
            RegionSet::build(vec![RegionConfig::line("gate", &[[50.0, 0.0], [50.0, 200.0]])]).unwrap(),
        );
        let mut a = CrossingEngine::with_defaults(Arc::clone(&regions), 30.0).unwrap();
        let mut b = CrossingEngine::with_defaults(Arc::clone(&regions), 30.0).unwrap();
        a.process(&det(1, 0, 40.0, 60.0)).unwrap();
        assert_eq!(a.counts()["gate"], 1);
        assert_eq!(b.counts()["gate"], 0);
        assert_eq!(b.process(&det(1, 0, 40.0, 60.0)).unwrap().len(), 1);
    }
}
