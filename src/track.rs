/// Per (track, region) status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossingStatus {
    #[default]
    NotEntered,
    Entered,
}

/// Crossing/occupancy state kept for one track against one region.
///
/// For lines `Entered` is a terminal latch. For areas it alternates with
/// `NotEntered` as the track enters and exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrossingState {
    pub status: CrossingStatus,
    pub entered_at_frame: Option<u64>,
    /// Frame of the most recent detection of this track evaluated against the region.
    pub last_frame: Option<u64>,
    /// The track already contributed to the region's running count.
    pub counted: bool,
}

impl CrossingState {
    pub fn is_entered(&self) -> bool {
        self.status == CrossingStatus::Entered
    }

    /// Move to `Entered`. Returns true the first time the track is counted.
    pub fn enter(&mut self, frame_index: u64) -> bool {
        self.status = CrossingStatus::Entered;
        self.entered_at_frame = Some(frame_index);
        !std::mem::replace(&mut self.counted, true)
    }

    pub fn exit(&mut self) {
        self.status = CrossingStatus::NotEntered;
        self.entered_at_frame = None;
    }

    pub fn mark_seen(&mut self, frame_index: u64) {
        self.last_frame = Some(frame_index);
    }
}
