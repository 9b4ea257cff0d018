use thiserror::Error;

/// Errors raised while building or driving a [`crate::CrossingEngine`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CrossingError {
    /// Malformed region configuration. Fatal at construction time.
    #[error("invalid region configuration: {0}")]
    Config(String),

    /// A single malformed detection record. The engine skips it and keeps going.
    #[error("invalid detection for track {track_id} at frame {frame_index}: {reason}")]
    InvalidDetection {
        track_id: u64,
        frame_index: u64,
        reason: String,
    },

    /// Non-positive or non-finite frame rate.
    #[error("frame rate must be positive and finite, got {0}")]
    InvalidFps(f64),
}

impl CrossingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_detection(track_id: u64, frame_index: u64, reason: impl Into<String>) -> Self {
        Self::InvalidDetection {
            track_id,
            frame_index,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrossingError>;
