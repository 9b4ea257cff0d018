use crate::error::{CrossingError, Result};

/// Converts frame indices to `H:M:S.ss` strings at a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeCodec {
    fps: f64,
}

impl TimeCodec {
    pub fn new(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CrossingError::InvalidFps(fps));
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn seconds(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps
    }

    /// Hours and minutes are whole numbers without padding; seconds are
    /// rounded to two decimals and keep a trailing `.0` when whole.
    /// Frame zero renders its seconds as a bare `0`.
    pub fn timecode(&self, frame_index: u64) -> String {
        let total = self.seconds(frame_index);
        let hours = (total / 3600.0).floor() as u64;
        let minutes = ((total % 3600.0) / 60.0).floor() as u64;
        if frame_index == 0 {
            return format!("{}:{}:0", hours, minutes);
        }
        let seconds = ((total % 60.0) * 100.0).round() / 100.0;
        // Debug formatting yields the shortest round-trip form and keeps ".0".
        format!("{}:{}:{:?}", hours, minutes, seconds)
    }
}

/// One-off conversion; fails if `fps` is not a positive finite number.
pub fn frame_to_timecode(frame_index: u64, fps: f64) -> Result<String> {
    Ok(TimeCodec::new(fps)?.timecode(frame_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_timecodes() {
        assert_eq!(frame_to_timecode(0, 30.0).unwrap(), "0:0:0");
        assert_eq!(frame_to_timecode(90, 30.0).unwrap(), "0:0:3.0");
        assert_eq!(frame_to_timecode(108000, 30.0).unwrap(), "1:0:0.0");
    }

    #[test]
    fn test_fractional_seconds_are_rounded() {
        assert_eq!(frame_to_timecode(10, 30.0).unwrap(), "0:0:0.33");
        assert_eq!(frame_to_timecode(1835, 30.0).unwrap(), "0:1:1.17");
        assert_eq!(frame_to_timecode(45, 30.0).unwrap(), "0:0:1.5");
    }

    #[test]
    fn test_hours_are_not_wrapped() {
        // 25 hours at 25 fps
        assert_eq!(frame_to_timecode(25 * 3600 * 25, 25.0).unwrap(), "25:0:0.0");
    }

    #[test]
    fn test_invalid_fps() {
        assert_eq!(frame_to_timecode(1, 0.0), Err(CrossingError::InvalidFps(0.0)));
        assert!(matches!(TimeCodec::new(-30.0), Err(CrossingError::InvalidFps(_))));
        assert!(TimeCodec::new(f64::NAN).is_err());
        assert!(TimeCodec::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_seconds() {
        let codec = TimeCodec::new(29.97).unwrap();
        assert_relative_eq!(codec.seconds(2997), 100.0, epsilon = 1e-9);
    }
}
