//! Visual structures (timed images and their display schedule).

/// Minimum time any image stays on screen, in seconds.
pub const MIN_DISPLAY_SECS: f64 = 0.5;

/// A still image with the narration timestamp it belongs to.
///
/// `sequence_index` is assigned by the schedule builder after sorting and
/// is never supplied by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedVisual {
    /// Position in the sorted sequence.
    pub sequence_index: usize,
    /// Narration time at which the image appears.
    pub timestamp_secs: f64,
    /// Encoded image data (PNG, JPEG, WebP...).
    pub image_bytes: Vec<u8>,
}

/// One image of the display schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    /// The image being shown.
    pub visual: TimedVisual,
    /// How long the image stays on screen (always >= `MIN_DISPLAY_SECS`).
    pub display_secs: f64,
    /// Last entry of the schedule. Its effective length is decided by the
    /// final mux, which stops at the end of the narration.
    pub is_terminal: bool,
}

impl ScheduleEntry {
    /// Time at which this entry leaves the screen, by the schedule's estimate.
    pub fn end_secs(&self) -> f64 {
        self.visual.timestamp_secs + self.display_secs
    }
}
