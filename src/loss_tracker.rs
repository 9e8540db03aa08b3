//! Face loss tracking and detector model switching.
//!
//! Counts consecutive frames without a detection. When the count reaches the threshold the active
//! model variant flips and the count starts over, so a face that stays lost makes the detector
//! alternate between near and full-range models.

use crate::face_detection::ModelVariant;
use std::fmt;

/// Whether the face is currently seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Tracking,
    Lost,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracking => write!(f, "Tracking"),
            Self::Lost => write!(f, "Searching..."),
        }
    }
}

/// Consecutive-loss counter with model variant selection
#[derive(Debug, Clone)]
pub struct LossTracker {
    threshold: u32,
    consecutive_lost_frames: u32,
    active_variant: ModelVariant,
    state: TrackingState,
}

impl LossTracker {
    /// Create a tracker; a threshold of 0 is treated as 1
    #[must_use]
    pub fn new(threshold: u32, initial_variant: ModelVariant) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_lost_frames: 0,
            active_variant: initial_variant,
            state: TrackingState::Tracking,
        }
    }

    /// Record one frame
    ///
    /// Returns the new variant when the loss threshold was just reached.
    pub fn observe(&mut self, detected: bool) -> Option<ModelVariant> {
        if detected {
            self.consecutive_lost_frames = 0;
            self.state = TrackingState::Tracking;
            return None;
        }

        self.state = TrackingState::Lost;
        self.consecutive_lost_frames += 1;
        if self.consecutive_lost_frames >= self.threshold {
            self.consecutive_lost_frames = 0;
            self.active_variant = self.active_variant.toggled();
            return Some(self.active_variant);
        }
        None
    }

    /// Operator override of the model variant
    ///
    /// The loss count keeps running, so a face that stays lost still triggers the next toggle on
    /// schedule.
    pub fn force_variant(&mut self, variant: ModelVariant) {
        self.active_variant = variant;
    }

    #[must_use]
    pub const fn consecutive_lost_frames(&self) -> u32 {
        self.consecutive_lost_frames
    }

    #[must_use]
    pub const fn active_variant(&self) -> ModelVariant {
        self.active_variant
    }

    #[must_use]
    pub const fn state(&self) -> TrackingState {
        self.state
    }

    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }
}
