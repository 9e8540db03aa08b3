//! One pass of the control pipeline, free of camera and serial I/O.

use crate::{
    axis_mapping::{map_error, AngularError, AxisConfig},
    config::Config,
    error_estimation::{estimate_error, ErrorSample},
    face_detection::{Detection, ModelVariant},
    loss_tracker::{LossTracker, TrackingState},
    servo_control::{ServoCommand, ServoController},
    Result,
};
use log::{debug, info};

/// What one frame produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    /// Pixel error of the tracked face, if one was detected
    pub sample: Option<ErrorSample>,
    pub angular: Option<AngularError>,
    /// Smoothed angles to transmit
    pub command: ServoCommand,
    pub state: TrackingState,
    /// Set when the loss threshold was reached and the detector should switch
    pub model_switch: Option<ModelVariant>,
}

/// Servo controller plus loss tracker, advanced once per frame
#[derive(Debug, Clone)]
pub struct Tracker {
    controller: ServoController,
    loss: LossTracker,
}

impl Tracker {
    /// # Errors
    ///
    /// Returns `InvalidInput` if the smoothing factor is outside (0, 1] or a gain or step limit is
    /// not finite.
    pub fn new(
        axis: AxisConfig,
        smoothing_alpha: f64,
        lost_frames_threshold: u32,
        initial_variant: ModelVariant,
    ) -> Result<Self> {
        Ok(Self {
            controller: ServoController::new(axis, smoothing_alpha)?,
            loss: LossTracker::new(lost_frames_threshold, initial_variant),
        })
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` if the smoothing factor is outside (0, 1].
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.axis_config(),
            config.control.smoothing_alpha,
            config.detector.lost_frames_threshold,
            config.detector.initial_variant,
        )
    }

    /// Advance one frame given its detections (best first) and dimensions
    ///
    /// Only the first detection is tracked. Without one the servo state is held.
    pub fn process(&mut self, detections: &[Detection], width: i32, height: i32) -> FrameOutcome {
        let sample = detections.first().map(|det| estimate_error(det, width, height));
        let angular = sample.map(|s| map_error(&s, self.controller.config(), width, height));
        let command = self.controller.update(angular.as_ref());

        let model_switch = self.loss.observe(sample.is_some());
        if let Some(variant) = model_switch {
            info!(
                "No face for {} frames, switching to {variant} model",
                self.loss.threshold()
            );
        }
        debug!("frame: {sample:?} -> {command}");

        FrameOutcome {
            sample,
            angular,
            command,
            state: self.loss.state(),
            model_switch,
        }
    }

    /// Operator override of the detector variant
    pub fn force_variant(&mut self, variant: ModelVariant) {
        self.loss.force_variant(variant);
    }

    #[must_use]
    pub const fn controller(&self) -> &ServoController {
        &self.controller
    }

    #[must_use]
    pub const fn loss(&self) -> &LossTracker {
        &self.loss
    }
}
