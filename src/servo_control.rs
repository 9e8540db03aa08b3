//! Servo controller: turns angular error into smoothed pan/tilt angles.
//!
//! Two control modes are supported. In [`ControlMode::Absolute`] the target angle is recomputed
//! from the mechanical centre every frame. In [`ControlMode::Incremental`] the angular error is
//! treated as a velocity signal: a proportional step, bounded by `max_step_deg`, is added to the
//! current smoothed position. Both modes feed the same exponential smoothing filter, and the
//! smoothed angles are what gets transmitted.

use crate::{
    axis_mapping::{AngularError, AxisConfig, ControlMode},
    constants::{SERVO_CENTER_DEG, SERVO_MAX_DEG, SERVO_MIN_DEG},
    smoothing::ExponentialSmoother,
    utils::safe_cast::f64_to_i32_clamp,
    Error, Result,
};
use log::trace;
use std::fmt;

/// Servo state owned by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoState {
    /// Raw computed targets
    pub target_x: i32,
    pub target_y: i32,
    /// Filtered angles, the ones actually sent
    pub smoothed_x: i32,
    pub smoothed_y: i32,
}

impl Default for ServoState {
    fn default() -> Self {
        Self {
            target_x: SERVO_CENTER_DEG,
            target_y: SERVO_CENTER_DEG,
            smoothed_x: SERVO_CENTER_DEG,
            smoothed_y: SERVO_CENTER_DEG,
        }
    }
}

/// Pan/tilt angles to send to the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    pub x: i32,
    pub y: i32,
}

impl ServoCommand {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Both servos at mechanical centre
    #[must_use]
    pub const fn center() -> Self {
        Self::new(SERVO_CENTER_DEG, SERVO_CENTER_DEG)
    }
}

impl fmt::Display for ServoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{},Y:{}", self.x, self.y)
    }
}

/// Clamp to the servo range; a non-finite value keeps `current`
fn clamp_angle(value: f64, current: i32) -> i32 {
    if value.is_finite() {
        f64_to_i32_clamp(value, SERVO_MIN_DEG, SERVO_MAX_DEG)
    } else {
        current
    }
}

/// Bounded, damped proportional tracker for two servo axes
#[derive(Debug, Clone)]
pub struct ServoController {
    config: AxisConfig,
    smoother: ExponentialSmoother,
    state: ServoState,
}

impl ServoController {
    /// Create a controller at mechanical centre
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the smoothing factor is outside (0, 1] or a gain or the max step
    /// is not finite.
    pub fn new(config: AxisConfig, smoothing_alpha: f64) -> Result<Self> {
        for (name, value) in [
            ("kp_x", config.kp_x),
            ("kp_y", config.kp_y),
            ("max_step_deg", config.max_step_deg),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("{name} must be finite, got {value}")));
            }
        }

        Ok(Self {
            config: config.normalized(),
            smoother: ExponentialSmoother::new(smoothing_alpha)?,
            state: ServoState::default(),
        })
    }

    /// Advance one frame
    ///
    /// With no error (no face this frame) the state is held and the last smoothed angles are
    /// returned unchanged.
    pub fn update(&mut self, error: Option<&AngularError>) -> ServoCommand {
        if let Some(error) = error {
            let (target_x, target_y) = self.compute_target(error);
            let (smoothed_x, smoothed_y) = self
                .smoother
                .step_pair((self.state.smoothed_x, self.state.smoothed_y), (target_x, target_y));

            self.state = ServoState {
                target_x,
                target_y,
                smoothed_x,
                smoothed_y,
            };
            trace!("servo update: {:?}", self.state);
        }

        self.command()
    }

    /// Raw target angles for an angular error, given the current state
    #[must_use]
    pub fn compute_target(&self, error: &AngularError) -> (i32, i32) {
        let offset_x = f64::from(self.config.offset_x_deg);
        let offset_y = f64::from(self.config.offset_y_deg);

        match self.config.control_mode {
            ControlMode::Absolute => {
                let center = f64::from(SERVO_CENTER_DEG);
                (
                    clamp_angle(center + error.err_x_deg + offset_x, self.state.target_x),
                    clamp_angle(center + error.err_y_deg + offset_y, self.state.target_y),
                )
            }
            ControlMode::Incremental => {
                let (step_x, step_y) = self.step(error);
                (
                    clamp_angle(
                        f64::from(self.state.smoothed_x) + step_x + offset_x,
                        self.state.smoothed_x,
                    ),
                    clamp_angle(
                        f64::from(self.state.smoothed_y) + step_y + offset_y,
                        self.state.smoothed_y,
                    ),
                )
            }
        }
    }

    /// Proportional step per axis, bounded by `max_step_deg`
    #[must_use]
    pub fn step(&self, error: &AngularError) -> (f64, f64) {
        let max_step = self.config.max_step_deg.abs();
        (
            (self.config.kp_x * error.err_x_deg).clamp(-max_step, max_step),
            (self.config.kp_y * error.err_y_deg).clamp(-max_step, max_step),
        )
    }

    /// Command for the current smoothed angles
    #[must_use]
    pub const fn command(&self) -> ServoCommand {
        ServoCommand::new(self.state.smoothed_x, self.state.smoothed_y)
    }

    #[must_use]
    pub const fn state(&self) -> &ServoState {
        &self.state
    }

    #[must_use]
    pub const fn config(&self) -> &AxisConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(mode: ControlMode) -> ServoController {
        let config = AxisConfig { control_mode: mode, ..AxisConfig::default() };
        ServoController::new(config, 0.3).unwrap()
    }

    fn err(x: f64, y: f64) -> AngularError {
        AngularError { err_x_deg: x, err_y_deg: y }
    }

    #[test]
    fn test_starts_centered() {
        let ctrl = controller(ControlMode::Incremental);
        assert_eq!(*ctrl.state(), ServoState::default());
        assert_eq!(ctrl.command(), ServoCommand::center());
        assert_eq!(ctrl.command().to_string(), "X:90,Y:90");
    }

    #[test]
    fn test_absolute_target() {
        let mut ctrl = controller(ControlMode::Absolute);
        let cmd = ctrl.update(Some(&err(45.0, -10.0)));
        assert_eq!(ctrl.state().target_x, 135);
        assert_eq!(ctrl.state().target_y, 80);
        // 0.7 * 90 + 0.3 * 135 rounds to 103 or 104 depending on float rounding; stays between
        assert!(cmd.x > 90 && cmd.x < 135);
    }

    #[test]
    fn test_absolute_target_clamped() {
        let mut ctrl = controller(ControlMode::Absolute);
        ctrl.update(Some(&err(500.0, -500.0)));
        assert_eq!(ctrl.state().target_x, 180);
        assert_eq!(ctrl.state().target_y, 0);
    }

    #[test]
    fn test_incremental_step_is_bounded() {
        let mut ctrl = controller(ControlMode::Incremental);
        // kp_x 0.2 * 45 = 9 > max step 4
        ctrl.update(Some(&err(45.0, 0.0)));
        assert_eq!(ctrl.state().target_x, 94);
        assert_eq!(ctrl.state().target_y, 90);
    }

    #[test]
    fn test_incremental_small_error_is_proportional() {
        let ctrl = controller(ControlMode::Incremental);
        let (step_x, step_y) = ctrl.step(&err(10.0, 10.0));
        assert!((step_x - 2.0).abs() < 1e-9);
        assert!((step_y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_detection_holds_state() {
        let mut ctrl = controller(ControlMode::Incremental);
        ctrl.update(Some(&err(45.0, 45.0)));
        let before = *ctrl.state();

        let cmd = ctrl.update(None);
        assert_eq!(*ctrl.state(), before);
        assert_eq!(cmd, ServoCommand::new(before.smoothed_x, before.smoothed_y));
    }

    #[test]
    fn test_offsets_apply_in_absolute_mode() {
        let config = AxisConfig {
            control_mode: ControlMode::Absolute,
            offset_x_deg: 10,
            offset_y_deg: -5,
            ..AxisConfig::default()
        };
        let mut ctrl = ServoController::new(config, 1.0).unwrap();
        let cmd = ctrl.update(Some(&err(0.0, 0.0)));
        assert_eq!(cmd, ServoCommand::new(100, 85));
    }

    #[test]
    fn test_invalid_alpha_rejected() {
        assert!(ServoController::new(AxisConfig::default(), 0.0).is_err());
    }

    #[test]
    fn test_non_finite_gains_rejected() {
        let infinite_gain = AxisConfig { kp_x: f64::INFINITY, ..AxisConfig::default() };
        assert!(matches!(
            ServoController::new(infinite_gain, 0.3),
            Err(Error::InvalidInput(_))
        ));

        let nan_step = AxisConfig { max_step_deg: f64::NAN, ..AxisConfig::default() };
        assert!(matches!(ServoController::new(nan_step, 0.3), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_error_holds_position() {
        let mut ctrl = controller(ControlMode::Incremental);
        let cmd = ctrl.update(Some(&err(f64::NAN, f64::INFINITY)));
        assert_eq!(cmd, ServoCommand::center());
        assert_eq!(ctrl.state().target_x, 90);

        let mut ctrl = controller(ControlMode::Absolute);
        let cmd = ctrl.update(Some(&err(f64::NAN, 0.0)));
        assert_eq!(cmd, ServoCommand::center());
    }
}
