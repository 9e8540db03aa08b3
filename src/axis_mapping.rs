//! Maps pixel tracking error to angular error for each servo axis.

use crate::{
    constants::{
        DEFAULT_DEADZONE_PX, DEFAULT_KP_X, DEFAULT_KP_Y, DEFAULT_MAX_DEGREES, DEFAULT_MAX_STEP_DEG,
        MAX_DEGREES_MAX, MAX_DEGREES_MIN,
    },
    error_estimation::ErrorSample,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the controller turns angular error into servo targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Target recomputed from centre every frame
    Absolute,
    /// Bounded proportional step from the current smoothed position
    Incremental,
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::Incremental
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => write!(f, "ABS"),
            Self::Incremental => write!(f, "INC"),
        }
    }
}

/// Per-run axis and control configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    pub invert_x: bool,
    pub invert_y: bool,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Pixel errors smaller than this are treated as zero
    pub deadzone_px: i32,
    /// Angular deflection at the frame edge; clamped to [1, 90] when used
    pub max_degrees: i32,
    pub offset_x_deg: i32,
    pub offset_y_deg: i32,
    pub control_mode: ControlMode,
    pub kp_x: f64,
    pub kp_y: f64,
    pub max_step_deg: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            invert_x: false,
            invert_y: false,
            scale_x: 1.0,
            scale_y: 1.0,
            deadzone_px: DEFAULT_DEADZONE_PX,
            max_degrees: DEFAULT_MAX_DEGREES,
            offset_x_deg: 0,
            offset_y_deg: 0,
            control_mode: ControlMode::default(),
            kp_x: DEFAULT_KP_X,
            kp_y: DEFAULT_KP_Y,
            max_step_deg: DEFAULT_MAX_STEP_DEG,
        }
    }
}

impl AxisConfig {
    /// `max_degrees` clamped to [1, 90]
    #[must_use]
    pub fn effective_max_degrees(&self) -> i32 {
        self.max_degrees.clamp(MAX_DEGREES_MIN, MAX_DEGREES_MAX)
    }

    /// Copy with `max_degrees` clamped to its valid range
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_degrees = self.effective_max_degrees();
        self
    }
}

/// Angular error per axis, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularError {
    pub err_x_deg: f64,
    pub err_y_deg: f64,
}

fn apply_deadzone(value: i32, deadzone: i32) -> i32 {
    if value.abs() < deadzone {
        0
    } else {
        value
    }
}

const fn sign(invert: bool) -> f64 {
    if invert {
        -1.0
    } else {
        1.0
    }
}

/// Scale a pixel offset against half the frame extent
fn scale_axis(offset: i32, extent: i32, max_degrees: i32, scale: f64, invert: bool) -> f64 {
    let half = f64::from(extent) / 2.0;
    if half <= 0.0 {
        return 0.0;
    }
    (f64::from(offset) / half) * f64::from(max_degrees) * scale * sign(invert)
}

/// Map a pixel error on a `width` x `height` frame to angular error
///
/// The vertical offset is negated before scaling (a face below centre tilts up), independently of
/// `invert_y`.
#[must_use]
pub fn map_error(sample: &ErrorSample, config: &AxisConfig, width: i32, height: i32) -> AngularError {
    let dx = apply_deadzone(sample.dx, config.deadzone_px);
    let dy = apply_deadzone(sample.dy, config.deadzone_px);
    let max_degrees = config.effective_max_degrees();

    AngularError {
        err_x_deg: scale_axis(dx, width, max_degrees, config.scale_x, config.invert_x),
        err_y_deg: scale_axis(-dy, height, max_degrees, config.scale_y, config.invert_y),
    }
}
