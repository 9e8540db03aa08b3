//! Configuration management for the face servo tracker

use crate::{
    axis_mapping::{AxisConfig, ControlMode},
    constants::{
        DEFAULT_BAUD_RATE, DEFAULT_CAPTURE_FPS, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH,
        DEFAULT_DEADZONE_PX, DEFAULT_KP_X, DEFAULT_KP_Y, DEFAULT_LOST_FRAMES_THRESHOLD,
        DEFAULT_MAX_DEGREES, DEFAULT_MAX_STEP_DEG, DEFAULT_MIN_CONFIDENCE, DEFAULT_PRINT_EVERY,
        DEFAULT_SEND_INTERVAL_MS, DEFAULT_SERIAL_SETTLE_MS, DEFAULT_SMOOTHING_ALPHA,
    },
    face_detection::ModelVariant,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link to the servo controller
    pub serial: SerialConfig,

    /// Camera acquisition
    pub camera: CameraConfig,

    /// Pixel-to-angle mapping
    pub axis: AxisSettings,

    /// Servo control loop
    pub control: ControlSettings,

    /// Face detector models
    pub detector: DetectorConfig,

    /// Operator display and console output
    pub display: DisplayConfig,
}

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Open the serial port at startup
    pub enabled: bool,

    /// Port name (`COM5`, `/dev/ttyUSB0`, ...)
    pub port: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Wait after opening before the first command (the board resets on connect)
    pub settle_delay_ms: u64,

    /// Minimum time between command transmissions
    pub send_interval_ms: u64,
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Preferred camera index; probe 0, 1, 2 when unset or failing
    pub index: Option<i32>,

    /// Mirror frames horizontally
    pub mirror: bool,

    /// Requested capture width
    pub width: i32,

    /// Requested capture height
    pub height: i32,

    /// Requested capture rate
    pub fps: i32,
}

/// Axis mapping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisSettings {
    /// Invert X axis
    pub invert_x: bool,

    /// Invert Y axis
    pub invert_y: bool,

    /// X axis sensitivity
    pub scale_x: f64,

    /// Y axis sensitivity
    pub scale_y: f64,

    /// Deadzone around the frame centre, in pixels
    pub deadzone_px: i32,

    /// Maximum deflection from centre, in degrees (1..=90)
    pub max_degrees: i32,

    /// Fixed X offset, in degrees
    pub offset_x_deg: i32,

    /// Fixed Y offset, in degrees
    pub offset_y_deg: i32,
}

/// Control loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Absolute or incremental control
    pub mode: ControlMode,

    /// X proportional gain (incremental mode)
    pub kp_x: f64,

    /// Y proportional gain (incremental mode)
    pub kp_y: f64,

    /// Maximum change per frame, in degrees (incremental mode)
    pub max_step_deg: f64,

    /// Exponential smoothing factor (0, 1]; higher is more responsive
    pub smoothing_alpha: f64,
}

/// Face detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Short-range BlazeFace ONNX model
    pub near_model: PathBuf,

    /// Full-range BlazeFace ONNX model
    pub full_range_model: PathBuf,

    /// Minimum detection confidence (0.0-1.0)
    pub min_confidence: f32,

    /// Frames without a face before switching model
    pub lost_frames_threshold: u32,

    /// Model used at startup
    pub initial_variant: ModelVariant,
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show the tracking window (needed for operator keys)
    pub gui: bool,

    /// Periodically log pixel error and servo angles
    pub print_xy: bool,

    /// Frames between periodic status lines
    pub print_every: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_serial_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            settle_delay_ms: DEFAULT_SERIAL_SETTLE_MS,
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: None,
            mirror: true,
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            fps: DEFAULT_CAPTURE_FPS,
        }
    }
}

impl Default for AxisSettings {
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
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            mode: ControlMode::Incremental,
            kp_x: DEFAULT_KP_X,
            kp_y: DEFAULT_KP_Y,
            max_step_deg: DEFAULT_MAX_STEP_DEG,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            near_model: PathBuf::from("assets/face_detection_short_range.onnx"),
            full_range_model: PathBuf::from("assets/face_detection_full_range.onnx"),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            lost_frames_threshold: DEFAULT_LOST_FRAMES_THRESHOLD,
            initial_variant: ModelVariant::Near,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            gui: true,
            print_xy: false,
            print_every: DEFAULT_PRINT_EVERY,
        }
    }
}

const fn default_serial_port() -> &'static str {
    if cfg!(windows) {
        "COM5"
    } else {
        "/dev/ttyUSB0"
    }
}

impl SerialConfig {
    /// Send interval as a `Duration`
    #[must_use]
    pub const fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `ConfigError` if it does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if serialization fails and `Io` if the file cannot be written.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))
    }

    /// Axis and control parameters for the servo controller
    #[must_use]
    pub fn axis_config(&self) -> AxisConfig {
        AxisConfig {
            invert_x: self.axis.invert_x,
            invert_y: self.axis.invert_y,
            scale_x: self.axis.scale_x,
            scale_y: self.axis.scale_y,
            deadzone_px: self.axis.deadzone_px,
            max_degrees: self.axis.max_degrees,
            offset_x_deg: self.axis.offset_x_deg,
            offset_y_deg: self.axis.offset_y_deg,
            control_mode: self.control.mode,
            kp_x: self.control.kp_x,
            kp_y: self.control.kp_y,
            max_step_deg: self.control.max_step_deg,
        }
        .normalized()
    }

    /// Validate configuration
    ///
    /// `axis.max_degrees` is clamped to 1..=90 where it is used rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.serial.enabled && self.serial.port.trim().is_empty() {
            return Err(Error::ConfigError("Serial port must not be empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::ConfigError("Baud rate must be greater than 0".to_string()));
        }
        if self.serial.send_interval_ms == 0 {
            return Err(Error::ConfigError("Send interval must be greater than 0".to_string()));
        }

        if let Some(index) = self.camera.index {
            if index < 0 {
                return Err(Error::ConfigError(format!("Camera index must not be negative, got {index}")));
            }
        }

        if self.axis.deadzone_px < 0 {
            return Err(Error::ConfigError("Deadzone must not be negative".to_string()));
        }
        if !self.axis.scale_x.is_finite() || !self.axis.scale_y.is_finite() {
            return Err(Error::ConfigError("Axis scale factors must be finite".to_string()));
        }

        let gains = [self.control.kp_x, self.control.kp_y];
        if !gains.iter().all(|kp| kp.is_finite() && *kp >= 0.0) {
            return Err(Error::ConfigError(
                "Proportional gains must be finite and not negative".to_string(),
            ));
        }
        if !(self.control.max_step_deg.is_finite() && self.control.max_step_deg >= 0.0) {
            return Err(Error::ConfigError("Max step must be finite and not negative".to_string()));
        }
        if !(self.control.smoothing_alpha > 0.0 && self.control.smoothing_alpha <= 1.0) {
            return Err(Error::ConfigError(
                "Smoothing alpha must be in (0.0, 1.0]".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(Error::ConfigError(
                "Minimum confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detector.lost_frames_threshold == 0 {
            return Err(Error::ConfigError(
                "Lost frames threshold must be greater than 0".to_string(),
            ));
        }

        if self.display.print_every == 0 {
            return Err(Error::ConfigError("Print interval must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face Servo Tracker Configuration

# Serial link to the servo controller
serial:
  enabled: true
  port: "/dev/ttyUSB0"
  baud_rate: 115200
  settle_delay_ms: 2000
  send_interval_ms: 50

# Camera (index: null probes 0, 1, 2)
camera:
  index: null
  mirror: true
  width: 1280
  height: 720
  fps: 30

# Pixel error to servo angle mapping
axis:
  invert_x: false
  invert_y: false
  scale_x: 1.0
  scale_y: 1.0
  deadzone_px: 70
  max_degrees: 45
  offset_x_deg: 0
  offset_y_deg: 0

# Control loop
control:
  mode: incremental
  kp_x: 0.2
  kp_y: 0.3
  max_step_deg: 4.0
  smoothing_alpha: 0.3

# Face detector
detector:
  near_model: "assets/face_detection_short_range.onnx"
  full_range_model: "assets/face_detection_full_range.onnx"
  min_confidence: 0.3
  lost_frames_threshold: 60
  initial_variant: near

# Display
display:
  gui: true
  print_xy: false
  print_every: 5
"#;
