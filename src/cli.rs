//! Command-line arguments.
//!
//! Every tuning flag is optional and overlays the configuration file (or the defaults) through
//! [`Args::apply_to`], so a YAML file can hold the rig calibration while one-off overrides stay
//! on the command line.

use crate::{axis_mapping::ControlMode, config::Config};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "Face tracking pan/tilt servo controller", long_about = None)]
pub struct Args {
    /// Serial port of the servo controller (e.g. COM5, /dev/ttyUSB0)
    #[arg(long, visible_alias = "com")]
    pub port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    pub baud: Option<u32>,

    /// Run without opening the serial port
    #[arg(long)]
    pub no_serial: bool,

    /// Invert the pan axis
    #[arg(long)]
    pub invert_x: bool,

    /// Invert the tilt axis
    #[arg(long)]
    pub invert_y: bool,

    /// Pan sensitivity multiplier
    #[arg(long)]
    pub scale_x: Option<f64>,

    /// Tilt sensitivity multiplier
    #[arg(long)]
    pub scale_y: Option<f64>,

    /// Camera index (skips probing unless the camera fails)
    #[arg(long)]
    pub camera_index: Option<i32>,

    /// Deadzone around the frame centre, in pixels
    #[arg(long)]
    pub deadzone: Option<i32>,

    /// Maximum deflection from centre in degrees (clamped to 1..=90)
    #[arg(long)]
    pub max_deg: Option<i32>,

    /// Control mode
    #[arg(long, value_enum)]
    pub control: Option<ControlMode>,

    /// Pan proportional gain (incremental mode)
    #[arg(long)]
    pub kp_x: Option<f64>,

    /// Tilt proportional gain (incremental mode)
    #[arg(long)]
    pub kp_y: Option<f64>,

    /// Maximum change per frame in degrees (incremental mode)
    #[arg(long)]
    pub max_step: Option<f64>,

    /// Fixed pan offset in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub offset_x: Option<i32>,

    /// Fixed tilt offset in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub offset_y: Option<i32>,

    /// Do not mirror camera frames
    #[arg(long)]
    pub no_flip: bool,

    /// Run without a window (stop with Ctrl+C)
    #[arg(long)]
    pub headless: bool,

    /// Short-range face detection model (ONNX)
    #[arg(long)]
    pub near_model: Option<PathBuf>,

    /// Full-range face detection model (ONNX)
    #[arg(long)]
    pub full_range_model: Option<PathBuf>,

    /// List working cameras and exit
    #[arg(long)]
    pub list_cams: bool,

    /// Preview the camera without face detection
    #[arg(long)]
    pub debug_camera: bool,

    /// Sweep both servos through 90, 0, 180, 90 and exit
    #[arg(long)]
    pub servo_test: bool,

    /// Periodically print pixel error and servo angles
    #[arg(long)]
    pub print_xy: bool,

    /// Frames between status lines with --print-xy
    #[arg(long, value_name = "FRAMES")]
    pub print_every: Option<u32>,

    /// Enable debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// Overlay the flags that were given onto `config`
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.serial.port.clone_from(port);
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if self.no_serial {
            config.serial.enabled = false;
        }

        if let Some(index) = self.camera_index {
            config.camera.index = Some(index);
        }
        if self.no_flip {
            config.camera.mirror = false;
        }

        if self.invert_x {
            config.axis.invert_x = true;
        }
        if self.invert_y {
            config.axis.invert_y = true;
        }
        if let Some(scale) = self.scale_x {
            config.axis.scale_x = scale;
        }
        if let Some(scale) = self.scale_y {
            config.axis.scale_y = scale;
        }
        if let Some(deadzone) = self.deadzone {
            config.axis.deadzone_px = deadzone;
        }
        if let Some(max_deg) = self.max_deg {
            config.axis.max_degrees = max_deg;
        }
        if let Some(offset) = self.offset_x {
            config.axis.offset_x_deg = offset;
        }
        if let Some(offset) = self.offset_y {
            config.axis.offset_y_deg = offset;
        }

        if let Some(mode) = self.control {
            config.control.mode = mode;
        }
        if let Some(kp) = self.kp_x {
            config.control.kp_x = kp;
        }
        if let Some(kp) = self.kp_y {
            config.control.kp_y = kp;
        }
        if let Some(max_step) = self.max_step {
            config.control.max_step_deg = max_step;
        }

        if let Some(path) = &self.near_model {
            config.detector.near_model.clone_from(path);
        }
        if let Some(path) = &self.full_range_model {
            config.detector.full_range_model.clone_from(path);
        }

        if self.headless {
            config.display.gui = false;
        }
        if self.print_xy {
            config.display.print_xy = true;
        }
        if let Some(every) = self.print_every {
            config.display.print_every = every;
        }
    }
}
