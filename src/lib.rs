//! Real-time face tracking for a two-axis pan/tilt servo rig.
//!
//! This library drives servos from camera frames using:
//! - `OpenCV` for camera capture and the operator window
//! - ONNX Runtime for BlazeFace face detection
//! - A serial link speaking a one-line text protocol to the servo controller
//!
//! The per-frame pipeline consists of:
//! 1. Camera acquisition with index probing and hot re-acquisition
//! 2. Face detection, normalized to six keypoints in pixel space
//! 3. Error estimation (eye midpoint and nose tip against the frame centre)
//! 4. Axis mapping (deadzone, inversion, scale) to angular error
//! 5. Servo control (absolute or incremental) with exponential smoothing
//! 6. Loss tracking, switching detector model after a run of empty frames
//! 7. Rate-limited, best-effort command transmission
//!
//! # Examples
//!
//! ## Control pipeline without hardware
//!
//! ```
//! use face_servo_tracker::{
//!     config::Config,
//!     face_detection::{BoundingBox, Detection, Keypoints, PixelPoint},
//!     tracker::Tracker,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tracker = Tracker::from_config(&Config::default())?;
//!
//! // Face well to the right of a 640x480 frame
//! let points = [(580, 240), (620, 240), (600, 240), (600, 270), (540, 240), (660, 240)];
//! let face = Detection {
//!     bbox: BoundingBox::default(),
//!     keypoints: Keypoints::new(points.map(|(x, y)| PixelPoint::new(x, y))),
//!     confidence: 0.9,
//! };
//!
//! let outcome = tracker.process(&[face], 640, 480);
//! assert!(outcome.command.x > 90);
//! println!("send {}", outcome.command);
//! # Ok(())
//! # }
//! ```
//!
//! ## Serial link
//!
//! ```no_run
//! use face_servo_tracker::{config::SerialConfig, serial_link::SerialLink, servo_control::ServoCommand};
//!
//! // Falls back to a no-op link if the port cannot be opened
//! let mut link = SerialLink::open(&SerialConfig::default());
//! link.send(ServoCommand::new(120, 80));
//! link.close();
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the application
pub mod constants;

/// Configuration management
pub mod config;

/// Command-line arguments
pub mod cli;

/// Utility functions for coordinates and numeric conversion
pub mod utils;

/// Camera acquisition
pub mod camera;

/// Face detection models and the face locator adapter
pub mod face_detection;

/// Pixel error of the tracked face
pub mod error_estimation;

/// Pixel error to angular error mapping
pub mod axis_mapping;

/// Exponential smoothing of servo angles
pub mod smoothing;

/// Servo control core
pub mod servo_control;

/// Face loss tracking and model switching
pub mod loss_tracker;

/// Serial command link to the servo rig
pub mod serial_link;

/// Per-frame control pipeline
pub mod tracker;

/// Main application module
pub mod app;

pub use error::{Error, Result};
