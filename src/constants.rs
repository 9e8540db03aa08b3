//! Constants used throughout the application

/// Number of keypoints the face locator reports per detection
pub const NUM_FACE_KEYPOINTS: usize = 6;

/// Servo angle range, in degrees
pub const SERVO_MIN_DEG: i32 = 0;
pub const SERVO_MAX_DEG: i32 = 180;

/// Mechanical centre of both servos
pub const SERVO_CENTER_DEG: i32 = 90;

/// Bounds for the maximum angular deflection from centre
pub const MAX_DEGREES_MIN: i32 = 1;
pub const MAX_DEGREES_MAX: i32 = 90;

/// Default tracking parameters
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 50;
pub const DEFAULT_LOST_FRAMES_THRESHOLD: u32 = 60;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;
pub const DEFAULT_DEADZONE_PX: i32 = 70;
pub const DEFAULT_MAX_DEGREES: i32 = 45;
pub const DEFAULT_KP_X: f64 = 0.2;
pub const DEFAULT_KP_Y: f64 = 0.3;
pub const DEFAULT_MAX_STEP_DEG: f64 = 4.0;

/// Default serial parameters
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_SERIAL_SETTLE_MS: u64 = 2000;
pub const SERIAL_WRITE_TIMEOUT_MS: u64 = 1000;

/// Camera indices probed when no preferred index works
pub const CAMERA_PROBE_INDICES: [i32; 3] = [0, 1, 2];

/// Highest index (exclusive) enumerated by `--list-cams`
pub const CAMERA_LIST_MAX_INDEX: i32 = 10;

/// Requested capture settings
pub const DEFAULT_CAPTURE_WIDTH: i32 = 1280;
pub const DEFAULT_CAPTURE_HEIGHT: i32 = 720;
pub const DEFAULT_CAPTURE_FPS: i32 = 30;
pub const AUTOFOCUS_SETTLE_MS: u64 = 800;

/// Depth proxy thresholds (inter-ear distance in pixels)
pub const DEPTH_NEAR_PX: f64 = 300.0;
pub const DEPTH_FAR_PX: f64 = 150.0;

/// Servo sweep used by `--servo-test`
pub const SERVO_SWEEP_SEQUENCE: [i32; 4] = [90, 0, 180, 90];
pub const SERVO_SWEEP_DWELL_MS: u64 = 800;

/// Periodic status output
pub const DEFAULT_PRINT_EVERY: u32 = 5;

/// Non-maximum suppression overlap threshold for face detections
pub const NMS_IOU_THRESHOLD: f32 = 0.3;

/// Operator keys
pub const KEY_ESCAPE: i32 = 27;
