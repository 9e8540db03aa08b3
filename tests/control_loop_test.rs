//! Reference scenarios for the per-frame control pipeline

mod test_helpers;

use face_servo_tracker::{
    axis_mapping::{map_error, AxisConfig, ControlMode},
    config::Config,
    error_estimation::{estimate_error, ErrorSample},
    face_detection::ModelVariant,
    servo_control::ServoController,
    tracker::Tracker,
};
use test_helpers::face_at;

#[test]
fn test_scenario_a_deadzone_keeps_target() {
    // Centre (320, 240); eye midpoint 20 px right is inside the 70 px deadzone
    let mut tracker = Tracker::from_config(&Config::default()).unwrap();
    let before = *tracker.controller().state();

    let outcome = tracker.process(&[face_at(340, 240)], 640, 480);
    let sample = outcome.sample.unwrap();
    assert_eq!(sample.dx, 20);
    assert_eq!(outcome.angular.unwrap().err_x_deg, 0.0);
    assert_eq!(tracker.controller().state().target_x, before.smoothed_x);
    assert_eq!(outcome.command.x, before.smoothed_x);
}

#[test]
fn test_scenario_b_absolute_full_deflection() {
    let config = AxisConfig {
        control_mode: ControlMode::Absolute,
        max_degrees: 45,
        scale_x: 1.0,
        ..AxisConfig::default()
    };

    // Half the frame width to the right maps to the full max_degrees deflection
    let edge = ErrorSample { dx: 320, dy: 0, depth_proxy: 200.0 };
    let angular = map_error(&edge, &config, 640, 480);
    assert!((angular.err_x_deg - 45.0).abs() < 1e-9);

    let mut controller = ServoController::new(config, 0.3).unwrap();
    controller.update(Some(&angular));
    assert_eq!(controller.state().target_x, 135);

    // A quarter of the width maps to half of it
    let quarter = ErrorSample { dx: 160, dy: 0, depth_proxy: 200.0 };
    let angular = map_error(&quarter, &config, 640, 480);
    assert!((angular.err_x_deg - 22.5).abs() < 1e-9);
}

#[test]
fn test_scenario_c_single_toggle_then_reset() {
    let mut tracker = Tracker::from_config(&Config::default()).unwrap();

    let switches: Vec<_> = (0..60).filter_map(|_| tracker.process(&[], 640, 480).model_switch).collect();
    assert_eq!(switches, vec![ModelVariant::FullRange]);
    assert_eq!(tracker.loss().consecutive_lost_frames(), 0);

    let outcome = tracker.process(&[face_at(320, 240)], 640, 480);
    assert_eq!(outcome.model_switch, None);
    assert_eq!(tracker.loss().consecutive_lost_frames(), 0);
    assert_eq!(tracker.loss().active_variant(), ModelVariant::FullRange);
}

#[test]
fn test_vertical_error_tilts_opposite_to_nose_offset() {
    let config = AxisConfig::default();
    let below = ErrorSample { dx: 0, dy: 120, depth_proxy: 200.0 };
    assert!(map_error(&below, &config, 640, 480).err_y_deg < 0.0);

    let inverted = AxisConfig { invert_y: true, ..config };
    assert!(map_error(&below, &inverted, 640, 480).err_y_deg > 0.0);
}

#[test]
fn test_error_sample_from_detection() {
    let sample = estimate_error(&face_at(400, 300), 640, 480);
    assert_eq!(sample.dx, 80);
    assert_eq!(sample.dy, 60);
    assert_eq!(sample.depth_proxy, 120.0);
}

#[test]
fn test_incremental_walks_toward_face() {
    let mut tracker = Tracker::from_config(&Config::default()).unwrap();
    let mut previous = 90;
    for _ in 0..30 {
        let x = tracker.process(&[face_at(620, 240)], 640, 480).command.x;
        assert!(x >= previous);
        assert!(x - previous <= 4);
        previous = x;
    }
    assert!(previous > 100);
}
