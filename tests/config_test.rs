//! Configuration file tests

use face_servo_tracker::{
    axis_mapping::ControlMode,
    config::{Config, EXAMPLE_CONFIG},
    face_detection::ModelVariant,
    Error,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_file_round_trip() {
    let mut config = Config::default();
    config.serial.port = "COM7".to_string();
    config.control.mode = ControlMode::Absolute;
    config.axis.invert_x = true;
    config.camera.index = Some(2);
    config.detector.initial_variant = ModelVariant::FullRange;

    let file = NamedTempFile::new().unwrap();
    config.to_file(file.path()).unwrap();

    let loaded = Config::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_example_config_matches_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(EXAMPLE_CONFIG.as_bytes()).unwrap();

    let loaded = Config::from_file(file.path()).unwrap();
    let mut expected = Config::default();
    expected.serial.port = "/dev/ttyUSB0".to_string();
    assert_eq!(loaded, expected);
}

#[test]
fn test_invalid_yaml_is_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"control:\n  mode: sideways\n").unwrap();

    assert!(matches!(Config::from_file(file.path()), Err(Error::ConfigError(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::from_file(dir.path().join("missing.yaml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_validation_messages() {
    let mut config = Config::default();
    config.control.smoothing_alpha = 1.5;
    match config.validate() {
        Err(Error::ConfigError(msg)) => assert!(msg.contains("alpha")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}
