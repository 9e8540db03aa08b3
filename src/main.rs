//! Face tracking pan/tilt servo controller.

use anyhow::{Context, Result};
use clap::Parser;
use face_servo_tracker::{
    app::{run_camera_preview, TrackerApp},
    camera::{Camera, FrameSource},
    cli::Args,
    config::Config,
    constants::{CAMERA_LIST_MAX_INDEX, SERVO_SWEEP_DWELL_MS, SERVO_SWEEP_SEQUENCE},
    face_detection::FaceLocator,
    serial_link::{servo_sweep, SerialLink},
};
use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Face Servo Tracker");

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };
    args.apply_to(&mut config);
    config.validate()?;

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    if args.list_cams {
        let cameras = Camera::list_available(CAMERA_LIST_MAX_INDEX);
        if cameras.is_empty() {
            println!("No working cameras found");
        }
        for camera in cameras {
            println!("Camera {}: {}x{}", camera.index, camera.width, camera.height);
        }
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)).context("Failed to install Ctrl+C handler")?;
    }

    if args.servo_test {
        let mut link = SerialLink::open(&config.serial);
        let result = servo_sweep(
            &mut link,
            &SERVO_SWEEP_SEQUENCE,
            Duration::from_millis(SERVO_SWEEP_DWELL_MS),
        );
        link.close();
        let steps = result?;
        info!("Servo test complete ({steps} steps)");
        return Ok(());
    }

    let mut camera = Camera::open(&config.camera)?;

    if args.debug_camera {
        let result = run_camera_preview(&mut camera, config.camera.mirror, &shutdown);
        camera.release();
        return Ok(result?);
    }

    let locator = match FaceLocator::with_blazeface(
        config.detector.near_model.clone(),
        config.detector.full_range_model.clone(),
        config.detector.initial_variant,
        config.detector.min_confidence,
    ) {
        Ok(locator) => locator,
        Err(e) => {
            camera.release();
            return Err(e).context("Cannot start without a face detector");
        }
    };

    let link = SerialLink::open(&config.serial);
    let mut app = TrackerApp::new(config, camera, locator, link)?.with_shutdown_flag(shutdown);
    let summary = app.run()?;
    info!("Done: {summary}");

    Ok(())
}
