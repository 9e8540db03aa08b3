//! Main application loop for the face servo tracker.

use crate::{
    camera::{mirror_frame, FrameSource},
    config::Config,
    constants::KEY_ESCAPE,
    error_estimation::frame_center,
    face_detection::{Detection, FaceLocator, ModelVariant},
    serial_link::SerialLink,
    tracker::{FrameOutcome, Tracker},
    Result,
};
use log::{error, info, warn};
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8, MARKER_CROSS},
    prelude::*,
};
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

const WINDOW_NAME: &str = "Face Servo Tracker";
const PREVIEW_WINDOW_NAME: &str = "Camera Preview";

/// Operator input during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Quit,
    ForceVariant(ModelVariant),
}

impl OperatorCommand {
    /// Decode a `wait_key` result
    #[must_use]
    pub fn from_key(key: i32) -> Option<Self> {
        if key == KEY_ESCAPE {
            return Some(Self::Quit);
        }
        match u8::try_from(key & 0xFF).ok()? {
            b'q' | b'Q' => Some(Self::Quit),
            b'0' => Some(Self::ForceVariant(ModelVariant::Near)),
            b'1' => Some(Self::ForceVariant(ModelVariant::FullRange)),
            _ => None,
        }
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub model_switches: u32,
    pub commands_sent: u64,
    pub reacquisitions: u32,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} model switches, {} commands sent, {} camera re-acquisitions",
            self.frames_processed, self.model_switches, self.commands_sent, self.reacquisitions
        )
    }
}

/// The tracking application: owns the camera, detector, controller and serial link
pub struct TrackerApp<S: FrameSource> {
    config: Config,
    source: S,
    locator: FaceLocator,
    tracker: Tracker,
    link: SerialLink,
    shutdown: Arc<AtomicBool>,
    max_frames: Option<u64>,
    summary: RunSummary,
}

impl<S: FrameSource> TrackerApp<S> {
    /// Assemble the application
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the control parameters are invalid, or `DetectorConstruction` if
    /// the locator cannot be brought to the configured initial variant.
    pub fn new(config: Config, source: S, mut locator: FaceLocator, link: SerialLink) -> Result<Self> {
        let tracker = Tracker::from_config(&config)?;
        locator.switch_to(config.detector.initial_variant)?;

        info!(
            "Control mode {}, deadzone {} px, max {} deg, serial {}",
            config.control.mode,
            config.axis.deadzone_px,
            tracker.controller().config().max_degrees,
            if link.is_connected() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            source,
            locator,
            tracker,
            link,
            shutdown: Arc::new(AtomicBool::new(false)),
            max_frames: None,
            summary: RunSummary::default(),
        })
    }

    /// Stop when `flag` becomes true (set from a signal handler)
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Stop after `frames` processed frames
    #[must_use]
    pub const fn with_frame_limit(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Run until quit, interrupt, frame limit or unrecoverable camera loss
    ///
    /// Camera, serial link and window are released on every exit path.
    ///
    /// # Errors
    ///
    /// Returns `NoCameraFound` if the camera is lost and cannot be reacquired, or
    /// `DetectorConstruction` if a model switch fails.
    pub fn run(&mut self) -> Result<RunSummary> {
        let result = self.run_loop();
        if let Err(e) = &result {
            error!("Tracking stopped: {e}");
        }
        self.shutdown();
        result.map(|()| self.summary)
    }

    fn run_loop(&mut self) -> Result<()> {
        if self.config.display.gui {
            highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        }
        info!("Tracking started ({})", self.source.describe());

        let start_time = Instant::now();
        let mut last_fps_update = Instant::now();
        let mut fps = 0.0;

        while !self.shutdown.load(Ordering::SeqCst) {
            if self.max_frames.is_some_and(|max| self.summary.frames_processed >= max) {
                break;
            }

            let frame = match self.source.read_frame() {
                Ok(frame) => frame,
                Err(e) if e.is_recoverable() => {
                    warn!("{e}, re-acquiring camera");
                    self.source.reacquire()?;
                    self.summary.reacquisitions += 1;
                    info!("Camera re-acquired ({})", self.source.describe());
                    continue;
                }
                Err(e) => return Err(e),
            };
            let frame = if self.config.camera.mirror {
                mirror_frame(&frame)?
            } else {
                frame
            };

            let detections = self.detect(&frame);
            let outcome = self.tracker.process(&detections, frame.cols(), frame.rows());
            if let Some(variant) = outcome.model_switch {
                self.switch_model(variant)?;
            }
            self.link.send(outcome.command);

            self.summary.frames_processed += 1;
            if last_fps_update.elapsed() >= Duration::from_secs(1) {
                fps = self.summary.frames_processed as f64 / start_time.elapsed().as_secs_f64();
                last_fps_update = Instant::now();
            }

            if self.config.display.print_xy
                && self.summary.frames_processed % u64::from(self.config.display.print_every.max(1)) == 0
            {
                self.print_status(&outcome, fps);
            }

            if self.config.display.gui {
                self.display(&frame, detections.first(), &outcome, fps)?;

                let key = highgui::wait_key(1)?;
                match OperatorCommand::from_key(key) {
                    Some(OperatorCommand::Quit) => {
                        info!("Exit requested by user");
                        break;
                    }
                    Some(OperatorCommand::ForceVariant(variant)) => {
                        info!("Operator forced {variant} model");
                        self.tracker.force_variant(variant);
                        self.switch_model(variant)?;
                    }
                    None => {}
                }
            }
        }

        if self.shutdown.load(Ordering::SeqCst) {
            info!("Interrupt received");
        }
        Ok(())
    }

    /// Detections for one frame; inference errors count as an empty frame
    fn detect(&mut self, frame: &Mat) -> Vec<Detection> {
        self.locator.detect(frame).unwrap_or_else(|e| {
            warn!("Face detection failed: {e}");
            Vec::new()
        })
    }

    fn switch_model(&mut self, variant: ModelVariant) -> Result<()> {
        if self.locator.switch_to(variant)? {
            self.summary.model_switches += 1;
        }
        Ok(())
    }

    fn print_status(&self, outcome: &FrameOutcome, fps: f64) {
        match &outcome.sample {
            Some(sample) => info!(
                "dx={:+} dy={:+} depth={:.0} ({}) -> {} | {} | {:.1} FPS",
                sample.dx,
                sample.dy,
                sample.depth_proxy,
                sample.depth_band(),
                outcome.command,
                outcome.state,
                fps
            ),
            None => info!("no face -> {} | {} | {:.1} FPS", outcome.command, outcome.state, fps),
        }
    }

    fn display(&self, frame: &Mat, detection: Option<&Detection>, outcome: &FrameOutcome, fps: f64) -> Result<()> {
        let mut display_frame = frame.clone();
        let (center_x, center_y) = frame_center(frame.cols(), frame.rows());
        let green = Scalar::new(0.0, 255.0, 0.0, 0.0);
        let yellow = Scalar::new(0.0, 255.0, 255.0, 0.0);
        let red = Scalar::new(0.0, 0.0, 255.0, 0.0);

        imgproc::draw_marker(
            &mut display_frame,
            Point::new(center_x, center_y),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            MARKER_CROSS,
            20,
            1,
            LINE_8,
        )?;

        if let Some(detection) = detection {
            let bbox = detection.bbox;
            imgproc::rectangle(
                &mut display_frame,
                Rect::new(bbox.x, bbox.y, bbox.width, bbox.height),
                green,
                2,
                LINE_8,
                0,
            )?;

            for (i, point) in detection.keypoints.iter().enumerate() {
                let position = Point::new(point.x, point.y);
                imgproc::circle(&mut display_frame, position, 3, yellow, -1, LINE_8, 0)?;
                imgproc::put_text(
                    &mut display_frame,
                    &i.to_string(),
                    Point::new(point.x + 4, point.y - 4),
                    FONT_HERSHEY_SIMPLEX,
                    0.4,
                    yellow,
                    1,
                    LINE_8,
                    false,
                )?;
            }
        }

        let readout = match &outcome.sample {
            Some(sample) => format!(
                "dx={:+} dy={:+} depth={} | {}",
                sample.dx,
                sample.dy,
                sample.depth_band(),
                outcome.command
            ),
            None => format!("{}", outcome.command),
        };
        let status = format!(
            "{} | {:.1} FPS | model {} ({}) | {}",
            outcome.state,
            fps,
            self.locator.active_variant(),
            self.locator.active_variant().selector(),
            self.config.control.mode
        );

        put_line(&mut display_frame, &readout, 30, green)?;
        put_line(&mut display_frame, &status, 60, green)?;
        if !self.link.is_connected() {
            put_line(&mut display_frame, "Serial OFF", 90, red)?;
        }

        highgui::imshow(WINDOW_NAME, &display_frame)?;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.summary.commands_sent = self.link.sent_count();
        self.source.release();
        self.link.close();
        if self.config.display.gui {
            if let Err(e) = highgui::destroy_all_windows() {
                warn!("Failed to close windows: {e}");
            }
        }
        info!("Shut down: {}", self.summary);
    }

    #[must_use]
    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    #[must_use]
    pub const fn link(&self) -> &SerialLink {
        &self.link
    }

    #[must_use]
    pub const fn locator(&self) -> &FaceLocator {
        &self.locator
    }

    #[must_use]
    pub const fn summary(&self) -> RunSummary {
        self.summary
    }
}

fn put_line(frame: &mut Mat, text: &str, y: i32, color: Scalar) -> Result<()> {
    imgproc::put_text(
        frame,
        text,
        Point::new(10, y),
        FONT_HERSHEY_SIMPLEX,
        0.6,
        color,
        2,
        LINE_8,
        false,
    )?;
    Ok(())
}

/// Camera-only preview with a centre marker, for checking the camera before loading models
///
/// # Errors
///
/// Returns `NoCameraFound` if the camera is lost and cannot be reacquired, or an OpenCV error if
/// the window cannot be shown.
pub fn run_camera_preview<S: FrameSource>(source: &mut S, mirror: bool, shutdown: &AtomicBool) -> Result<()> {
    highgui::named_window(PREVIEW_WINDOW_NAME, WINDOW_NORMAL)?;
    info!("Camera preview on {} (q or Esc to quit)", source.describe());

    let mut frames = 0u64;
    let start_time = Instant::now();
    let result = loop {
        if shutdown.load(Ordering::SeqCst) {
            break Ok(());
        }

        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{e}, re-acquiring camera");
                if let Err(e) = source.reacquire() {
                    break Err(e);
                }
                continue;
            }
        };
        let mut frame = if mirror { mirror_frame(&frame)? } else { frame };

        frames += 1;
        let fps = frames as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
        let (center_x, center_y) = frame_center(frame.cols(), frame.rows());
        imgproc::draw_marker(
            &mut frame,
            Point::new(center_x, center_y),
            Scalar::new(0.0, 255.0, 0.0, 0.0),
            MARKER_CROSS,
            20,
            2,
            LINE_8,
        )?;
        let info_line = format!("{}x{} | {fps:.1} FPS", frame.cols(), frame.rows());
        put_line(&mut frame, &info_line, 30, Scalar::new(0.0, 255.0, 0.0, 0.0))?;
        highgui::imshow(PREVIEW_WINDOW_NAME, &frame)?;

        if OperatorCommand::from_key(highgui::wait_key(1)?) == Some(OperatorCommand::Quit) {
            break Ok(());
        }
    };

    if let Err(e) = highgui::destroy_window(PREVIEW_WINDOW_NAME) {
        warn!("Failed to close preview window: {e}");
    }
    info!("Preview ended after {frames} frames");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_keys() {
        assert_eq!(OperatorCommand::from_key(27), Some(OperatorCommand::Quit));
        assert_eq!(OperatorCommand::from_key(i32::from(b'q')), Some(OperatorCommand::Quit));
        assert_eq!(
            OperatorCommand::from_key(i32::from(b'0')),
            Some(OperatorCommand::ForceVariant(ModelVariant::Near))
        );
        assert_eq!(
            OperatorCommand::from_key(i32::from(b'1')),
            Some(OperatorCommand::ForceVariant(ModelVariant::FullRange))
        );
        assert_eq!(OperatorCommand::from_key(-1), None);
        assert_eq!(OperatorCommand::from_key(i32::from(b'x')), None);
    }

    #[test]
    fn test_run_summary_display() {
        let summary = RunSummary {
            frames_processed: 10,
            model_switches: 1,
            commands_sent: 4,
            reacquisitions: 0,
        };
        assert_eq!(
            summary.to_string(),
            "10 frames, 1 model switches, 4 commands sent, 0 camera re-acquisitions"
        );
    }
}
