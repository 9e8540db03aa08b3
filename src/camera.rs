//! Camera acquisition with index probing and hot re-acquisition.

use crate::{
    config::CameraConfig,
    constants::{AUTOFOCUS_SETTLE_MS, CAMERA_PROBE_INDICES},
    Error, Result,
};
use log::{debug, info, warn};
use opencv::{
    core::{self, Mat},
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::thread;
use std::time::Duration;

/// Source of frames for the control loop
pub trait FrameSource {
    /// Read the next frame
    ///
    /// # Errors
    ///
    /// Returns `CameraRead` if no frame could be read.
    fn read_frame(&mut self) -> Result<Mat>;

    /// Close the device and run the open procedure again
    ///
    /// # Errors
    ///
    /// Returns `NoCameraFound` if no camera could be reopened.
    fn reacquire(&mut self) -> Result<()>;

    /// Release the device
    fn release(&mut self);

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// A working camera found by [`Camera::list_available`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraInfo {
    pub index: i32,
    pub width: i32,
    pub height: i32,
}

/// An opened OpenCV camera
pub struct Camera {
    capture: VideoCapture,
    index: i32,
    config: CameraConfig,
}

impl Camera {
    /// Open the preferred camera, falling back to probing indices 0, 1, 2
    ///
    /// # Errors
    ///
    /// Returns `NoCameraFound` if no index yields a readable frame.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        if let Some(index) = config.index {
            match open_index(index, config) {
                Ok(capture) => return Ok(Self::opened(capture, index, config)),
                Err(e) => warn!("Camera {index} unavailable ({e}), probing other indices"),
            }
        }

        for &index in CAMERA_PROBE_INDICES.iter().filter(|&&i| Some(i) != config.index) {
            match open_index(index, config) {
                Ok(capture) => return Ok(Self::opened(capture, index, config)),
                Err(e) => debug!("Camera {index}: {e}"),
            }
        }

        Err(Error::NoCameraFound(format!("tried indices {:?}", CAMERA_PROBE_INDICES)))
    }

    fn opened(capture: VideoCapture, index: i32, config: &CameraConfig) -> Self {
        info!("Using camera {index}");
        Self {
            capture,
            index,
            config: config.clone(),
        }
    }

    /// Enumerate indices `0..max_index` and report the resolution of every working camera
    #[must_use]
    pub fn list_available(max_index: i32) -> Vec<CameraInfo> {
        (0..max_index)
            .filter_map(|index| match probe_resolution(index) {
                Ok(info) => info,
                Err(e) => {
                    debug!("Camera {index}: {e}");
                    None
                }
            })
            .collect()
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        let ok = self
            .capture
            .read(&mut frame)
            .map_err(|e| Error::CameraRead(format!("camera {}: {e}", self.index)))?;

        if !ok || frame.empty() {
            return Err(Error::CameraRead(format!("camera {} returned no frame", self.index)));
        }
        Ok(frame)
    }

    fn reacquire(&mut self) -> Result<()> {
        self.release();
        let config = CameraConfig {
            index: Some(self.index),
            ..self.config.clone()
        };
        let reopened = Self::open(&config)?;
        self.capture = reopened.capture;
        self.index = reopened.index;
        Ok(())
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release camera {}: {e}", self.index);
        }
    }

    fn describe(&self) -> String {
        format!("camera {}", self.index)
    }
}

/// Open one index and validate it by reading a frame
fn open_index(index: i32, config: &CameraConfig) -> Result<VideoCapture> {
    let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
    if !capture.is_opened()? {
        return Err(Error::CameraRead(format!("camera {index} did not open")));
    }

    configure(&mut capture, config);
    thread::sleep(Duration::from_millis(AUTOFOCUS_SETTLE_MS));

    let mut frame = Mat::default();
    if !capture.read(&mut frame)? || frame.empty() {
        capture.release()?;
        return Err(Error::CameraRead(format!("camera {index} opened but returned no frame")));
    }

    info!("Camera {index} ready at {}x{}", frame.cols(), frame.rows());
    Ok(capture)
}

/// Request resolution, rate and autofocus; unsupported properties are ignored
fn configure(capture: &mut VideoCapture, config: &CameraConfig) {
    let properties = [
        (videoio::CAP_PROP_FRAME_WIDTH, f64::from(config.width), "width"),
        (videoio::CAP_PROP_FRAME_HEIGHT, f64::from(config.height), "height"),
        (videoio::CAP_PROP_FPS, f64::from(config.fps), "fps"),
        (videoio::CAP_PROP_AUTOFOCUS, 1.0, "autofocus"),
    ];

    for (property, value, name) in properties {
        match capture.set(property, value) {
            Ok(true) => {}
            Ok(false) => debug!("Camera ignored {name}={value}"),
            Err(e) => debug!("Setting {name} failed: {e}"),
        }
    }
}

fn probe_resolution(index: i32) -> Result<Option<CameraInfo>> {
    let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
    if !capture.is_opened()? {
        return Ok(None);
    }

    let mut frame = Mat::default();
    let info = if capture.read(&mut frame)? && !frame.empty() {
        Some(CameraInfo {
            index,
            width: frame.cols(),
            height: frame.rows(),
        })
    } else {
        None
    };
    capture.release()?;
    Ok(info)
}

/// Mirror a frame horizontally
///
/// # Errors
///
/// Returns an OpenCV error if the flip fails.
pub fn mirror_frame(frame: &Mat) -> Result<Mat> {
    let mut mirrored = Mat::default();
    core::flip(frame, &mut mirrored, 1)?;
    Ok(mirrored)
}
