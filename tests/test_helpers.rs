//! Helper functions and scripted fakes for tests
#![allow(dead_code)]

use face_servo_tracker::{
    camera::FrameSource,
    face_detection::{
        BoundingBox, Detection, DetectorFactory, FaceDetectionModel, Keypoints, ModelVariant, PixelPoint,
        RawDetection,
    },
    serial_link::Transport,
    Error, Result,
};
use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    prelude::*,
};
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

/// Create a black BGR test image
pub fn create_test_image(height: i32, width: i32) -> Result<Mat> {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0)).map_err(Into::into)
}

/// A face whose eye midpoint is at `(x, y)`, nose tip at `(x, y)`, ears 120 px apart
pub fn face_at(x: i32, y: i32) -> Detection {
    let points = [(x - 20, y), (x + 20, y), (x, y), (x, y + 30), (x - 60, y), (x + 60, y)];
    Detection {
        bbox: BoundingBox {
            x: x - 80,
            y: y - 80,
            width: 160,
            height: 160,
        },
        keypoints: Keypoints::new(points.map(|(px, py)| PixelPoint::new(px, py))),
        confidence: 0.9,
    }
}

/// Normalized model output for a face centred at `(cx, cy)`
pub fn raw_face(cx: f32, cy: f32) -> RawDetection {
    RawDetection {
        confidence: 0.95,
        xmin: cx - 0.1,
        ymin: cy - 0.1,
        width: 0.2,
        height: 0.2,
        keypoints: vec![
            (cx - 0.03, cy),
            (cx + 0.03, cy),
            (cx, cy),
            (cx, cy + 0.05),
            (cx - 0.1, cy),
            (cx + 0.1, cy),
        ],
    }
}

/// One scripted camera read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    Frame,
    Fail,
    /// A read error the loop cannot recover from
    Fault,
}

/// What the app did with a [`ScriptedCamera`]
#[derive(Debug, Default)]
pub struct CameraStats {
    pub reads: u32,
    pub reacquisitions: u32,
    pub releases: u32,
}

/// Frame source that replays a script, then delivers frames forever
pub struct ScriptedCamera {
    script: VecDeque<CameraEvent>,
    width: i32,
    height: i32,
    reacquire_ok: bool,
    pub stats: Rc<RefCell<CameraStats>>,
}

impl ScriptedCamera {
    pub fn new(width: i32, height: i32, script: &[CameraEvent], reacquire_ok: bool) -> Self {
        Self {
            script: script.iter().copied().collect(),
            width,
            height,
            reacquire_ok,
            stats: Rc::new(RefCell::new(CameraStats::default())),
        }
    }

    pub fn always_ok(width: i32, height: i32) -> Self {
        Self::new(width, height, &[], true)
    }
}

impl FrameSource for ScriptedCamera {
    fn read_frame(&mut self) -> Result<Mat> {
        self.stats.borrow_mut().reads += 1;
        match self.script.pop_front().unwrap_or(CameraEvent::Frame) {
            CameraEvent::Frame => create_test_image(self.height, self.width),
            CameraEvent::Fail => Err(Error::CameraRead("scripted failure".to_string())),
            CameraEvent::Fault => Err(Error::InvalidInput("scripted fault".to_string())),
        }
    }

    fn reacquire(&mut self) -> Result<()> {
        self.stats.borrow_mut().reacquisitions += 1;
        if self.reacquire_ok {
            Ok(())
        } else {
            Err(Error::NoCameraFound("scripted".to_string()))
        }
    }

    fn release(&mut self) {
        self.stats.borrow_mut().releases += 1;
    }

    fn describe(&self) -> String {
        "scripted camera".to_string()
    }
}

/// Detector returning queued outputs shared across every instance the factory builds
pub struct ScriptedDetector {
    script: Rc<RefCell<VecDeque<Vec<RawDetection>>>>,
}

impl FaceDetectionModel for ScriptedDetector {
    fn detect(&mut self, _frame: &Mat) -> Result<Vec<RawDetection>> {
        Ok(self.script.borrow_mut().pop_front().unwrap_or_default())
    }
}

/// Shared detector script; an empty queue means no faces
pub type DetectionScript = Rc<RefCell<VecDeque<Vec<RawDetection>>>>;

pub fn detection_script(frames: impl IntoIterator<Item = Vec<RawDetection>>) -> DetectionScript {
    Rc::new(RefCell::new(frames.into_iter().collect()))
}

/// Factory building [`ScriptedDetector`]s and recording every build
pub fn scripted_factory(script: DetectionScript, builds: Rc<RefCell<Vec<ModelVariant>>>) -> DetectorFactory {
    Box::new(move |variant, _min_confidence| {
        builds.borrow_mut().push(variant);
        Ok(Box::new(ScriptedDetector {
            script: Rc::clone(&script),
        }) as Box<dyn FaceDetectionModel>)
    })
}

/// Transport that records every line written
#[derive(Default)]
pub struct RecordingTransport {
    pub lines: Rc<RefCell<Vec<String>>>,
}

impl Transport for RecordingTransport {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.lines.borrow_mut().push(String::from_utf8_lossy(line).into_owned());
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
