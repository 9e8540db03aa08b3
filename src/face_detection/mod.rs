//! Face locator adapter.
//!
//! Wraps a face detection model behind [`FaceDetectionModel`] and normalizes its output to a fixed
//! six-keypoint schema in pixel coordinates. The model itself is an external collaborator; the
//! bundled implementation is [`blazeface::BlazeFaceDetector`], which runs the MediaPipe BlazeFace
//! networks through ONNX Runtime.

/// SSD anchor generation for the BlazeFace networks
pub mod anchors;

/// ONNX Runtime BlazeFace detector
pub mod blazeface;

use crate::{
    constants::NUM_FACE_KEYPOINTS,
    utils::safe_cast::normalized_to_pixels,
    Error, Result,
};
use log::info;
use opencv::{core::Mat, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

/// Face detection model configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Short-range network, best for faces within about 2 m
    Near,
    /// Full-range network, slower but detects distant faces
    FullRange,
}

impl ModelVariant {
    /// The other variant
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Near => Self::FullRange,
            Self::FullRange => Self::Near,
        }
    }

    /// Numeric model selector shown to the operator (0 = near, 1 = full range)
    #[must_use]
    pub const fn selector(self) -> u8 {
        match self {
            Self::Near => 0,
            Self::FullRange => 1,
        }
    }
}

impl Default for ModelVariant {
    fn default() -> Self {
        Self::Near
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Near => write!(f, "near"),
            Self::FullRange => write!(f, "full_range"),
        }
    }
}

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// As an `(x, y)` tuple
    #[must_use]
    pub const fn as_tuple(self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Keypoint slots, in the order the detection model reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypointKind {
    RightEye = 0,
    LeftEye = 1,
    NoseTip = 2,
    MouthCenter = 3,
    RightEar = 4,
    LeftEar = 5,
}

/// Exactly six facial keypoints of one detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypoints([PixelPoint; NUM_FACE_KEYPOINTS]);

impl Keypoints {
    #[must_use]
    pub const fn new(points: [PixelPoint; NUM_FACE_KEYPOINTS]) -> Self {
        Self(points)
    }

    /// Build from a slice, rejecting anything but a complete set
    #[must_use]
    pub fn from_slice(points: &[PixelPoint]) -> Option<Self> {
        let points: [PixelPoint; NUM_FACE_KEYPOINTS] = points.try_into().ok()?;
        Some(Self(points))
    }

    #[must_use]
    pub const fn get(&self, kind: KeypointKind) -> PixelPoint {
        self.0[kind as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PixelPoint> {
        self.0.iter()
    }
}

/// Face bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// A detected face in frame pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub keypoints: Keypoints,
    /// Detection confidence in [0, 1]
    pub confidence: f32,
}

impl Detection {
    /// Scale a normalized model detection onto a `width` x `height` frame.
    ///
    /// Returns `None` unless the detection carries exactly six keypoints.
    #[must_use]
    pub fn from_raw(raw: &RawDetection, width: i32, height: i32) -> Option<Self> {
        let points: Vec<PixelPoint> = raw
            .keypoints
            .iter()
            .map(|&(x, y)| PixelPoint::new(normalized_to_pixels(x, width), normalized_to_pixels(y, height)))
            .collect();
        let keypoints = Keypoints::from_slice(&points)?;

        Some(Self {
            bbox: BoundingBox {
                x: normalized_to_pixels(raw.xmin, width),
                y: normalized_to_pixels(raw.ymin, height),
                width: normalized_to_pixels(raw.width, width),
                height: normalized_to_pixels(raw.height, height),
            },
            keypoints,
            confidence: raw.confidence.clamp(0.0, 1.0),
        })
    }
}

/// Model output in normalized [0, 1] frame coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
    /// Keypoints as normalized `(x, y)`
    pub keypoints: Vec<(f32, f32)>,
}

impl RawDetection {
    /// Box area in normalized units
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another detection's box
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.xmin.max(other.xmin);
        let y1 = self.ymin.max(other.ymin);
        let x2 = (self.xmin + self.width).min(other.xmin + other.width);
        let y2 = (self.ymin + self.height).min(other.ymin + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Contract of a face detection model
pub trait FaceDetectionModel {
    /// Detect faces in a frame, best first
    fn detect(&mut self, frame: &Mat) -> Result<Vec<RawDetection>>;
}

/// Builds a detector for a variant and minimum confidence
pub type DetectorFactory = Box<dyn Fn(ModelVariant, f32) -> Result<Box<dyn FaceDetectionModel>>>;

/// Holds one live detector and rebuilds it only when the variant changes
pub struct FaceLocator {
    factory: DetectorFactory,
    min_confidence: f32,
    variant: ModelVariant,
    detector: Option<Box<dyn FaceDetectionModel>>,
}

impl FaceLocator {
    /// Create a locator, building the initial detector
    ///
    /// # Errors
    ///
    /// Returns `DetectorConstruction` if the factory fails.
    pub fn new(factory: DetectorFactory, variant: ModelVariant, min_confidence: f32) -> Result<Self> {
        let detector = factory(variant, min_confidence)?;
        info!("Face detector ready (model {variant}, min confidence {min_confidence})");

        Ok(Self {
            factory,
            min_confidence,
            variant,
            detector: Some(detector),
        })
    }

    /// Create a locator backed by the BlazeFace ONNX models at the given paths
    ///
    /// # Errors
    ///
    /// Returns `DetectorConstruction` if the initial model cannot be loaded.
    pub fn with_blazeface(
        near_model: PathBuf,
        full_range_model: PathBuf,
        variant: ModelVariant,
        min_confidence: f32,
    ) -> Result<Self> {
        let factory: DetectorFactory = Box::new(move |variant, min_confidence| {
            let path = match variant {
                ModelVariant::Near => &near_model,
                ModelVariant::FullRange => &full_range_model,
            };
            let detector = blazeface::BlazeFaceDetector::new(path, variant, min_confidence)?;
            Ok(Box::new(detector) as Box<dyn FaceDetectionModel>)
        });

        Self::new(factory, variant, min_confidence)
    }

    /// Run the active detector on a frame
    ///
    /// Detections without a full keypoint set are dropped.
    ///
    /// # Errors
    ///
    /// Propagates inference errors from the model.
    pub fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>> {
        let width = frame.cols();
        let height = frame.rows();
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| Error::DetectorConstruction("no active face detector".to_string()))?;

        let raw = detector.detect(frame)?;
        Ok(raw
            .iter()
            .filter_map(|det| Detection::from_raw(det, width, height))
            .collect())
    }

    /// Replace the live detector with one for `variant`
    ///
    /// Returns `false` without touching the detector if `variant` is already active.
    ///
    /// # Errors
    ///
    /// Returns `DetectorConstruction` if the new detector cannot be built; the locator is left
    /// without a detector.
    pub fn switch_to(&mut self, variant: ModelVariant) -> Result<bool> {
        if variant == self.variant && self.detector.is_some() {
            return Ok(false);
        }

        info!(
            "Switching face detector model: {} -> {} (selector {})",
            self.variant,
            variant,
            variant.selector()
        );
        // Release the old instance before building its replacement
        self.detector = None;
        self.detector = Some((self.factory)(variant, self.min_confidence)?);
        self.variant = variant;
        Ok(true)
    }

    /// Variant of the live detector
    #[must_use]
    pub const fn active_variant(&self) -> ModelVariant {
        self.variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    struct ScriptedModel {
        output: Vec<RawDetection>,
    }

    impl FaceDetectionModel for ScriptedModel {
        fn detect(&mut self, _frame: &Mat) -> Result<Vec<RawDetection>> {
            Ok(self.output.clone())
        }
    }

    fn raw_with_keypoints(count: usize) -> RawDetection {
        RawDetection {
            confidence: 0.9,
            xmin: 0.25,
            ymin: 0.25,
            width: 0.5,
            height: 0.5,
            keypoints: (0..count).map(|i| (0.1 * i as f32, 0.5)).collect(),
        }
    }

    fn counting_factory(builds: Rc<RefCell<Vec<ModelVariant>>>, output: Vec<RawDetection>) -> DetectorFactory {
        Box::new(move |variant, _min_confidence| {
            builds.borrow_mut().push(variant);
            Ok(Box::new(ScriptedModel { output: output.clone() }) as Box<dyn FaceDetectionModel>)
        })
    }

    #[test]
    fn test_model_variant_toggle() {
        assert_eq!(ModelVariant::Near.toggled(), ModelVariant::FullRange);
        assert_eq!(ModelVariant::FullRange.toggled(), ModelVariant::Near);
        assert_eq!(ModelVariant::Near.selector(), 0);
        assert_eq!(ModelVariant::FullRange.selector(), 1);
    }

    #[test]
    fn test_keypoints_require_complete_set() {
        let five = vec![PixelPoint::default(); 5];
        let six = vec![PixelPoint::default(); 6];
        let seven = vec![PixelPoint::default(); 7];
        assert!(Keypoints::from_slice(&five).is_none());
        assert!(Keypoints::from_slice(&six).is_some());
        assert!(Keypoints::from_slice(&seven).is_none());
    }

    #[test]
    fn test_detection_from_raw_scales_to_pixels() {
        let det = Detection::from_raw(&raw_with_keypoints(6), 640, 480).unwrap();
        assert_eq!(det.bbox, BoundingBox { x: 160, y: 120, width: 320, height: 240 });
        assert_eq!(det.keypoints.get(KeypointKind::RightEye), PixelPoint::new(0, 240));
        assert_eq!(det.keypoints.get(KeypointKind::LeftEar), PixelPoint::new(320, 240));
        assert!(Detection::from_raw(&raw_with_keypoints(4), 640, 480).is_none());
    }

    #[test]
    fn test_iou() {
        let a = raw_with_keypoints(6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        let mut b = a.clone();
        b.xmin = 0.9;
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_locator_drops_partial_detections() {
        let builds = Rc::new(RefCell::new(Vec::new()));
        let output = vec![raw_with_keypoints(6), raw_with_keypoints(3)];
        let mut locator = FaceLocator::new(counting_factory(builds, output), ModelVariant::Near, 0.3).unwrap();

        let frame = Mat::default();
        // An empty Mat reports 0x0; scaling still works
        let detections = locator.detect(&frame).unwrap();
        assert_eq!(detections.len(), 1);
    }

    #[test]
    fn test_locator_rebuilds_only_on_variant_change() {
        let builds = Rc::new(RefCell::new(Vec::new()));
        let mut locator =
            FaceLocator::new(counting_factory(Rc::clone(&builds), Vec::new()), ModelVariant::Near, 0.3).unwrap();
        assert_eq!(builds.borrow().len(), 1);

        assert!(!locator.switch_to(ModelVariant::Near).unwrap());
        assert_eq!(builds.borrow().len(), 1);

        assert!(locator.switch_to(ModelVariant::FullRange).unwrap());
        assert_eq!(locator.active_variant(), ModelVariant::FullRange);
        assert_eq!(*builds.borrow(), vec![ModelVariant::Near, ModelVariant::FullRange]);
    }

    #[test]
    fn test_locator_construction_failure_propagates() {
        let factory: DetectorFactory =
            Box::new(|_, _| Err(Error::DetectorConstruction("model file missing".to_string())));
        let result = FaceLocator::new(factory, ModelVariant::Near, 0.3);
        assert!(matches!(result, Err(Error::DetectorConstruction(_))));
    }
}
