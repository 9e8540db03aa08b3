use super::{
    anchors::{generate_anchors, Anchor},
    FaceDetectionModel, ModelVariant, RawDetection,
};
use crate::{constants::NMS_IOU_THRESHOLD, Error, Result};
use log::{debug, trace};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, Vec3b};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Values per anchor in the regressor output: box (4) + 6 keypoints (12)
const REGRESSOR_STRIDE: usize = 16;

/// Raw scores are clipped before the sigmoid
const SCORE_CLIP: f32 = 100.0;

/// Memory layout of the network input tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputLayout {
    /// `[batch, height, width, channels]`
    Nhwc,
    /// `[batch, channels, height, width]`
    Nchw,
}

/// BlazeFace face detector using ONNX Runtime
pub struct BlazeFaceDetector {
    session: Session,
    input_size: (i32, i32),
    layout: InputLayout,
    anchors: Vec<Anchor>,
    min_confidence: f32,
}

impl BlazeFaceDetector {
    /// Load a BlazeFace network from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns `DetectorConstruction` if the file is missing or the session cannot be built.
    pub fn new<P: AsRef<Path>>(model_path: P, variant: ModelVariant, min_confidence: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(Error::DetectorConstruction(format!(
                "face detector model not found: {}",
                model_path.display()
            )));
        }

        let construction = |e: ort::OrtError| {
            Error::DetectorConstruction(format!("failed to load {}: {e}", model_path.display()))
        };

        let environment = Arc::new(
            Environment::builder()
                .with_name("face_locator")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()
                .map_err(construction)?,
        );

        let session = ort::SessionBuilder::new(&environment)
            .map_err(construction)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)
            .map_err(construction)?
            .with_model_from_file(model_path)
            .map_err(construction)?;

        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| Error::DetectorConstruction("model has no inputs".to_string()))?;

        let default_side = variant.input_size();
        let dims = &input_meta.dimensions;
        let side = |d: Option<u32>| d.and_then(|v| i32::try_from(v).ok()).unwrap_or(default_side);
        let (layout, input_size) = if dims.len() == 4 && dims[1] == Some(3) {
            (InputLayout::Nchw, (side(dims[3]), side(dims[2])))
        } else if dims.len() == 4 {
            (InputLayout::Nhwc, (side(dims[2]), side(dims[1])))
        } else {
            (InputLayout::Nhwc, (default_side, default_side))
        };

        debug!(
            "Loaded {} ({variant}): input {}x{} {:?}",
            model_path.display(),
            input_size.0,
            input_size.1,
            layout
        );

        Ok(Self {
            session,
            input_size,
            layout,
            anchors: generate_anchors(variant.anchor_layers()),
            min_confidence,
        })
    }

    /// Resize to the network input and normalize RGB to [-1, 1]
    ///
    /// The frame is stretched rather than letterboxed so normalized outputs map straight back onto it.
    fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>> {
        let (width, height) = self.input_size;

        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(width, height),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let (w, h) = (width as usize, height as usize);
        let mut array = match self.layout {
            InputLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
            InputLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
        };

        for row in 0..h {
            for col in 0..w {
                let pixel = rgb.at_2d::<Vec3b>(row as i32, col as i32)?;
                for ch in 0..3 {
                    let value = f32::from(pixel[ch]) / 127.5 - 1.0;
                    match self.layout {
                        InputLayout::Nhwc => array[[0, row, col, ch]] = value,
                        InputLayout::Nchw => array[[0, ch, row, col]] = value,
                    }
                }
            }
        }

        Ok(array)
    }

    /// Run the network, returning flattened regressors and raw scores
    fn forward(&self, input: Array4<f32>) -> Result<(Vec<f32>, Vec<f32>)> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let mut regressors = None;
        let mut scores = None;
        for output in &outputs {
            let tensor = output.try_extract::<f32>()?;
            let view = tensor.view();
            match view.shape().last() {
                Some(&REGRESSOR_STRIDE) => regressors = Some(view.iter().copied().collect::<Vec<f32>>()),
                Some(&1) => scores = Some(view.iter().copied().collect::<Vec<f32>>()),
                other => trace!("ignoring model output with trailing dimension {:?}", other),
            }
        }

        match (regressors, scores) {
            (Some(regressors), Some(scores)) => Ok((regressors, scores)),
            _ => Err(Error::ModelOutputError(
                "expected box regressor (..x16) and score (..x1) outputs".to_string(),
            )),
        }
    }
}

impl FaceDetectionModel for BlazeFaceDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<RawDetection>> {
        let input = self.preprocess(frame)?;
        let (regressors, scores) = self.forward(input)?;
        let candidates = decode_detections(
            &self.anchors,
            &regressors,
            &scores,
            self.input_size,
            self.min_confidence,
        )?;
        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x.clamp(-SCORE_CLIP, SCORE_CLIP)).exp())
}

/// Decode raw network outputs into normalized detections above `min_confidence`
///
/// # Errors
///
/// Returns `ModelOutputError` if the output sizes do not match the anchor count.
#[allow(clippy::cast_precision_loss)] // Input sizes are tiny
pub fn decode_detections(
    anchors: &[Anchor],
    regressors: &[f32],
    scores: &[f32],
    input_size: (i32, i32),
    min_confidence: f32,
) -> Result<Vec<RawDetection>> {
    if scores.len() != anchors.len() || regressors.len() != anchors.len() * REGRESSOR_STRIDE {
        return Err(Error::ModelOutputError(format!(
            "output sizes ({} boxes, {} scores) do not match {} anchors",
            regressors.len() / REGRESSOR_STRIDE,
            scores.len(),
            anchors.len()
        )));
    }

    let input_w = input_size.0 as f32;
    let input_h = input_size.1 as f32;

    let detections = anchors
        .iter()
        .zip(scores)
        .zip(regressors.chunks_exact(REGRESSOR_STRIDE))
        .filter_map(|((anchor, &raw_score), params)| {
            let confidence = sigmoid(raw_score);
            if confidence < min_confidence {
                return None;
            }

            let x_center = params[0] / input_w + anchor.x_center;
            let y_center = params[1] / input_h + anchor.y_center;
            let width = params[2] / input_w;
            let height = params[3] / input_h;
            let keypoints = params[4..]
                .chunks_exact(2)
                .map(|kp| (kp[0] / input_w + anchor.x_center, kp[1] / input_h + anchor.y_center))
                .collect();

            Some(RawDetection {
                confidence,
                xmin: x_center - width / 2.0,
                ymin: y_center - height / 2.0,
                width,
                height,
                keypoints,
            })
        })
        .collect();

    Ok(detections)
}

/// Greedy non-maximum suppression; the result is ordered by descending confidence
#[must_use]
pub fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept.iter().all(|k| k.iou(&candidate) < iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
