//! Converts a face detection into a pixel-space tracking error.
//!
//! Horizontal error is measured from the midpoint between the eyes, vertical error from the nose
//! tip, and the distance between the ears serves as a rough depth proxy.

use crate::{
    constants::{DEPTH_FAR_PX, DEPTH_NEAR_PX},
    face_detection::{Detection, KeypointKind},
    utils::euclidean_distance,
};
use std::fmt;

/// Per-frame tracking error of the tracked face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorSample {
    /// Eye midpoint offset from the frame centre, in pixels (positive = right)
    pub dx: i32,
    /// Nose tip offset from the frame centre, in pixels (positive = down)
    pub dy: i32,
    /// Inter-ear distance in pixels; larger means closer
    pub depth_proxy: f64,
}

impl ErrorSample {
    /// Coarse distance class of the face
    #[must_use]
    pub fn depth_band(&self) -> DepthBand {
        DepthBand::classify(self.depth_proxy)
    }
}

/// Coarse face distance derived from the depth proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthBand {
    Near,
    Normal,
    Far,
}

impl DepthBand {
    #[must_use]
    pub fn classify(depth_proxy: f64) -> Self {
        if depth_proxy > DEPTH_NEAR_PX {
            Self::Near
        } else if depth_proxy < DEPTH_FAR_PX {
            Self::Far
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for DepthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Near => write!(f, "near"),
            Self::Normal => write!(f, "normal"),
            Self::Far => write!(f, "far"),
        }
    }
}

/// Centre of a `width` x `height` frame (integer division)
#[must_use]
pub const fn frame_center(width: i32, height: i32) -> (i32, i32) {
    (width / 2, height / 2)
}

/// Compute the tracking error of a detection on a `width` x `height` frame
#[must_use]
pub fn estimate_error(detection: &Detection, width: i32, height: i32) -> ErrorSample {
    let (center_x, center_y) = frame_center(width, height);
    let kp = &detection.keypoints;

    let right_eye = kp.get(KeypointKind::RightEye);
    let left_eye = kp.get(KeypointKind::LeftEye);
    let eye_mid_x = (right_eye.x + left_eye.x) / 2;

    ErrorSample {
        dx: eye_mid_x - center_x,
        dy: kp.get(KeypointKind::NoseTip).y - center_y,
        depth_proxy: euclidean_distance(
            kp.get(KeypointKind::RightEar).as_tuple(),
            kp.get(KeypointKind::LeftEar).as_tuple(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detection::{BoundingBox, Keypoints, PixelPoint};

    fn detection(points: [(i32, i32); 6]) -> Detection {
        Detection {
            bbox: BoundingBox::default(),
            keypoints: Keypoints::new(points.map(|(x, y)| PixelPoint::new(x, y))),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_error_uses_eye_midpoint_and_nose() {
        // eyes at 300/380 -> midpoint 340; nose y 260; ears 200 px apart
        let det = detection([(300, 230), (380, 250), (345, 260), (340, 300), (240, 240), (440, 240)]);
        let sample = estimate_error(&det, 640, 480);

        assert_eq!(sample.dx, 20);
        assert_eq!(sample.dy, 20);
        assert_eq!(sample.depth_proxy, 200.0);
        assert_eq!(sample.depth_band(), DepthBand::Normal);
    }

    #[test]
    fn test_centered_face_has_zero_error() {
        let det = detection([(300, 240), (340, 240), (320, 240), (320, 280), (250, 240), (390, 240)]);
        let sample = estimate_error(&det, 640, 480);
        assert_eq!((sample.dx, sample.dy), (0, 0));
    }

    #[test]
    fn test_odd_frame_center_truncates() {
        assert_eq!(frame_center(641, 481), (320, 240));
    }

    #[test]
    fn test_depth_bands() {
        assert_eq!(DepthBand::classify(301.0), DepthBand::Near);
        assert_eq!(DepthBand::classify(300.0), DepthBand::Normal);
        assert_eq!(DepthBand::classify(150.0), DepthBand::Normal);
        assert_eq!(DepthBand::classify(149.9), DepthBand::Far);
    }
}
