//! Error types for the face servo tracker.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No camera index produced a readable frame
    #[error("No camera found: {0}")]
    NoCameraFound(String),

    /// Reading a frame from an open camera failed
    #[error("Camera read error: {0}")]
    CameraRead(String),

    /// The serial port could not be opened
    #[error("Serial open error: {0}")]
    SerialOpen(String),

    /// Writing a command to the serial port failed
    #[error("Serial write error: {0}")]
    SerialWrite(String),

    /// A face detector instance could not be built
    #[error("Detector construction error: {0}")]
    DetectorConstruction(String),

    /// Model output had an unexpected shape or content
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the control loop can keep running after this error.
    ///
    /// Camera read failures trigger re-acquisition and serial failures degrade the link; everything
    /// else ends the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CameraRead(_) | Self::SerialOpen(_) | Self::SerialWrite(_)
        )
    }
}
