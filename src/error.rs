//! Error types for image loading, pose estimation and auto-fit.

use std::fmt;
use thiserror::Error;

use crate::pose::BodyPart;

/// Errors that can occur when decoding an uploaded or fetched image.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The bytes are not an image format we can decode
    #[error("Not a supported image: {0}")]
    Image(#[from] image::ImageError),

    /// The image decoded but has no pixels
    #[error("Image has no pixels ({width}x{height})")]
    Empty {
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
    },
}

/// Errors that can occur when refreshing the garment image.
///
/// These never reach the user; the previous garment stays in place and the
/// failure is logged.
#[derive(Error, Debug)]
pub enum GarmentLoadError {
    /// The locator could not be fetched
    #[error("Garment image unreachable at '{locator}': {reason}")]
    Unreachable {
        /// Locator that was requested
        locator: String,
        /// Description of the transport failure
        reason: String,
    },

    /// The fetched bytes are not a usable image
    #[error("Garment image at '{locator}' is invalid: {source}")]
    Invalid {
        /// Locator that was requested
        locator: String,
        /// Underlying decode failure
        #[source]
        source: DecodeError,
    },
}

impl GarmentLoadError {
    /// Create an unreachable-locator error.
    pub fn unreachable(locator: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Unreachable {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors reported by a pose-estimation backend.
#[derive(Error, Debug)]
pub enum PoseError {
    /// The pose-estimation library is not present
    #[error("Pose library not available: {0}")]
    LibraryMissing(String),

    /// The model could not be loaded
    #[error("Failed to load pose model: {0}")]
    Load(String),

    /// The model failed while estimating
    #[error("Pose estimation failed: {0}")]
    Estimation(String),

    /// The model returned something that is not a pose
    #[error("Malformed pose output: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Why a detected pose could not be turned into a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum PoseRejection {
    /// The keypoint is absent from the model output
    Missing(BodyPart),
    /// The keypoint is present but not confident enough
    LowConfidence {
        /// Which keypoint
        part: BodyPart,
        /// Reported confidence
        confidence: f32,
    },
    /// The keypoint position is not a finite coordinate
    InvalidPosition(BodyPart),
    /// Both shoulders sit on the same point, so no width can be derived
    CoincidentShoulders,
    /// The shoulders are so far apart that the placement overflows
    PlacementOutOfRange,
}

impl fmt::Display for PoseRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseRejection::Missing(part) => write!(f, "{} not found", part),
            PoseRejection::LowConfidence { part, confidence } => {
                write!(f, "{} confidence {:.2} too low", part, confidence)
            }
            PoseRejection::InvalidPosition(part) => write!(f, "{} position is invalid", part),
            PoseRejection::CoincidentShoulders => write!(f, "shoulders overlap"),
            PoseRejection::PlacementOutOfRange => write!(f, "placement out of range"),
        }
    }
}

/// Errors that can occur during auto-fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutoFitError {
    /// No user photo is loaded
    #[error("Upload a photo before using auto-fit")]
    NoPhoto,

    /// The pose model could not be loaded or run
    #[error("Pose model unavailable: {0}")]
    ModelUnavailable(String),

    /// Shoulders were not detected reliably
    #[error("Could not detect shoulders: {0}")]
    PoseNotDetected(PoseRejection),

    /// Another auto-fit is still running
    #[error("Auto-fit is already running")]
    InProgress,

    /// The photo was cleared or replaced while the pose was being estimated
    #[error("Photo changed during auto-fit")]
    PhotoChanged,
}

impl From<PoseError> for AutoFitError {
    fn from(err: PoseError) -> Self {
        AutoFitError::ModelUnavailable(err.to_string())
    }
}
