//! User-facing status line.

use std::fmt;

use crate::error::AutoFitError;

/// Phase of the try-on flow, shown to the user as one line of text.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// No photo loaded yet
    Prompt,
    /// Photo loaded, manual adjustment available
    Adjusting,
    /// The uploaded file could not be decoded
    PhotoRejected(String),
    /// Auto-fit is estimating the pose
    Analyzing,
    /// Auto-fit placed the garment
    Fitted,
    /// Auto-fit failed; manual controls still work
    AutoFitFailed(AutoFitError),
}

impl Status {
    /// Whether this status reports a problem.
    pub fn is_error(&self) -> bool {
        matches!(self, Status::PhotoRejected(_) | Status::AutoFitFailed(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Prompt => write!(f, "Upload a photo to start."),
            Status::Adjusting => write!(f, "Drag to move • Use sliders to fit"),
            Status::PhotoRejected(reason) => {
                write!(f, "Could not read that photo ({}). Try another image.", reason)
            }
            Status::Analyzing => write!(f, "Analyzing pose..."),
            Status::Fitted => write!(f, "Auto-fit applied. Drag or use sliders to fine-tune."),
            Status::AutoFitFailed(err) => match err {
                AutoFitError::NoPhoto => write!(f, "Upload a photo before using auto-fit."),
                AutoFitError::ModelUnavailable(_) => {
                    write!(f, "Pose detection is unavailable. Fit the garment manually.")
                }
                AutoFitError::PoseNotDetected(_) => write!(
                    f,
                    "Couldn't find your shoulders. Try a clearer, front-facing photo."
                ),
                AutoFitError::InProgress => write!(f, "Auto-fit is already running..."),
                AutoFitError::PhotoChanged => write!(f, "Photo changed. Try auto-fit again."),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoseRejection;
    use crate::pose::BodyPart;

    #[test]
    fn test_status_text() {
        assert_eq!(Status::Prompt.to_string(), "Upload a photo to start.");
        assert_eq!(Status::Adjusting.to_string(), "Drag to move • Use sliders to fit");
        assert!(Status::Analyzing.to_string().starts_with("Analyzing"));
    }

    #[test]
    fn test_failures_are_actionable() {
        let status = Status::AutoFitFailed(AutoFitError::PoseNotDetected(
            PoseRejection::Missing(BodyPart::LeftShoulder),
        ));
        assert!(status.is_error());
        assert!(status.to_string().contains("shoulders"));
        assert!(!Status::Fitted.is_error());
    }
}
