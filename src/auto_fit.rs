//! Pose-based automatic fitting.
//!
//! [`derive_fit`] turns a detected pose into an overlay placement and is a
//! pure function of its inputs. [`AutoFitEngine`] wraps the pose service and
//! enforces that only one fit runs at a time.

use std::cell::Cell;

use crate::config::AutoFitConfig;
use crate::error::{AutoFitError, PoseRejection};
use crate::image_cache::RasterImage;
use crate::pose::{BodyPart, Keypoint, Pose, PoseBackend, PoseService};
use crate::transform::Placement;

/// Image and surface dimensions the fit is computed against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitFrame {
    /// Native width of the user photo (the pose's coordinate space)
    pub user_width: u32,
    /// Current surface width in pixels
    pub surface_width: u32,
    /// Native width of the garment, if one is loaded
    pub garment_width: Option<u32>,
}

/// Placement derived from a pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub anchor_x: f32,
    pub anchor_y: f32,
    pub rotation_degrees: f32,
    /// `None` when no garment was loaded; the current scale is kept
    pub scale: Option<f32>,
    /// Distance between the shoulders, in photo pixels
    pub shoulder_width: f32,
}

impl FitResult {
    /// Merge into the current placement.
    pub fn placement(&self, current: &Placement) -> Placement {
        Placement {
            anchor_x: self.anchor_x,
            anchor_y: self.anchor_y,
            scale: self.scale.unwrap_or(current.scale),
            rotation_degrees: self.rotation_degrees,
        }
    }
}

fn confident_keypoint(
    pose: &Pose,
    part: BodyPart,
    min_confidence: f32,
) -> Result<&Keypoint, PoseRejection> {
    let keypoint = pose.keypoint(part).ok_or(PoseRejection::Missing(part))?;
    // Written so that a NaN confidence is rejected too
    if !(keypoint.confidence > min_confidence) {
        return Err(PoseRejection::LowConfidence {
            part,
            confidence: keypoint.confidence,
        });
    }
    if !keypoint.position.x.is_finite() || !keypoint.position.y.is_finite() {
        return Err(PoseRejection::InvalidPosition(part));
    }
    Ok(keypoint)
}

/// Derive an overlay placement from the shoulders of a detected pose.
///
/// The anchor sits below the middle of the shoulder line by a fraction of
/// the shoulder width, the rotation follows the shoulder line, and the
/// scale (only when a garment is loaded) makes the garment a multiple of
/// the shoulder width once drawn on the surface. Coordinates stay in the
/// photo's native pixel space.
pub fn derive_fit(
    pose: &Pose,
    frame: FitFrame,
    params: &AutoFitConfig,
) -> Result<FitResult, AutoFitError> {
    let reject = AutoFitError::PoseNotDetected;
    let left = confident_keypoint(pose, BodyPart::LeftShoulder, params.min_confidence)
        .map_err(reject)?
        .position;
    let right = confident_keypoint(pose, BodyPart::RightShoulder, params.min_confidence)
        .map_err(reject)?
        .position;

    let (dx, dy) = (right.x - left.x, right.y - left.y);
    let shoulder_width = dx.hypot(dy);
    if !(shoulder_width > f32::EPSILON) || !shoulder_width.is_finite() {
        return Err(reject(PoseRejection::CoincidentShoulders));
    }

    let center_x = (left.x + right.x) / 2.0;
    let center_y = (left.y + right.y) / 2.0;
    let rotation_degrees = dy.atan2(dx).to_degrees();

    let scale = frame.garment_width.map(|garment_width| {
        let canvas_scale_factor = frame.surface_width as f32 / frame.user_width.max(1) as f32;
        let estimated_garment_width = shoulder_width * params.garment_width_per_shoulder;
        estimated_garment_width / garment_width.max(1) as f32 * canvas_scale_factor
    });
    let anchor_y = center_y + params.anchor_drop_per_shoulder * shoulder_width;
    let scale_ok = scale.is_none_or(|scale| scale.is_finite() && scale > 0.0);
    if !scale_ok || !center_x.is_finite() || !anchor_y.is_finite() {
        return Err(reject(PoseRejection::PlacementOutOfRange));
    }

    Ok(FitResult {
        anchor_x: center_x,
        anchor_y,
        rotation_degrees,
        scale,
        shoulder_width,
    })
}

/// Clears the engine's in-flight flag when dropped, including when the
/// fit future is dropped before completing.
pub struct InFlightGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Runs pose estimation for auto-fit, one request at a time.
pub struct AutoFitEngine {
    service: PoseService,
    params: AutoFitConfig,
    in_flight: Cell<bool>,
}

impl AutoFitEngine {
    pub fn new(backend: Box<dyn PoseBackend>, params: AutoFitConfig) -> Self {
        Self {
            service: PoseService::new(backend),
            params,
            in_flight: Cell::new(false),
        }
    }

    pub fn params(&self) -> &AutoFitConfig {
        &self.params
    }

    pub fn service(&self) -> &PoseService {
        &self.service
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.get()
    }

    /// Claim the engine. Fails with [`AutoFitError::InProgress`] if a fit
    /// is already running.
    pub fn try_begin(&self) -> Result<InFlightGuard<'_>, AutoFitError> {
        if self.in_flight.replace(true) {
            return Err(AutoFitError::InProgress);
        }
        Ok(InFlightGuard {
            flag: &self.in_flight,
        })
    }

    /// Estimate the pose in the user photo.
    pub async fn estimate(&self, image: &RasterImage) -> Result<Pose, AutoFitError> {
        Ok(self.service.estimate(image).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{FixedPoseBackend, Keypoint};
    use crate::test_image::solid_image;

    fn shoulders(left: (f32, f32, f32), right: (f32, f32, f32)) -> Pose {
        Pose::new(vec![
            Keypoint::new(BodyPart::Nose, 400.0, 250.0, 0.99),
            Keypoint::new(BodyPart::LeftShoulder, left.0, left.1, left.2),
            Keypoint::new(BodyPart::RightShoulder, right.0, right.1, right.2),
        ])
    }

    fn frame(garment_width: Option<u32>) -> FitFrame {
        FitFrame {
            user_width: 800,
            surface_width: 400,
            garment_width,
        }
    }

    #[test]
    fn test_reference_fit() {
        let pose = shoulders((300.0, 400.0, 0.9), (500.0, 420.0, 0.9));
        let fit = derive_fit(&pose, frame(Some(1000)), &AutoFitConfig::default()).unwrap();

        assert!((fit.shoulder_width - 200.997).abs() < 0.01);
        assert!((fit.anchor_x - 400.0).abs() < 1e-4);
        assert!((fit.anchor_y - 510.5).abs() < 0.01);
        assert!((fit.rotation_degrees - 5.7106).abs() < 0.001);
        // (200.99 * 3.0 / 1000) * (400 / 800)
        assert!((fit.scale.unwrap() - 0.3015).abs() < 0.0001);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let pose = shoulders((310.5, 401.25, 0.8), (498.0, 430.75, 0.7));
        let params = AutoFitConfig::default();
        let a = derive_fit(&pose, frame(Some(640)), &params).unwrap();
        let b = derive_fit(&pose, frame(Some(640)), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_without_garment_scale_is_kept() {
        let pose = shoulders((300.0, 400.0, 0.9), (500.0, 420.0, 0.9));
        let fit = derive_fit(&pose, frame(None), &AutoFitConfig::default()).unwrap();
        assert_eq!(fit.scale, None);

        let current = Placement {
            anchor_x: 1.0,
            anchor_y: 2.0,
            scale: 1.25,
            rotation_degrees: 0.0,
        };
        let merged = fit.placement(&current);
        assert_eq!(merged.scale, 1.25);
        assert_eq!(merged.anchor_x, fit.anchor_x);
    }

    #[test]
    fn test_low_confidence_shoulder_is_rejected() {
        let pose = shoulders((300.0, 400.0, 0.4), (500.0, 420.0, 0.9));
        let err = derive_fit(&pose, frame(Some(1000)), &AutoFitConfig::default()).unwrap_err();
        assert_eq!(
            err,
            AutoFitError::PoseNotDetected(PoseRejection::LowConfidence {
                part: BodyPart::LeftShoulder,
                confidence: 0.4,
            })
        );
    }

    #[test]
    fn test_confidence_at_threshold_is_rejected() {
        let pose = shoulders((300.0, 400.0, 0.9), (500.0, 420.0, 0.5));
        assert!(matches!(
            derive_fit(&pose, frame(Some(1000)), &AutoFitConfig::default()),
            Err(AutoFitError::PoseNotDetected(PoseRejection::LowConfidence {
                part: BodyPart::RightShoulder,
                ..
            }))
        ));
    }

    #[test]
    fn test_missing_shoulder_is_rejected() {
        let pose = Pose::new(vec![Keypoint::new(BodyPart::RightShoulder, 1.0, 1.0, 0.9)]);
        assert_eq!(
            derive_fit(&pose, frame(None), &AutoFitConfig::default()).unwrap_err(),
            AutoFitError::PoseNotDetected(PoseRejection::Missing(BodyPart::LeftShoulder))
        );
    }

    #[test]
    fn test_degenerate_geometry_is_rejected() {
        let params = AutoFitConfig::default();
        let same_point = shoulders((300.0, 400.0, 0.9), (300.0, 400.0, 0.9));
        assert_eq!(
            derive_fit(&same_point, frame(Some(1000)), &params).unwrap_err(),
            AutoFitError::PoseNotDetected(PoseRejection::CoincidentShoulders)
        );

        let nan = shoulders((f32::NAN, 400.0, 0.9), (300.0, 400.0, 0.9));
        assert_eq!(
            derive_fit(&nan, frame(Some(1000)), &params).unwrap_err(),
            AutoFitError::PoseNotDetected(PoseRejection::InvalidPosition(BodyPart::LeftShoulder))
        );
    }

    #[test]
    fn test_overflowing_anchor_is_rejected() {
        // Midpoint of these x positions overflows f32
        let pose = shoulders((3.0e38, 400.0, 0.9), (3.3e38, 400.0, 0.9));
        assert_eq!(
            derive_fit(&pose, frame(None), &AutoFitConfig::default()).unwrap_err(),
            AutoFitError::PoseNotDetected(PoseRejection::PlacementOutOfRange)
        );
    }

    #[test]
    fn test_rotation_follows_shoulder_line() {
        // Right shoulder higher on screen: counter-clockwise tilt
        let pose = shoulders((300.0, 420.0, 0.9), (500.0, 400.0, 0.9));
        let fit = derive_fit(&pose, frame(None), &AutoFitConfig::default()).unwrap();
        assert!((fit.rotation_degrees + 5.7106).abs() < 0.001);
    }

    #[test]
    fn test_engine_is_not_reentrant() {
        let engine = AutoFitEngine::new(
            Box::new(FixedPoseBackend::new(Pose::default())),
            AutoFitConfig::default(),
        );
        let guard = engine.try_begin().unwrap();
        assert!(engine.is_running());
        assert!(matches!(engine.try_begin(), Err(AutoFitError::InProgress)));

        drop(guard);
        assert!(!engine.is_running());
        assert!(engine.try_begin().is_ok());
    }

    #[test]
    fn test_engine_estimates_with_cached_model() {
        let pose = shoulders((300.0, 400.0, 0.9), (500.0, 420.0, 0.9));
        let engine = AutoFitEngine::new(
            Box::new(FixedPoseBackend::new(pose.clone())),
            AutoFitConfig::default(),
        );
        let photo = solid_image(8, 8, [0, 0, 0, 255]);

        assert_eq!(pollster::block_on(engine.estimate(&photo)).unwrap(), pose);
        assert_eq!(pollster::block_on(engine.estimate(&photo)).unwrap(), pose);
        assert_eq!(engine.service().load_count(), 1);
    }
}
