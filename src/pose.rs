//! Pose-estimation boundary.
//!
//! The pose model itself is an external black box. This module defines the
//! keypoint data it returns, the traits a backend implements, and
//! [`PoseService`], which loads the model once and reuses it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::LocalFuture;
use crate::error::PoseError;
use crate::image_cache::RasterImage;

/// Anatomical landmarks reported by PoseNet-style models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    /// Any part name this crate does not know about
    #[serde(other)]
    Unknown,
}

impl BodyPart {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftEye => "left eye",
            BodyPart::RightEye => "right eye",
            BodyPart::LeftEar => "left ear",
            BodyPart::RightEar => "right ear",
            BodyPart::LeftShoulder => "left shoulder",
            BodyPart::RightShoulder => "right shoulder",
            BodyPart::LeftElbow => "left elbow",
            BodyPart::RightElbow => "right elbow",
            BodyPart::LeftWrist => "left wrist",
            BodyPart::RightWrist => "right wrist",
            BodyPart::LeftHip => "left hip",
            BodyPart::RightHip => "right hip",
            BodyPart::LeftKnee => "left knee",
            BodyPart::RightKnee => "right knee",
            BodyPart::LeftAnkle => "left ankle",
            BodyPart::RightAnkle => "right ankle",
            BodyPart::Unknown => "unknown part",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position in the pixel space of the image submitted for estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// A detected landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: BodyPart,
    pub position: Position,
    /// Detection confidence in `[0, 1]`
    #[serde(rename = "score")]
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, x: f32, y: f32, confidence: f32) -> Self {
        Self {
            part,
            position: Position { x, y },
            confidence,
        }
    }
}

/// Single-person pose, in the JSON shape PoseNet returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Overall pose confidence, if the model reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default)]
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            score: None,
            keypoints,
        }
    }

    /// Parse a PoseNet JSON result.
    pub fn from_json(json: &str) -> Result<Self, PoseError> {
        Ok(serde_json::from_str(json)?)
    }

    /// First keypoint reported for `part`.
    pub fn keypoint(&self, part: BodyPart) -> Option<&Keypoint> {
        self.keypoints.iter().find(|k| k.part == part)
    }
}

/// A loaded pose model.
pub trait PoseModel {
    /// Estimate a single person's pose in `image`.
    fn estimate_single_pose<'a>(
        &'a self,
        image: &'a RasterImage,
    ) -> LocalFuture<'a, Result<Pose, PoseError>>;
}

/// Loads a pose model. Loading may be expensive; [`PoseService`] calls it
/// at most once per successful load.
pub trait PoseBackend {
    fn load(&self) -> LocalFuture<'_, Result<Box<dyn PoseModel>, PoseError>>;
}

/// Lazily-loaded, cached pose model.
pub struct PoseService {
    backend: Box<dyn PoseBackend>,
    model: RefCell<Option<Rc<dyn PoseModel>>>,
    load_count: Cell<u32>,
}

impl PoseService {
    pub fn new(backend: Box<dyn PoseBackend>) -> Self {
        Self {
            backend,
            model: RefCell::new(None),
            load_count: Cell::new(0),
        }
    }

    /// Whether a model has been loaded and cached.
    pub fn is_loaded(&self) -> bool {
        self.model.borrow().is_some()
    }

    /// Number of load attempts made so far.
    pub fn load_count(&self) -> u32 {
        self.load_count.get()
    }

    /// The cached model, loading it on first use. A failed load is not
    /// cached, so the next call tries again.
    pub async fn model(&self) -> Result<Rc<dyn PoseModel>, PoseError> {
        let cached = self.model.borrow().clone();
        if let Some(model) = cached {
            return Ok(model);
        }

        self.load_count.set(self.load_count.get() + 1);
        log::info!("Loading pose model (attempt {})", self.load_count.get());
        let model: Rc<dyn PoseModel> = Rc::from(self.backend.load().await?);
        *self.model.borrow_mut() = Some(Rc::clone(&model));
        log::info!("Pose model ready");
        Ok(model)
    }

    /// Load the model if needed and estimate the pose in `image`.
    pub async fn estimate(&self, image: &RasterImage) -> Result<Pose, PoseError> {
        let model = self.model().await?;
        let pose = model.estimate_single_pose(image).await?;
        log::debug!(
            "Pose estimated: {} keypoints (score {:?})",
            pose.keypoints.len(),
            pose.score
        );
        Ok(pose)
    }
}

/// Backend whose "model" always reports the same pose. Used for keypoints
/// computed ahead of time (and in tests).
#[derive(Debug, Clone)]
pub struct FixedPoseBackend {
    pose: Pose,
}

impl FixedPoseBackend {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }
}

struct FixedPoseModel {
    pose: Pose,
}

impl PoseModel for FixedPoseModel {
    fn estimate_single_pose<'a>(
        &'a self,
        _image: &'a RasterImage,
    ) -> LocalFuture<'a, Result<Pose, PoseError>> {
        Box::pin(async move { Ok(self.pose.clone()) })
    }
}

impl PoseBackend for FixedPoseBackend {
    fn load(&self) -> LocalFuture<'_, Result<Box<dyn PoseModel>, PoseError>> {
        let pose = self.pose.clone();
        Box::pin(async move { Ok(Box::new(FixedPoseModel { pose }) as Box<dyn PoseModel>) })
    }
}

/// Backend for hosts without any pose library.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPoseBackend;

impl PoseBackend for NoPoseBackend {
    fn load(&self) -> LocalFuture<'_, Result<Box<dyn PoseModel>, PoseError>> {
        Box::pin(async {
            Err(PoseError::LibraryMissing(
                "no pose-estimation backend configured".to_string(),
            ))
        })
    }
}

/// Backend reading a PoseNet JSON result from disk on load.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct KeypointFileBackend {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl KeypointFileBackend {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl PoseBackend for KeypointFileBackend {
    fn load(&self) -> LocalFuture<'_, Result<Box<dyn PoseModel>, PoseError>> {
        Box::pin(async move {
            let json = std::fs::read_to_string(&self.path)
                .map_err(|e| PoseError::Load(format!("{}: {}", self.path.display(), e)))?;
            let pose = Pose::from_json(&json)?;
            log::info!(
                "Read {} keypoints from {}",
                pose.keypoints.len(),
                self.path.display()
            );
            Ok(Box::new(FixedPoseModel { pose }) as Box<dyn PoseModel>)
        })
    }
}
