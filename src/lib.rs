//! TryOn - virtual try-on widget
//!
//! Composites a user photo with a garment overlay that can be dragged,
//! scaled and rotated by hand, or placed automatically from the shoulders
//! found by a pose-estimation model. The same core drives a browser canvas
//! (WASM) and a headless CPU surface (native).

use std::future::Future;
use std::pin::Pin;

pub mod auto_fit;
pub mod compositor;
pub mod config;
pub mod constants;
pub mod error;
pub mod image_cache;
pub mod manual_fit;
pub mod pose;
pub mod signal;
pub mod status;
pub mod surface;
pub mod transform;
pub mod widget;

#[cfg(test)]
mod test_image;

/// Boxed single-threaded future. Pose models, fetchers and the widget's
/// async operations are not `Send`.
pub type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub use auto_fit::{AutoFitEngine, FitFrame, FitResult, derive_fit};
pub use compositor::Compositor;
pub use config::{ConfigError, LogLevel, TryOnConfig};
pub use error::{AutoFitError, DecodeError, GarmentLoadError, PoseError, PoseRejection};
pub use image_cache::{GarmentFetcher, ImageSourceCache, RasterImage};
pub use manual_fit::{EventResponse, PointerKind, SliderValues, SurfaceRect};
pub use pose::{BodyPart, Keypoint, Pose, PoseBackend, PoseModel};
pub use signal::Signal;
pub use status::Status;
pub use surface::{RasterSurface, Surface};
pub use transform::{Affine, Placement, TransformState};
pub use widget::{TryOn, WidgetView};

// WASM entry point
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::*;
