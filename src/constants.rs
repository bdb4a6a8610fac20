//! Global constants for the try-on widget

/// Maximum surface height in pixels (matches the page's CSS max-height)
pub const DEFAULT_MAX_SURFACE_HEIGHT: f32 = 700.0;

/// Container width assumed when the host cannot report one
pub const DEFAULT_CONTAINER_WIDTH: f32 = 600.0;

/// Garment base width as a fraction of the surface width
pub const GARMENT_BASE_WIDTH_FRACTION: f32 = 0.5;

/// Initial anchor height as a fraction of the surface height (approx. chest)
pub const INITIAL_ANCHOR_HEIGHT_FRACTION: f32 = 1.0 / 3.0;

/// Scale slider bounds and default, in percent
pub const SCALE_SLIDER_MIN: f32 = 50.0;
pub const SCALE_SLIDER_MAX: f32 = 170.0;
pub const SCALE_SLIDER_DEFAULT: f32 = 100.0;

/// Rotation slider bounds and default, in degrees
pub const ROTATION_SLIDER_MIN: f32 = -180.0;
pub const ROTATION_SLIDER_MAX: f32 = 180.0;
pub const ROTATION_SLIDER_DEFAULT: f32 = 0.0;

/// Keypoints at or below this confidence are treated as not detected
pub const MIN_KEYPOINT_CONFIDENCE: f32 = 0.5;

/// Estimated garment width per unit of shoulder width
pub const GARMENT_WIDTH_PER_SHOULDER: f32 = 3.0;

/// Anchor offset below the shoulder line per unit of shoulder width
pub const ANCHOR_DROP_PER_SHOULDER: f32 = 0.5;
