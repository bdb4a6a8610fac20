//! Decoded image sources for the try-on widget.
//!
//! Holds the user photo and the garment overlay, and tracks enough
//! bookkeeping (photo generation, garment request sequence) to let
//! asynchronous work detect that it has gone stale before committing.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::LocalFuture;
use crate::error::{DecodeError, GarmentLoadError};

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"];

/// Whether a file name or URL path ends in a supported image extension.
pub fn is_image_file(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A decoded RGBA bitmap with non-zero dimensions.
///
/// Clones share the pixel buffer. Every decode gets a fresh `id`, which
/// surface backends use to cache per-image GPU or canvas resources.
#[derive(Debug, Clone)]
pub struct RasterImage {
    id: u64,
    pixels: Arc<RgbaImage>,
}

impl RasterImage {
    /// Decode raw file bytes (PNG, JPEG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        Self::from_rgba(rgba)
    }

    /// Wrap already-decoded pixels.
    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, DecodeError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty { width, height });
        }
        Ok(Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            pixels: Arc::new(pixels),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Fetches the raw bytes behind a garment locator (URL, path, ...).
pub trait GarmentFetcher {
    fn fetch<'a>(&'a self, locator: &'a str) -> LocalFuture<'a, Result<Vec<u8>, GarmentLoadError>>;
}

/// Ticket for an in-flight garment refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarmentRequest {
    pub seq: u64,
    pub locator: String,
}

/// Outcome of committing a garment refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GarmentUpdate {
    /// The garment was replaced; redraw if a photo is loaded
    Replaced { redraw: bool },
    /// A newer request was issued meanwhile; this result was dropped
    Superseded,
    /// The locator was empty; nothing was requested
    Skipped,
}

/// Owns the user photo and the garment overlay.
#[derive(Debug, Default)]
pub struct ImageSourceCache {
    user: Option<RasterImage>,
    garment: Option<RasterImage>,
    /// Bumped whenever the user photo is replaced or cleared
    photo_generation: u64,
    /// Sequence number of the newest garment request
    garment_seq: u64,
}

impl ImageSourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and store a new user photo.
    ///
    /// On failure the previous photo (if any) is kept.
    pub fn load_user_photo(&mut self, bytes: &[u8]) -> Result<RasterImage, DecodeError> {
        let image = RasterImage::decode(bytes)?;
        log::info!(
            "🖼️ Loaded user photo {}x{} ({} bytes)",
            image.width(),
            image.height(),
            bytes.len()
        );
        self.user = Some(image.clone());
        self.photo_generation += 1;
        Ok(image)
    }

    /// Drop the user photo. Safe to call repeatedly.
    pub fn clear_user_photo(&mut self) {
        if self.user.take().is_some() {
            log::info!("🖼️ Cleared user photo");
        }
        self.photo_generation += 1;
    }

    pub fn user_photo(&self) -> Option<&RasterImage> {
        self.user.as_ref()
    }

    pub fn garment(&self) -> Option<&RasterImage> {
        self.garment.as_ref()
    }

    pub fn has_user_photo(&self) -> bool {
        self.user.is_some()
    }

    pub fn has_garment(&self) -> bool {
        self.garment.is_some()
    }

    /// Changes every time the user photo is replaced or cleared.
    pub fn photo_generation(&self) -> u64 {
        self.photo_generation
    }

    /// Register a new garment request. Any request issued earlier becomes
    /// stale.
    pub fn begin_garment_refresh(&mut self, locator: &str) -> GarmentRequest {
        self.garment_seq += 1;
        GarmentRequest {
            seq: self.garment_seq,
            locator: locator.to_string(),
        }
    }

    /// Decode fetched bytes for `request` and, if it is still the newest
    /// request, replace the garment.
    pub fn complete_garment_refresh(
        &mut self,
        request: &GarmentRequest,
        bytes: &[u8],
    ) -> Result<GarmentUpdate, GarmentLoadError> {
        if request.seq != self.garment_seq {
            log::debug!(
                "Dropping stale garment load for '{}' (request {}, newest {})",
                request.locator,
                request.seq,
                self.garment_seq
            );
            return Ok(GarmentUpdate::Superseded);
        }

        let image = RasterImage::decode(bytes).map_err(|source| GarmentLoadError::Invalid {
            locator: request.locator.clone(),
            source,
        })?;
        log::info!(
            "🖼️ Loaded garment '{}': {}x{}",
            request.locator,
            image.width(),
            image.height()
        );
        self.garment = Some(image);
        Ok(GarmentUpdate::Replaced {
            redraw: self.user.is_some(),
        })
    }
}

/// Reads garments from the local filesystem; locators are paths.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Default)]
pub struct FileGarmentFetcher {
    root: Option<std::path::PathBuf>,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileGarmentFetcher {
    /// Resolve relative locators against `root`.
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl GarmentFetcher for FileGarmentFetcher {
    fn fetch<'a>(&'a self, locator: &'a str) -> LocalFuture<'a, Result<Vec<u8>, GarmentLoadError>> {
        Box::pin(async move {
            let path = match &self.root {
                Some(root) => root.join(locator),
                None => std::path::PathBuf::from(locator),
            };
            if !is_image_file(locator) {
                log::debug!("Garment '{}' has no image extension, decoding anyway", locator);
            }
            std::fs::read(&path).map_err(|e| GarmentLoadError::unreachable(locator, e))
        })
    }
}
