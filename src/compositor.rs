//! Composite rendering: user photo as background, garment on top.

use crate::constants::GARMENT_BASE_WIDTH_FRACTION;
use crate::image_cache::RasterImage;
use crate::surface::{Rect, Surface};
use crate::transform::{Affine, TransformState};

/// Draws the try-on composite onto a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compositor {
    /// Garment base width as a fraction of the surface width
    pub base_width_fraction: f32,
}

impl Compositor {
    pub fn new(base_width_fraction: f32) -> Self {
        Self {
            base_width_fraction,
        }
    }

    /// Garment rectangle in the overlay's local frame: centered on the
    /// origin, width a fixed fraction of the surface width, height following
    /// the garment's own aspect ratio.
    pub fn garment_rect(&self, surface_width: u32, garment: &RasterImage) -> Rect {
        let width = surface_width as f32 * self.base_width_fraction;
        let height = width * garment.height() as f32 / garment.width() as f32;
        Rect::centered(width, height)
    }

    /// Render the composite.
    ///
    /// The caller must have a user photo; a missing garment only skips the
    /// overlay.
    pub fn render(
        &self,
        surface: &mut dyn Surface,
        user: &RasterImage,
        garment: Option<&RasterImage>,
        transform: &TransformState,
    ) {
        let (width, height) = (surface.width(), surface.height());
        surface.clear();
        surface.draw_image(
            user,
            Rect::new(0.0, 0.0, width as f32, height as f32),
            &Affine::IDENTITY,
        );

        if let Some(garment) = garment {
            let rect = self.garment_rect(width, garment);
            surface.draw_image(garment, rect, &transform.overlay_matrix());
        }
        log::trace!(
            "Rendered {}x{} composite (garment: {})",
            width,
            height,
            garment.is_some()
        );
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(GARMENT_BASE_WIDTH_FRACTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RasterSurface;
    use crate::test_image::solid_image;
    use crate::transform::Placement;
    use image::Rgba;

    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const RED: [u8; 4] = [255, 0, 0, 255];

    fn transform(anchor_x: f32, anchor_y: f32, scale: f32, rotation_degrees: f32) -> TransformState {
        let mut state = TransformState::new();
        assert!(state.apply(Placement {
            anchor_x,
            anchor_y,
            scale,
            rotation_degrees,
        }));
        state
    }

    #[test]
    fn test_garment_rect_uses_surface_width_and_aspect() {
        let compositor = Compositor::default();
        let garment = solid_image(1000, 1200, RED);
        let rect = compositor.garment_rect(400, &garment);
        assert_eq!(rect, Rect::new(-100.0, -120.0, 200.0, 240.0));
    }

    #[test]
    fn test_garment_rect_keeps_non_terminating_aspect() {
        // 7/3 has no exact binary form
        let compositor = Compositor::default();
        let garment = solid_image(300, 700, RED);
        let rect = compositor.garment_rect(600, &garment);
        assert_eq!(rect.width, 300.0);
        assert_eq!(rect.height, 700.0);
        assert_eq!(rect.y, -350.0);
    }

    #[test]
    fn test_render_without_garment_draws_photo_only() {
        let mut surface = RasterSurface::new(40, 50);
        let photo = solid_image(80, 100, BLUE);
        Compositor::default().render(&mut surface, &photo, None, &transform(20.0, 16.0, 1.0, 0.0));

        assert!(surface.image().pixels().all(|p| *p == Rgba(BLUE)));
    }

    #[test]
    fn test_render_places_garment_at_anchor() {
        let mut surface = RasterSurface::new(100, 100);
        let photo = solid_image(10, 10, BLUE);
        // Base width 50px, square garment
        let garment = solid_image(10, 10, RED);
        Compositor::default().render(
            &mut surface,
            &photo,
            Some(&garment),
            &transform(30.0, 60.0, 1.0, 0.0),
        );

        assert_eq!(surface.pixel(30, 60), Rgba(RED));
        assert_eq!(surface.pixel(6, 36), Rgba(RED));
        assert_eq!(surface.pixel(54, 84), Rgba(RED));
        assert_eq!(surface.pixel(3, 60), Rgba(BLUE));
        assert_eq!(surface.pixel(57, 60), Rgba(BLUE));
        assert_eq!(surface.pixel(30, 90), Rgba(BLUE));
    }

    #[test]
    fn test_render_applies_scale_and_rotation() {
        let mut surface = RasterSurface::new(200, 200);
        let photo = solid_image(10, 10, BLUE);
        // Base rect 100x20 (wide bar), halved by scale then turned upright
        let garment = solid_image(50, 10, RED);
        Compositor::default().render(
            &mut surface,
            &photo,
            Some(&garment),
            &transform(100.0, 100.0, 0.5, 90.0),
        );

        // Rotated bar is 10 wide and 50 tall around the anchor
        assert_eq!(surface.pixel(100, 80), Rgba(RED));
        assert_eq!(surface.pixel(100, 120), Rgba(RED));
        assert_eq!(surface.pixel(120, 100), Rgba(BLUE));
        assert_eq!(surface.pixel(100, 130), Rgba(BLUE));
    }

    #[test]
    fn test_render_clears_previous_frame() {
        let mut surface = RasterSurface::new(100, 100);
        let photo = solid_image(10, 10, BLUE);
        let garment = solid_image(10, 10, RED);
        let compositor = Compositor::default();

        compositor.render(&mut surface, &photo, Some(&garment), &transform(20.0, 20.0, 1.0, 0.0));
        compositor.render(&mut surface, &photo, Some(&garment), &transform(80.0, 80.0, 1.0, 0.0));

        assert_eq!(surface.pixel(20, 20), Rgba(BLUE));
        assert_eq!(surface.pixel(80, 80), Rgba(RED));
    }
}
