//! Drawing surfaces.
//!
//! A [`Surface`] is the pixel-addressable target the compositor draws on.
//! The browser build draws on a canvas; [`RasterSurface`] is a CPU
//! implementation backed by an RGBA buffer, used by the native binary and
//! the tests.

use image::{Rgba, RgbaImage};

use crate::image_cache::RasterImage;
use crate::transform::Affine;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle of the given size centered on the origin.
    pub fn centered(width: f32, height: f32) -> Self {
        Self::new(-width / 2.0, -height / 2.0, width, height)
    }
}

/// A drawing target.
pub trait Surface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Resize the pixel buffer. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    /// Clear every pixel to transparent.
    fn clear(&mut self);

    /// Draw `image` stretched into `dest`, where `dest` is expressed in the
    /// local frame that `transform` maps to surface pixels.
    fn draw_image(&mut self, image: &RasterImage, dest: Rect, transform: &Affine);
}

/// Bounding box a new photo's surface must fit inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceBounds {
    pub max_width: f32,
    pub max_height: f32,
}

/// Size a surface so it keeps the photo's aspect ratio and fits `bounds`.
///
/// The same factor is applied to both dimensions; photos smaller than the
/// bounds are scaled up. Dimensions are truncated to whole pixels, like a
/// canvas does, but never collapse below one pixel.
pub fn fit_surface(image_width: u32, image_height: u32, bounds: SurfaceBounds) -> (u32, u32) {
    let (w, h) = (image_width.max(1) as f32, image_height.max(1) as f32);
    let usable = |limit: f32| limit.is_finite() && limit > 0.0;
    // f32::min ignores a NaN operand, so each bound is checked on its own
    let scale = if usable(bounds.max_width) && usable(bounds.max_height) {
        (bounds.max_width / w).min(bounds.max_height / h)
    } else {
        log::warn!(
            "Unusable surface bounds {:?}, keeping native photo size",
            bounds
        );
        1.0
    };
    let width = ((w * scale) as u32).max(1);
    let height = ((h * scale) as u32).max(1);
    (width, height)
}

/// CPU surface backed by an RGBA image.
pub struct RasterSurface {
    canvas: RgbaImage,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.canvas.get_pixel(x, y)
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::new(width, height);
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_image(&mut self, image: &RasterImage, dest: Rect, transform: &Affine) {
        let src = image.pixels();
        let (src_w, src_h) = (src.width() as f32, src.height() as f32);

        // Image pixel space -> local dest rect -> surface pixels
        let image_to_local = Affine {
            a: dest.width / src_w,
            b: 0.0,
            c: 0.0,
            d: dest.height / src_h,
            e: dest.x,
            f: dest.y,
        };
        let forward = transform.multiply(&image_to_local);
        let Some(inverse) = forward.invert() else {
            // Zero-area destination draws nothing
            return;
        };

        let corners = [(0.0, 0.0), (src_w, 0.0), (0.0, src_h), (src_w, src_h)]
            .map(|(x, y)| forward.apply(x, y));
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let x0 = min_x.floor().max(0.0) as u32;
        let y0 = min_y.floor().max(0.0) as u32;
        let x1 = (max_x.ceil().max(0.0) as u32).min(self.canvas.width());
        let y1 = (max_y.ceil().max(0.0) as u32).min(self.canvas.height());

        for py in y0..y1 {
            for px in x0..x1 {
                // Sample at the pixel center
                let (u, v) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
                if u < 0.0 || v < 0.0 || u >= src_w || v >= src_h {
                    continue;
                }
                let sample = sample_bilinear(src, u - 0.5, v - 0.5);
                let dst = self.canvas.get_pixel_mut(px, py);
                *dst = blend_over(sample, *dst);
            }
        }
    }
}

/// Bilinear sample with edge clamping. Returns premultiplied RGBA in 0..=1.
fn sample_bilinear(src: &RgbaImage, x: f32, y: f32) -> [f32; 4] {
    let max_x = src.width() as i64 - 1;
    let max_y = src.height() as i64 - 1;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let fetch = |xi: i64, yi: i64| -> [f32; 4] {
        let p = src.get_pixel(xi.clamp(0, max_x) as u32, yi.clamp(0, max_y) as u32);
        let alpha = f32::from(p[3]) / 255.0;
        [
            f32::from(p[0]) / 255.0 * alpha,
            f32::from(p[1]) / 255.0 * alpha,
            f32::from(p[2]) / 255.0 * alpha,
            alpha,
        ]
    };

    let (xi, yi) = (x0 as i64, y0 as i64);
    let p00 = fetch(xi, yi);
    let p10 = fetch(xi + 1, yi);
    let p01 = fetch(xi, yi + 1);
    let p11 = fetch(xi + 1, yi + 1);

    std::array::from_fn(|i| {
        p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy
    })
}

/// Source-over composite of a premultiplied sample onto a straight-alpha pixel.
fn blend_over(src: [f32; 4], dst: Rgba<u8>) -> Rgba<u8> {
    let dst_a = f32::from(dst[3]) / 255.0;
    let inv = 1.0 - src[3];
    let out_a = src[3] + dst_a * inv;
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| -> u8 {
        let dst_c = f32::from(dst[i]) / 255.0 * dst_a;
        let premul = src[i] + dst_c * inv;
        ((premul / out_a) * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_image::solid_image;

    fn bounds(max_width: f32, max_height: f32) -> SurfaceBounds {
        SurfaceBounds {
            max_width,
            max_height,
        }
    }

    #[test]
    fn test_fit_surface_width_limited() {
        // 800x1000 photo in a 400px wide container capped at 700px high
        assert_eq!(fit_surface(800, 1000, bounds(400.0, 700.0)), (400, 500));
    }

    #[test]
    fn test_fit_surface_height_limited() {
        assert_eq!(fit_surface(1000, 2000, bounds(600.0, 700.0)), (350, 700));
    }

    #[test]
    fn test_fit_surface_upscales_small_photos() {
        assert_eq!(fit_surface(100, 100, bounds(400.0, 700.0)), (400, 400));
    }

    #[test]
    fn test_fit_surface_degenerate_bounds() {
        assert_eq!(fit_surface(120, 80, bounds(0.0, 700.0)), (120, 80));
        assert_eq!(fit_surface(120, 80, bounds(f32::NAN, 700.0)), (120, 80));
        assert_eq!(fit_surface(120, 80, bounds(400.0, f32::NAN)), (120, 80));
        assert_eq!(fit_surface(120, 80, bounds(f32::INFINITY, 700.0)), (120, 80));
        assert_eq!(fit_surface(120, 80, bounds(400.0, -1.0)), (120, 80));
    }

    #[test]
    fn test_stretch_fills_surface() {
        let mut surface = RasterSurface::new(20, 10);
        let photo = solid_image(4, 4, [200, 100, 50, 255]);
        surface.draw_image(&photo, Rect::new(0.0, 0.0, 20.0, 10.0), &Affine::IDENTITY);

        for (x, y) in [(0, 0), (19, 0), (0, 9), (19, 9), (10, 5)] {
            assert_eq!(surface.pixel(x, y), Rgba([200, 100, 50, 255]));
        }
    }

    #[test]
    fn test_translated_draw_only_covers_dest() {
        let mut surface = RasterSurface::new(20, 20);
        let patch = solid_image(2, 2, [255, 0, 0, 255]);
        surface.draw_image(
            &patch,
            Rect::centered(4.0, 4.0),
            &Affine::translation(10.0, 10.0),
        );

        assert_eq!(surface.pixel(10, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(surface.pixel(8, 8), Rgba([255, 0, 0, 255]));
        assert_eq!(surface.pixel(11, 11), Rgba([255, 0, 0, 255]));
        assert_eq!(surface.pixel(7, 10), Rgba([0, 0, 0, 0]));
        assert_eq!(surface.pixel(12, 10), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_transparent_overlay_keeps_background() {
        let mut surface = RasterSurface::new(8, 8);
        let background = solid_image(1, 1, [0, 0, 255, 255]);
        let clear = solid_image(1, 1, [255, 0, 0, 0]);
        surface.draw_image(&background, Rect::new(0.0, 0.0, 8.0, 8.0), &Affine::IDENTITY);
        surface.draw_image(&clear, Rect::new(0.0, 0.0, 8.0, 8.0), &Affine::IDENTITY);

        assert_eq!(surface.pixel(4, 4), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_half_transparent_overlay_blends() {
        let mut surface = RasterSurface::new(4, 4);
        let background = solid_image(1, 1, [0, 0, 0, 255]);
        let veil = solid_image(1, 1, [255, 255, 255, 128]);
        surface.draw_image(&background, Rect::new(0.0, 0.0, 4.0, 4.0), &Affine::IDENTITY);
        surface.draw_image(&veil, Rect::new(0.0, 0.0, 4.0, 4.0), &Affine::IDENTITY);

        let p = surface.pixel(1, 1);
        assert_eq!(p[3], 255);
        assert!((i32::from(p[0]) - 128).abs() <= 1);
    }

    #[test]
    fn test_zero_scale_draws_nothing() {
        let mut surface = RasterSurface::new(4, 4);
        let patch = solid_image(2, 2, [255, 0, 0, 255]);
        surface.draw_image(&patch, Rect::centered(4.0, 4.0), &Affine::scaling(0.0));
        assert!(surface.image().pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_clear_and_resize() {
        let mut surface = RasterSurface::new(3, 3);
        let patch = solid_image(1, 1, [9, 9, 9, 255]);
        surface.draw_image(&patch, Rect::new(0.0, 0.0, 3.0, 3.0), &Affine::IDENTITY);
        surface.clear();
        assert!(surface.image().pixels().all(|p| p[3] == 0));

        surface.resize(5, 7);
        assert_eq!((surface.width(), surface.height()), (5, 7));
    }
}
