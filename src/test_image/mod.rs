//! Test image generation.
//!
//! Builds small in-memory photos and garments so tests never depend on
//! files on disk.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::image_cache::RasterImage;

/// A single-color RGBA image.
pub fn solid_rgba(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}

/// A single-color decoded image.
pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RasterImage {
    RasterImage::from_rgba(solid_rgba(width, height, color)).expect("non-empty test image")
}

/// A single-color image encoded as PNG file bytes.
pub fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encode_png(solid_rgba(width, height, color))
}

/// An opaque garment-shaped test overlay: a filled rectangle with a
/// transparent border, so the drawn footprint is easy to detect.
pub fn garment_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let border_x = width / 8;
    let border_y = height / 8;
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let inside = x >= border_x
            && x < width - border_x
            && y >= border_y
            && y < height - border_y;
        if inside {
            Rgba([color[0], color[1], color[2], 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    encode_png(img)
}

fn encode_png(img: RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG encoding of a test image");
    bytes
}
