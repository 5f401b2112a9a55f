//! Synthetic image fixtures for imaging and delivery tests.

use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::Path;

/// Write a small gradient image of the given size in `format`.
///
/// The file's extension is ignored; `format` decides the bytes.
pub fn write_test_image(path: &Path, format: ImageFormat, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 16 % 256) as u8, (y * 16 % 256) as u8, 128])
    });
    DynamicImage::ImageRgb8(img)
        .save_with_format(path, format)
        .unwrap();
}
