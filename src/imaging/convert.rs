//! Format conversion for image files.
//!
//! [`convert`] re-encodes an image into a target format at a new path. When
//! the source already *is* the target format (by content, not extension) the
//! bytes are copied unchanged: re-encoding a JPEG as JPEG would only lose
//! quality.
//!
//! Success always means "the destination file exists afterwards". That is
//! re-checked on disk after the copy or encode, never assumed.

use super::format::{DetectedFormat, detect};
use crate::fsutil;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("source image path is empty")]
    EmptySource,
    #[error("source image {0} does not exist")]
    MissingSource(PathBuf),
    #[error("source and destination are the same path: {0}")]
    SameDestination(PathBuf),
    #[error("unsupported target format '{0}'")]
    UnsupportedTarget(String),
    #[error("could not detect the real format of {0}")]
    UndetectedSource(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("conversion finished but {0} was not written")]
    MissingOutput(PathBuf),
}

/// Convert `src` into `dst` encoded as the format named by `target`
/// (`"jpeg"`, `"PNG"`, ...).
pub fn convert_to_named(src: &Path, dst: &Path, target: &str) -> Result<(), ConversionError> {
    check_paths(src, dst)?;
    let format: DetectedFormat = target.parse().unwrap_or(DetectedFormat::Unknown);
    if !format.is_known() {
        return Err(ConversionError::UnsupportedTarget(target.to_string()));
    }
    convert_checked(src, dst, format)
}

/// Convert `src` into `dst` encoded as `target`.
pub fn convert(src: &Path, dst: &Path, target: DetectedFormat) -> Result<(), ConversionError> {
    check_paths(src, dst)?;
    if !target.is_known() {
        return Err(ConversionError::UnsupportedTarget(target.to_string()));
    }
    convert_checked(src, dst, target)
}

fn check_paths(src: &Path, dst: &Path) -> Result<(), ConversionError> {
    if src.as_os_str().is_empty() {
        return Err(ConversionError::EmptySource);
    }
    if !fsutil::is_file(src) {
        return Err(ConversionError::MissingSource(src.to_path_buf()));
    }
    if src == dst {
        return Err(ConversionError::SameDestination(src.to_path_buf()));
    }
    Ok(())
}

fn convert_checked(src: &Path, dst: &Path, target: DetectedFormat) -> Result<(), ConversionError> {
    let real = detect(src);
    if !real.is_known() {
        return Err(ConversionError::UndetectedSource(src.to_path_buf()));
    }

    if real == target {
        tracing::debug!(src = %src.display(), dst = %dst.display(), format = %real, "same format, copying");
        fsutil::copy_file(src, dst)?;
    } else if let Err(e) = reencode(src, dst, target) {
        tracing::error!(
            src = %src.display(),
            from = %real,
            to = %target,
            error = %e,
            "image conversion failed"
        );
        return Err(e);
    }

    if fsutil::is_file(dst) {
        Ok(())
    } else {
        Err(ConversionError::MissingOutput(dst.to_path_buf()))
    }
}

fn reencode(src: &Path, dst: &Path, target: DetectedFormat) -> Result<(), ConversionError> {
    let Some(format) = target.image_format() else {
        return Err(ConversionError::UnsupportedTarget(target.to_string()));
    };
    let img = ImageReader::open(src)?.with_guessed_format()?.decode()?;
    // JPEG has no alpha channel; every other supported encoder takes RGBA8.
    let prepared = match target {
        DetectedFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => DynamicImage::ImageRgba8(img.to_rgba8()),
    };
    prepared.save_with_format(dst, format)?;
    Ok(())
}
