//! Real-format detection for image files.
//!
//! File extensions lie: frames exported by workflow hosts are routinely
//! named `.png` while holding WebP bytes. [`detect`] looks at the content in
//! two layers:
//!
//! 1. **Header sniff**: compare the first bytes against the signatures of
//!    the five supported formats. Cheap, no decode.
//! 2. **Decode fallback**: let the `image` crate guess from content and
//!    fully decode to confirm. Catches files whose header we don't recognise
//!    but the decoder does (and reports formats we don't support).
//!
//! Detection never fails: anything that cannot be classified is
//! [`DetectedFormat::Unknown`].

use crate::text;
use image::{ImageFormat, ImageReader};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Longest signature we need to look at (RIFF....WEBP).
const SNIFF_LEN: usize = 12;

/// The true encoded format of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedFormat {
    Webp,
    Gif,
    Jpeg,
    Png,
    Bmp,
    Unknown,
}

impl DetectedFormat {
    /// Formats that can be detected and converted to.
    pub const SUPPORTED: [DetectedFormat; 5] = [
        DetectedFormat::Webp,
        DetectedFormat::Gif,
        DetectedFormat::Jpeg,
        DetectedFormat::Png,
        DetectedFormat::Bmp,
    ];

    /// Upper-case canonical name (`"JPEG"`, `"UNKNOWN"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            DetectedFormat::Webp => "WEBP",
            DetectedFormat::Gif => "GIF",
            DetectedFormat::Jpeg => "JPEG",
            DetectedFormat::Png => "PNG",
            DetectedFormat::Bmp => "BMP",
            DetectedFormat::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(self) -> bool {
        self != DetectedFormat::Unknown
    }

    /// Map an `image` crate format onto the supported set.
    pub fn from_image_format(format: ImageFormat) -> Self {
        match format {
            ImageFormat::WebP => DetectedFormat::Webp,
            ImageFormat::Gif => DetectedFormat::Gif,
            ImageFormat::Jpeg => DetectedFormat::Jpeg,
            ImageFormat::Png => DetectedFormat::Png,
            ImageFormat::Bmp => DetectedFormat::Bmp,
            _ => DetectedFormat::Unknown,
        }
    }

    /// The matching `image` crate format, `None` for `Unknown`.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            DetectedFormat::Webp => Some(ImageFormat::WebP),
            DetectedFormat::Gif => Some(ImageFormat::Gif),
            DetectedFormat::Jpeg => Some(ImageFormat::Jpeg),
            DetectedFormat::Png => Some(ImageFormat::Png),
            DetectedFormat::Bmp => Some(ImageFormat::Bmp),
            DetectedFormat::Unknown => None,
        }
    }

    /// File extension conventionally used for this format.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            DetectedFormat::Webp => Some("webp"),
            DetectedFormat::Gif => Some("gif"),
            DetectedFormat::Jpeg => Some("jpg"),
            DetectedFormat::Png => Some("png"),
            DetectedFormat::Bmp => Some("bmp"),
            DetectedFormat::Unknown => None,
        }
    }
}

impl fmt::Display for DetectedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a format name, case-insensitively. `JPG` is accepted for JPEG.
///
/// Names outside the supported set parse to `Unknown` rather than erroring;
/// callers that need a real target check [`DetectedFormat::is_known`].
impl FromStr for DetectedFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if text::equals_ignore_case(name, "JPG") {
            return Ok(DetectedFormat::Jpeg);
        }
        Ok(DetectedFormat::SUPPORTED
            .into_iter()
            .find(|format| text::equals_ignore_case(name, format.as_str()))
            .unwrap_or(DetectedFormat::Unknown))
    }
}

/// Match a file header against the supported signatures.
pub fn sniff_header(header: &[u8]) -> Option<DetectedFormat> {
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(DetectedFormat::Jpeg);
    }
    if header.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(DetectedFormat::Png);
    }
    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return Some(DetectedFormat::Gif);
    }
    if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
        return Some(DetectedFormat::Webp);
    }
    if header.starts_with(b"BM") {
        return Some(DetectedFormat::Bmp);
    }
    None
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

/// Content-guess with the `image` crate and decode fully to confirm.
///
/// Returns the decoder's format even when it is outside the supported set,
/// so the caller can log what it actually saw.
fn decode_format(path: &Path) -> Option<ImageFormat> {
    let reader = ImageReader::open(path).ok()?.with_guessed_format().ok()?;
    let format = reader.format()?;
    match reader.decode() {
        Ok(_) => Some(format),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "decode fallback failed");
            None
        }
    }
}

/// Determine the true format of the image at `path`.
pub fn detect(path: &Path) -> DetectedFormat {
    if !crate::fsutil::is_file(path) {
        tracing::error!(path = %path.display(), "image file does not exist, cannot detect its format");
        return DetectedFormat::Unknown;
    }

    let header = match read_header(path) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read image header");
            return DetectedFormat::Unknown;
        }
    };
    if let Some(format) = sniff_header(&header) {
        return format;
    }

    match decode_format(path) {
        Some(format) => {
            let detected = DetectedFormat::from_image_format(format);
            if !detected.is_known() {
                tracing::warn!(
                    path = %path.display(),
                    format = ?format,
                    "image decoded as an unsupported format"
                );
            }
            detected
        }
        None => {
            tracing::warn!(path = %path.display(), "unrecognised image format");
            DetectedFormat::Unknown
        }
    }
}
