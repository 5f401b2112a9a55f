//! Image format handling: detection and conversion, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Sniff** | magic-byte table in [`format::sniff_header`] |
//! | **Detect (fallback)** | `image::ImageReader::with_guessed_format` + full decode |
//! | **Convert** | `image` decode → `save_with_format` (JPEG drops alpha) |
//! | **Same-format convert** | plain byte copy |
//!
//! Supported formats are WEBP, GIF, JPEG, PNG and BMP. Anything else is
//! [`DetectedFormat::Unknown`] and is passed through untouched by the
//! delivery pipeline.

pub mod convert;
pub mod format;
#[cfg(test)]
pub(crate) mod test_images;

pub use convert::{ConversionError, convert, convert_to_named};
pub use format::{DetectedFormat, detect, sniff_header};
