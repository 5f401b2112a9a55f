//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Callback
//!
//! The node's tuple as one line of JSON, so a shell caller can parse it:
//!
//! ```text
//! ["succeed",0,"prompt-1"]
//! ```
//!
//! ## Detect
//!
//! ```text
//! frame.png: WEBP
//!     Extension: png (mismatch)
//! ```
//!
//! ## Convert
//!
//! ```text
//! frame.png → frame.jpg
//!     Format: WEBP → JPEG
//!     Took: 00:00:01
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::DetectedFormat;
use crate::node::NodeResult;
use crate::text;
use std::path::Path;
use std::time::Duration;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Callback
// ============================================================================

/// The node tuple as a JSON array: `[text, code, prompt_id]`.
pub fn format_node_result(result: &NodeResult) -> Vec<String> {
    let tuple = (&result.text, result.code, &result.prompt_id);
    // Serializing strings and an integer cannot fail.
    vec![serde_json::to_string(&tuple).unwrap_or_default()]
}

pub fn print_node_result(result: &NodeResult) {
    for line in format_node_result(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Detect
// ============================================================================

/// Detected format, plus the extension when it disagrees with the content.
pub fn format_detect_output(path: &Path, format: DetectedFormat) -> Vec<String> {
    let mut lines = vec![format!("{}: {}", display_name(path), format)];
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    if let (Some(ext), true) = (ext, format.is_known()) {
        let agrees = match format {
            DetectedFormat::Jpeg => {
                text::equals_ignore_case(&ext, "jpg") || text::equals_ignore_case(&ext, "jpeg")
            }
            other => other
                .extension()
                .is_some_and(|known| text::equals_ignore_case(&ext, known)),
        };
        if !agrees {
            lines.push(format!("{}Extension: {} (mismatch)", indent(1), ext));
        }
    }
    lines
}

pub fn print_detect_output(path: &Path, format: DetectedFormat) {
    for line in format_detect_output(path, format) {
        println!("{}", line);
    }
}

// ============================================================================
// Convert
// ============================================================================

pub fn format_convert_output(
    src: &Path,
    dst: &Path,
    from: DetectedFormat,
    to: DetectedFormat,
    elapsed: Duration,
) -> Vec<String> {
    vec![
        format!("{} → {}", display_name(src), display_name(dst)),
        format!("{}Format: {} → {}", indent(1), from, to),
        format!("{}Took: {}", indent(1), text::format_hms(elapsed.as_secs())),
    ]
}

pub fn print_convert_output(
    src: &Path,
    dst: &Path,
    from: DetectedFormat,
    to: DetectedFormat,
    elapsed: Duration,
) {
    for line in format_convert_output(src, dst, from, to, elapsed) {
        println!("{}", line);
    }
}
