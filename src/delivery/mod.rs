//! Result delivery: ship a generated video and its tail-frame image to a
//! caller-supplied HTTP endpoint.
//!
//! # Pipeline
//!
//! ```text
//! validate ─→ normalize image ─→ attempt ─┬─→ 200 → Success
//!   (-1)       (→ JPEG, temp)     ▲       └─→ classify → backoff ─┐
//!                                 └───────────────────────────────┘
//! ```
//!
//! - **Validation** never touches the network: empty URL or prompt id, or a
//!   missing image/video, fails with code `-1` immediately.
//! - **Normalization** converts a known non-JPEG image to JPEG in a
//!   [`TempArtifact`](temp::TempArtifact) that is deleted when delivery
//!   returns. Conversion failure is not a delivery failure; the original
//!   image is sent instead.
//! - **Attempts** run strictly one after another. Each opens both files
//!   again, and failures are reduced to symbolic codes by [`classify`].
//!   Only the last attempt's classification is reported.

pub mod backoff;
pub mod classify;
mod client;
pub mod temp;
pub mod transport;

pub use backoff::{Sleeper, ThreadSleeper, backoff_delay};
pub use classify::{AttemptFailure, classify_status};
pub use client::ResultDeliveryClient;
pub use transport::{HttpReply, HttpTransport, Payload, Transport, TransportError};

use std::path::PathBuf;

/// Attempts made when no valid limit is given.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Error code for requests rejected before any network call.
pub const PRECONDITION_FAILED: &str = "-1";

/// Error code reported alongside a successful delivery.
pub const SUCCESS_CODE: &str = "200";

/// Resolve the attempt limit from a raw value.
///
/// - `None` or `Some(n)` with `n <= 0` → [`DEFAULT_MAX_RETRIES`]
/// - `Some(n)` → `n`, saturated to `u32::MAX`
pub fn effective_max_retries(raw: Option<i64>) -> u32 {
    match raw {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => DEFAULT_MAX_RETRIES,
    }
}

/// Parse an attempt limit from text. Anything that is not a positive integer
/// (`"abc"`, `"2.5"`, `"-1"`) resolves to [`DEFAULT_MAX_RETRIES`].
pub fn parse_max_retries(raw: &str) -> u32 {
    effective_max_retries(raw.trim().parse::<i64>().ok())
}

/// One delivery job. Built per invocation, never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub callback_url: String,
    pub prompt_id: String,
    pub image_path: PathBuf,
    pub video_path: PathBuf,
    /// Total attempts; `0` is treated as the default.
    pub max_retries: u32,
}

impl DeliveryRequest {
    pub fn new(
        callback_url: impl Into<String>,
        prompt_id: impl Into<String>,
        image_path: impl Into<PathBuf>,
        video_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            callback_url: callback_url.into(),
            prompt_id: prompt_id.into(),
            image_path: image_path.into(),
            video_path: video_path.into(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the attempt limit from a raw (possibly invalid) value.
    pub fn with_max_retries(mut self, raw: i64) -> Self {
        self.max_retries = effective_max_retries(Some(raw));
        self
    }

    /// Attempt count actually used.
    pub fn attempts(&self) -> u32 {
        effective_max_retries(Some(i64::from(self.max_retries)))
    }
}

/// Result of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    Failure {
        error_code: String,
        error_message: String,
    },
}

impl DeliveryOutcome {
    pub fn failure(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        DeliveryOutcome::Failure {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success)
    }

    /// `"200"` on success, the symbolic code otherwise.
    pub fn error_code(&self) -> &str {
        match self {
            DeliveryOutcome::Success => SUCCESS_CODE,
            DeliveryOutcome::Failure { error_code, .. } => error_code,
        }
    }

    /// Empty on success.
    pub fn error_message(&self) -> &str {
        match self {
            DeliveryOutcome::Success => "",
            DeliveryOutcome::Failure { error_message, .. } => error_message,
        }
    }

    /// Flatten to `(success, error_code, error_message)`.
    pub fn into_parts(self) -> (bool, String, String) {
        match self {
            DeliveryOutcome::Success => (true, SUCCESS_CODE.to_string(), String::new()),
            DeliveryOutcome::Failure {
                error_code,
                error_message,
            } => (false, error_code, error_message),
        }
    }
}

impl From<AttemptFailure> for DeliveryOutcome {
    fn from(failure: AttemptFailure) -> Self {
        DeliveryOutcome::failure(failure.code, failure.message)
    }
}

/// Anything that can carry a [`DeliveryRequest`] to completion.
///
/// The node layer depends on this rather than on the concrete client.
pub trait Deliver {
    fn deliver(&self, request: &DeliveryRequest) -> DeliveryOutcome;
}

impl<D: Deliver + ?Sized> Deliver for &D {
    fn deliver(&self, request: &DeliveryRequest) -> DeliveryOutcome {
        (**self).deliver(request)
    }
}
