//! The delivery client: validation, normalization, retry loop.

use super::backoff::{Sleeper, ThreadSleeper, backoff_delay};
use super::classify::{AttemptFailure, UNKNOWN_ERROR, classify_status};
use super::temp::TempArtifact;
use super::transport::{HttpTransport, Payload, Transport, TransportError};
use super::{Deliver, DeliveryOutcome, DeliveryRequest, PRECONDITION_FAILED};
use crate::config::DeliveryConfig;
use crate::fsutil;
use crate::imaging::{self, DetectedFormat};
use std::path::Path;
use std::time::Duration;

/// Delivers results over a [`Transport`], sleeping through a [`Sleeper`]
/// between attempts.
pub struct ResultDeliveryClient<T = HttpTransport, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    backoff_unit: Duration,
}

impl ResultDeliveryClient {
    /// Production client: blocking HTTP with the configured timeout.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_parts(
            transport,
            ThreadSleeper,
            Duration::from_millis(config.backoff_unit_ms),
        ))
    }
}

impl<T: Transport, S: Sleeper> ResultDeliveryClient<T, S> {
    pub fn with_parts(transport: T, sleeper: S, backoff_unit: Duration) -> Self {
        Self {
            transport,
            sleeper,
            backoff_unit,
        }
    }

    /// Flat-argument form of [`Deliver::deliver`], returning
    /// `(success, error_code, error_message)`.
    pub fn deliver_parts(
        &self,
        callback_url: &str,
        prompt_id: &str,
        image_path: &Path,
        video_path: &Path,
        max_retries: i64,
    ) -> (bool, String, String) {
        let request = DeliveryRequest::new(callback_url, prompt_id, image_path, video_path)
            .with_max_retries(max_retries);
        self.deliver(&request).into_parts()
    }

    /// One attempt: open the files, send, classify.
    fn attempt(&self, request: &DeliveryRequest, image_path: &Path) -> Result<(), AttemptFailure> {
        let payload =
            Payload::open(&request.prompt_id, image_path, &request.video_path).map_err(|e| {
                AttemptFailure::new(UNKNOWN_ERROR, format!("failed to open payload files: {e}"))
            })?;
        let reply = self.transport.post(&request.callback_url, payload)?;
        if reply.status == 200 {
            Ok(())
        } else {
            Err(classify_status(reply.status, &reply.body))
        }
    }
}

fn validate(request: &DeliveryRequest) -> Result<(), DeliveryOutcome> {
    let reject = |message: String| {
        tracing::error!("{message}");
        Err(DeliveryOutcome::failure(PRECONDITION_FAILED, message))
    };
    if request.callback_url.is_empty() {
        return reject("callback url is empty".to_string());
    }
    if request.prompt_id.is_empty() {
        return reject("prompt id is empty".to_string());
    }
    if !fsutil::is_file(&request.image_path) {
        return reject(format!(
            "image file {} does not exist",
            request.image_path.display()
        ));
    }
    if !fsutil::is_file(&request.video_path) {
        return reject(format!(
            "video file {} does not exist",
            request.video_path.display()
        ));
    }
    Ok(())
}

/// Convert a known non-JPEG image to a temporary JPEG.
///
/// `None` means "send the original": already JPEG, unknown format, or the
/// conversion failed.
fn normalize_image(image_path: &Path) -> Option<TempArtifact> {
    let format = imaging::detect(image_path);
    if !format.is_known() || format == DetectedFormat::Jpeg {
        return None;
    }

    let artifact = match TempArtifact::reserve_jpeg_beside(image_path) {
        Ok(artifact) => artifact,
        Err(e) => {
            tracing::warn!(
                src = %image_path.display(),
                error = %e,
                "could not reserve a temporary JPEG, sending original image"
            );
            return None;
        }
    };
    match imaging::convert(image_path, artifact.path(), DetectedFormat::Jpeg) {
        Ok(()) => {
            tracing::info!(
                from = %format,
                src = %image_path.display(),
                dst = %artifact.path().display(),
                "normalized image to JPEG"
            );
            Some(artifact)
        }
        Err(e) => {
            tracing::warn!(
                src = %image_path.display(),
                error = %e,
                "JPEG normalization failed, sending original image"
            );
            None
        }
    }
}

impl<T: Transport, S: Sleeper> Deliver for ResultDeliveryClient<T, S> {
    #[tracing::instrument(skip(self, request), fields(prompt_id = %request.prompt_id))]
    fn deliver(&self, request: &DeliveryRequest) -> DeliveryOutcome {
        if let Err(outcome) = validate(request) {
            return outcome;
        }

        let attempts = request.attempts();
        // Dropped (and deleted) on every return below.
        let normalized = normalize_image(&request.image_path);
        let image_path = normalized
            .as_ref()
            .map(TempArtifact::path)
            .unwrap_or(request.image_path.as_path());

        let mut last = AttemptFailure::new(UNKNOWN_ERROR, "no delivery attempt was made");
        for index in 0..attempts {
            match self.attempt(request, image_path) {
                Ok(()) => {
                    tracing::info!(attempt = index + 1, url = %request.callback_url, "result delivered");
                    return DeliveryOutcome::Success;
                }
                Err(failure) => {
                    tracing::warn!(
                        attempt = index + 1,
                        of = attempts,
                        code = %failure.code,
                        message = %failure.message,
                        "delivery attempt failed"
                    );
                    last = failure;
                }
            }
            if index + 1 < attempts {
                let delay = backoff_delay(index, self.backoff_unit);
                tracing::debug!(delay_ms = delay.as_millis() as u64, "backing off");
                self.sleeper.sleep(delay);
            }
        }

        tracing::error!(
            attempts,
            code = %last.code,
            message = %last.message,
            "delivery failed after all attempts"
        );
        last.into()
    }
}
