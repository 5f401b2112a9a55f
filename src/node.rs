//! The host-facing callback node.
//!
//! The host calls the node with a callback URL, a video, a tail-frame image
//! and a prompt id, and expects a three-tuple back:
//! `(result_text, result_code, prompt_id)`.
//!
//! | Code | Meaning |
//! |---|---|
//! | `0` | delivered |
//! | `2` | invalid input, nothing sent |
//! | `-1` | delivery failed after all attempts |
//!
//! Validation order matters: the first failing check decides the tuple, and
//! only the video-missing check already carries the prompt id.

use crate::config::CallbackConfig;
use crate::delivery::{DEFAULT_MAX_RETRIES, Deliver, DeliveryRequest};
use crate::fsutil;
use crate::prompt::{HostContext, resolve_prompt_id};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CODE_SUCCESS: i32 = 0;
pub const CODE_INVALID_INPUT: i32 = 2;
pub const CODE_DELIVERY_FAILED: i32 = -1;

/// A value the host may send either alone or as a batch.
///
/// Only the first element of a batch is used; batches are never combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// The single value, or the first of a batch. Empty batch → `None`.
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(v) => Some(v),
            OneOrMany::Many(vs) => vs.first(),
        }
    }
}

impl<T: Default> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::One(T::default())
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(value: &str) -> Self {
        OneOrMany::One(value.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(values: Vec<&str>) -> Self {
        OneOrMany::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Everything the host hands the node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CallbackInputs {
    pub callback_url: String,
    pub video: OneOrMany<String>,
    pub image: OneOrMany<String>,
    pub prompt_id: String,
    /// Host-injected context; `prompt`, `extra_pnginfo` and `unique_id`
    /// sit at the top level of the host document.
    #[serde(flatten)]
    pub context: HostContext,
}

/// The node's answer to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeResult {
    pub text: String,
    pub code: i32,
    pub prompt_id: String,
}

impl NodeResult {
    fn new(text: impl Into<String>, code: i32, prompt_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code,
            prompt_id: prompt_id.into(),
        }
    }

    pub fn into_tuple(self) -> (String, i32, String) {
        (self.text, self.code, self.prompt_id)
    }
}

/// Construction-time node settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOptions {
    /// Attempt limit handed to every delivery.
    pub max_retries: u32,
    /// Log raw host context while resolving prompt ids.
    pub verbose: bool,
}

impl NodeOptions {
    pub fn from_config(config: &CallbackConfig) -> Self {
        Self {
            max_retries: config.delivery.attempts(),
            verbose: config.logging.verbose,
        }
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            verbose: false,
        }
    }
}

/// Validates host input and hands it to a [`Deliver`] implementation.
pub struct CallbackNode<D> {
    delivery: D,
    options: NodeOptions,
}

impl<D: Deliver> CallbackNode<D> {
    pub fn new(delivery: D, options: NodeOptions) -> Self {
        Self { delivery, options }
    }

    /// Run the node. Never panics on bad input and never returns an error:
    /// every outcome is a [`NodeResult`].
    pub fn commit_result(&self, inputs: &CallbackInputs) -> NodeResult {
        if inputs.callback_url.is_empty() {
            tracing::error!("callback url is empty, cannot commit generated result");
            return NodeResult::new("callback url is empty", CODE_INVALID_INPUT, "");
        }

        let prompt_id = if inputs.prompt_id.is_empty() {
            resolve_prompt_id(&inputs.context, self.options.verbose).unwrap_or_default()
        } else {
            inputs.prompt_id.clone()
        };
        if prompt_id.is_empty() {
            tracing::error!("prompt id is empty, cannot commit generated result");
            return NodeResult::new("prompt id is empty", CODE_INVALID_INPUT, "");
        }

        let video = inputs.video.first().map(String::as_str).unwrap_or_default();
        let image = inputs.image.first().map(String::as_str).unwrap_or_default();

        if video.is_empty() {
            tracing::error!("video path is empty, cannot commit generated result");
            return NodeResult::new("video path is empty", CODE_INVALID_INPUT, "");
        }
        if image.is_empty() {
            tracing::error!("image path is empty, cannot commit generated result");
            return NodeResult::new("image path is empty", CODE_INVALID_INPUT, "");
        }
        if !fsutil::is_file(Path::new(video)) {
            tracing::error!(video, "video does not exist, cannot commit generated result");
            return NodeResult::new(
                format!("video[{video}] not exist, cannot commit generated result!"),
                CODE_INVALID_INPUT,
                prompt_id,
            );
        }
        if !fsutil::is_file(Path::new(image)) {
            // The tail frame is best effort; delivery decides what to do.
            tracing::warn!(image, "tail frame image does not exist");
        }

        let request = DeliveryRequest {
            max_retries: self.options.max_retries,
            ..DeliveryRequest::new(&inputs.callback_url, &prompt_id, image, video)
        };
        let outcome = self.delivery.deliver(&request);
        if outcome.is_success() {
            tracing::info!(prompt_id = %prompt_id, "generated result committed");
            NodeResult::new("succeed", CODE_SUCCESS, prompt_id)
        } else {
            tracing::error!(
                prompt_id = %prompt_id,
                code = outcome.error_code(),
                message = outcome.error_message(),
                "failed to commit generated result"
            );
            NodeResult::new("failed", CODE_DELIVERY_FAILED, prompt_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryOutcome;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records requests and answers with a fixed outcome.
    struct MockDelivery {
        outcome: DeliveryOutcome,
        requests: Mutex<Vec<DeliveryRequest>>,
    }

    impl MockDelivery {
        fn answering(outcome: DeliveryOutcome) -> Self {
            Self {
                outcome,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn get_requests(&self) -> Vec<DeliveryRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Deliver for MockDelivery {
        fn deliver(&self, request: &DeliveryRequest) -> DeliveryOutcome {
            self.requests.lock().unwrap().push(request.clone());
            self.outcome.clone()
        }
    }

    struct Files {
        _tmp: TempDir,
        video: String,
        image: String,
    }

    fn files() -> Files {
        let tmp = TempDir::new().unwrap();
        let video = tmp.path().join("clip.mp4");
        let image = tmp.path().join("tail.jpg");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&image, b"i").unwrap();
        Files {
            video: video.to_string_lossy().into_owned(),
            image: image.to_string_lossy().into_owned(),
            _tmp: tmp,
        }
    }

    fn inputs(f: &Files) -> CallbackInputs {
        CallbackInputs {
            callback_url: "http://cb/result".into(),
            video: f.video.as_str().into(),
            image: f.image.as_str().into(),
            prompt_id: "prompt-1".into(),
            context: HostContext::default(),
        }
    }

    fn node(mock: &MockDelivery) -> CallbackNode<&MockDelivery> {
        CallbackNode::new(mock, NodeOptions::default())
    }

    #[test]
    fn success_maps_to_code_zero() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::Success);

        let result = node(&mock).commit_result(&inputs(&f));

        assert_eq!(
            result.into_tuple(),
            ("succeed".to_string(), 0, "prompt-1".to_string())
        );
        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].callback_url, "http://cb/result");
        assert_eq!(requests[0].video_path, PathBuf::from(&f.video));
        assert_eq!(requests[0].image_path, PathBuf::from(&f.image));
        assert_eq!(requests[0].max_retries, 3);
    }

    #[test]
    fn delivery_failure_maps_to_minus_one() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::failure("SERVER_ERROR", "x"));

        let result = node(&mock).commit_result(&inputs(&f));

        assert_eq!(result, NodeResult::new("failed", -1, "prompt-1"));
    }

    #[test]
    fn empty_fields_fail_validation_without_delivery() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::Success);
        let n = node(&mock);

        let cases: Vec<(CallbackInputs, &str)> = vec![
            (
                CallbackInputs {
                    callback_url: String::new(),
                    ..inputs(&f)
                },
                "callback url is empty",
            ),
            (
                CallbackInputs {
                    prompt_id: String::new(),
                    ..inputs(&f)
                },
                "prompt id is empty",
            ),
            (
                CallbackInputs {
                    video: "".into(),
                    ..inputs(&f)
                },
                "video path is empty",
            ),
            (
                CallbackInputs {
                    image: "".into(),
                    ..inputs(&f)
                },
                "image path is empty",
            ),
            (
                CallbackInputs {
                    video: OneOrMany::Many(Vec::new()),
                    ..inputs(&f)
                },
                "video path is empty",
            ),
        ];
        for (input, text) in cases {
            assert_eq!(
                n.commit_result(&input),
                NodeResult::new(text, 2, ""),
                "case {text}"
            );
        }
        assert!(mock.get_requests().is_empty());
    }

    #[test]
    fn callback_url_is_checked_before_prompt_id() {
        let mock = MockDelivery::answering(DeliveryOutcome::Success);
        let result = node(&mock).commit_result(&CallbackInputs::default());
        assert_eq!(result.text, "callback url is empty");
    }

    #[test]
    fn missing_video_keeps_prompt_id() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::Success);
        let input = CallbackInputs {
            video: "/nonexistent/clip.mp4".into(),
            ..inputs(&f)
        };

        let result = node(&mock).commit_result(&input);

        assert_eq!(
            result,
            NodeResult::new(
                "video[/nonexistent/clip.mp4] not exist, cannot commit generated result!",
                2,
                "prompt-1"
            )
        );
        assert!(mock.get_requests().is_empty());
    }

    #[test]
    fn missing_image_still_attempts_delivery() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::failure("-1", "image missing"));
        let input = CallbackInputs {
            image: "/nonexistent/tail.jpg".into(),
            ..inputs(&f)
        };

        let result = node(&mock).commit_result(&input);

        let requests = mock.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].image_path, PathBuf::from("/nonexistent/tail.jpg"));
        assert_eq!(result, NodeResult::new("failed", -1, "prompt-1"));
    }

    #[test]
    fn batched_inputs_use_first_element() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::Success);
        let input = CallbackInputs {
            image: vec![f.image.as_str(), "b.jpg"].into(),
            video: vec![f.video.as_str()].into(),
            ..inputs(&f)
        };

        node(&mock).commit_result(&input);

        let requests = mock.get_requests();
        assert_eq!(requests[0].image_path, PathBuf::from(&f.image));
        assert_eq!(requests[0].video_path, PathBuf::from(&f.video));
    }

    #[test]
    fn prompt_id_resolved_from_context_when_missing() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::Success);
        let input = CallbackInputs {
            prompt_id: String::new(),
            context: HostContext {
                extra_pnginfo: Some(json!({"workflow": {"id": "wf-9"}})),
                ..HostContext::default()
            },
            ..inputs(&f)
        };

        let result = node(&mock).commit_result(&input);

        assert_eq!(result, NodeResult::new("succeed", 0, "wf-9"));
        assert_eq!(mock.get_requests()[0].prompt_id, "wf-9");
    }

    #[test]
    fn options_max_retries_is_forwarded() {
        let f = files();
        let mock = MockDelivery::answering(DeliveryOutcome::Success);
        let n = CallbackNode::new(
            &mock,
            NodeOptions {
                max_retries: 5,
                verbose: true,
            },
        );

        n.commit_result(&inputs(&f));
        assert_eq!(mock.get_requests()[0].max_retries, 5);
    }

    #[test]
    fn options_follow_config() {
        let mut config = CallbackConfig::default();
        config.delivery.max_retries = -1;
        config.logging.verbose = true;
        assert_eq!(
            NodeOptions::from_config(&config),
            NodeOptions {
                max_retries: 3,
                verbose: true
            }
        );
    }

    #[test]
    fn inputs_parse_from_host_document() {
        let input: CallbackInputs = serde_json::from_value(json!({
            "callback_url": "http://cb",
            "video": ["v1.mp4", "v2.mp4"],
            "image": "a.jpg",
            "prompt_id": "",
            "extra_pnginfo": {"workflow": {"id": "wf"}},
            "unique_id": "12"
        }))
        .unwrap();

        assert_eq!(input.video.first().map(String::as_str), Some("v1.mp4"));
        assert_eq!(input.image, OneOrMany::One("a.jpg".to_string()));
        assert_eq!(input.context.unique_id.as_deref(), Some("12"));
        assert_eq!(resolve_prompt_id(&input.context, false).as_deref(), Some("wf"));
    }
}
