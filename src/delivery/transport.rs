//! Multipart transport for delivery attempts.
//!
//! A [`Payload`] owns freshly opened handles for the image and the video.
//! [`Transport::post`] consumes it, so the handles are closed when the
//! attempt ends whatever its outcome. Each attempt opens a new payload from
//! disk; the file parts are buffered before the request is sent.
//!
//! The wire shape is fixed:
//!
//! ```text
//! POST <callback_url>
//! Content-Type: multipart/form-data
//!   image     file part, image/*, basename of the image
//!   video     file part, video/*, basename of the video
//!   promptId  text field
//! ```

use crate::fsutil;
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() || has_connection_cause(&err) {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Whether any error in the `source()` chain is a socket-level connection
/// failure. Body-side errors raised by a failed connect hide it there.
fn has_connection_cause(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cause = err.source();
    while let Some(e) = cause {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if is_connection_kind(io_err.kind()) {
                return true;
            }
        }
        cause = e.source();
    }
    false
}

fn is_connection_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable
    )
}

/// One file part of the multipart body.
#[derive(Debug)]
pub struct FilePart {
    pub file_name: String,
    pub mime: &'static str,
    pub len: u64,
    pub file: File,
}

impl FilePart {
    fn open(path: &Path, mime: &'static str) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            file_name: fsutil::file_name(path),
            mime,
            len,
            file,
        })
    }
}

/// Everything one attempt sends.
#[derive(Debug)]
pub struct Payload {
    pub prompt_id: String,
    pub image: FilePart,
    pub video: FilePart,
}

impl Payload {
    /// Open both files for reading.
    pub fn open(prompt_id: &str, image: &Path, video: &Path) -> io::Result<Self> {
        Ok(Self {
            prompt_id: prompt_id.to_string(),
            image: FilePart::open(image, "image/*")?,
            video: FilePart::open(video, "video/*")?,
        })
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends one payload to one URL.
pub trait Transport {
    fn post(&self, url: &str, payload: Payload) -> Result<HttpReply, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, url: &str, payload: Payload) -> Result<HttpReply, TransportError> {
        (**self).post(url, payload)
    }
}

/// Blocking `reqwest` transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxy settings, TLS roots, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Buffer the part in memory. A streamed body races the connect and can
/// mask a refused connection as a body error.
fn file_part(mut part: FilePart) -> Result<Part, TransportError> {
    let mut bytes = Vec::with_capacity(usize::try_from(part.len).unwrap_or_default());
    part.file
        .read_to_end(&mut bytes)
        .map_err(|e| TransportError::Unknown(format!("failed to read {}: {e}", part.file_name)))?;
    Ok(Part::bytes(bytes)
        .file_name(part.file_name)
        .mime_str(part.mime)?)
}

impl Transport for HttpTransport {
    fn post(&self, url: &str, payload: Payload) -> Result<HttpReply, TransportError> {
        let form = Form::new()
            .part("image", file_part(payload.image)?)
            .part("video", file_part(payload.video)?)
            .text("promptId", payload.prompt_id);

        let response = self.client.post(url).multipart(form).send()?;
        let status = response.status().as_u16();
        // The success body is ignored; failure bodies end up in messages.
        let body = if status == 200 {
            String::new()
        } else {
            response.text().unwrap_or_default()
        };
        Ok(HttpReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// An error that only reveals its io cause through `source()`.
    #[derive(Error, Debug)]
    #[error("request or response body error")]
    struct BodyError(#[source] io::Error);

    #[test]
    fn refused_connection_in_source_chain_is_detected() {
        let refused = BodyError(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(has_connection_cause(&refused));

        let reset = BodyError(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(has_connection_cause(&reset));
    }

    #[test]
    fn other_io_causes_are_not_connection_failures() {
        let denied = BodyError(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!has_connection_cause(&denied));
        assert!(!has_connection_cause(&io::Error::from(
            io::ErrorKind::ConnectionRefused
        )));
    }

    #[test]
    fn payload_open_reads_names_and_lengths() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("tail.jpg");
        let video = tmp.path().join("clip.mp4");
        std::fs::write(&image, b"jpegbytes").unwrap();
        std::fs::write(&video, b"mp4").unwrap();

        let mut payload = Payload::open("p-1", &image, &video).unwrap();
        assert_eq!(payload.prompt_id, "p-1");
        assert_eq!(payload.image.file_name, "tail.jpg");
        assert_eq!(payload.image.mime, "image/*");
        assert_eq!(payload.image.len, 9);
        assert_eq!(payload.video.file_name, "clip.mp4");
        assert_eq!(payload.video.mime, "video/*");

        let mut buf = Vec::new();
        payload.video.file.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"mp4");
    }

    #[test]
    fn payload_open_fails_on_missing_video() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("tail.jpg");
        std::fs::write(&image, b"x").unwrap();

        let result = Payload::open("p", &image, &tmp.path().join("missing.mp4"));
        assert!(result.is_err());
    }

    #[test]
    fn unreachable_host_is_a_connection_error() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("tail.jpg");
        let video = tmp.path().join("clip.mp4");
        std::fs::write(&image, b"x").unwrap();
        std::fs::write(&video, b"y").unwrap();

        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let transport = HttpTransport::with_client(client);
        let payload = Payload::open("p", &image, &video).unwrap();

        let result = transport.post(&format!("http://127.0.0.1:{port}/cb"), payload);
        assert!(matches!(result, Err(TransportError::Connection(_))));
    }

    #[test]
    fn malformed_url_is_a_request_error() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("tail.jpg");
        let video = tmp.path().join("clip.mp4");
        std::fs::write(&image, b"x").unwrap();
        std::fs::write(&video, b"y").unwrap();

        let transport = HttpTransport::new(DEFAULT_TIMEOUT).unwrap();
        let payload = Payload::open("p", &image, &video).unwrap();

        let result = transport.post("not a url", payload);
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
