//! # Workflow Callback
//!
//! The "commit result" step of a visual-workflow host: when a generation
//! run finishes, ship its video and tail-frame image to a caller-supplied
//! HTTP endpoint and tell the host how it went.
//!
//! # Architecture
//!
//! ```text
//! host inputs ─→ node ─→ delivery ─→ POST multipart (image, video, promptId)
//!                 │         │
//!                 │         └─→ imaging (detect real format, convert → JPEG)
//!                 └─→ prompt (resolve prompt id from host context)
//! ```
//!
//! The node validates and maps outcomes onto the host's result codes; the
//! delivery client owns retries, backoff, error classification and temp-file
//! cleanup; imaging is pure file-in/file-out work on top of the `image` crate.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`node`] | Host-facing callback node: validation, result codes `0`/`2`/`-1` |
//! | [`delivery`] | Multipart HTTP delivery with retry, backoff and failure classification |
//! | [`imaging`] | Real-format detection and format conversion |
//! | [`prompt`] | Prompt id discovery from host context or the host's queue |
//! | [`config`] | `config.toml` loading, validation and stock defaults |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//! | [`fsutil`] | Small filesystem helpers |
//! | [`text`] | Case-insensitive compare, random digits, time formatting |
//!
//! # Design Decisions
//!
//! ## Content Over Extensions
//!
//! Workflow hosts routinely write WebP bytes into `.png` files. Every decision
//! about an image is made on its sniffed content ([`imaging::detect`]), and
//! the extension is never trusted.
//!
//! ## Seams Are Traits
//!
//! The node talks to [`delivery::Deliver`], and the delivery client talks to
//! [`delivery::Transport`] and [`delivery::Sleeper`]. Production code uses the
//! blocking `reqwest` client and `thread::sleep`; tests substitute recorders
//! and never wait on real time.
//!
//! ## No Error Crosses the Node
//!
//! The host expects a tuple, never an exception. Every library error is a
//! `thiserror` enum, and the node reduces all of them to a result code and a
//! short message.

pub mod config;
pub mod delivery;
pub mod fsutil;
pub mod imaging;
pub mod logging;
pub mod node;
pub mod output;
pub mod prompt;
pub mod text;
