//! Error types for the client pipeline and the segmented downloader.
//!
//! All fallible operations in this crate return [`Error`] (or
//! [`CacheError`](crate::cache::CacheError) at the cache boundary) with enough
//! context to identify the failing call without re-deriving it from a backtrace.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error type used by hook callbacks and custom redirect policies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pipeline stage at which a hook callback failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Client-level callbacks invoked before the request is built.
    BeforeRequest,
    /// Request-level callbacks invoked after the request is built.
    AfterRequest,
    /// Callbacks invoked after a successful transport round-trip.
    Response,
}

impl std::fmt::Display for HookStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BeforeRequest => f.write_str("before-request"),
            Self::AfterRequest => f.write_str("after-request"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// Errors produced by request execution and downloads.
#[derive(Debug, Error)]
pub enum Error {
    /// The URL could not be parsed after base-URL and scheme merging.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },

    /// Client construction failed (bad proxy URL, TLS backend failure, ...).
    #[error("failed to build HTTP client: {source}")]
    Builder {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A header name or value supplied through the builder is not valid HTTP.
    #[error("invalid header {name:?}")]
    Header {
        /// The header name as given.
        name: String,
    },

    /// Request body could not be encoded for the negotiated content type.
    #[error("failed to encode request body: {source}")]
    Encode {
        /// The underlying serializer or IO error.
        #[source]
        source: BoxError,
    },

    /// Response body could not be decoded for its content type.
    #[error("failed to decode {content_type:?} response body: {source}")]
    Decode {
        /// The response `Content-Type` value.
        content_type: String,
        /// The underlying deserializer error.
        #[source]
        source: BoxError,
    },

    /// A registered hook aborted the pipeline.
    #[error("{stage} hook failed: {source}")]
    Hook {
        /// The stage whose hook failed.
        stage: HookStage,
        /// The error returned by the hook.
        #[source]
        source: BoxError,
    },

    /// The buffered request could not be converted into an outgoing request.
    #[error("failed to build outgoing request for {method} {url}: {source}")]
    RequestBuild {
        /// HTTP method of the call.
        method: String,
        /// Target URL of the call.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Transport-level failure after all retries were exhausted.
    #[error("{method} {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        /// HTTP method of the failing call.
        method: String,
        /// Target URL of the failing call.
        url: String,
        /// Number of times the network primitive was invoked.
        attempts: u32,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error status surfaced via [`Response::error_for_status`](crate::Response::error_for_status).
    #[error("{method} {url} returned HTTP {status}")]
    Status {
        /// HTTP method of the call.
        method: String,
        /// Target URL of the call.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// Reading a response body failed mid-stream.
    #[error("failed to read response body from {url}: {source}")]
    Read {
        /// The URL whose body failed to read.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error while writing a download.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The probe response did not declare a usable `Content-Length`.
    #[error("no usable Content-Length in response from {url}")]
    MissingContentLength {
        /// The probed URL.
        url: String,
    },

    /// Downloaded byte count does not match the declared content length.
    #[error("incomplete file: expected {expected} bytes, got {actual}")]
    Incomplete {
        /// Declared content length.
        expected: u64,
        /// Bytes actually received/written.
        actual: u64,
    },

    /// A download segment returned the wrong number of bytes.
    #[error("segment {index} length mismatch: expected {expected} bytes, got {actual}")]
    PartLength {
        /// Segment index.
        index: usize,
        /// Expected byte count (`to - from + 1`).
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },

    /// A download task could not be joined (panicked or was cancelled).
    #[error("download task failed: {message}")]
    Task {
        /// Join failure description.
        message: String,
    },
}

impl Error {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a body-encoding error.
    pub fn encode(source: impl Into<BoxError>) -> Self {
        Self::Encode {
            source: source.into(),
        }
    }

    /// Creates a body-decoding error.
    pub fn decode(content_type: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            content_type: content_type.into(),
            source: source.into(),
        }
    }

    /// Creates a hook failure for the given pipeline stage.
    pub fn hook(stage: HookStage, source: impl Into<BoxError>) -> Self {
        Self::Hook {
            stage,
            source: source.into(),
        }
    }

    /// Creates a request-construction error.
    pub fn request_build(
        method: impl Into<String>,
        url: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::RequestBuild {
            method: method.into(),
            url: url.into(),
            source,
        }
    }

    /// Creates a transport error with call context.
    pub fn transport(
        method: impl Into<String>,
        url: impl Into<String>,
        attempts: u32,
        source: reqwest::Error,
    ) -> Self {
        Self::Transport {
            method: method.into(),
            url: url.into(),
            attempts,
            source,
        }
    }

    /// Creates a typed HTTP status error.
    pub fn status(method: impl Into<String>, url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            method: method.into(),
            url: url.into(),
            status,
        }
    }

    /// Creates a body-read error.
    pub fn read(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Read {
            url: url.into(),
            source,
        }
    }

    /// Creates an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an incomplete-file error.
    pub fn incomplete(expected: u64, actual: u64) -> Self {
        Self::Incomplete { expected, actual }
    }

    /// Creates a segment length mismatch error.
    pub fn part_length(index: usize, expected: u64, actual: u64) -> Self {
        Self::PartLength {
            index,
            expected,
            actual,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_carries_context() {
        // A reqwest::Error cannot be constructed directly; exercise the
        // variants that do not wrap one.
        let error = Error::status("GET", "http://example.com/get", 404);
        let msg = error.to_string();
        assert!(msg.contains("GET"), "expected method in: {msg}");
        assert!(msg.contains("http://example.com/get"), "expected URL in: {msg}");
        assert!(msg.contains("404"), "expected status in: {msg}");
    }

    #[test]
    fn test_hook_display_names_stage() {
        let error = Error::hook(HookStage::BeforeRequest, "nope".to_string());
        assert!(error.to_string().contains("before-request"));
    }

    #[test]
    fn test_request_build_display_is_not_a_transport_error() {
        // Proxy::all is the one synchronous way to obtain a reqwest::Error.
        let source = reqwest::Proxy::all("http://[invalid").unwrap_err();
        let error = Error::request_build("GET", "http://example.com/x", source);
        let msg = error.to_string();
        assert!(msg.contains("failed to build outgoing request"), "got: {msg}");
        assert!(msg.contains("GET"), "got: {msg}");
        assert!(!msg.contains("attempt"), "got: {msg}");
    }

    #[test]
    fn test_incomplete_display() {
        let msg = Error::incomplete(100, 42).to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_part_length_display() {
        let msg = Error::part_length(3, 512, 17).to_string();
        assert!(msg.contains("segment 3"));
        assert!(msg.contains("512"));
    }
}
