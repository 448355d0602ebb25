//! Fluent HTTP Client Library
//!
//! A reqwest-based HTTP client with a fluent builder, lifecycle hooks, an
//! immutable middleware chain, fixed-interval retries, content-type-driven
//! body encoding/decoding, per-host cookie persistence and a segmented
//! concurrent downloader.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`client`] - Builder, frozen client and the verb surface
//! - [`pipeline`] - Hook/middleware execution and the retrying transport call
//! - [`body`] - Request body shapes and multipart encoding
//! - [`response`] - Response wrapper with typed decoding and line streaming
//! - [`downloader`] - HEAD-probe segmented downloads
//! - [`cache`] - File-backed key/value store for cookie persistence
//!
//! # Example
//!
//! ```no_run
//! use reqkit::Client;
//!
//! # async fn run() -> Result<(), reqkit::Error> {
//! let client = Client::builder()
//!     .base_url("http://httpbin.org")
//!     .as_json()
//!     .build()?;
//! let body: serde_json::Value = client.get_decode("/get", ()).await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod body;
pub mod cache;
pub mod client;
pub mod cookie;
pub mod downloader;
pub mod error;
pub mod hooks;
pub mod middleware;
mod pipeline;
pub mod redirect;
pub mod request;
pub mod response;
pub mod util;

// Re-export commonly used types
pub use body::{Body, FILE_PARAM_PREFIX, MultipartForm};
pub use cache::{Cache, CacheError, FileCache};
pub use client::{Client, ClientBuilder, KvFn};
pub use cookie::CookieMap;
pub use downloader::Downloader;
pub use error::{BoxError, Error, HookStage};
pub use middleware::{Middleware, Next};
pub use redirect::RedirectPolicy;
pub use request::Request;
pub use response::Response;

// The HTTP vocabulary callers need alongside the client
pub use reqwest::{Method, StatusCode};
