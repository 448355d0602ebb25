//! A fully built, buffered HTTP request.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use url::Url;

use crate::error::Error;

/// A prepared request with its body fully buffered.
///
/// The buffered body makes retries replayable byte-for-byte. After-request
/// hooks and middleware receive mutable access before dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Request {
    /// Creates a request from its parts.
    #[must_use]
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable access to the target URL.
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns a header value as text, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header from string parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Header`] when the name or value is not valid HTTP.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = reqwest::header::HeaderName::try_from(name).map_err(|_| Error::Header {
            name: name.to_string(),
        })?;
        let value = HeaderValue::try_from(value).map_err(|_| Error::Header {
            name: name.as_str().to_string(),
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Appends a query pair to the URL.
    pub fn append_query(&mut self, name: &str, value: &str) {
        self.url.query_pairs_mut().append_pair(name, value);
    }

    /// The buffered body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces the buffered body.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Builds a reqwest request from the buffered parts. The original stays
    /// intact so it can be replayed on retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestBuild`]; construction failures are not
    /// transport errors and are never retried.
    pub(crate) fn to_reqwest(&self, http: &reqwest::Client) -> Result<reqwest::Request, Error> {
        http.request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .body(self.body.clone())
            .build()
            .map_err(|source| {
                Error::request_build(self.method.as_str(), self.url.as_str(), source)
            })
    }
}
