//! Response wrapper carrying call context and typed body decoding.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, SET_COOKIE};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::cookie::CookieMap;
use crate::error::Error;
use crate::util::{is_json_type, is_xml_type};

/// A response plus the context of the call that produced it.
///
/// Dropping the response releases the underlying connection; callers that
/// never read the body need no explicit close.
#[derive(Debug)]
pub struct Response {
    inner: reqwest::Response,
    method: Method,
    url: Url,
    request_body: Vec<u8>,
    attempt: u32,
    elapsed: Duration,
}

impl Response {
    pub(crate) fn new(
        inner: reqwest::Response,
        method: Method,
        url: Url,
        request_body: Vec<u8>,
        attempt: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            inner,
            method,
            url,
            request_body,
            attempt,
            elapsed,
        }
    }

    /// The HTTP status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    /// Returns `true` for statuses of 400 and above.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.inner.status().as_u16() >= 400
    }

    /// Converts an error status into [`Error::Status`], passing other
    /// responses through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] when the status is 400 or above.
    pub fn error_for_status(self) -> Result<Self, Error> {
        if self.is_error() {
            return Err(Error::status(
                self.method.as_str(),
                self.url.as_str(),
                self.inner.status().as_u16(),
            ));
        }
        Ok(self)
    }

    /// The response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns a header value as text, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header, or an empty string when absent.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE.as_str()).unwrap_or_default()
    }

    /// Cookies set by this response, parsed from `Set-Cookie` headers.
    /// Attributes after the first `name=value` pair are dropped.
    #[must_use]
    pub fn cookies(&self) -> CookieMap {
        cookies_from_headers(self.inner.headers())
    }

    /// The URL the request was sent to (before redirects).
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL the response was served from (after redirects).
    #[must_use]
    pub fn final_url(&self) -> &Url {
        self.inner.url()
    }

    /// The HTTP method of the originating call.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The buffered request body that produced this response.
    #[must_use]
    pub fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    /// Number of transport attempts the call took (1 when no retry fired).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Wall-clock time spent in the transport call, retries included.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Reads the full body as bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] when the body cannot be read.
    pub async fn bytes(self) -> Result<Vec<u8>, Error> {
        let url = self.url.to_string();
        self.inner
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::read(url, e))
    }

    /// Reads the full body as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] when the body cannot be read.
    pub async fn text(self) -> Result<String, Error> {
        let url = self.url.to_string();
        self.inner.text().await.map_err(|e| Error::read(url, e))
    }

    /// Decodes the body into `T` according to the response content type:
    /// JSON family via serde_json, XML family via quick-xml.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] when the body cannot be read and
    /// [`Error::Decode`] when the content type is unsupported or the payload
    /// does not parse.
    pub async fn decode<T: serde::de::DeserializeOwned>(self) -> Result<T, Error> {
        let content_type = self.content_type().to_string();
        let body = self.bytes().await?;
        if is_json_type(&content_type) {
            serde_json::from_slice(&body).map_err(|e| Error::decode(&content_type, e))
        } else if is_xml_type(&content_type) {
            let text = String::from_utf8(body).map_err(|e| Error::decode(&content_type, e))?;
            quick_xml::de::from_str(&text).map_err(|e| Error::decode(&content_type, e))
        } else {
            Err(Error::decode(
                &content_type,
                "unsupported content type for decoding",
            ))
        }
    }

    /// Streams the body line by line, invoking `f` with each line (without
    /// its trailing `\n`/`\r\n`) and its zero-based index. Returns the number
    /// of lines seen.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] when the body stream fails mid-way.
    pub async fn read_lines<F>(self, mut f: F) -> Result<u64, Error>
    where
        F: FnMut(&[u8], u64),
    {
        let url = self.url.to_string();
        let mut stream = self.inner.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut count: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::read(&url, e))?;
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                f(&line, count);
                count += 1;
            }
        }
        if !pending.is_empty() {
            f(&pending, count);
            count += 1;
        }
        Ok(count)
    }
}

/// Extracts the `name=value` pair of each `Set-Cookie` header.
fn cookies_from_headers(headers: &HeaderMap) -> CookieMap {
    let mut cookies = CookieMap::new();
    for value in headers.get_all(SET_COOKIE) {
        let Ok(raw) = value.to_str() else { continue };
        let pair = raw.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            cookies.set(name.trim(), value.trim());
        }
    }
    cookies
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_cookies_from_headers_strips_attributes() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("session=abc; Path=/; HttpOnly"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark"));

        let cookies = cookies_from_headers(&headers);
        assert_eq!(cookies.get("session"), Some("abc"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_cookies_from_headers_ignores_malformed() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("no-equals-sign"));
        assert!(cookies_from_headers(&headers).is_empty());
    }
}
