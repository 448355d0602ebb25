//! Hashing, encoding and query-string helpers shared across the crate.

use std::path::Path;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use rand::Rng;
use regex::Regex;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Matches the JSON content-type family, including `*+json` suffix types.
#[allow(clippy::expect_used)]
static JSON_CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(application|text)/(json|.*\+json|json\-.*)(;|$)")
        .expect("JSON content-type regex is valid") // Static pattern, safe to panic
});

/// Matches the XML content-type family, including `*+xml` suffix types.
#[allow(clippy::expect_used)]
static XML_CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(application|text)/(xml|.*\+xml)(;|$)")
        .expect("XML content-type regex is valid") // Static pattern, safe to panic
});

/// User agents rotated by [`random_user_agent`].
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Returns `true` when the content type is a JSON family type
/// (`application/json`, `text/json`, `*+json` suffixes, optional parameters).
#[must_use]
pub fn is_json_type(content_type: &str) -> bool {
    JSON_CONTENT_TYPE.is_match(content_type)
}

/// Returns `true` when the content type is an XML family type
/// (`application/xml`, `text/xml`, `*+xml` suffixes, optional parameters).
#[must_use]
pub fn is_xml_type(content_type: &str) -> bool {
    XML_CONTENT_TYPE.is_match(content_type)
}

/// Hex-encoded SHA-1 of the input.
#[must_use]
pub fn sha1_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(data.as_ref()))
}

/// Hex-encoded SHA-256 of the input.
#[must_use]
pub fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// URL-safe base64 encoding of a string.
#[must_use]
pub fn base64_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(data.as_ref())
}

/// Decodes a URL-safe base64 string back into UTF-8 text.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the input is not valid base64 or not UTF-8.
pub fn base64_decode(data: &str) -> Result<String, Error> {
    let bytes = URL_SAFE
        .decode(data)
        .map_err(|e| Error::decode("base64", e))?;
    String::from_utf8(bytes).map_err(|e| Error::decode("base64", e))
}

/// Standard base64 encoding of a file's contents.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read.
pub fn base64_file(path: impl AsRef<Path>) -> Result<String, Error> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    Ok(STANDARD.encode(bytes))
}

/// Percent-encodes a query component.
#[must_use]
pub fn url_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// Decodes a percent-encoded string.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the input contains invalid escapes.
pub fn url_decode(s: &str) -> Result<String, Error> {
    urlencoding::decode(s)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| Error::decode("percent-encoding", e))
}

/// Serializes a JSON object into a query string, expanding nested objects as
/// `key[sub]=value` and arrays as repeated keys.
#[must_use]
pub fn http_build_query(data: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut out = String::new();
    for (key, value) in data {
        push_query(&mut out, key, value);
    }
    out
}

fn push_query(out: &mut String, key: &str, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (sub, sub_value) in map {
                push_query(out, &format!("{key}[{sub}]"), sub_value);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                push_query(out, key, item);
            }
        }
        scalar => {
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(&url_encode(key));
            out.push('=');
            out.push_str(&url_encode(&scalar_string(scalar)));
        }
    }
}

/// Renders a scalar JSON value without the quoting `to_string` would add.
fn scalar_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Picks a browser User-Agent from a small rotation pool.
#[must_use]
pub fn random_user_agent() -> &'static str {
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}
