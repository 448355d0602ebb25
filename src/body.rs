//! Request body shapes and content-type-driven encoding.
//!
//! A [`Body`] is always encoded into a fully buffered byte vector before the
//! request is dispatched, so retries can replay it byte-for-byte.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use reqwest::Method;
use serde::Serialize;

use crate::error::Error;
use crate::util::{is_json_type, is_xml_type};

/// Value prefix marking a multipart field as a local file attachment.
pub const FILE_PARAM_PREFIX: &str = "@file:";

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Matches `key=value`-shaped text used for form auto-detection.
#[allow(clippy::expect_used)]
static FORM_PARAM_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w\[\]]+=.+").expect("form shape regex is valid") // Static pattern, safe to panic
});

/// A request body prior to encoding.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Raw bytes passed through verbatim.
    Bytes(Vec<u8>),
    /// Text passed through verbatim.
    Text(String),
    /// A JSON value, encoded according to the content type.
    Json(serde_json::Value),
    /// Name/value pairs, encoded as JSON or urlencoded form data.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Builds a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] when the value cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(Error::encode)
    }

    /// Builds an XML body from any serializable value.
    ///
    /// The value is serialized eagerly; the resulting text passes through the
    /// encoder verbatim under an XML content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] when the value cannot be represented as XML.
    pub fn xml<T: Serialize>(value: &T) -> Result<Self, Error> {
        quick_xml::se::to_string(value)
            .map(Self::Text)
            .map_err(Error::encode)
    }

    /// Builds a form body from name/value pairs.
    pub fn form<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns `true` when no body content is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes(b) => b.is_empty(),
            Self::Text(s) => s.is_empty(),
            Self::Json(v) => v.is_null(),
            Self::Form(p) => p.is_empty(),
        }
    }
}

impl From<()> for Body {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<&[u8]> for Body {
    fn from(b: &[u8]) -> Self {
        Self::Bytes(b.to_vec())
    }
}

impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<(String, String)>> for Body {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self::Form(pairs)
    }
}

impl From<&[(&str, &str)]> for Body {
    fn from(pairs: &[(&str, &str)]) -> Self {
        Self::form(pairs.iter().copied())
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Body {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self::form(pairs)
    }
}

impl From<HashMap<String, String>> for Body {
    fn from(map: HashMap<String, String>) -> Self {
        Self::form(map)
    }
}

/// Result of encoding a [`Body`] against a method and content type.
#[derive(Debug, Default)]
pub(crate) struct EncodedBody {
    /// The buffered body bytes sent with the request.
    pub bytes: Vec<u8>,
    /// Content type detected from the body shape, set only when the caller
    /// supplied none.
    pub detected_content_type: Option<&'static str>,
    /// Urlencoded params moved into the URL query (GET requests only).
    pub query: Option<String>,
}

/// Encodes a body for the given method and `Content-Type` header value.
///
/// JSON and XML content types serialize structured bodies with the matching
/// codec while strings and bytes pass through verbatim. Any other content
/// type urlencodes structured bodies; for GET requests the urlencoded params
/// are moved into the URL query instead.
pub(crate) fn encode_body(
    method: &Method,
    content_type: Option<&str>,
    body: Body,
) -> Result<EncodedBody, Error> {
    if body.is_empty() {
        return Ok(EncodedBody::default());
    }
    let content_type = content_type.unwrap_or_default();

    let bytes = if is_json_type(content_type) {
        encode_json(body)?
    } else if is_xml_type(content_type) {
        encode_xml(body)?
    } else {
        let encoded = encode_default(body);
        if *method == Method::GET {
            let query = String::from_utf8(encoded).map_err(Error::encode)?;
            return Ok(EncodedBody {
                bytes: Vec::new(),
                detected_content_type: None,
                query: Some(query),
            });
        }
        encoded
    };

    let detected = if content_type.is_empty() && *method != Method::GET {
        detect_content_type(&bytes)
    } else {
        None
    };
    Ok(EncodedBody {
        bytes,
        detected_content_type: detected,
        query: None,
    })
}

fn encode_json(body: Body) -> Result<Vec<u8>, Error> {
    match body {
        Body::Empty => Ok(Vec::new()),
        Body::Bytes(b) => Ok(b),
        Body::Text(s) => Ok(s.into_bytes()),
        Body::Json(v) => serde_json::to_vec(&v).map_err(Error::encode),
        Body::Form(pairs) => {
            let map: serde_json::Map<String, serde_json::Value> = pairs
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
            serde_json::to_vec(&map).map_err(Error::encode)
        }
    }
}

fn encode_xml(body: Body) -> Result<Vec<u8>, Error> {
    match body {
        Body::Empty => Ok(Vec::new()),
        Body::Bytes(b) => Ok(b),
        Body::Text(s) => Ok(s.into_bytes()),
        // Maps have no natural XML root element; callers serialize structured
        // values up front with Body::xml.
        Body::Json(_) | Body::Form(_) => Err(Error::encode(
            "structured XML bodies must be pre-serialized with Body::xml",
        )),
    }
}

fn encode_default(body: Body) -> Vec<u8> {
    match body {
        Body::Empty => Vec::new(),
        Body::Bytes(b) => b,
        Body::Text(s) => s.into_bytes(),
        Body::Json(serde_json::Value::Object(map)) => {
            crate::util::http_build_query(&map).into_bytes()
        }
        Body::Json(v) => v.to_string().into_bytes(),
        Body::Form(pairs) => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (k, v) in &pairs {
                serializer.append_pair(k, v);
            }
            serializer.finish().into_bytes()
        }
    }
}

/// Sniffs a content type from the encoded bytes: valid JSON starting with
/// `{`/`[` maps to JSON, `key=value`-shaped text maps to form data.
fn detect_content_type(bytes: &[u8]) -> Option<&'static str> {
    let first = bytes.first()?;
    if (*first == b'{' || *first == b'[')
        && serde_json::from_slice::<serde::de::IgnoredAny>(bytes).is_ok()
    {
        return Some(CONTENT_TYPE_JSON);
    }
    let text = std::str::from_utf8(bytes).ok()?;
    if FORM_PARAM_SHAPE.is_match(text) {
        return Some(CONTENT_TYPE_FORM);
    }
    None
}

/// Buffered `multipart/form-data` encoder.
///
/// The whole form is materialized into memory so the resulting request body
/// can be replayed across retries.
#[derive(Debug)]
pub struct MultipartForm {
    boundary: String,
    buf: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Creates an empty form with a random boundary.
    #[must_use]
    pub fn new() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        Self {
            boundary: format!("----FormBoundary{suffix}"),
            buf: Vec::new(),
        }
    }

    /// The boundary separating form parts.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Appends a text field.
    pub fn add_text(&mut self, name: &str, value: &str) {
        self.buf
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Appends a file part with the given contents.
    pub fn add_file_bytes(&mut self, name: &str, filename: &str, content: &[u8]) {
        self.buf
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        self.buf
            .extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        self.buf.extend_from_slice(content);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Reads a local file and appends it as a file part.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the file cannot be read.
    pub fn add_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(name);
        self.add_file_bytes(name, filename, &content);
        Ok(())
    }

    /// Finalizes the form, returning its content type and buffered bytes.
    #[must_use]
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        let content_type = format!("multipart/form-data; boundary={}", self.boundary);
        (content_type, self.buf)
    }
}
