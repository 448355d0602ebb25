//! Fluent client configuration and the request surface.
//!
//! A [`ClientBuilder`] collects configuration and is consumed by
//! [`ClientBuilder::build`]; the resulting [`Client`] is frozen and cheap to
//! clone. All per-call state lives in the pipeline, so one client can serve
//! concurrent requests.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::body::{Body, FILE_PARAM_PREFIX, MultipartForm, encode_body};
use crate::cache::Cache;
use crate::cookie::CookieMap;
use crate::downloader::Downloader;
use crate::error::{BoxError, Error};
use crate::hooks::{self, Hooks};
use crate::middleware::Middleware;
use crate::redirect::RedirectPolicy;
use crate::request::Request;
use crate::response::Response;
use crate::util;

/// Callback producing a `(name, value)` pair per request.
pub type KvFn = Arc<dyn Fn() -> (String, String) + Send + Sync>;

const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(2000);
const DEFAULT_USER_AGENT: &str = concat!("reqkit/", env!("CARGO_PKG_VERSION"));

const CONTENT_TYPE_JSON_UTF8: &str = "application/json; charset=UTF-8";
const CONTENT_TYPE_XML_UTF8: &str = "application/xml; charset=UTF-8";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Fluent configuration for a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    query: Vec<(String, String)>,
    query_fns: Vec<KvFn>,
    headers: Vec<(String, String)>,
    header_fns: Vec<KvFn>,
    cookies: CookieMap,
    retry: Option<(u32, Duration)>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    proxy: Option<String>,
    redirect: RedirectPolicy,
    cookie_store: bool,
    debug: bool,
    hooks: Hooks,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("retry", &self.retry)
            .field("redirect", &self.redirect)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix prepended to every request URI.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Query pair appended to every request URL.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Callback producing a query pair per request (e.g. rotating signatures).
    #[must_use]
    pub fn query_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> (String, String) + Send + Sync + 'static,
    {
        self.query_fns.push(Arc::new(f));
        self
    }

    /// Default header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds several default headers at once.
    #[must_use]
    pub fn headers<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in pairs {
            self.headers.push((name.into(), value.into()));
        }
        self
    }

    /// Callback producing a header pair per request.
    #[must_use]
    pub fn header_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> (String, String) + Send + Sync + 'static,
    {
        self.header_fns.push(Arc::new(f));
        self
    }

    /// Default `Content-Type` for request bodies.
    #[must_use]
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Sends bodies as `application/json; charset=UTF-8`.
    #[must_use]
    pub fn as_json(self) -> Self {
        self.content_type(CONTENT_TYPE_JSON_UTF8)
    }

    /// Sends bodies as `application/xml; charset=UTF-8`.
    #[must_use]
    pub fn as_xml(self) -> Self {
        self.content_type(CONTENT_TYPE_XML_UTF8)
    }

    /// Sends bodies as `application/x-www-form-urlencoded`.
    #[must_use]
    pub fn as_form(self) -> Self {
        self.content_type(CONTENT_TYPE_FORM)
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        self.header(USER_AGENT.as_str(), user_agent)
    }

    /// Sets a browser `User-Agent` picked from the rotation pool.
    #[must_use]
    pub fn random_user_agent(self) -> Self {
        self.user_agent(util::random_user_agent())
    }

    /// Sets HTTP basic authentication credentials.
    #[must_use]
    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let credentials = STANDARD.encode(format!("{user}:{password}"));
        self.header(AUTHORIZATION.as_str(), format!("Basic {credentials}"))
    }

    /// Sets a `Bearer` authorization token.
    #[must_use]
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.token(token, "Bearer")
    }

    /// Sets an authorization token with an explicit scheme.
    #[must_use]
    pub fn token(self, token: impl AsRef<str>, scheme: &str) -> Self {
        self.header(
            AUTHORIZATION.as_str(),
            format!("{scheme} {}", token.as_ref()),
        )
    }

    /// Adds a cookie sent with every request.
    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.set(name, value);
        self
    }

    /// Merges a cookie map into the client's default cookies.
    #[must_use]
    pub fn cookies(mut self, cookies: &CookieMap) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Parses a `Cookie` header style string into the default cookies.
    #[must_use]
    pub fn cookie_string(mut self, raw: &str) -> Self {
        self.cookies.extend(&CookieMap::parse(raw));
        self
    }

    /// Persists cookies per host through `cache`: responses that set cookies
    /// store them (JSON-serialized, under the hashed host), and later
    /// requests to the same host replay them as a `Cookie` header.
    #[must_use]
    pub fn cookie_cache(mut self, cache: Arc<dyn Cache>, ttl: Option<Duration>) -> Self {
        self.hooks
            .after_request
            .push(hooks::cookie_cache_load(Arc::clone(&cache)));
        self.hooks
            .response
            .push(hooks::cookie_cache_store(cache, ttl));
        self
    }

    /// Retry policy for transport errors: `count` retries with a fixed `wait`
    /// between attempts. Defaults to 3 retries every 2 seconds.
    #[must_use]
    pub fn retry(mut self, count: u32, wait: Duration) -> Self {
        self.retry = Some((count, wait));
        self
    }

    /// Total per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Connection establishment timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Routes all requests through a proxy (`http`, `https` or `socks5` URL).
    #[must_use]
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy = Some(proxy_url.into());
        self
    }

    /// Redirect policy; defaults to reqwest's standard behavior.
    #[must_use]
    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = policy;
        self
    }

    /// Enables reqwest's in-memory cookie jar ("browser mode").
    #[must_use]
    pub fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Logs request and response summaries at debug level.
    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Registers a hook run before each request is built.
    #[must_use]
    pub fn on_before_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&Client) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.before_request.push(Arc::new(f));
        self
    }

    /// Registers a hook run after each request is built, before dispatch.
    #[must_use]
    pub fn on_after_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&Client, &mut Request) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.after_request.push(Arc::new(f));
        self
    }

    /// Registers a hook run after each successful round-trip.
    #[must_use]
    pub fn on_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Client, &Request, &Response) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hooks.response.push(Arc::new(f));
        self
    }

    /// Registers a terminal observer for successful calls.
    #[must_use]
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&Client, &Response) + Send + Sync + 'static,
    {
        self.hooks.success.push(Arc::new(f));
        self
    }

    /// Registers a terminal observer for failed calls.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&Client, Option<&Request>, &Error) + Send + Sync + 'static,
    {
        self.hooks.error.push(Arc::new(f));
        self
    }

    /// Appends a middleware to the dispatch chain.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Builds the frozen client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Header`] for malformed default headers and
    /// [`Error::Builder`] when the underlying HTTP client cannot be
    /// constructed (e.g. an invalid proxy URL).
    pub fn build(self) -> Result<Client, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|_| Error::Header {
                name: name.clone(),
            })?;
            let header_value = HeaderValue::try_from(value.as_str()).map_err(|_| {
                Error::Header { name: name.clone() }
            })?;
            headers.insert(header_name, header_value);
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }

        let mut http = reqwest::Client::builder().redirect(self.redirect.into_reqwest());
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            http = http.connect_timeout(timeout);
        }
        if let Some(proxy_url) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|source| Error::Builder { source })?;
            http = http.proxy(proxy);
        }
        if self.cookie_store {
            http = http.cookie_store(true);
        }
        let http = http.build().map_err(|source| Error::Builder { source })?;

        let (retry_count, retry_wait) = self.retry.unwrap_or((DEFAULT_RETRY_COUNT, DEFAULT_RETRY_WAIT));
        Ok(Client {
            http,
            base_url: self.base_url,
            query: Arc::new(self.query),
            query_fns: Arc::new(self.query_fns),
            headers,
            header_fns: Arc::new(self.header_fns),
            cookies: self.cookies,
            retry_count,
            retry_wait,
            debug: self.debug,
            hooks: self.hooks,
            middlewares: self.middlewares.into(),
            attempts: Arc::new(AtomicU32::new(0)),
        })
    }
}

/// A frozen HTTP client with hooks, middleware and a retry policy.
#[derive(Clone)]
pub struct Client {
    pub(crate) http: reqwest::Client,
    base_url: Option<String>,
    query: Arc<Vec<(String, String)>>,
    query_fns: Arc<Vec<KvFn>>,
    headers: HeaderMap,
    header_fns: Arc<Vec<KvFn>>,
    cookies: CookieMap,
    pub(crate) retry_count: u32,
    pub(crate) retry_wait: Duration,
    pub(crate) debug: bool,
    pub(crate) hooks: Hooks,
    pub(crate) middlewares: Arc<[Arc<dyn Middleware>]>,
    pub(crate) attempts: Arc<AtomicU32>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("retry_count", &self.retry_count)
            .field("retry_wait", &self.retry_wait)
            .field("hooks", &self.hooks)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Starts building a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configured base URL, if any.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Number of retries configured for transport errors.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Fixed wait between retry attempts.
    #[must_use]
    pub fn retry_wait(&self) -> Duration {
        self.retry_wait
    }

    /// Total transport attempts made by this client (shared across clones).
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Builds the outgoing request: merges the base URL and default scheme,
    /// client query pairs and callbacks, headers and cookies, and encodes
    /// the body against the effective content type.
    pub(crate) fn prepare_request(
        &self,
        method: &Method,
        uri: &str,
        body: Body,
        content_type_override: Option<&str>,
    ) -> Result<Request, Error> {
        let mut target = uri.trim().to_string();
        if let Some(base) = &self.base_url {
            target = format!("{base}{target}");
        }
        if !target.contains("://") {
            target = format!("http://{target}");
        }
        let mut url = Url::parse(&target).map_err(|_| Error::invalid_url(&target))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in self.query.iter() {
                pairs.append_pair(name, value);
            }
            for query_fn in self.query_fns.iter() {
                let (name, value) = query_fn();
                pairs.append_pair(&name, &value);
            }
        }

        let content_type = content_type_override.map(str::to_string).or_else(|| {
            self.headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
        let encoded = encode_body(method, content_type.as_deref(), body)?;
        if let Some(params) = encoded.query {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{params}"),
                _ => params,
            };
            url.set_query(Some(&merged));
        }

        let mut headers = self.headers.clone();
        if let Some(ct) = content_type_override {
            let value = HeaderValue::try_from(ct).map_err(|_| Error::Header {
                name: CONTENT_TYPE.as_str().to_string(),
            })?;
            headers.insert(CONTENT_TYPE, value);
        }
        for header_fn in self.header_fns.iter() {
            let (name, value) = header_fn();
            let header_name =
                HeaderName::try_from(name.as_str()).map_err(|_| Error::Header {
                    name: name.clone(),
                })?;
            let header_value =
                HeaderValue::try_from(value.as_str()).map_err(|_| Error::Header {
                    name: name.clone(),
                })?;
            headers.insert(header_name, header_value);
        }
        if !self.cookies.is_empty() {
            let value = HeaderValue::try_from(self.cookies.encode()).map_err(|_| {
                Error::Header {
                    name: COOKIE.as_str().to_string(),
                }
            })?;
            headers.insert(COOKIE, value);
        }
        if let Some(detected) = encoded.detected_content_type {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(detected));
            }
        }

        Ok(Request::new(method.clone(), url, headers, encoded.bytes))
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn get(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::GET, uri, body).await
    }

    /// Sends a GET request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn get_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::GET, uri, body).await
    }

    /// Sends a GET request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn get_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::GET, uri, body).await
    }

    /// Sends a POST request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn post(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::POST, uri, body).await
    }

    /// Sends a POST request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn post_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::POST, uri, body).await
    }

    /// Sends a POST request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn post_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::POST, uri, body).await
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn put(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::PUT, uri, body).await
    }

    /// Sends a PUT request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn put_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::PUT, uri, body).await
    }

    /// Sends a PUT request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn put_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::PUT, uri, body).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn delete(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::DELETE, uri, body).await
    }

    /// Sends a DELETE request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn delete_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::DELETE, uri, body).await
    }

    /// Sends a DELETE request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn delete_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::DELETE, uri, body).await
    }

    /// Sends a HEAD request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn head(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::HEAD, uri, body).await
    }

    /// Sends a HEAD request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn head_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::HEAD, uri, body).await
    }

    /// Sends a HEAD request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn head_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::HEAD, uri, body).await
    }

    /// Sends a PATCH request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn patch(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::PATCH, uri, body).await
    }

    /// Sends a PATCH request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn patch_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::PATCH, uri, body).await
    }

    /// Sends a PATCH request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn patch_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::PATCH, uri, body).await
    }

    /// Sends an OPTIONS request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn options(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::OPTIONS, uri, body).await
    }

    /// Sends an OPTIONS request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn options_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::OPTIONS, uri, body).await
    }

    /// Sends an OPTIONS request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn options_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::OPTIONS, uri, body).await
    }

    /// Sends a TRACE request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn trace(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::TRACE, uri, body).await
    }

    /// Sends a TRACE request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn trace_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::TRACE, uri, body).await
    }

    /// Sends a TRACE request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn trace_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::TRACE, uri, body).await
    }

    /// Sends a CONNECT request.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn connect(&self, uri: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Method::CONNECT, uri, body).await
    }

    /// Sends a CONNECT request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_decode`].
    pub async fn connect_decode<T: DeserializeOwned>(
        &self,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute_decode(Method::CONNECT, uri, body).await
    }

    /// Sends a CONNECT request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute_bytes`].
    pub async fn connect_bytes(&self, uri: &str, body: impl Into<Body>) -> Result<Vec<u8>, Error> {
        self.execute_bytes(Method::CONNECT, uri, body).await
    }

    /// Serializes `data` as JSON and POSTs it with a JSON content type,
    /// regardless of the client's default content type.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`]; additionally returns [`Error::Encode`] when
    /// `data` cannot be serialized.
    pub async fn post_json<T: Serialize>(&self, uri: &str, data: &T) -> Result<Response, Error> {
        let body = Body::json(data)?;
        self.execute_with(Method::POST, uri, body, Some(CONTENT_TYPE_JSON_UTF8))
            .await
    }

    /// POSTs fields as `multipart/form-data` with a random boundary.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`].
    pub async fn post_form<K, V>(
        &self,
        uri: &str,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Response, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = MultipartForm::new();
        for (name, value) in fields {
            form.add_text(name.as_ref(), value.as_ref());
        }
        let (content_type, bytes) = form.finish();
        self.execute_with(Method::POST, uri, Body::Bytes(bytes), Some(&content_type))
            .await
    }

    /// Like [`Client::post_form`], but values prefixed with `@file:` are read
    /// from the local filesystem and attached as file parts.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`]; additionally returns [`Error::Io`] when a
    /// referenced file cannot be read.
    pub async fn post_form_with_files<K, V>(
        &self,
        uri: &str,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Response, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut form = MultipartForm::new();
        for (name, value) in fields {
            let name = name.as_ref();
            let value = value.as_ref();
            if let Some(raw_path) = value.strip_prefix(FILE_PARAM_PREFIX) {
                let path = PathBuf::from(raw_path.trim());
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::io(&path, e))?;
                form.add_file_bytes(name, name, &content);
            } else {
                form.add_text(name, value);
            }
        }
        let (content_type, bytes) = form.finish();
        self.execute_with(Method::POST, uri, Body::Bytes(bytes), Some(&content_type))
            .await
    }

    /// Downloads `url` to `dest` with the segmented downloader at its default
    /// concurrency.
    ///
    /// # Errors
    ///
    /// See [`Downloader::run`].
    pub async fn download(&self, url: &str, dest: impl Into<PathBuf>) -> Result<(), Error> {
        Downloader::new(self.clone(), url, dest).run().await
    }
}
