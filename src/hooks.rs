//! Callback registry invoked around request execution.
//!
//! Hooks are registered on the builder and frozen into the client. Four kinds
//! run in registration order: before-request (client-level), after-request
//! (request-level, may mutate the request), response (observation after a
//! successful round-trip) and the terminal success/error observers. Exactly
//! one of the terminal sets fires once per call.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::Cache;
use crate::client::Client;
use crate::cookie::CookieMap;
use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::Response;
use crate::util::sha256_hex;

/// Client-level callback run before the request is built.
pub type BeforeRequestHook = Arc<dyn Fn(&Client) -> Result<(), BoxError> + Send + Sync>;

/// Request-level callback run after the request is built, before dispatch.
pub type AfterRequestHook =
    Arc<dyn Fn(&Client, &mut Request) -> Result<(), BoxError> + Send + Sync>;

/// Callback run after a successful transport round-trip.
pub type ResponseHook =
    Arc<dyn Fn(&Client, &Request, &Response) -> Result<(), BoxError> + Send + Sync>;

/// Terminal observer for calls that completed without error.
pub type SuccessHook = Arc<dyn Fn(&Client, &Response) + Send + Sync>;

/// Terminal observer for failed calls. The request is absent when the
/// failure happened before it was built.
pub type ErrorHook = Arc<dyn Fn(&Client, Option<&Request>, &Error) + Send + Sync>;

/// The frozen hook lists carried by a built client.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub before_request: Vec<BeforeRequestHook>,
    pub after_request: Vec<AfterRequestHook>,
    pub response: Vec<ResponseHook>,
    pub success: Vec<SuccessHook>,
    pub error: Vec<ErrorHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_request", &self.before_request.len())
            .field("after_request", &self.after_request.len())
            .field("response", &self.response.len())
            .field("success", &self.success.len())
            .field("error", &self.error.len())
            .finish()
    }
}

/// Builds the after-request half of the cookie persistence pair: when the
/// cache holds a cookie map for the request's host, it is injected as the
/// `Cookie` header.
pub(crate) fn cookie_cache_load(cache: Arc<dyn Cache>) -> AfterRequestHook {
    Arc::new(move |_client, request| {
        let Some(host) = request.url().host_str().map(str::to_string) else {
            return Ok(());
        };
        let key = sha256_hex(&host);
        if let Ok(raw) = cache.get(&key) {
            let cookies: CookieMap = serde_json::from_str(&raw)?;
            if !cookies.is_empty() {
                debug!(host, "injecting cached cookies");
                request.set_header("cookie", &cookies.encode())?;
            }
        }
        Ok(())
    })
}

/// Builds the response half of the cookie persistence pair: when no entry
/// exists for the host yet, the response's cookies are stored as JSON.
pub(crate) fn cookie_cache_store(cache: Arc<dyn Cache>, ttl: Option<Duration>) -> ResponseHook {
    Arc::new(move |_client, request, response| {
        let Some(host) = request.url().host_str().map(str::to_string) else {
            return Ok(());
        };
        let key = sha256_hex(&host);
        if !cache.has(&key) {
            let cookies = response.cookies();
            if !cookies.is_empty() {
                debug!(host, count = cookies.len(), "persisting response cookies");
                let raw = serde_json::to_string(&cookies)?;
                cache.set(&key, &raw, ttl)?;
            }
        }
        Ok(())
    })
}
