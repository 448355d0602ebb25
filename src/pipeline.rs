//! Per-call execution: hooks, middleware dispatch and the retrying
//! transport call.
//!
//! Every call walks the same state machine: before-request hooks, request
//! build, after-request hooks, middleware chain (or the transport call
//! directly), response hooks, then exactly one of the terminal success/error
//! hook sets. Only transport errors are retried; hook and build failures
//! abort immediately.

use std::sync::atomic::Ordering;
use std::time::Instant;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::body::Body;
use crate::client::Client;
use crate::error::{Error, HookStage};
use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;

impl Client {
    /// Executes a request through the full pipeline.
    ///
    /// HTTP error statuses do not fail the call; use
    /// [`Response::error_for_status`] to convert them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hook`] when a hook aborts, [`Error::InvalidUrl`] /
    /// [`Error::Encode`] / [`Error::Header`] when the request cannot be
    /// built, and [`Error::Transport`] when the network call still fails
    /// after all retries.
    #[instrument(level = "debug", skip(self, body), fields(%method, uri))]
    pub async fn execute(
        &self,
        method: Method,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<Response, Error> {
        self.execute_with(method, uri, body.into(), None).await
    }

    /// Executes a request and decodes the response body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`] and [`Response::decode`].
    pub async fn execute_decode<T: DeserializeOwned>(
        &self,
        method: Method,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<T, Error> {
        self.execute(method, uri, body).await?.decode().await
    }

    /// Executes a request and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// See [`Client::execute`] and [`Response::bytes`].
    pub async fn execute_bytes(
        &self,
        method: Method,
        uri: &str,
        body: impl Into<Body>,
    ) -> Result<Vec<u8>, Error> {
        self.execute(method, uri, body).await?.bytes().await
    }

    pub(crate) async fn execute_with(
        &self,
        method: Method,
        uri: &str,
        body: Body,
        content_type_override: Option<&str>,
    ) -> Result<Response, Error> {
        match self
            .run_pipeline(&method, uri, body, content_type_override)
            .await
        {
            Ok(response) => {
                for hook in &self.hooks.success {
                    hook(self, &response);
                }
                Ok(response)
            }
            Err((request, error)) => {
                for hook in &self.hooks.error {
                    hook(self, request.as_ref(), &error);
                }
                Err(error)
            }
        }
    }

    /// The pipeline proper. Failures carry the built request (when one
    /// exists) so error hooks can observe it.
    async fn run_pipeline(
        &self,
        method: &Method,
        uri: &str,
        body: Body,
        content_type_override: Option<&str>,
    ) -> Result<Response, (Option<Request>, Error)> {
        for hook in &self.hooks.before_request {
            if let Err(e) = hook(self) {
                return Err((None, Error::hook(HookStage::BeforeRequest, e)));
            }
        }

        let mut request = match self.prepare_request(method, uri, body, content_type_override) {
            Ok(request) => request,
            Err(e) => return Err((None, e)),
        };

        for hook in &self.hooks.after_request {
            if let Err(e) = hook(self, &mut request) {
                return Err((Some(request), Error::hook(HookStage::AfterRequest, e)));
            }
        }

        if self.debug {
            debug!(
                method = %request.method(),
                url = %request.url(),
                body_len = request.body().len(),
                "dispatching request"
            );
        }

        let result = if self.middlewares.is_empty() {
            self.transport_call(request.clone()).await
        } else {
            Next::new(self, &self.middlewares).run(request.clone()).await
        };
        let response = match result {
            Ok(response) => response,
            Err(e) => return Err((Some(request), e)),
        };

        if self.debug {
            debug!(
                status = %response.status(),
                attempt = response.attempt(),
                elapsed = ?response.elapsed(),
                "received response"
            );
        }

        for hook in &self.hooks.response {
            if let Err(e) = hook(self, &request, &response) {
                return Err((Some(request), Error::hook(HookStage::Response, e)));
            }
        }
        Ok(response)
    }

    /// The raw network primitive: sends the buffered request, replaying it
    /// byte-for-byte on transport errors until the retry budget is spent.
    /// Downloader segments call this directly, bypassing hooks and
    /// middleware.
    pub(crate) async fn transport_call(&self, request: Request) -> Result<Response, Error> {
        let started = Instant::now();
        let mut retries_left = self.retry_count;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.attempts.fetch_add(1, Ordering::Relaxed);
            let outbound = request.to_reqwest(&self.http)?;
            match self.http.execute(outbound).await {
                Ok(inner) => {
                    return Ok(Response::new(
                        inner,
                        request.method().clone(),
                        request.url().clone(),
                        request.body().to_vec(),
                        attempt,
                        started.elapsed(),
                    ));
                }
                Err(source) => {
                    if retries_left == 0 {
                        return Err(Error::transport(
                            request.method().as_str(),
                            request.url().as_str(),
                            attempt,
                            source,
                        ));
                    }
                    retries_left -= 1;
                    warn!(
                        method = %request.method(),
                        url = %request.url(),
                        attempt,
                        wait = ?self.retry_wait,
                        error = %source,
                        "transport error, retrying"
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
            }
        }
    }
}
