//! Middleware chain wrapping the transport call.
//!
//! The chain is immutable: each handler receives a [`Next`] holding the tail
//! of the chain and decides whether to forward the request. A handler can run
//! at most once per request, and returning without calling
//! [`Next::run`] short-circuits the rest of the chain and the transport call.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::client::Client;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// A handler wrapping request dispatch.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use reqkit::{Client, Error, Middleware, Next, Request, Response};
///
/// struct TraceHeader;
///
/// #[async_trait]
/// impl Middleware for TraceHeader {
///     async fn handle(
///         &self,
///         client: &Client,
///         mut request: Request,
///         next: Next<'_>,
///     ) -> Result<Response, Error> {
///         request.set_header("x-trace-id", "abc123")?;
///         next.run(request).await
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handles the request, typically forwarding it via `next.run(request)`.
    async fn handle(
        &self,
        client: &Client,
        request: Request,
        next: Next<'_>,
    ) -> Result<Response, Error>;
}

/// The remaining middleware chain, terminating in the transport call.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    client: &'a Client,
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(client: &'a Client, rest: &'a [Arc<dyn Middleware>]) -> Self {
        Self { client, rest }
    }

    /// Forwards the request to the rest of the chain.
    ///
    /// When no middleware remains, this performs the transport call with
    /// the client's retry policy.
    pub fn run(self, request: Request) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            match self.rest.split_first() {
                Some((head, rest)) => {
                    head.handle(self.client, request, Next::new(self.client, rest))
                        .await
                }
                None => self.client.transport_call(request).await,
            }
        })
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Next {{ remaining: {} }}", self.rest.len())
    }
}
