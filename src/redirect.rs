//! Redirect policies mapped onto reqwest's redirect handling.

use std::collections::HashSet;
use std::sync::Arc;

use url::Url;

use crate::error::BoxError;

/// Callback deciding whether a redirect may be followed.
///
/// Receives the next URL and the chain of previously visited URLs; returning
/// an error stops the redirect and fails the request.
pub type RedirectFn = dyn Fn(&Url, &[Url]) -> Result<(), BoxError> + Send + Sync;

/// Redirect behavior of a client.
#[derive(Clone, Default)]
pub struct RedirectPolicy {
    kind: Kind,
}

#[derive(Clone, Default)]
enum Kind {
    /// reqwest's default (follow up to 10 hops).
    #[default]
    Default,
    /// Never follow redirects.
    None,
    /// Follow at most `n` hops.
    Limit(usize),
    /// Follow only redirects targeting the listed hosts.
    Domains(HashSet<String>),
    /// User-supplied decision callback.
    Custom(Arc<RedirectFn>),
}

impl std::fmt::Debug for RedirectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            Kind::Default => f.write_str("RedirectPolicy::Default"),
            Kind::None => f.write_str("RedirectPolicy::None"),
            Kind::Limit(n) => write!(f, "RedirectPolicy::Limit({n})"),
            Kind::Domains(hosts) => write!(f, "RedirectPolicy::Domains({hosts:?})"),
            Kind::Custom(_) => f.write_str("RedirectPolicy::Custom"),
        }
    }
}

impl RedirectPolicy {
    /// reqwest's default behavior.
    #[must_use]
    pub fn default_policy() -> Self {
        Self { kind: Kind::Default }
    }

    /// Disables redirects entirely; 3xx responses are returned as-is.
    #[must_use]
    pub fn none() -> Self {
        Self { kind: Kind::None }
    }

    /// Follows at most `n` redirect hops; exceeding the budget fails the
    /// request.
    #[must_use]
    pub fn limit(n: usize) -> Self {
        Self {
            kind: Kind::Limit(n),
        }
    }

    /// Allows redirects only to the listed hostnames (case-insensitive).
    #[must_use]
    pub fn domains<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: Kind::Domains(
                hosts
                    .into_iter()
                    .map(|h| h.into().to_ascii_lowercase())
                    .collect(),
            ),
        }
    }

    /// Delegates the decision to a callback.
    #[must_use]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Url, &[Url]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            kind: Kind::Custom(Arc::new(f)),
        }
    }

    pub(crate) fn into_reqwest(self) -> reqwest::redirect::Policy {
        use reqwest::redirect::Policy;
        match self.kind {
            Kind::Default => Policy::default(),
            Kind::None => Policy::none(),
            Kind::Limit(n) => Policy::custom(move |attempt| {
                if attempt.previous().len() > n {
                    attempt.error(format!("stopped after {n} redirects"))
                } else {
                    attempt.follow()
                }
            }),
            Kind::Domains(hosts) => Policy::custom(move |attempt| {
                let allowed = attempt
                    .url()
                    .host_str()
                    .is_some_and(|host| hosts.contains(&host.to_ascii_lowercase()));
                if allowed {
                    attempt.follow()
                } else {
                    attempt.error("redirect target not in the allowed domain list".to_string())
                }
            }),
            Kind::Custom(f) => Policy::custom(move |attempt| {
                let previous = attempt.previous().to_vec();
                match f(attempt.url(), &previous) {
                    Ok(()) => attempt.follow(),
                    Err(e) => attempt.error(e),
                }
            }),
        }
    }
}
