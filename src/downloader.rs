//! Segmented concurrent downloader.
//!
//! The downloader probes the target with a HEAD request, then either streams
//! it with a single GET (no range support) or splits the declared length into
//! contiguous segments fetched concurrently with `Range` requests and merged
//! in index order. Segment requests go through the client's raw transport
//! call only; hooks and middleware do not see them.

use std::path::PathBuf;

use reqwest::Method;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, HeaderValue, RANGE, USER_AGENT};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, instrument};
use url::Url;

use crate::client::Client;
use crate::error::Error;
use crate::request::Request;
use crate::util;

/// One ranged slice of the file; `from..=to` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    index: usize,
    from: u64,
    to: u64,
}

impl Segment {
    fn len(self) -> u64 {
        self.to - self.from + 1
    }
}

/// Concurrent downloader for a single URL.
#[derive(Debug)]
pub struct Downloader {
    client: Client,
    url: String,
    dest: PathBuf,
    concurrency: usize,
    user_agent: String,
}

impl Downloader {
    /// Creates a downloader writing `url` to `dest`.
    ///
    /// Concurrency defaults to the machine's available parallelism and the
    /// User-Agent to a random browser string.
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        let concurrency =
            std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self {
            client,
            url: url.into(),
            dest: dest.into(),
            concurrency,
            user_agent: util::random_user_agent().to_string(),
        }
    }

    /// Number of concurrent segment tasks (minimum 1).
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Overrides the User-Agent sent with probe and segment requests.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Runs the download to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] for non-2xx probe or segment responses,
    /// [`Error::MissingContentLength`] when the probe declares no usable
    /// length, [`Error::PartLength`] when a segment returns the wrong byte
    /// count, [`Error::Incomplete`] when the assembled file does not match
    /// the declared length, and [`Error::Io`] for filesystem failures. The
    /// first failed segment aborts the remaining tasks.
    #[instrument(level = "debug", skip(self), fields(url = %self.url, dest = %self.dest.display()))]
    pub async fn run(self) -> Result<(), Error> {
        let probe = self.segment_request(Method::HEAD, None)?;
        let response = self.client.transport_call(probe).await?.error_for_status()?;
        let total: u64 = response
            .header(CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::MissingContentLength {
                url: self.url.clone(),
            })?;
        let ranged = response.header(ACCEPT_RANGES.as_str()) == Some("bytes");
        drop(response);

        if total == 0 {
            tokio::fs::write(&self.dest, [])
                .await
                .map_err(|e| Error::io(&self.dest, e))?;
            return Ok(());
        }
        if !ranged {
            debug!(total, "no range support, falling back to a single GET");
            return self.sequential(total).await;
        }
        self.segmented(total).await
    }

    /// Builds a raw probe/segment request with the downloader's User-Agent.
    fn segment_request(&self, method: Method, range: Option<(u64, u64)>) -> Result<Request, Error> {
        let url = Url::parse(&self.url).map_err(|_| Error::invalid_url(&self.url))?;
        let mut headers = HeaderMap::new();
        let agent =
            HeaderValue::try_from(self.user_agent.as_str()).map_err(|_| Error::Header {
                name: USER_AGENT.as_str().to_string(),
            })?;
        headers.insert(USER_AGENT, agent);
        if let Some((from, to)) = range {
            let value =
                HeaderValue::try_from(format!("bytes={from}-{to}")).map_err(|_| Error::Header {
                    name: RANGE.as_str().to_string(),
                })?;
            headers.insert(RANGE, value);
        }
        Ok(Request::new(method, url, headers, Vec::new()))
    }

    /// Single-GET fallback for servers without range support.
    async fn sequential(self, total: u64) -> Result<(), Error> {
        let request = self.segment_request(Method::GET, None)?;
        let response = self.client.transport_call(request).await?.error_for_status()?;
        let body = response.bytes().await?;
        tokio::fs::write(&self.dest, &body)
            .await
            .map_err(|e| Error::io(&self.dest, e))?;
        let actual = body.len() as u64;
        if actual != total {
            let _ = tokio::fs::remove_file(&self.dest).await;
            return Err(Error::incomplete(total, actual));
        }
        Ok(())
    }

    /// Fans segments out over a `JoinSet` and merges them in index order.
    async fn segmented(self, total: u64) -> Result<(), Error> {
        let segments = plan_segments(total, self.concurrency);
        debug!(segments = segments.len(), total, "starting segmented download");

        let mut tasks: JoinSet<Result<(usize, Vec<u8>), Error>> = JoinSet::new();
        for segment in &segments {
            let client = self.client.clone();
            let request = self.segment_request(Method::GET, Some((segment.from, segment.to)))?;
            let segment = *segment;
            tasks.spawn(async move {
                let response = client.transport_call(request).await?.error_for_status()?;
                let data = response.bytes().await?;
                let actual = data.len() as u64;
                if actual != segment.len() {
                    return Err(Error::part_length(segment.index, segment.len(), actual));
                }
                Ok((segment.index, data))
            });
        }

        let mut slots: Vec<Option<Vec<u8>>> = vec![None; segments.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, data))) => slots[index] = Some(data),
                Ok(Err(e)) => {
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(Error::Task {
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut file = tokio::fs::File::create(&self.dest)
            .await
            .map_err(|e| Error::io(&self.dest, e))?;
        let mut written: u64 = 0;
        for slot in slots {
            let Some(data) = slot else {
                let _ = tokio::fs::remove_file(&self.dest).await;
                return Err(Error::incomplete(total, written));
            };
            file.write_all(&data)
                .await
                .map_err(|e| Error::io(&self.dest, e))?;
            written += data.len() as u64;
        }
        file.flush().await.map_err(|e| Error::io(&self.dest, e))?;
        if written != total {
            let _ = tokio::fs::remove_file(&self.dest).await;
            return Err(Error::incomplete(total, written));
        }
        Ok(())
    }
}

/// Partitions `[0, total)` into at most `concurrency` contiguous segments.
/// The last segment absorbs the division remainder. `total` must be > 0.
fn plan_segments(total: u64, concurrency: usize) -> Vec<Segment> {
    let parts = u64::try_from(concurrency.max(1)).unwrap_or(1).min(total);
    let base = total / parts;
    let mut segments = Vec::with_capacity(usize::try_from(parts).unwrap_or(1));
    for i in 0..parts {
        let from = i * base;
        let to = if i == parts - 1 {
            total - 1
        } else {
            from + base - 1
        };
        segments.push(Segment {
            index: usize::try_from(i).unwrap_or_default(),
            from,
            to,
        });
    }
    segments
}
