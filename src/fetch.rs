//! HTTP retrieval with bounded retries
//!
//! [`Retrieval`] is the seam between the harvester and the network. The
//! production implementation, [`HttpRetrieval`], shares one `reqwest::Client`
//! (connection pool and cookie jar) across all workers and wraps every request
//! in [`with_retry`].
//!
//! The configured timeout bounds each wait for progress (connecting, response
//! headers, the next body chunk), not the whole transfer, so a large EPUB on a
//! slow link completes as long as bytes keep arriving.

use crate::config::{HttpConfig, RetryConfig};
use crate::error::{Error, FetchError, Result};
use crate::retry::{IsRetryable, RetryFailure, Sleeper, TokioSleeper, with_retry};
use crate::store::remove_if_exists;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Fetches remote resources for the harvester
///
/// Implementations handle retries themselves; an `Err` means the resource is
/// given up on for this run.
#[async_trait]
pub trait Retrieval: Send + Sync {
    /// Fetch the whole body of `url` into memory
    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Bytes, FetchError>;

    /// Stream the body of `url` into `dest`, returning the number of bytes written
    ///
    /// On failure nothing is left at `dest`.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError>;
}

/// [`Retrieval`] over HTTP(S)
pub struct HttpRetrieval {
    client: reqwest::Client,
    timeout: Duration,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpRetrieval {
    /// Build the shared HTTP client
    ///
    /// # Errors
    /// Returns [`Error::Network`] if the client cannot be constructed (for
    /// example when the TLS backend fails to initialize).
    pub fn new(http: &HttpConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(http.cookies)
            .connect_timeout(http.timeout)
            .user_agent(http.user_agent.as_str())
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            timeout: http.timeout,
            retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the clock used between attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn stalled(&self, url: &str) -> FetchError {
        FetchError::Timeout {
            url: url.to_string(),
            after: self.timeout,
        }
    }

    async fn send(&self, url: &str) -> std::result::Result<reqwest::Response, FetchError> {
        let request = self.client.get(url).send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?,
            Err(_) => return Err(self.stalled(url)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Next body chunk, or `None` at the end of the body
    async fn next_chunk<S>(
        &self,
        url: &str,
        body: &mut S,
    ) -> std::result::Result<Option<Bytes>, FetchError>
    where
        S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
    {
        match tokio::time::timeout(self.timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
            Ok(Some(Err(source))) => Err(FetchError::Transport {
                url: url.to_string(),
                source,
            }),
            Ok(None) => Ok(None),
            Err(_) => Err(self.stalled(url)),
        }
    }

    async fn get_bytes_once(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        let response = self.send(url).await?;
        let mut body = response.bytes_stream();
        let mut buf = Vec::new();

        while let Some(chunk) = self.next_chunk(url, &mut body).await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }

    async fn get_file_once(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let result = self.stream_to_file(url, dest).await;
        if result.is_err() {
            discard_partial(dest).await;
        }
        result
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let io_err = |source| FetchError::Io {
            url: url.to_string(),
            path: dest.to_path_buf(),
            source,
        };

        let response = self.send(url).await?;
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut body = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = self.next_chunk(url, &mut body).await? {
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(io_err)?;
        Ok(written)
    }
}

#[async_trait]
impl Retrieval for HttpRetrieval {
    async fn fetch_bytes(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        let bytes = with_retry(&self.retry, self.sleeper.as_ref(), url, || {
            self.get_bytes_once(url)
        })
        .await
        .map_err(|failure| give_up(url, failure))?;

        debug!(url, bytes = bytes.len(), "fetched");
        Ok(bytes)
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let written = with_retry(&self.retry, self.sleeper.as_ref(), url, || {
            self.get_file_once(url, dest)
        })
        .await
        .map_err(|failure| give_up(url, failure))?;

        debug!(url, path = %dest.display(), bytes = written, "downloaded");
        Ok(written)
    }
}

/// Turn the last attempt's error into the error reported for the item
///
/// A transient error that outlived the budget becomes [`FetchError::Exhausted`];
/// a permanent one is returned as is.
fn give_up(url: &str, failure: RetryFailure<FetchError>) -> FetchError {
    if failure.error.is_retryable() {
        FetchError::Exhausted {
            url: url.to_string(),
            attempts: failure.attempts,
            source: Box::new(failure.error),
        }
    } else {
        failure.error
    }
}

async fn discard_partial(path: &Path) {
    if let Err(e) = remove_if_exists(path).await {
        warn!(error = %e, "failed to remove partial download");
    }
}
