//! Downloading optional assets (music, sound effects).
//!
//! The pipeline itself is synchronous. `HttpFetcher` owns a small
//! current-thread tokio runtime and drives bounded-concurrency downloads on
//! it, so callers must not invoke it from inside another tokio runtime.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::FetchSettings;
use crate::orchestrator::CancelHandle;

/// One asset to retrieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    /// Track label for logs ("music", "effect #3").
    pub label: String,
    /// `http(s)://`, `file://` or a plain local path.
    pub url: String,
    /// Where the bytes go.
    pub dest: PathBuf,
}

impl AssetRequest {
    pub fn new(label: impl Into<String>, url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            dest: dest.into(),
        }
    }
}

/// Why an asset could not be retrieved.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("request for {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("invalid asset reference '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} timed out after {}s", .after.as_secs())]
    TimedOut { url: String, after: Duration },

    #[error("download of {url} was cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Timeouts and cancellation end the job instead of dropping the track.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::TimedOut { .. } | FetchError::Cancelled { .. })
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Retrieves a batch of assets. Results come back in request order.
pub trait AssetFetcher: Send + Sync {
    fn fetch_all(
        &self,
        requests: &[AssetRequest],
        cancel: &CancelHandle,
    ) -> Vec<FetchResult<PathBuf>>;
}

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// Completion order is arbitrary; the returned vector follows input order.
pub async fn fan_out<I, T, F, Fut>(items: I, limit: usize, mut f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    let mut indexed: Vec<(usize, T)> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = f(item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_concurrency: usize,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("reelmix/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            max_concurrency: settings.max_concurrency.max(1),
            timeout: settings.timeout(),
        })
    }

    /// Override the per-download deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_one(&self, request: &AssetRequest, cancel: &CancelHandle) -> FetchResult<PathBuf> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: request.url.clone(),
            });
        }

        let result = match tokio::time::timeout(self.timeout, self.retrieve(request, cancel)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::TimedOut {
                url: request.url.clone(),
                after: self.timeout,
            }),
        };

        match result {
            Ok(()) => {
                tracing::debug!(label = %request.label, dest = %request.dest.display(), "asset retrieved");
                Ok(request.dest.clone())
            }
            Err(e) => {
                // Never leave a truncated file behind for the normalizer to find.
                let _ = tokio::fs::remove_file(&request.dest).await;
                tracing::warn!(label = %request.label, error = %e, "asset retrieval failed");
                Err(e)
            }
        }
    }

    async fn retrieve(&self, request: &AssetRequest, cancel: &CancelHandle) -> FetchResult<()> {
        if let Some(parent) = request.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        match local_source(&request.url)? {
            Some(source) => {
                tokio::fs::copy(&source, &request.dest)
                    .await
                    .map_err(|e| FetchError::io(&source, e))?;
                Ok(())
            }
            None => self.download(request, cancel).await,
        }
    }

    async fn download(&self, request: &AssetRequest, cancel: &CancelHandle) -> FetchResult<()> {
        let url = request.url.as_str();
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(&request.dest)
            .await
            .map_err(|e| FetchError::io(&request.dest, e))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    url: url.to_string(),
                });
            }
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(&request.dest, e))?;
        }
        file.flush()
            .await
            .map_err(|e| FetchError::io(&request.dest, e))?;
        Ok(())
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch_all(
        &self,
        requests: &[AssetRequest],
        cancel: &CancelHandle,
    ) -> Vec<FetchResult<PathBuf>> {
        if requests.is_empty() {
            return Vec::new();
        }

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                return requests
                    .iter()
                    .map(|r| {
                        Err(FetchError::Transport {
                            url: r.url.clone(),
                            message: format!("could not start download runtime: {}", e),
                        })
                    })
                    .collect()
            }
        };

        runtime.block_on(fan_out(requests, self.max_concurrency, |request| {
            self.fetch_one(request, cancel)
        }))
    }
}

/// Resolve `file://` URLs and bare paths. Remote URLs yield `None`.
fn local_source(url: &str) -> FetchResult<Option<PathBuf>> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(None);
    }
    if lower.starts_with("file:") {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        return parsed
            .to_file_path()
            .map(Some)
            .map_err(|_| FetchError::InvalidUrl {
                url: url.to_string(),
                message: "not a local file URL".to_string(),
            });
    }
    if url.contains("://") {
        return Err(FetchError::InvalidUrl {
            url: url.to_string(),
            message: "unsupported scheme".to_string(),
        });
    }
    Ok(Some(PathBuf::from(url)))
}
