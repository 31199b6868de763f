use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;

use crate::core::error::codes;
use crate::plugins::registry::{SingleTransfer, TransferContext, TransferListener};

#[derive(thiserror::Error, Debug)]
pub enum HttpTransferError {
    #[error("http status error: {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid header {0}")]
    InvalidHeader(String),

    #[error("write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HttpTransferError {
    /// Status codes pass through, everything else maps to a local code.
    pub fn code(&self) -> i32 {
        match self {
            HttpTransferError::Status(s) => s.as_u16() as i32,
            HttpTransferError::Network(_) => codes::NETWORK,
            HttpTransferError::InvalidHeader(_) => codes::UNSUPPORTED,
            HttpTransferError::Io { .. } => codes::IO,
        }
    }
}

pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("custom http client unavailable, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self { client }
    }

    fn build_headers(ctx: &TransferContext) -> Result<HeaderMap, HttpTransferError> {
        let mut h = HeaderMap::new();
        let ua = HeaderValue::from_str(&ctx.user_agent)
            .map_err(|_| HttpTransferError::InvalidHeader(format!("user-agent: {}", ctx.user_agent)))?;
        h.insert(USER_AGENT, ua);
        for (k, v) in &ctx.headers {
            let name = HeaderName::from_bytes(k.as_bytes())
                .map_err(|_| HttpTransferError::InvalidHeader(k.clone()))?;
            let value = HeaderValue::from_str(v)
                .map_err(|_| HttpTransferError::InvalidHeader(format!("{}: {}", k, v)))?;
            h.insert(name, value);
        }
        Ok(h)
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    fn backoff_delay(ctx: &TransferContext, attempt: u32) -> Duration {
        let base = ctx.retry_backoff_ms.max(1);
        let mul = 1u64 << attempt.min(16);
        Duration::from_millis(base.saturating_mul(mul).min(30_000))
    }

    /// A network error while reading the body is as transient as one while
    /// connecting.
    fn is_transient(err: &HttpTransferError) -> bool {
        match err {
            HttpTransferError::Network(_) => true,
            HttpTransferError::Status(s) => Self::should_retry_status(*s),
            _ => false,
        }
    }

    async fn fetch(
        client: &reqwest::Client,
        url: &str,
        dest: &Path,
        ctx: &TransferContext,
        listener: &TransferListener,
    ) -> Result<(), HttpTransferError> {
        let headers = Self::build_headers(ctx)?;

        let mut last_err: Option<HttpTransferError> = None;
        for attempt in 0..=ctx.retries {
            if attempt > 0 {
                sleep(Self::backoff_delay(ctx, attempt - 1)).await;
                tracing::debug!(url, attempt, "retrying");
            }

            let result = match client
                .get(url)
                .headers(headers.clone())
                .timeout(Duration::from_secs(ctx.timeout_secs))
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => Self::stream_to_file(resp, url, dest, listener).await,
                Ok(resp) => Err(HttpTransferError::Status(resp.status())),
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) if Self::is_transient(&e) => {
                    tracing::debug!(url, attempt, "transient http error: {}", e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(HttpTransferError::Status(StatusCode::REQUEST_TIMEOUT)))
    }

    /// Writes the body to `<dest>.partial` and renames it into place once
    /// complete. The partial file is removed again if anything fails.
    async fn stream_to_file(
        resp: reqwest::Response,
        url: &str,
        dest: &Path,
        listener: &TransferListener,
    ) -> Result<(), HttpTransferError> {
        let partial = partial_path(dest);
        let written = Self::write_body(resp, url, &partial, listener).await;
        let finished = match written {
            Ok(()) => tokio::fs::rename(&partial, dest).await.map_err(io(dest)),
            Err(e) => Err(e),
        };
        if finished.is_err() {
            if let Err(e) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), "partial cleanup skipped: {}", e);
            }
        }
        finished
    }

    async fn write_body(
        resp: reqwest::Response,
        url: &str,
        partial: &Path,
        listener: &TransferListener,
    ) -> Result<(), HttpTransferError> {
        if let Some(parent) = partial.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io(parent))?;
        }
        // create truncates whatever an earlier attempt left behind
        let mut file = tokio::fs::File::create(partial).await.map_err(io(partial))?;

        let total = resp.content_length();
        let mut downloaded = 0u64;
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk: Bytes = chunk?;
            file.write_all(&chunk).await.map_err(io(partial))?;
            downloaded += chunk.len() as u64;
            listener.progress(url, downloaded, total);
        }
        file.flush().await.map_err(io(partial))?;
        Ok(())
    }
}

/// `a/000-smile.png` -> `a/000-smile.png.partial`
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

fn io(path: &Path) -> impl FnOnce(std::io::Error) -> HttpTransferError + '_ {
    move |source| HttpTransferError::Io { path: path.to_path_buf(), source }
}

impl Default for HttpTransfer {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleTransfer for HttpTransfer {
    fn name(&self) -> &'static str { "http-transfer" }

    fn supports(&self, url: &str) -> bool {
        url::Url::parse(url)
            .map(|u| u.scheme() == "http" || u.scheme() == "https")
            .unwrap_or(false)
    }

    fn start(&self, url: &str, dest: &Path, ctx: &TransferContext, listener: TransferListener) {
        let client = self.client.clone();
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let ctx = ctx.clone();

        tokio::spawn(async move {
            match Self::fetch(&client, &url, &dest, &ctx, &listener).await {
                Ok(()) => listener.succeeded(&url, dest),
                Err(e) => {
                    tracing::debug!(url = %url, "http transfer failed: {}", e);
                    listener.failed(&url, e.code(), e.to_string());
                }
            }
        });
    }
}
