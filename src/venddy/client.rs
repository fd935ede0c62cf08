use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::HttpConfig;
use crate::venddy::error::FetchError;

#[derive(Debug, Clone)]
pub struct VenddyClient {
    pub base_url: String,
    pub taxonomy_base_url: String,
    pub(crate) inner: reqwest::Client,
    pub http_cfg: HttpConfig,
}

impl VenddyClient {
    pub fn new(
        base_url: impl Into<String>,
        taxonomy_base_url: impl Into<String>,
        http_cfg: HttpConfig,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let inner = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_millis(http_cfg.connect_timeout_ms))
            .timeout(Duration::from_millis(http_cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            taxonomy_base_url: taxonomy_base_url.into(),
            inner,
            http_cfg,
        })
    }

    pub(crate) fn endpoint(&self, object: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), object)
    }

    pub(crate) fn taxonomy_endpoint(&self, table: &str) -> String {
        format!("{}/{}", self.taxonomy_base_url.trim_end_matches('/'), table)
    }

    /// GET `url` with `query` and decode the JSON body, retrying transient failures.
    pub async fn get_json<T, Q>(
        &self,
        url: &str,
        query: &Q,
        cancel: &CancellationToken,
    ) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let max_attempts = self.http_cfg.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            let res = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(url, "request cancelled");
                    return Err(FetchError::Cancelled { url: url.to_string() });
                }
                res = self.get_once(url, query) => res,
            };

            match res {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let wait = self.backoff_delay(attempt, e.retry_after());
                    info!(attempt, kind=?e.kind(), wait_ms=%wait.as_millis(), "retrying request");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!(url, "request cancelled during retry sleep");
                            return Err(FetchError::Cancelled { url: url.to_string() });
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, err=%e, "request failed");
                    return Err(e);
                }
            }
        }
    }

    async fn get_once<T, Q>(&self, url: &str, query: &Q) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .inner
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        debug!(url=%resp.url(), status=%resp.status().as_u16(), "venddy response");

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                body,
                retry_after,
            });
        }

        let text = resp.text().await.map_err(transport)?;
        serde_json::from_str(&text).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })
    }

    pub(crate) fn backoff_delay(&self, attempt: usize, retry_after_secs: Option<u64>) -> Duration {
        if self.http_cfg.respect_retry_after
            && let Some(secs) = retry_after_secs
        {
            return Duration::from_secs(secs);
        }
        let base = self.http_cfg.retry_base_ms;
        let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1).min(16) as u32));
        let jitter = self.http_cfg.retry_jitter_ms;
        let rnd = if jitter == 0 {
            0
        } else {
            fastrand::u64(0..=jitter)
        };
        Duration::from_millis(exp.saturating_add(rnd))
    }
}
