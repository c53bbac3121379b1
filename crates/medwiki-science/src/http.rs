use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::RequestBuilder;
use reqwest::header::{ACCEPT, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// Sequential HTTP client: keeps at least `min_interval` between requests and
/// retries transport errors and HTTP 429 up to `max_retries` times.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(min_interval: Duration, max_retries: u32, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_query(url, &[]).await
    }

    pub async fn get_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let resp = self
            .send_with_retries(url, || self.client.get(url).query(query))
            .await?;
        resp.text().await.map_err(ScienceError::Http)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .send_with_retries(url, || {
                self.client
                    .get(url)
                    .query(query)
                    .header(ACCEPT, HeaderValue::from_static("application/json"))
            })
            .await?;
        let text = resp.text().await.map_err(ScienceError::Http)?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(format!("{url}: {e}")))
    }

    /// Streams a response body to `target`, replacing any existing file only
    /// once the whole body has arrived.
    pub async fn download_to(&self, url: &str, target: &Path) -> Result<u64> {
        let mut resp = self.send_with_retries(url, || self.client.get(url)).await?;

        let partial = target.with_extension("part");
        let result = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            let mut written = 0u64;
            while let Some(chunk) = resp.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            drop(file);
            tokio::fs::rename(&partial, target).await?;
            Ok::<u64, ScienceError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                debug!(url, bytes = written, "download complete");
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    warn!(path = %partial.display(), error = %cleanup, "could not remove partial download");
                }
                Err(e)
            }
        }
    }

    async fn send_with_retries<F>(&self, url: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            match build().send().await {
                Ok(r) if r.status() == 429 => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    if attempt >= self.max_retries {
                        return Err(ScienceError::RateLimit(url.to_string(), wait));
                    }
                    warn!(url, wait, "rate limited, backing off");
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}: {body}"),
                    ));
                }
                Ok(r) => return Ok(r),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(ScienceError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    warn!(url, attempt, error = %e, "request failed, retrying in {backoff}s");
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use tempfile::TempDir;

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let client = RateLimitedClient::new(Duration::ZERO, 0, "medwiki-test").unwrap();
        let err = client
            .get(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();
        match err {
            ScienceError::ApiError(_, msg) => assert_eq!(msg, "HTTP 404: nope"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_without_retries_reports_wait() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/busy")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let client = RateLimitedClient::new(Duration::ZERO, 0, "medwiki-test").unwrap();
        let err = client
            .get(&format!("{}/busy", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::RateLimit(_, 7)));
    }

    #[tokio::test]
    async fn download_writes_target_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/list.txt")
            .with_status(200)
            .with_body("2019-01-01 00:00:00\nline\n")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("list.txt");
        let client = RateLimitedClient::new(Duration::ZERO, 0, "medwiki-test").unwrap();
        let bytes = client
            .download_to(&format!("{}/list.txt", server.url()), &target)
            .await
            .unwrap();

        assert_eq!(bytes, 25);
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "2019-01-01 00:00:00\nline\n"
        );
        assert!(!target.with_extension("part").exists());
    }

    #[tokio::test]
    async fn failed_download_leaves_no_partial_file() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/list.txt")
            .with_status(200)
            .with_body("2019-01-01 00:00:00\n")
            .create_async()
            .await;

        // a directory in the target's place makes the final rename fail
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("list");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        let client = RateLimitedClient::new(Duration::ZERO, 0, "medwiki-test").unwrap();
        let err = client
            .download_to(&format!("{}/list.txt", server.url()), &target)
            .await
            .unwrap_err();

        assert!(matches!(err, ScienceError::Io(_)));
        assert!(!target.with_extension("part").exists());
        assert!(target.join("keep").exists());
    }
}
