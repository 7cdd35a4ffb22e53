//! Async HTTP client wrapping reqwest.
//!
//! Plain HTTP, no browser. Page and document fetches follow redirects and
//! retry on 5xx with backoff on 429. Validation uses single HEAD requests.
//! Probes make a single request without following redirects, so that a 301
//! on `/api` is reported as such.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use api_hunter::ProbeOutcome;

const USER_AGENT: &str = concat!("api-hunter/", env!("CARGO_PKG_VERSION"));

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the fetch collaborator.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    probe_client: reqwest::Client,
    max_retries: u32,
}

impl HttpClient {
    /// Build a client that sends `headers` on every request.
    pub fn new(timeout: Duration, headers: &[(String, String)]) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {name:?}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {name}"))?;
            default_headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .default_headers(default_headers.clone())
            .build()
            .context("failed to build HTTP client")?;

        let probe_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .default_headers(default_headers)
            .build()
            .context("failed to build probe client")?;

        Ok(Self {
            client,
            probe_client,
            max_retries: 2,
        })
    }

    /// Disable retries (used by tests that serve 5xx on purpose).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// GET with retry on 5xx and transport errors, and backoff on 429.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut retries = 0u32;

        loop {
            match self.client.get(url).send().await {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let final_url = r.url().to_string();
                    let content_type = r
                        .headers()
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let body = r.text().await.unwrap_or_default();

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries && !e.is_builder() {
                        retries += 1;
                        tokio::time::sleep(backoff(retries)).await;
                        continue;
                    }
                    return Err(e).with_context(|| format!("GET {url} failed"));
                }
            }
        }
    }

    /// Parallel GETs with bounded concurrency. Results keep the order of
    /// `urls`.
    pub async fn get_many(&self, urls: &[String], concurrency: usize) -> Vec<Result<HttpResponse>> {
        stream::iter(urls.iter())
            .map(|url| {
                let client = self.clone();
                let u = url.clone();
                async move { client.get(&u).await }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Single HEAD request that follows redirects, without retries. The
    /// body is always empty.
    pub async fn head(&self, url: &str) -> Result<HttpResponse> {
        let r = self
            .client
            .head(url)
            .send()
            .await
            .with_context(|| format!("HEAD {url} failed"))?;
        let content_type = r
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(HttpResponse {
            url: url.to_string(),
            final_url: r.url().to_string(),
            status: r.status().as_u16(),
            content_type,
            body: String::new(),
        })
    }

    /// One request, no redirects, no retries. A timeout is reported as such
    /// rather than as a failure.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.probe_client.get(url).send().await {
            Ok(r) => ProbeOutcome::Status {
                code: r.status().as_u16(),
            },
            Err(e) if e.is_timeout() => ProbeOutcome::TimedOut,
            Err(e) => ProbeOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500 * 2u64.pow(attempt.saturating_sub(1)))
}
