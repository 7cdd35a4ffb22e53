//! Post-discovery reachability check.
//!
//! Annotates ranked endpoints with the answer to a single HEAD request. The
//! result is reported next to each endpoint and never feeds back into
//! confidence.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::debug;

use api_hunter::{CancelFlag, Endpoint, EndpointKey};

use super::http_client::HttpClient;

/// Content-type fragments that suggest a machine-readable API response.
const API_CONTENT_HINTS: &[&str] = &["json", "xml", "api"];

/// What a HEAD request to an endpoint returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reachability {
    /// `None` when the request timed out or failed.
    pub status: Option<u16>,
    pub content_type: Option<String>,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self.status, Some(code) if code < 400)
    }

    pub fn looks_like_api(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            API_CONTENT_HINTS.iter().any(|hint| ct.contains(hint))
        })
    }

    /// Short form for text reports, e.g. `200 application/json`.
    pub fn summary(&self) -> String {
        match (self.status, &self.content_type) {
            (Some(code), Some(ct)) => format!("{code} {ct}"),
            (Some(code), None) => code.to_string(),
            (None, _) => "unreachable".to_string(),
        }
    }
}

pub type ReachabilityMap = BTreeMap<EndpointKey, Reachability>;

/// HEAD every endpoint with at most `workers` requests in flight. Endpoints
/// not reached before cancellation are left out.
pub async fn validate_endpoints(
    client: &HttpClient,
    endpoints: &[Endpoint],
    workers: usize,
    cancel: &CancelFlag,
) -> ReachabilityMap {
    stream::iter(endpoints)
        .map(|ep| async move {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let reachability = match client.head(&ep.canonical_url).await {
                Ok(resp) => Reachability {
                    status: Some(resp.status),
                    content_type: resp.content_type,
                },
                Err(e) => {
                    debug!("{e:#}");
                    Reachability {
                        status: None,
                        content_type: None,
                    }
                }
            };
            let key = EndpointKey {
                canonical_url: ep.canonical_url.clone(),
                method: ep.method,
            };
            Some((key, reachability))
        })
        .buffer_unordered(workers.max(1))
        .filter_map(futures::future::ready)
        .collect()
        .await
}
