//! Fetch collaborator: fills a [`DocumentStore`] for one target.
//!
//! Everything network-facing lives here. Failures are logged and degrade to
//! missing documents; only cancellation and an unusable target URL abort the
//! collection.

pub mod http_client;
pub mod scripts;
pub mod validate;

use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use api_hunter::extract::well_known::robots_sitemaps;
use api_hunter::openapi::parse_document;
use api_hunter::{
    ApiDocument, CancelFlag, DocumentKind, DocumentStore, Endpoint, HunterError, ProbeResult,
    RawDocument, AUTHENTICATED_PATHS, COMMON_PATHS,
};

use crate::config::FetchSettings;
use http_client::HttpClient;
use scripts::{extract_script_urls, MAX_SCRIPT_SIZE};
use validate::{validate_endpoints, ReachabilityMap};

/// Locations where Swagger/OpenAPI descriptions are commonly served.
pub const OPENAPI_PATHS: &[&str] = &[
    "/swagger.json",
    "/openapi.json",
    "/api-docs",
    "/v2/api-docs",
    "/v3/api-docs",
    "/swagger/v1/swagger.json",
    "/openapi.yaml",
    "/swagger.yaml",
];

const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml"];

/// Add `https://` to a bare host and check that the result is a usable
/// http(s) URL.
pub fn normalize_target(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&with_scheme).with_context(|| format!("invalid target URL {raw:?}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        anyhow::bail!("target must be an http(s) URL with a host: {raw}");
    }
    Ok(url)
}

pub struct Fetcher {
    client: HttpClient,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self> {
        let client = HttpClient::new(settings.timeout(), &settings.headers)?;
        Ok(Self { client, settings })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: HttpClient, settings: FetchSettings) -> Self {
        Self { client, settings }
    }

    /// Fetch page, scripts, robots, sitemaps, API descriptions and probes.
    pub async fn collect(&self, target: &Url, cancel: &CancelFlag) -> Result<DocumentStore> {
        let mut store = DocumentStore::new(target.as_str());

        self.fetch_page(target, &mut store).await;
        check(cancel)?;
        self.fetch_scripts(&mut store).await;
        check(cancel)?;
        let sitemaps = self.fetch_robots(target, &mut store).await;
        check(cancel)?;
        self.fetch_sitemaps(target, sitemaps, &mut store).await;
        check(cancel)?;
        self.fetch_api_documents(target, &mut store).await;
        check(cancel)?;
        if self.settings.probe {
            self.probe_common_paths(target, &mut store, cancel).await;
            check(cancel)?;
        }

        info!(
            target = %target,
            documents = store.documents.len(),
            api_documents = store.api_documents.len(),
            probes = store.probes.len(),
            "collection complete"
        );
        Ok(store)
    }

    /// HEAD every ranked endpoint; see [`validate::validate_endpoints`].
    pub async fn validate(&self, endpoints: &[Endpoint], cancel: &CancelFlag) -> Result<ReachabilityMap> {
        let results = validate_endpoints(&self.client, endpoints, self.settings.workers, cancel).await;
        check(cancel)?;
        let reachable = results.values().filter(|r| r.is_reachable()).count();
        info!(checked = results.len(), reachable, "validation complete");
        Ok(results)
    }

    /// Paths to probe: the common set, plus account paths when credentials
    /// are configured.
    fn probe_paths(&self) -> Vec<&'static str> {
        let mut paths = COMMON_PATHS.to_vec();
        if !self.settings.headers.is_empty() {
            paths.extend(AUTHENTICATED_PATHS.iter().copied().filter(|p| !COMMON_PATHS.contains(p)));
        }
        paths
    }

    async fn fetch_page(&self, target: &Url, store: &mut DocumentStore) {
        match self.client.get(target.as_str()).await {
            Ok(resp) if resp.status < 400 => {
                store.add_document(RawDocument::new(resp.final_url, DocumentKind::Html, resp.body));
            }
            Ok(resp) => warn!(status = resp.status, "target page returned an error status"),
            Err(e) => warn!("could not fetch target page: {e:#}"),
        }
    }

    async fn fetch_scripts(&self, store: &mut DocumentStore) {
        let mut urls: Vec<String> = Vec::new();
        for page in store.documents_of(DocumentKind::Html) {
            for url in extract_script_urls(&page.body, &page.url) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls.truncate(self.settings.max_scripts);
        if urls.is_empty() {
            return;
        }

        debug!(count = urls.len(), "fetching linked scripts");
        for result in self.client.get_many(&urls, self.settings.workers).await {
            match result {
                Ok(resp) if resp.is_success() && resp.body.len() <= MAX_SCRIPT_SIZE => {
                    store.add_document(RawDocument::new(resp.url, DocumentKind::Script, resp.body));
                }
                Ok(resp) => debug!(url = %resp.url, status = resp.status, "script skipped"),
                Err(e) => warn!("script fetch failed: {e:#}"),
            }
        }
    }

    /// Store robots.txt and return the sitemap URLs it declares.
    async fn fetch_robots(&self, target: &Url, store: &mut DocumentStore) -> Vec<String> {
        let Ok(url) = target.join("/robots.txt") else {
            return Vec::new();
        };
        match self.client.get(url.as_str()).await {
            Ok(resp) if resp.is_success() => {
                let sitemaps = robots_sitemaps(&resp.body);
                store.add_document(RawDocument::new(url.as_str(), DocumentKind::Robots, resp.body));
                sitemaps
            }
            Ok(resp) => {
                debug!(status = resp.status, "no robots.txt");
                Vec::new()
            }
            Err(e) => {
                debug!("robots.txt fetch failed: {e:#}");
                Vec::new()
            }
        }
    }

    async fn fetch_sitemaps(&self, target: &Url, declared: Vec<String>, store: &mut DocumentStore) {
        let mut urls = declared;
        for path in SITEMAP_PATHS {
            if let Ok(url) = target.join(path) {
                let url = url.to_string();
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }

        for result in self.client.get_many(&urls, self.settings.workers).await {
            match result {
                Ok(resp) if resp.is_success() && resp.body.trim_start().starts_with('<') => {
                    store.add_document(RawDocument::new(resp.url, DocumentKind::Sitemap, resp.body));
                }
                Ok(resp) => debug!(url = %resp.url, status = resp.status, "no sitemap"),
                Err(e) => debug!("sitemap fetch failed: {e:#}"),
            }
        }
    }

    async fn fetch_api_documents(&self, target: &Url, store: &mut DocumentStore) {
        let urls: Vec<String> = OPENAPI_PATHS
            .iter()
            .filter_map(|p| target.join(p).ok())
            .map(|u| u.to_string())
            .collect();

        for result in self.client.get_many(&urls, self.settings.workers).await {
            let resp = match result {
                Ok(resp) if resp.is_success() => resp,
                Ok(_) => continue,
                Err(e) => {
                    debug!("API description fetch failed: {e:#}");
                    continue;
                }
            };
            match parse_document(&resp.body, &resp.url) {
                Ok(operations) if !operations.is_empty() => {
                    info!(url = %resp.url, operations = operations.len(), "found API description");
                    store.add_api_document(ApiDocument {
                        url: resp.url,
                        operations,
                    });
                }
                Ok(_) => debug!(url = %resp.url, "API description declares no operations"),
                Err(e) => debug!("{e}"),
            }
        }
    }

    async fn probe_common_paths(&self, target: &Url, store: &mut DocumentStore, cancel: &CancelFlag) {
        let paths = self.probe_paths();
        let mut results: Vec<ProbeResult> = stream::iter(paths)
            .map(|path| async move {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let url = target.join(path).ok()?;
                let outcome = self.client.probe(url.as_str()).await;
                Some(ProbeResult {
                    path: path.to_string(),
                    outcome,
                })
            })
            .buffer_unordered(self.settings.workers.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await;
        results.sort_by(|a, b| a.path.cmp(&b.path));
        for probe in results {
            store.add_probe(probe);
        }
    }
}

fn check(cancel: &CancelFlag) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(HunterError::Cancelled.into());
    }
    Ok(())
}
