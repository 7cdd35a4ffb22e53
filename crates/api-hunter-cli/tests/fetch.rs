//! Fetch collaborator and end-to-end scan tests against a mock server.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use api_hunter::{
    CancelFlag, DiscoveryConfig, Discovery, DocumentKind, HunterError, Method, ProbeOutcome,
    SourceKind, AUTHENTICATED_PATHS, COMMON_PATHS,
};
use api_hunter_cli::auth::AuthOptions;
use api_hunter_cli::config::{FetchSettings, Overrides};
use api_hunter_cli::fetch::http_client::HttpClient;
use api_hunter_cli::fetch::{normalize_target, Fetcher};
use api_hunter_cli::report::ReportFormat;
use api_hunter_cli::scan::{self, ScanRequest};

// ─────────────────────── helpers ───────────────────────

const PAGE: &str = r#"<!DOCTYPE html>
<html><head><script src="/static/app.js"></script></head>
<body><a href="/api/v1/items">Items</a></body></html>"#;

const SWAGGER: &str = r#"{
  "swagger": "2.0",
  "paths": {
    "/api/v1/users": {
      "get": {"parameters": [{"name": "id", "in": "query"}, {"name": "name", "in": "query"}]}
    }
  }
}"#;

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn site() -> MockServer {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount(&server, "/", ResponseTemplate::new(200).set_body_string(PAGE)).await;
    mount(
        &server,
        "/static/app.js",
        ResponseTemplate::new(200).set_body_string("fetch('/api/v1/users').then(r => r.json());"),
    )
    .await;
    mount(
        &server,
        "/robots.txt",
        ResponseTemplate::new(200).set_body_string(format!(
            "User-agent: *\nDisallow: /internal/\nSitemap: {uri}/custom-sitemap.xml\n"
        )),
    )
    .await;
    mount(
        &server,
        "/custom-sitemap.xml",
        ResponseTemplate::new(200).set_body_string(format!(
            "<urlset><url><loc>{uri}/api/feed</loc></url></urlset>"
        )),
    )
    .await;
    mount(&server, "/swagger.json", ResponseTemplate::new(200).set_body_string(SWAGGER)).await;
    mount(&server, "/graphql", ResponseTemplate::new(403)).await;
    mount(
        &server,
        "/api",
        ResponseTemplate::new(301).insert_header("location", "/login"),
    )
    .await;

    server
}

fn settings() -> FetchSettings {
    FetchSettings {
        timeout_secs: 5,
        ..FetchSettings::default()
    }
}

fn probe_outcome(store: &api_hunter::DocumentStore, probe_path: &str) -> ProbeOutcome {
    store
        .probes
        .iter()
        .find(|p| p.path == probe_path)
        .map(|p| p.outcome.clone())
        .unwrap_or_else(|| panic!("no probe for {probe_path}"))
}

// ─────────────────────── collection ───────────────────────

#[tokio::test]
async fn collects_every_document_kind() {
    let server = site().await;
    let target = normalize_target(&server.uri()).unwrap();
    let fetcher = Fetcher::new(settings()).unwrap();

    let store = fetcher.collect(&target, &CancelFlag::default()).await.unwrap();

    assert_eq!(store.documents_of(DocumentKind::Html).count(), 1);
    assert_eq!(store.documents_of(DocumentKind::Script).count(), 1);
    assert_eq!(store.documents_of(DocumentKind::Robots).count(), 1);
    assert_eq!(store.documents_of(DocumentKind::Sitemap).count(), 1);
    assert_eq!(store.api_documents.len(), 1);
    assert_eq!(store.api_documents[0].operations.len(), 1);

    assert_eq!(store.probes.len(), COMMON_PATHS.len());
    assert_eq!(probe_outcome(&store, "/graphql"), ProbeOutcome::Status { code: 403 });
    assert_eq!(probe_outcome(&store, "/api"), ProbeOutcome::Status { code: 301 });
    assert_eq!(probe_outcome(&store, "/rest"), ProbeOutcome::Status { code: 404 });
}

#[tokio::test]
async fn collected_store_feeds_discovery() {
    let server = site().await;
    let target = normalize_target(&server.uri()).unwrap();
    let store = Fetcher::new(settings())
        .unwrap()
        .collect(&target, &CancelFlag::default())
        .await
        .unwrap();

    let outcome = Discovery::new(DiscoveryConfig::default())
        .unwrap()
        .run(&store, &AtomicBool::new(false))
        .unwrap();

    let users = outcome
        .endpoints
        .iter()
        .find(|e| e.canonical_url.ends_with("/api/v1/users"))
        .unwrap();
    assert_eq!(users.method, Method::Get);
    assert_eq!(users.confidence, 1.0);
    assert_eq!(
        users.sources.iter().copied().collect::<Vec<_>>(),
        vec![SourceKind::Javascript, SourceKind::Swagger]
    );

    let graphql = outcome
        .endpoints
        .iter()
        .find(|e| e.canonical_url.ends_with("/graphql"))
        .unwrap();
    assert_eq!(graphql.confidence, 0.6);

    assert!(outcome.endpoints.iter().any(|e| e.canonical_url.ends_with("/api/feed")));
    assert!(outcome.endpoints.iter().any(|e| e.canonical_url.ends_with("/internal")));
}

#[tokio::test]
async fn auth_headers_reach_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("authorization", "Bearer tok"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/profile"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let auth = AuthOptions {
        cookies_json: Some(r#"{"session": "abc"}"#.into()),
        bearer: Some("tok".into()),
        ..AuthOptions::default()
    };
    let fetch = FetchSettings {
        headers: auth.headers().unwrap(),
        ..settings()
    };
    let target = normalize_target(&server.uri()).unwrap();
    let store = Fetcher::new(fetch)
        .unwrap()
        .collect(&target, &CancelFlag::default())
        .await
        .unwrap();

    assert_eq!(store.documents_of(DocumentKind::Html).count(), 1);
    assert_eq!(probe_outcome(&store, "/graphql"), ProbeOutcome::Status { code: 200 });
    assert_eq!(probe_outcome(&store, "/api/profile"), ProbeOutcome::Status { code: 200 });
    assert_eq!(store.probes.len(), COMMON_PATHS.len() + AUTHENTICATED_PATHS.len());
}

#[tokio::test]
async fn account_paths_need_credentials() {
    let server = site().await;
    let target = normalize_target(&server.uri()).unwrap();
    let store = Fetcher::new(settings())
        .unwrap()
        .collect(&target, &CancelFlag::default())
        .await
        .unwrap();

    assert!(store.probes.iter().all(|p| !AUTHENTICATED_PATHS.contains(&p.path.as_str())));
}

#[tokio::test]
async fn failed_page_still_yields_probes() {
    let server = MockServer::start().await;
    mount(&server, "/", ResponseTemplate::new(500)).await;
    mount(&server, "/api/v1", ResponseTemplate::new(200)).await;

    let client = HttpClient::new(Duration::from_secs(5), &[]).unwrap().with_max_retries(0);
    let fetcher = Fetcher::with_client(client, settings());
    let target = normalize_target(&server.uri()).unwrap();
    let store = fetcher.collect(&target, &CancelFlag::default()).await.unwrap();

    assert_eq!(store.documents_of(DocumentKind::Html).count(), 0);
    assert_eq!(probe_outcome(&store, "/api/v1"), ProbeOutcome::Status { code: 200 });
}

#[tokio::test]
async fn slow_probe_is_reported_as_timeout() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/graphql",
        ResponseTemplate::new(200).set_delay(Duration::from_secs(3)),
    )
    .await;

    let fetch = FetchSettings {
        timeout_secs: 1,
        ..FetchSettings::default()
    };
    let client = HttpClient::new(fetch.timeout(), &[]).unwrap().with_max_retries(0);
    let target = normalize_target(&server.uri()).unwrap();
    let store = Fetcher::with_client(client, fetch)
        .collect(&target, &CancelFlag::default())
        .await
        .unwrap();

    assert_eq!(probe_outcome(&store, "/graphql"), ProbeOutcome::TimedOut);
}

#[tokio::test]
async fn cancelled_collection_stops() {
    let server = site().await;
    let target = normalize_target(&server.uri()).unwrap();
    let cancel: CancelFlag = Arc::new(AtomicBool::new(true));

    let err = Fetcher::new(settings())
        .unwrap()
        .collect(&target, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<HunterError>(), Some(HunterError::Cancelled)));
}

// ─────────────────────── scan command ───────────────────────

#[tokio::test]
async fn scan_writes_json_report() {
    let server = site().await;
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("api-hunter.toml");
    std::fs::write(&config, "threshold = 0.5\n").unwrap();
    let output = dir.path().join("out").join("report.json");

    let request = ScanRequest {
        target: server.uri(),
        format: ReportFormat::Json,
        output: Some(output.clone()),
        auto_save: false,
        config: Some(config),
        overrides: Overrides::default(),
        auth: AuthOptions::default(),
    };
    let outcome = scan::run(request, CancelFlag::default()).await.unwrap();
    assert_eq!(outcome.written_to.as_deref(), Some(output.as_path()));
    assert!(outcome.endpoints.iter().all(|e| e.confidence >= 0.5));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report["total_endpoints"], outcome.endpoints.len());
    assert_eq!(report["endpoints"][0]["confidence"], 1.0);
}

#[tokio::test]
async fn scan_rejects_bad_configuration() {
    let request = ScanRequest {
        target: "https://example.invalid".into(),
        format: ReportFormat::Console,
        output: None,
        auto_save: false,
        config: None,
        overrides: Overrides {
            threshold: Some(3.0),
            ..Overrides::default()
        },
        auth: AuthOptions::default(),
    };
    let err = scan::run(request, CancelFlag::default()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HunterError>(),
        Some(HunterError::Configuration(_))
    ));
}

#[tokio::test]
async fn validated_scan_reports_reachability() {
    let server = site().await;
    Mock::given(method("HEAD"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/json"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.json");

    let request = ScanRequest {
        target: server.uri(),
        format: ReportFormat::Json,
        output: Some(output.clone()),
        auto_save: false,
        config: None,
        overrides: Overrides {
            threshold: Some(0.9),
            validate: true,
            ..Overrides::default()
        },
        auth: AuthOptions::default(),
    };
    let outcome = scan::run(request, CancelFlag::default()).await.unwrap();

    let users = outcome
        .endpoints
        .iter()
        .find(|e| e.canonical_url.ends_with("/api/v1/users"))
        .unwrap();
    assert_eq!(users.confidence, 1.0);
    let reach = outcome.reachability.values().find(|r| r.status == Some(200)).unwrap();
    assert!(reach.looks_like_api());
    assert_eq!(outcome.reachability.len(), outcome.endpoints.len());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report["endpoints"][0]["reachability"]["status"], 200);
    assert_eq!(
        report["endpoints"][0]["reachability"]["content_type"],
        "application/json"
    );
}
