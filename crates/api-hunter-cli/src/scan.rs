//! The `scan` command: fetch, discover, report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use api_hunter::{CancelFlag, Discovery, Endpoint, RunStats};

use crate::auth::AuthOptions;
use crate::config::{Overrides, Settings};
use crate::fetch::validate::ReachabilityMap;
use crate::fetch::{normalize_target, Fetcher};
use crate::report::{auto_save_filename, write_report, Report, ReportFormat};

/// Everything the `scan` command needs.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub target: String,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub auto_save: bool,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub auth: AuthOptions,
}

/// What a scan produced.
#[derive(Debug)]
pub struct ScanOutcome {
    pub endpoints: Vec<Endpoint>,
    pub stats: RunStats,
    /// HEAD results per endpoint; empty unless validation was requested.
    pub reachability: ReachabilityMap,
    /// Where the report was written; `None` when printed to stdout.
    pub written_to: Option<PathBuf>,
}

pub async fn run(request: ScanRequest, cancel: CancelFlag) -> Result<ScanOutcome> {
    let mut settings = Settings::load(request.config.as_deref(), &request.overrides)?;
    settings.fetch.headers = request.auth.headers()?;
    if !request.auth.is_empty() {
        info!(headers = settings.fetch.headers.len(), "injecting authentication headers");
    }

    let target = normalize_target(&request.target)?;
    let discovery = Discovery::new(settings.discovery.clone())?;
    let fetcher = Fetcher::new(settings.fetch.clone())?;

    info!(
        target = %target,
        threshold = discovery.config().threshold,
        "collecting documents"
    );
    let store = fetcher.collect(&target, &cancel).await?;
    if store.is_empty() {
        warn!(target = %target, "nothing could be collected from the target");
    }

    let run_cancel = cancel.clone();
    let outcome = tokio::task::spawn_blocking(move || discovery.run(&store, &run_cancel))
        .await
        .context("discovery task panicked")??;

    let reachability = if settings.fetch.validate {
        fetcher.validate(&outcome.endpoints, &cancel).await?
    } else {
        ReachabilityMap::new()
    };

    let report = Report::new(target.as_str(), &outcome.endpoints).with_reachability(&reachability);
    let rendered = report.render(request.format)?;

    let path = match request.output {
        Some(path) => Some(path),
        None if request.auto_save => Some(PathBuf::from(auto_save_filename(
            target.as_str(),
            request.format,
            report.generated_at,
        ))),
        None => None,
    };

    match &path {
        Some(path) => {
            write_report(path, &rendered)?;
            info!("report written to {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(ScanOutcome {
        endpoints: outcome.endpoints,
        stats: outcome.stats,
        reachability,
        written_to: path,
    })
}
