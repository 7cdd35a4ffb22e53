//! Orchestration: fan extractors out over the document store, then merge
//! and rank on a single thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::extract::{Extractor, ExtractorInput};
use crate::normalize::Normalizer;
use crate::rank::rank;
use crate::resolve::Resolver;
use crate::store::DocumentStore;
use crate::types::{Endpoint, HunterError, HunterResult, Observation};

/// Shared cancellation flag. Setting it makes an in-flight run return
/// [`HunterError::Cancelled`] at its next checkpoint.
pub type CancelFlag = Arc<AtomicBool>;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// (extractor, input) pairs executed.
    pub tasks: usize,
    /// Inputs an extractor rejected as malformed.
    pub malformed: usize,
    pub observations: usize,
    /// Observations from source kinds that are switched off.
    pub disabled: usize,
    /// Observations that failed normalization or were off-scope.
    pub dropped: usize,
    /// Endpoints after merging, before the threshold.
    pub merged: usize,
    /// Endpoints in the final ranking.
    pub ranked: usize,
}

#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub endpoints: Vec<Endpoint>,
    pub stats: RunStats,
}

/// A validated discovery engine.
#[derive(Debug, Clone)]
pub struct Discovery {
    config: DiscoveryConfig,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> HunterResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run every enabled extractor over `store` and return the ranked
    /// endpoint set.
    pub fn run(&self, store: &DocumentStore, cancel: &AtomicBool) -> HunterResult<DiscoveryOutcome> {
        if cancel.load(Ordering::Relaxed) {
            return Err(HunterError::Cancelled);
        }
        let normalizer = Normalizer::new(&store.base_url, self.config.extend_scope)?;
        let mut stats = RunStats::default();

        let tasks: Vec<(Extractor, ExtractorInput<'_>)> = Extractor::ALL
            .into_iter()
            .filter(|ex| ex.kinds().iter().any(|k| self.config.is_enabled(*k)))
            .flat_map(|ex| ex.inputs(store).into_iter().map(move |input| (ex, input)))
            .collect();
        stats.tasks = tasks.len();
        debug!(
            tasks = tasks.len(),
            target = %store.base_url,
            scope = normalizer.scope(),
            "starting extraction"
        );

        let results: Vec<(Extractor, &str, HunterResult<Vec<Observation>>)> = tasks
            .par_iter()
            .map(|(ex, input)| {
                let result = if cancel.load(Ordering::Relaxed) {
                    Err(HunterError::Cancelled)
                } else {
                    ex.extract(input, &store.base_url)
                };
                (*ex, input.label(), result)
            })
            .collect();

        if cancel.load(Ordering::Relaxed) {
            return Err(HunterError::Cancelled);
        }

        let mut resolver = Resolver::new(&self.config.scores);
        for (extractor, label, result) in results {
            let observations = match result {
                Ok(observations) => observations,
                Err(HunterError::Cancelled) => return Err(HunterError::Cancelled),
                Err(e) => {
                    warn!(extractor = extractor.name(), input = label, "{e}");
                    stats.malformed += 1;
                    continue;
                }
            };
            for obs in observations {
                stats.observations += 1;
                if !self.config.is_enabled(obs.source_kind()) {
                    stats.disabled += 1;
                    continue;
                }
                match normalizer.normalize(&obs) {
                    Ok(normalized) => resolver.observe(normalized),
                    Err(e) => {
                        debug!(extractor = extractor.name(), origin = %obs.origin_document, "dropped: {e}");
                        stats.dropped += 1;
                    }
                }
            }
        }

        stats.merged = resolver.len();
        let endpoints = rank(resolver.into_endpoints().into_values(), self.config.threshold);
        stats.ranked = endpoints.len();

        info!(
            target = %store.base_url,
            observations = stats.observations,
            endpoints = stats.ranked,
            "discovery complete"
        );
        Ok(DiscoveryOutcome { endpoints, stats })
    }
}

/// Validate `config`, run discovery over `store`, and return the ranked
/// endpoints.
pub fn discover(
    store: &DocumentStore,
    config: &DiscoveryConfig,
    cancel: &CancelFlag,
) -> HunterResult<Vec<Endpoint>> {
    let discovery = Discovery::new(config.clone())?;
    Ok(discovery.run(store, cancel)?.endpoints)
}
