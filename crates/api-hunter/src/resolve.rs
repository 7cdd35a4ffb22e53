//! Confidence resolver: merges normalized observations into endpoints.
//!
//! The merged confidence of an endpoint depends only on the highest base
//! score seen and the number of distinct source kinds, so the final mapping
//! is the same for any arrival order.

use std::collections::BTreeMap;

use crate::config::ScoreTable;
use crate::types::{Endpoint, EndpointKey, NormalizedObservation};

/// Per-run merge state, keyed by (canonical URL, method).
#[derive(Debug)]
pub struct Resolver<'a> {
    scores: &'a ScoreTable,
    endpoints: BTreeMap<EndpointKey, Endpoint>,
}

impl<'a> Resolver<'a> {
    pub fn new(scores: &'a ScoreTable) -> Self {
        Self {
            scores,
            endpoints: BTreeMap::new(),
        }
    }

    /// Merge one observation.
    pub fn observe(&mut self, obs: NormalizedObservation) {
        let base = self.scores.base_score(obs.tier);
        let kind = obs.tier.source_kind();

        let endpoint = self.endpoints.entry(obs.key()).or_insert_with(|| Endpoint {
            canonical_url: obs.canonical_url.clone(),
            method: obs.method,
            parameters: Default::default(),
            sources: Default::default(),
            confidence: 0.0,
            evidence_count: 0,
            peak_score: base,
        });

        endpoint.peak_score = endpoint.peak_score.max(base);
        endpoint.sources.insert(kind);
        endpoint.parameters.extend(obs.parameters);
        endpoint.evidence_count += 1;
        endpoint.confidence = merged_confidence(
            endpoint.peak_score,
            endpoint.sources.len(),
            self.scores.corroboration_bonus,
        );
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn into_endpoints(self) -> BTreeMap<EndpointKey, Endpoint> {
        self.endpoints
    }
}

/// `min(1, peak + bonus * (distinct_kinds - 1))`, rounded to four decimals
/// so that float noise never reorders a ranking.
pub fn merged_confidence(peak: f64, distinct_kinds: usize, bonus: f64) -> f64 {
    let extra = distinct_kinds.saturating_sub(1) as f64 * bonus;
    let raw = (peak + extra).clamp(0.0, 1.0);
    (raw * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Method, ScoreTier, SourceKind};

    fn obs(url: &str, method: Method, tier: ScoreTier, params: &[&str]) -> NormalizedObservation {
        NormalizedObservation {
            canonical_url: url.to_string(),
            method,
            tier,
            parameters: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_first_sighting() {
        let scores = ScoreTable::default();
        let mut r = Resolver::new(&scores);
        r.observe(obs("https://e.com/graphql", Method::Get, ScoreTier::CommonPathProtected, &[]));
        let ep = r.endpoints().next().unwrap();
        assert_eq!(ep.confidence, 0.6);
        assert_eq!(ep.evidence_count, 1);
        assert_eq!(ep.sources.iter().collect::<Vec<_>>(), vec![&SourceKind::CommonPath]);
    }

    #[test]
    fn test_corroboration_bonus_per_distinct_kind() {
        let scores = ScoreTable::default();
        let mut r = Resolver::new(&scores);
        let url = "https://e.com/api/items";
        r.observe(obs(url, Method::Get, ScoreTier::HtmlLinkApi, &[]));
        r.observe(obs(url, Method::Get, ScoreTier::MetaTag, &[]));
        r.observe(obs(url, Method::Get, ScoreTier::Comment, &["page"]));
        let ep = r.endpoints().next().unwrap();
        assert_eq!(ep.confidence, 0.8);
        assert_eq!(ep.evidence_count, 3);
        assert!(ep.parameters.contains("page"));
    }

    #[test]
    fn test_same_kind_repeats_do_not_inflate() {
        let scores = ScoreTable::default();
        let mut r = Resolver::new(&scores);
        for _ in 0..5 {
            r.observe(obs("https://e.com/x", Method::Get, ScoreTier::Comment, &[]));
        }
        let ep = r.endpoints().next().unwrap();
        assert_eq!(ep.confidence, 0.4);
        assert_eq!(ep.evidence_count, 5);
    }

    #[test]
    fn test_tiers_of_one_kind_count_once() {
        let scores = ScoreTable::default();
        let mut r = Resolver::new(&scores);
        r.observe(obs("https://e.com/api", Method::Get, ScoreTier::CommonPathProtected, &[]));
        r.observe(obs("https://e.com/api", Method::Get, ScoreTier::CommonPathOk, &[]));
        assert_eq!(r.endpoints().next().unwrap().confidence, 0.85);
    }

    #[test]
    fn test_method_mismatch_is_distinct() {
        let scores = ScoreTable::default();
        let mut r = Resolver::new(&scores);
        r.observe(obs("https://e.com/api/u", Method::Get, ScoreTier::Javascript, &[]));
        r.observe(obs("https://e.com/api/u", Method::Post, ScoreTier::FormAction, &[]));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_remerging_same_multiset_keeps_scores() {
        let scores = ScoreTable::default();
        let batch = [
            obs("https://e.com/api/old", Method::Get, ScoreTier::Comment, &["page"]),
            obs("https://e.com/api/old", Method::Get, ScoreTier::MetaTag, &[]),
        ];

        let mut once = Resolver::new(&scores);
        for o in batch.clone() {
            once.observe(o);
        }
        let mut twice = Resolver::new(&scores);
        for o in batch.iter().chain(batch.iter()).cloned() {
            twice.observe(o);
        }

        let a = once.endpoints().next().unwrap();
        let b = twice.endpoints().next().unwrap();
        assert_eq!(twice.len(), 1);
        assert_eq!(b.confidence, 0.55);
        assert_eq!(b.confidence, a.confidence);
        assert_eq!(b.sources, a.sources);
        assert_eq!(b.parameters, a.parameters);
        // Every merged observation is counted.
        assert_eq!(a.evidence_count, 2);
        assert_eq!(b.evidence_count, 4);
    }

    #[test]
    fn test_cap_at_one() {
        assert_eq!(merged_confidence(1.0, 9, 0.05), 1.0);
        assert_eq!(merged_confidence(0.35, 3, 0.05), 0.45);
        assert_eq!(merged_confidence(0.5, 1, 0.05), 0.5);
    }

    #[test]
    fn test_custom_bonus() {
        let scores = ScoreTable {
            corroboration_bonus: 0.1,
            ..ScoreTable::default()
        };
        let mut r = Resolver::new(&scores);
        r.observe(obs("https://e.com/a", Method::Get, ScoreTier::Robots, &[]));
        r.observe(obs("https://e.com/a", Method::Get, ScoreTier::Sitemap, &[]));
        assert_eq!(r.endpoints().next().unwrap().confidence, 0.65);
    }
}
