//! Threshold filtering, deterministic ordering, and confidence bands.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Endpoint;

/// Keep endpoints with `confidence >= threshold` and sort them: confidence
/// descending, evidence count descending, then URL and method ascending.
pub fn rank<I>(endpoints: I, threshold: f64) -> Vec<Endpoint>
where
    I: IntoIterator<Item = Endpoint>,
{
    let mut kept: Vec<Endpoint> = endpoints
        .into_iter()
        .filter(|ep| ep.confidence >= threshold)
        .collect();
    kept.sort_by(compare);
    kept
}

fn compare(a: &Endpoint, b: &Endpoint) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.evidence_count.cmp(&a.evidence_count))
        .then_with(|| a.canonical_url.cmp(&b.canonical_url))
        .then_with(|| a.method.cmp(&b.method))
}

/// Presentation bucket for a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f64) -> Self {
        if confidence >= 0.8 {
            Self::High
        } else if confidence >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High Confidence",
            Self::Medium => "Medium Confidence",
            Self::Low => "Low Confidence",
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Split an already ranked slice into bands, High first. Empty bands are
/// omitted and the order inside each band is preserved.
pub fn group_by_band(endpoints: &[Endpoint]) -> Vec<(ConfidenceBand, Vec<&Endpoint>)> {
    [ConfidenceBand::High, ConfidenceBand::Medium, ConfidenceBand::Low]
        .into_iter()
        .map(|band| {
            let members: Vec<&Endpoint> = endpoints
                .iter()
                .filter(|ep| ConfidenceBand::of(ep.confidence) == band)
                .collect();
            (band, members)
        })
        .filter(|(_, members)| !members.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Method, SourceKind};

    fn ep(url: &str, method: Method, confidence: f64, evidence: usize) -> Endpoint {
        Endpoint {
            canonical_url: url.to_string(),
            method,
            parameters: Default::default(),
            sources: [SourceKind::Javascript].into_iter().collect(),
            confidence,
            evidence_count: evidence,
            peak_score: confidence,
        }
    }

    #[test]
    fn test_ordering() {
        let ranked = rank(
            vec![
                ep("https://e.com/b", Method::Get, 0.8, 1),
                ep("https://e.com/a", Method::Post, 0.8, 1),
                ep("https://e.com/a", Method::Get, 0.8, 1),
                ep("https://e.com/z", Method::Get, 0.8, 3),
                ep("https://e.com/top", Method::Get, 1.0, 1),
            ],
            0.0,
        );
        let order: Vec<_> = ranked
            .iter()
            .map(|e| format!("{} {}", e.method, e.canonical_url))
            .collect();
        assert_eq!(
            order,
            vec![
                "GET https://e.com/top",
                "GET https://e.com/z",
                "GET https://e.com/a",
                "POST https://e.com/a",
                "GET https://e.com/b",
            ]
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let eps = vec![ep("https://e.com/legacy", Method::Get, 0.4, 1)];
        assert_eq!(rank(eps.clone(), 0.4).len(), 1);
        assert!(rank(eps, 0.41).is_empty());
    }

    #[test]
    fn test_rank_is_idempotent() {
        let eps = vec![
            ep("https://e.com/a", Method::Get, 0.5, 2),
            ep("https://e.com/b", Method::Get, 0.9, 1),
        ];
        let once = rank(eps, 0.3);
        assert_eq!(rank(once.clone(), 0.3), once);
    }

    #[test]
    fn test_bands() {
        assert_eq!(ConfidenceBand::of(0.8), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::of(0.79), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::of(0.5), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::of(0.45), ConfidenceBand::Low);

        let ranked = rank(
            vec![
                ep("https://e.com/a", Method::Get, 0.9, 1),
                ep("https://e.com/b", Method::Get, 0.4, 1),
            ],
            0.0,
        );
        let groups = group_by_band(&ranked);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ConfidenceBand::High);
        assert_eq!(groups[1].0, ConfidenceBand::Low);
    }
}
