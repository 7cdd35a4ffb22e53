//! Well-known-document extractor: robots.txt, sitemaps, and Swagger/OpenAPI
//! operations.

use super::sitemap::parse_locations;
use crate::store::{ApiDocument, DocumentKind, RawDocument};
use crate::types::{HunterResult, Observation, ScoreTier};

/// Extract observations from a robots.txt or sitemap document.
pub fn extract_document(doc: &RawDocument) -> HunterResult<Vec<Observation>> {
    match doc.kind {
        DocumentKind::Robots => Ok(robots_paths(&doc.body)
            .into_iter()
            .map(|path| Observation::new(path, ScoreTier::Robots, &doc.url))
            .collect()),
        DocumentKind::Sitemap => Ok(parse_locations(&doc.body, &doc.url)?
            .into_iter()
            .map(|loc| Observation::new(loc, ScoreTier::Sitemap, &doc.url))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// One swagger observation per declared operation, carrying the declared
/// verb and parameter names.
pub fn extract_api(doc: &ApiDocument) -> Vec<Observation> {
    doc.operations
        .iter()
        .map(|op| {
            Observation::new(&op.path, ScoreTier::Swagger, &doc.url)
                .with_method(Some(op.method))
                .with_parameters(op.parameters.iter().cloned())
        })
        .collect()
}

/// Path hints from `Allow`/`Disallow` rules.
///
/// Wildcard rules are cut at the first `*`, end anchors are dropped, and
/// rules that reduce to nothing or to the bare root are skipped.
pub fn robots_paths(body: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for (field, value) in robots_fields(body) {
        if field != "allow" && field != "disallow" {
            continue;
        }
        let path = value.split('*').next().unwrap_or("").trim_end_matches('$');
        if path.len() <= 1 || !path.starts_with('/') {
            continue;
        }
        if !paths.iter().any(|p| p == path) {
            paths.push(path.to_string());
        }
    }
    paths
}

/// `Sitemap:` entries of a robots.txt, for the fetch collaborator.
pub fn robots_sitemaps(body: &str) -> Vec<String> {
    robots_fields(body)
        .filter(|(field, _)| field == "sitemap")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn robots_fields(body: &str) -> impl Iterator<Item = (String, &str)> {
    body.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or("").trim();
        let (field, value) = line.split_once(':')?;
        Some((field.trim().to_ascii_lowercase(), value.trim()))
    })
}
