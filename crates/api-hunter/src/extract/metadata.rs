//! Metadata extractor: URL-shaped values in `<meta content>` and `data-*`
//! attributes.

use scraper::{Html, Selector};

use super::looks_like_url;
use crate::store::RawDocument;
use crate::types::{HunterError, HunterResult, Observation, ScoreTier};

/// Extract metadata observations from an HTML document.
pub fn extract(doc: &RawDocument) -> HunterResult<Vec<Observation>> {
    let document = Html::parse_document(&doc.body);
    let all = Selector::parse("*").map_err(|e| HunterError::malformed(&doc.url, e))?;

    let mut observations = Vec::new();
    for element in document.select(&all) {
        let el = element.value();
        for (name, value) in el.attrs() {
            let candidate = if name.starts_with("data-") {
                Some(value)
            } else if el.name() == "meta" && name == "content" {
                Some(refresh_target(value).unwrap_or(value))
            } else {
                None
            };

            if let Some(candidate) = candidate.map(str::trim) {
                if looks_like_url(candidate) {
                    observations.push(Observation::new(candidate, ScoreTier::MetaTag, &doc.url));
                }
            }
        }
    }

    Ok(observations)
}

/// The target of a `<meta http-equiv="refresh" content="0; url=/next">`.
fn refresh_target(content: &str) -> Option<&str> {
    let lower = content.to_ascii_lowercase();
    let idx = lower.find("url=")?;
    Some(content[idx + 4..].trim().trim_matches(|c| c == '\'' || c == '"'))
}
