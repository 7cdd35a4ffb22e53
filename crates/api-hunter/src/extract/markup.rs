//! Markup extractor: `<a href>` targets and `<form action>` submissions.
//!
//! Links whose reference carries an API-like token (`/api/`, `/v1/`,
//! `/graphql`, `/rest/`, `.json`) land in the higher link tier; every other
//! navigational link is kept at the generic tier and left for the threshold
//! to sort out. Forms carry their `method` attribute and the names of their
//! fields.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::is_non_navigational;
use crate::store::RawDocument;
use crate::types::{HunterError, HunterResult, Method, Observation, ScoreTier};

fn selector(css: &str, doc: &RawDocument) -> HunterResult<Selector> {
    Selector::parse(css).map_err(|e| HunterError::malformed(&doc.url, format!("selector {css}: {e}")))
}

/// Extract link and form observations from an HTML document.
pub fn extract(doc: &RawDocument) -> HunterResult<Vec<Observation>> {
    let document = Html::parse_document(&doc.body);
    let link_sel = selector("a[href]", doc)?;
    let form_sel = selector("form", doc)?;
    let field_sel = selector("input[name], select[name], textarea[name], button[name]", doc)?;

    let mut observations = Vec::new();

    for link in document.select(&link_sel) {
        let href = link.value().attr("href").unwrap_or("").trim();
        if is_non_navigational(href) {
            continue;
        }
        let tier = if is_api_like(href) {
            ScoreTier::HtmlLinkApi
        } else {
            ScoreTier::HtmlLinkGeneric
        };
        observations.push(Observation::new(href, tier, &doc.url));
    }

    for form in document.select(&form_sel) {
        // A form without an action submits to its own document.
        let action = form.value().attr("action").map(str::trim).unwrap_or("");
        let action = if action.is_empty() { doc.url.as_str() } else { action };
        if is_non_navigational(action) {
            continue;
        }
        let method = form.value().attr("method").and_then(Method::parse);
        let fields = form
            .select(&field_sel)
            .filter_map(|f| f.value().attr("name"))
            .map(str::trim)
            .filter(|name| !name.is_empty());

        observations.push(
            Observation::new(action, ScoreTier::FormAction, &doc.url)
                .with_form_method(method)
                .with_parameters(fields),
        );
    }

    Ok(observations)
}

/// Whether a reference contains one of the tokens that mark API links.
pub fn is_api_like(reference: &str) -> bool {
    static VERSION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let lower = reference.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or("");

    if path.contains("/api/")
        || path.ends_with("/api")
        || path.contains("/graphql")
        || path.contains("/rest/")
        || path.ends_with(".json")
    {
        return true;
    }
    VERSION_RE
        .get_or_init(|| Regex::new(r"/v\d+(/|$)").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(path))
}
