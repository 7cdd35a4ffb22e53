//! Linked-script discovery for the fetch collaborator.
//!
//! Finds `<script src>` references in a page, drops third-party analytics
//! and CDN bundles, and keeps only scripts inside the target's registrable
//! domain.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use api_hunter::normalize::registrable_domain;

/// Scripts larger than this are skipped (5 MB).
pub const MAX_SCRIPT_SIZE: usize = 5 * 1024 * 1024;

/// Third-party hosts whose bundles never carry first-party API calls.
const SKIP_PATTERNS: &[&str] = &[
    "google-analytics.com",
    "googletagmanager.com",
    "googlesyndication.com",
    "googleadservices.com",
    "google.com/recaptcha",
    "gstatic.com",
    "facebook.net",
    "fbcdn.net",
    "hotjar.com",
    "segment.com",
    "segment.io",
    "analytics.",
    "cdnjs.cloudflare.com",
    "unpkg.com",
    "cdn.jsdelivr.net",
    "ajax.googleapis.com",
    "bootstrapcdn.com",
    "code.jquery.com",
    "newrelic.com",
    "nr-data.net",
    "sentry-cdn.com",
    "fullstory.com",
    "mixpanel.com",
    "clarity.ms",
    "doubleclick.net",
    "optimizely.com",
    "intercomcdn.com",
    "zendesk.com",
];

fn script_src_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<script[^>]+src\s*=\s*["']([^"']+)["']"#).ok())
        .as_ref()
}

/// Absolute URLs of the same-scope scripts linked from `html`, in document
/// order, without duplicates.
pub fn extract_script_urls(html: &str, page_url: &str) -> Vec<String> {
    let (Some(re), Ok(page)) = (script_src_regex(), Url::parse(page_url)) else {
        return Vec::new();
    };
    let scope = registrable_domain(&page);

    let mut urls: Vec<String> = Vec::new();
    for cap in re.captures_iter(html) {
        let Some(src) = cap.get(1) else { continue };
        let Ok(resolved) = page.join(src.as_str().trim()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        let resolved_str = resolved.to_string();
        if is_analytics_or_cdn(&resolved_str) || registrable_domain(&resolved) != scope {
            continue;
        }
        if !urls.contains(&resolved_str) {
            urls.push(resolved_str);
        }
    }
    urls
}

fn is_analytics_or_cdn(url: &str) -> bool {
    let lower = url.to_lowercase();
    SKIP_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}
