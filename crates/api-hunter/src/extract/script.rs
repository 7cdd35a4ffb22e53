//! Script extractor: HTTP client calls in JavaScript source.
//!
//! Scans external script bodies and the inline `<script>` blocks of HTML
//! pages for fetch-style, XHR-style, axios and jQuery invocations, plus bare
//! `/api/` string literals. Patterns live in [`SCRIPT_PATTERNS`]; the matcher
//! below only interprets the table.
//!
//! Template segments are preserved as path placeholders: `${id}`, `:id` and
//! `{id}` all become `{id}`.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{compile_patterns, is_non_navigational, window, CompiledPattern, PatternSpec};
use crate::store::{DocumentKind, RawDocument};
use crate::types::{HunterResult, Method, Observation, ScoreTier};

/// How far past the opening parenthesis the matcher looks for the end of a
/// call.
const CALL_WINDOW: usize = 1000;

/// Ordered call-pattern table. Earlier entries win when two patterns
/// produce the same URL and verb.
pub static SCRIPT_PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        name: "xhr_open",
        pattern: r#"\.open\s*\(\s*["'](\w+)["']\s*,\s*["'`]([^"'`]+)["'`]"#,
        url_group: 2,
        method_group: Some(1),
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "fetch",
        pattern: r#"\bfetch\s*\(\s*["'`]([^"'`]+)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "axios_verb",
        pattern: r#"(?i)\baxios\s*\.\s*(get|post|put|patch|delete|head|options)\s*\(\s*["'`]([^"'`]+)["'`]"#,
        url_group: 2,
        method_group: Some(1),
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "axios_config",
        pattern: r#"\baxios\s*\(\s*\{[^}]*?\burl\s*:\s*["'`]([^"'`]+)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "jquery_ajax",
        pattern: r#"\$\s*\.\s*ajax\s*\(\s*\{[^}]*?\burl\s*:\s*["'`]([^"'`]+)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "jquery_post",
        pattern: r#"\$\s*\.\s*post\s*\(\s*["'`]([^"'`]+)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: Some(Method::Post),
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "jquery_get",
        pattern: r#"\$\s*\.\s*(?:get|getJSON)\s*\(\s*["'`]([^"'`]+)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: Some(Method::Get),
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        // Any client object: http.get("/x"), this.$http.post("/x"), api.delete(...).
        name: "client_verb",
        pattern: r#"\.(get|post|put|patch|delete)\s*\(\s*["'`]((?:/|https?://)[^"'`]*)["'`]"#,
        url_group: 2,
        method_group: Some(1),
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: false,
    },
    PatternSpec {
        name: "base_url_config",
        pattern: r#"(?i)\b(?:baseURL|apiUrl|apiBase|endpoint)\s*[:=]\s*["'`]((?:/|https?://)[^"'`]+)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: true,
    },
    PatternSpec {
        name: "api_literal",
        pattern: r#"["'`](/(?:client/)?api/[^"'`\s]*)["'`]"#,
        url_group: 1,
        method_group: None,
        fixed_method: None,
        tier: ScoreTier::Javascript,
        fallback: true,
    },
];

fn patterns() -> &'static [CompiledPattern] {
    static COMPILED: OnceLock<Vec<CompiledPattern>> = OnceLock::new();
    COMPILED.get_or_init(|| compile_patterns(SCRIPT_PATTERNS))
}

struct OptionRegexes {
    method: Regex,
    object_keys: Vec<Regex>,
    interpolation: Regex,
}

fn option_regexes() -> Option<&'static OptionRegexes> {
    static RES: OnceLock<Option<OptionRegexes>> = OnceLock::new();
    RES.get_or_init(|| {
        Some(OptionRegexes {
            method: Regex::new(r#"\b(?:method|type)\s*:\s*["'](\w+)["']"#).ok()?,
            object_keys: vec![
                Regex::new(r"\bparams\s*:\s*\{([^{}]*)\}").ok()?,
                Regex::new(r"\bdata\s*:\s*\{([^{}]*)\}").ok()?,
                Regex::new(r"JSON\.stringify\s*\(\s*\{([^{}]*)\}").ok()?,
            ],
            interpolation: Regex::new(r"\$\{\s*([^}]*?)\s*\}").ok()?,
        })
    })
    .as_ref()
}

/// Extract script observations from a script document, or from the inline
/// scripts of an HTML document.
pub fn extract(doc: &RawDocument) -> HunterResult<Vec<Observation>> {
    match doc.kind {
        DocumentKind::Script => Ok(scan_source(&doc.body, &doc.url)),
        DocumentKind::Html => Ok(inline_scripts(&doc.body)
            .iter()
            .flat_map(|src| scan_source(src, &doc.url))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// Bodies of every inline `<script>` element.
pub(crate) fn inline_scripts(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse("script:not([src])") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .map(|el| el.text().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Run the pattern table over one JavaScript source.
pub fn scan_source(source: &str, origin: &str) -> Vec<Observation> {
    let mut observations = Vec::new();
    let mut seen: HashSet<(String, Option<Method>)> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();

    for compiled in patterns() {
        let spec = compiled.spec;
        for caps in compiled.regex.captures_iter(source) {
            let Some(url_match) = caps.get(spec.url_group) else {
                continue;
            };
            let Some(reference) = template_reference(url_match.as_str()) else {
                continue;
            };
            if spec.fallback && seen_urls.contains(&reference) {
                continue;
            }

            let whole = caps.get(0).map_or(url_match.start(), |m| m.start());
            let call = call_window(source, whole, url_match.start(), url_match.end());

            let method = spec
                .fixed_method
                .or_else(|| {
                    spec.method_group
                        .and_then(|g| caps.get(g))
                        .and_then(|m| Method::parse(m.as_str()))
                })
                .or_else(|| method_in(call));

            if !seen.insert((reference.clone(), method)) {
                continue;
            }
            seen_urls.insert(reference.clone());

            observations.push(
                Observation::new(reference, spec.tier, origin)
                    .with_method(method)
                    .with_parameters(parameters_in(call)),
            );
        }
    }

    observations
}

/// The text of a call: from the start of the match to the parenthesis that
/// closes the call's argument list. String and template literals are skipped
/// while counting brackets. Matches that are not calls, and calls that do
/// not close within [`CALL_WINDOW`], end at the URL.
fn call_window(source: &str, start: usize, url_start: usize, url_end: usize) -> &str {
    let Some(open) = source[start..url_start].find('(').map(|i| start + i) else {
        return &source[start..url_end];
    };
    let limit = open + window(source, open, CALL_WINDOW).len();
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < limit {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return &source[start..=i];
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    &source[start..url_end]
}

/// First `method:`/`type:` value in the call that names an HTTP verb.
fn method_in(call: &str) -> Option<Method> {
    let res = option_regexes()?;
    res.method
        .captures_iter(call)
        .filter_map(|c| c.get(1))
        .find_map(|m| Method::parse(m.as_str()))
}

/// Keys of object literals passed as `params`, `data`, or a stringified body.
fn parameters_in(call: &str) -> BTreeSet<String> {
    let mut params = BTreeSet::new();
    let Some(res) = option_regexes() else {
        return params;
    };
    for re in &res.object_keys {
        for caps in re.captures_iter(call) {
            let Some(body) = caps.get(1) else { continue };
            for entry in body.as_str().split(',') {
                let key = entry
                    .split(':')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'');
                if is_identifier(key) {
                    params.insert(key.to_string());
                }
            }
        }
    }
    params
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-')
}

/// Turn a literal or template URL argument into a reference with
/// `{name}` placeholders. Returns `None` for arguments that cannot name an
/// endpoint.
pub fn template_reference(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if is_non_navigational(raw) {
        return None;
    }

    let with_braces = match option_regexes() {
        Some(res) => res.interpolation.replace_all(raw, "{$1}").into_owned(),
        None => raw.to_string(),
    };

    // A leading interpolation is an unknown base (`${API}/users`); anchor the
    // remainder at the root.
    let anchored = match with_braces.strip_prefix('{') {
        Some(rest) => match rest.find('}') {
            Some(close) if rest[close + 1..].starts_with('/') => rest[close + 1..].to_string(),
            _ => return None,
        },
        None => with_braces,
    };

    let (path, suffix) = match anchored.find(['?', '#']) {
        Some(i) => anchored.split_at(i),
        None => (anchored.as_str(), ""),
    };
    let path: Vec<String> = path
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if is_identifier(name) => format!("{{{name}}}"),
            _ => segment.to_string(),
        })
        .collect();
    let reference = format!("{}{}", path.join("/"), suffix);

    if reference.is_empty() || reference.chars().any(char::is_whitespace) {
        return None;
    }
    Some(reference)
}
