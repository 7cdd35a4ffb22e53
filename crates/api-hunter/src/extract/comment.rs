//! Comment extractor: URL-shaped strings inside HTML and script comments.
//!
//! Comments are stale more often than not, so everything found here sits in
//! the lowest confidence tier.

use std::sync::OnceLock;

use regex::Regex;

use super::script::inline_scripts;
use super::{compile_patterns, looks_like_url, CompiledPattern, PatternSpec};
use crate::store::{DocumentKind, RawDocument};
use crate::types::{HunterResult, Observation, ScoreTier};

/// Comment delimiters for HTML documents.
static HTML_COMMENTS: &[PatternSpec] = &[PatternSpec {
    name: "html_comment",
    pattern: r"(?s)<!--(.*?)-->",
    url_group: 1,
    method_group: None,
    fixed_method: None,
    tier: ScoreTier::Comment,
    fallback: false,
}];

fn html_patterns() -> &'static [CompiledPattern] {
    static COMPILED: OnceLock<Vec<CompiledPattern>> = OnceLock::new();
    COMPILED.get_or_init(|| compile_patterns(HTML_COMMENTS))
}

fn url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?:^|[\s"'(=:,\[])((?:https?://[^\s<>"'`)\]]+)|(?:/[A-Za-z0-9_~.{}-]+(?:/[A-Za-z0-9_~.{}-]*)*(?:\?[^\s<>"'`)\]]*)?))"#,
        )
        .ok()
    })
    .as_ref()
}

/// Extract comment observations from an HTML or script document.
pub fn extract(doc: &RawDocument) -> HunterResult<Vec<Observation>> {
    let mut bodies: Vec<String> = Vec::new();
    match doc.kind {
        DocumentKind::Html => {
            bodies.extend(comment_bodies(&doc.body, html_patterns()));
            for script in inline_scripts(&doc.body) {
                bodies.extend(script_comment_bodies(&script).into_iter().map(str::to_string));
            }
        }
        DocumentKind::Script => {
            bodies.extend(script_comment_bodies(&doc.body).into_iter().map(str::to_string))
        }
        _ => {}
    }

    Ok(bodies
        .iter()
        .flat_map(|body| urls_in(body))
        .map(|url| Observation::new(url, ScoreTier::Comment, &doc.url))
        .collect())
}

fn comment_bodies(source: &str, patterns: &[CompiledPattern]) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|p| {
            p.regex
                .captures_iter(source)
                .filter_map(|c| c.get(p.spec.url_group))
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Bodies of the `/* */` and `//` comments of a JavaScript source, in source
/// order. String and template literals are skipped, so `"//cdn"` and
/// `"a // b"` are not comments. A `//` right after `:` is a URL scheme.
fn script_comment_bodies(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut bodies = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            q @ (b'"' | b'\'' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && q != b'`' {
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i + 2;
                match source[start..].find("*/") {
                    Some(len) => {
                        bodies.push(&source[start..start + len]);
                        i = start + len + 2;
                    }
                    None => {
                        bodies.push(&source[start..]);
                        break;
                    }
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') && (i == 0 || bytes[i - 1] != b':') => {
                let start = i + 2;
                let end = source[start..].find('\n').map_or(source.len(), |len| start + len);
                bodies.push(&source[start..end]);
                i = end;
            }
            _ => i += 1,
        }
    }
    bodies
}

/// URL-shaped strings in a block of comment text.
pub fn urls_in(text: &str) -> Vec<String> {
    let Some(re) = url_regex() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']))
        .filter(|candidate| looks_like_url(candidate))
        .map(str::to_string)
        .collect()
}
