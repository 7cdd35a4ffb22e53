//! Extraction strategies.
//!
//! Each extractor is a pure function from one pre-fetched input (a raw
//! document, a parsed API document, or a probe result) to a sequence of
//! [`Observation`]s. Extractors never touch the network and never fail the
//! run: a parse failure surfaces as [`HunterError::MalformedInput`], which the
//! orchestrator logs and treats as "no observations".
//!
//! The set is closed. The orchestrator iterates [`Extractor::ALL`] and pairs
//! every extractor with every input it is registered for.

pub mod comment;
pub mod markup;
pub mod metadata;
pub mod probe;
pub mod script;
pub mod sitemap;
pub mod well_known;

use regex::Regex;
use tracing::warn;

use crate::store::{ApiDocument, DocumentKind, DocumentStore, ProbeResult, RawDocument};
use crate::types::{HunterResult, Method, Observation, ScoreTier, SourceKind};

/// The six extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extractor {
    Markup,
    Script,
    Metadata,
    Comment,
    CommonPath,
    WellKnown,
}

/// One unit of extractor work.
#[derive(Debug, Clone, Copy)]
pub enum ExtractorInput<'a> {
    Document(&'a RawDocument),
    Api(&'a ApiDocument),
    Probe(&'a ProbeResult),
}

impl ExtractorInput<'_> {
    /// Identifies the input in log lines.
    pub fn label(&self) -> &str {
        match self {
            Self::Document(doc) => &doc.url,
            Self::Api(doc) => &doc.url,
            Self::Probe(probe) => &probe.path,
        }
    }
}

impl Extractor {
    pub const ALL: [Extractor; 6] = [
        Extractor::Markup,
        Extractor::Script,
        Extractor::Metadata,
        Extractor::Comment,
        Extractor::CommonPath,
        Extractor::WellKnown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Script => "script",
            Self::Metadata => "metadata",
            Self::Comment => "comment",
            Self::CommonPath => "common_path",
            Self::WellKnown => "well_known",
        }
    }

    /// Source kinds this extractor can emit.
    pub fn kinds(&self) -> &'static [SourceKind] {
        match self {
            Self::Markup => &[SourceKind::HtmlLink, SourceKind::FormAction],
            Self::Script => &[SourceKind::Javascript],
            Self::Metadata => &[SourceKind::MetaTag],
            Self::Comment => &[SourceKind::Comment],
            Self::CommonPath => &[SourceKind::CommonPath],
            Self::WellKnown => &[SourceKind::Robots, SourceKind::Sitemap, SourceKind::Swagger],
        }
    }

    /// Every input in `store` this extractor is registered to consume.
    pub fn inputs<'a>(&self, store: &'a DocumentStore) -> Vec<ExtractorInput<'a>> {
        match self {
            Self::Markup | Self::Metadata => documents(store, &[DocumentKind::Html]).collect(),
            Self::Script | Self::Comment => {
                documents(store, &[DocumentKind::Html, DocumentKind::Script]).collect()
            }
            Self::CommonPath => store.probes.iter().map(ExtractorInput::Probe).collect(),
            Self::WellKnown => documents(store, &[DocumentKind::Robots, DocumentKind::Sitemap])
                .chain(store.api_documents.iter().map(ExtractorInput::Api))
                .collect(),
        }
    }

    /// Run this extractor over one input.
    ///
    /// `base_url` is the target; probe observations are anchored to it.
    pub fn extract(&self, input: &ExtractorInput<'_>, base_url: &str) -> HunterResult<Vec<Observation>> {
        match (self, input) {
            (Self::Markup, ExtractorInput::Document(doc)) => markup::extract(doc),
            (Self::Script, ExtractorInput::Document(doc)) => script::extract(doc),
            (Self::Metadata, ExtractorInput::Document(doc)) => metadata::extract(doc),
            (Self::Comment, ExtractorInput::Document(doc)) => comment::extract(doc),
            (Self::CommonPath, ExtractorInput::Probe(p)) => Ok(probe::extract(p, base_url)),
            (Self::WellKnown, ExtractorInput::Document(doc)) => well_known::extract_document(doc),
            (Self::WellKnown, ExtractorInput::Api(doc)) => Ok(well_known::extract_api(doc)),
            _ => Ok(Vec::new()),
        }
    }
}

fn documents<'a>(
    store: &'a DocumentStore,
    kinds: &'static [DocumentKind],
) -> impl Iterator<Item = ExtractorInput<'a>> + 'a {
    store
        .documents
        .iter()
        .filter(move |d| kinds.contains(&d.kind))
        .map(ExtractorInput::Document)
}

// ── Declarative pattern tables ──────────────────────────────────────────────

/// A regex-driven extraction rule, kept as data so that tables can be
/// extended and tested without touching control flow.
#[derive(Debug)]
pub struct PatternSpec {
    pub name: &'static str,
    pub pattern: &'static str,
    /// Capture group holding the URL (or comment body).
    pub url_group: usize,
    /// Capture group naming the HTTP verb, if the pattern has one.
    pub method_group: Option<usize>,
    /// Verb implied by the pattern itself (e.g. `$.post`).
    pub fixed_method: Option<Method>,
    pub tier: ScoreTier,
    /// Only emit when no earlier pattern already produced this URL.
    pub fallback: bool,
}

/// A [`PatternSpec`] with its regex compiled.
pub struct CompiledPattern {
    pub spec: &'static PatternSpec,
    pub regex: Regex,
}

/// Compile a pattern table, skipping (and logging) invalid entries.
pub fn compile_patterns(specs: &'static [PatternSpec]) -> Vec<CompiledPattern> {
    specs
        .iter()
        .filter_map(|spec| match Regex::new(spec.pattern) {
            Ok(regex) => Some(CompiledPattern { spec, regex }),
            Err(e) => {
                warn!(pattern = spec.name, "invalid extraction pattern: {e}");
                None
            }
        })
        .collect()
}

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Whether an attribute value or text fragment is shaped like a URL: an
/// absolute http(s) URL, a protocol-relative URL, or a root-relative path.
pub fn looks_like_url(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() || v.chars().any(char::is_whitespace) {
        return false;
    }
    let lower = v.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return v.len() > "https://".len();
    }
    if let Some(rest) = v.strip_prefix("//") {
        return rest.contains('.');
    }
    match v.strip_prefix('/') {
        Some(rest) => rest.chars().any(|c| c.is_ascii_alphabetic()),
        None => false,
    }
}

/// Whether a reference can never name an HTTP endpoint.
pub fn is_non_navigational(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with('#')
        || ["javascript:", "mailto:", "tel:", "data:", "about:", "blob:"]
            .iter()
            .any(|scheme| lower.starts_with(scheme))
}

/// Slice `text` from `start` for at most `max` bytes without splitting a
/// UTF-8 character.
pub fn window(text: &str, start: usize, max: usize) -> &str {
    let mut end = (start + max).min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end]
}
