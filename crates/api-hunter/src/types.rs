//! Core data types for observations, endpoints, and discovery errors.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// HTTP verb attached to an endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Parse a verb case-insensitively. Unknown verbs yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The extraction method that produced an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    HtmlLink,
    Javascript,
    FormAction,
    MetaTag,
    Comment,
    CommonPath,
    Robots,
    Sitemap,
    Swagger,
}

impl SourceKind {
    pub const ALL: [SourceKind; 9] = [
        SourceKind::HtmlLink,
        SourceKind::Javascript,
        SourceKind::FormAction,
        SourceKind::MetaTag,
        SourceKind::Comment,
        SourceKind::CommonPath,
        SourceKind::Robots,
        SourceKind::Sitemap,
        SourceKind::Swagger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HtmlLink => "html_link",
            Self::Javascript => "javascript",
            Self::FormAction => "form_action",
            Self::MetaTag => "meta_tag",
            Self::Comment => "comment",
            Self::CommonPath => "common_path",
            Self::Robots => "robots",
            Self::Sitemap => "sitemap",
            Self::Swagger => "swagger",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = HunterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| HunterError::Configuration(format!("unknown source kind: {s}")))
    }
}

/// Confidence class chosen by an extractor. Each tier belongs to exactly
/// one [`SourceKind`]; the score for a tier lives in the `ScoreTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Swagger,
    /// Probe answered 2xx or 3xx.
    CommonPathOk,
    Javascript,
    /// Probe answered 401/403 (exists but protected).
    CommonPathProtected,
    HtmlLinkApi,
    FormAction,
    Sitemap,
    MetaTag,
    Robots,
    Comment,
    HtmlLinkGeneric,
}

impl ScoreTier {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Swagger => SourceKind::Swagger,
            Self::CommonPathOk | Self::CommonPathProtected => SourceKind::CommonPath,
            Self::Javascript => SourceKind::Javascript,
            Self::HtmlLinkApi | Self::HtmlLinkGeneric => SourceKind::HtmlLink,
            Self::FormAction => SourceKind::FormAction,
            Self::Sitemap => SourceKind::Sitemap,
            Self::MetaTag => SourceKind::MetaTag,
            Self::Robots => SourceKind::Robots,
            Self::Comment => SourceKind::Comment,
        }
    }
}

/// A single unverified signal produced by one extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Reference as found in the source: absolute URL, relative URL, or path.
    pub raw_reference: String,
    pub tier: ScoreTier,
    /// Verb named by the surrounding code (e.g. `axios.post`).
    pub method_hint: Option<Method>,
    /// `<form method>` attribute, ranked below `method_hint`.
    pub form_method: Option<Method>,
    pub parameter_hints: BTreeSet<String>,
    /// URL of the raw document the reference was found in.
    pub origin_document: String,
}

impl Observation {
    pub fn new(raw_reference: impl Into<String>, tier: ScoreTier, origin: impl Into<String>) -> Self {
        Self {
            raw_reference: raw_reference.into(),
            tier,
            method_hint: None,
            form_method: None,
            parameter_hints: BTreeSet::new(),
            origin_document: origin.into(),
        }
    }

    pub fn with_method(mut self, method: Option<Method>) -> Self {
        self.method_hint = method;
        self
    }

    pub fn with_form_method(mut self, method: Option<Method>) -> Self {
        self.form_method = method;
        self
    }

    pub fn with_parameters<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_hints.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn source_kind(&self) -> SourceKind {
        self.tier.source_kind()
    }
}

/// An observation after URL canonicalization and method inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedObservation {
    pub canonical_url: String,
    pub method: Method,
    pub tier: ScoreTier,
    pub parameters: BTreeSet<String>,
}

impl NormalizedObservation {
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            canonical_url: self.canonical_url.clone(),
            method: self.method,
        }
    }
}

/// Deduplication key of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    pub canonical_url: String,
    pub method: Method,
}

/// The canonical, deduplicated discovery record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub canonical_url: String,
    pub method: Method,
    pub parameters: BTreeSet<String>,
    pub sources: BTreeSet<SourceKind>,
    pub confidence: f64,
    pub evidence_count: usize,
    /// Highest base score among merged observations.
    #[serde(skip)]
    pub peak_score: f64,
}

/// Errors that can occur during a discovery run.
#[derive(thiserror::Error, Debug)]
pub enum HunterError {
    #[error("Malformed input in {document}: {reason}")]
    MalformedInput { document: String, reason: String },

    #[error("Unresolvable reference {reference:?}: {reason}")]
    UnresolvableReference { reference: String, reason: String },

    #[error("Probe timed out: {path}")]
    ProbeTimeout { path: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Discovery run cancelled")]
    Cancelled,
}

impl HunterError {
    pub(crate) fn malformed(document: &str, reason: impl fmt::Display) -> Self {
        Self::MalformedInput {
            document: document.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unresolvable(reference: &str, reason: impl fmt::Display) -> Self {
        Self::UnresolvableReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Convenience result type.
pub type HunterResult<T> = Result<T, HunterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("post"), Some(Method::Post));
        assert_eq!(Method::parse(" Delete "), Some(Method::Delete));
        assert_eq!(Method::parse("getJSON"), None);
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn test_source_kind_from_str() {
        assert_eq!("common_path".parse::<SourceKind>().unwrap(), SourceKind::CommonPath);
        assert_eq!("HTML-LINK".parse::<SourceKind>().unwrap(), SourceKind::HtmlLink);
        assert!("browser".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_tier_kinds() {
        assert_eq!(ScoreTier::CommonPathProtected.source_kind(), SourceKind::CommonPath);
        assert_eq!(ScoreTier::HtmlLinkGeneric.source_kind(), SourceKind::HtmlLink);
    }

    #[test]
    fn test_endpoint_serializes_snake_case_sources() {
        let ep = Endpoint {
            canonical_url: "https://example.com/api".into(),
            method: Method::Post,
            parameters: BTreeSet::new(),
            sources: [SourceKind::FormAction].into_iter().collect(),
            confidence: 0.65,
            evidence_count: 1,
            peak_score: 0.65,
        };
        let v = serde_json::to_value(&ep).unwrap();
        assert_eq!(v["method"], "POST");
        assert_eq!(v["sources"][0], "form_action");
        assert!(v.get("peak_score").is_none());
    }
}
