//! Raw document store: pre-fetched artifacts handed to the extractors.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Method;

/// What a raw text document is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Html,
    Script,
    Robots,
    Sitemap,
}

/// A fetched text artifact keyed by its URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub url: String,
    pub kind: DocumentKind,
    pub body: String,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, kind: DocumentKind, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            body: body.into(),
        }
    }
}

/// One operation declared by a Swagger/OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOperation {
    pub path: String,
    pub method: Method,
    pub parameters: BTreeSet<String>,
}

/// A Swagger/OpenAPI document, already reduced to its operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDocument {
    pub url: String,
    pub operations: Vec<ApiOperation>,
}

/// How a common-path probe ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Status { code: u16 },
    TimedOut,
    Failed { reason: String },
}

/// Result of probing one well-known path against the target origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub path: String,
    pub outcome: ProbeOutcome,
}

impl ProbeResult {
    pub fn status(path: impl Into<String>, code: u16) -> Self {
        Self {
            path: path.into(),
            outcome: ProbeOutcome::Status { code },
        }
    }

    pub fn timed_out(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            outcome: ProbeOutcome::TimedOut,
        }
    }
}

/// Everything the fetch collaborator retrieved for one discovery run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStore {
    pub base_url: String,
    pub documents: Vec<RawDocument>,
    pub api_documents: Vec<ApiDocument>,
    pub probes: Vec<ProbeResult>,
}

impl DocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn add_document(&mut self, doc: RawDocument) {
        self.documents.push(doc);
    }

    pub fn add_api_document(&mut self, doc: ApiDocument) {
        self.api_documents.push(doc);
    }

    pub fn add_probe(&mut self, probe: ProbeResult) {
        self.probes.push(probe);
    }

    /// Documents of one kind, in insertion order.
    pub fn documents_of(&self, kind: DocumentKind) -> impl Iterator<Item = &RawDocument> {
        self.documents.iter().filter(move |d| d.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.api_documents.is_empty() && self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_until_anything_is_added() {
        let mut store = DocumentStore::new("https://example.com");
        assert!(store.is_empty());
        store.add_probe(ProbeResult::status("/graphql", 403));
        assert!(!store.is_empty());
        assert_eq!(store.documents_of(DocumentKind::Html).count(), 0);
    }
}
