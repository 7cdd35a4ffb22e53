//! API Hunter: discovery aggregation engine that turns pre-fetched web
//! artifacts into a ranked, deduplicated set of likely API endpoints.

pub mod config;
pub mod discovery;
pub mod extract;
pub mod normalize;
pub mod openapi;
pub mod rank;
pub mod resolve;
pub mod store;
pub mod types;

pub use config::{DiscoveryConfig, ScoreTable};
pub use discovery::{discover, CancelFlag, Discovery, DiscoveryOutcome, RunStats};
pub use extract::probe::{AUTHENTICATED_PATHS, COMMON_PATHS};
pub use extract::Extractor;
pub use normalize::Normalizer;
pub use rank::{group_by_band, rank, ConfidenceBand};
pub use resolve::Resolver;
pub use store::{ApiDocument, ApiOperation, DocumentKind, DocumentStore, ProbeOutcome, ProbeResult, RawDocument};
pub use types::*;
