//! Common-path probe extractor.
//!
//! The fetch collaborator requests each entry of [`COMMON_PATHS`] against the
//! target origin; this module turns the answers into observations. A 404 or
//! 410 means absent, a timeout or transport failure means "no signal", and
//! neither is ever scored as negative evidence.

use tracing::debug;

use crate::store::{ProbeOutcome, ProbeResult};
use crate::types::{HunterError, Observation, ScoreTier};

/// Well-known API path suffixes probed against the target origin.
pub const COMMON_PATHS: &[&str] = &[
    "/api",
    "/api/v1",
    "/api/v2",
    "/v1",
    "/rest",
    "/graphql",
    "/swagger.json",
    "/openapi.json",
    "/api-docs",
    "/endpoints",
    "/services",
    "/data",
    "/ajax",
    "/client/api",
];

/// Account-scoped paths, probed in addition to [`COMMON_PATHS`] when the
/// scan carries credentials.
pub const AUTHENTICATED_PATHS: &[&str] = &[
    "/client/api/user",
    "/client/api/events",
    "/client/api/groups",
    "/client/api/calendar",
    "/client/api/invitations",
    "/client/api/messages",
    "/client/api/notifications",
    "/api/user",
    "/api/events",
    "/api/groups",
    "/api/calendar",
    "/api/invitations",
    "/api/messages",
    "/api/profile",
    "/api/dashboard",
    "/api/settings",
];

/// Confidence tier for a probe status code, or `None` when the status is
/// not evidence that the path exists.
pub fn classify_status(code: u16) -> Option<ScoreTier> {
    match code {
        200..=399 => Some(ScoreTier::CommonPathOk),
        404 | 410 => None,
        // 401/403 and the other client errors (405, 429, ...) mean something
        // answered at that path.
        400..=499 => Some(ScoreTier::CommonPathProtected),
        _ => None,
    }
}

/// Observation for one probe result, anchored at the target base URL.
pub fn extract(probe: &ProbeResult, base_url: &str) -> Vec<Observation> {
    match &probe.outcome {
        ProbeOutcome::Status { code } => match classify_status(*code) {
            Some(tier) => vec![Observation::new(&probe.path, tier, base_url)],
            None => {
                debug!(path = %probe.path, status = code, "probe negative");
                Vec::new()
            }
        },
        ProbeOutcome::TimedOut => {
            let err = HunterError::ProbeTimeout {
                path: probe.path.clone(),
            };
            debug!("{err}; treated as no signal");
            Vec::new()
        }
        ProbeOutcome::Failed { reason } => {
            debug!(path = %probe.path, "probe failed: {reason}; treated as no signal");
            Vec::new()
        }
    }
}
