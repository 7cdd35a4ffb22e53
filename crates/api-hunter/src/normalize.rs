//! URL canonicalization, scope filtering, and method inference.

use url::{Host, Url};

use crate::extract::is_non_navigational;
use crate::types::{HunterError, HunterResult, NormalizedObservation, Observation};

/// Two-level public suffixes under which registrable domains have three
/// labels.
const TWO_LEVEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "ltd.uk", "plc.uk", "me.uk",
    "com.au", "net.au", "org.au", "edu.au", "gov.au",
    "co.jp", "ne.jp", "or.jp", "ac.jp",
    "co.nz", "org.nz", "govt.nz",
    "co.za", "org.za",
    "com.br", "net.br", "gov.br",
    "com.cn", "net.cn", "org.cn",
    "co.in", "net.in", "org.in",
    "com.mx", "com.tr", "com.sg", "com.hk", "co.kr", "or.kr", "co.il",
];

/// Turns raw observations into canonical, in-scope observations.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base: Url,
    scope: String,
    extend_scope: bool,
}

impl Normalizer {
    pub fn new(base_url: &str, extend_scope: bool) -> HunterResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| HunterError::Configuration(format!("invalid target URL {base_url:?}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(HunterError::Configuration(format!(
                "target URL must be http or https: {base_url}"
            )));
        }
        let scope = registrable_domain(&base).ok_or_else(|| {
            HunterError::Configuration(format!("target URL has no host: {base_url}"))
        })?;
        Ok(Self {
            base,
            scope,
            extend_scope,
        })
    }

    /// Registrable domain of the target.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Canonicalize one observation.
    ///
    /// Fails with [`HunterError::UnresolvableReference`] when the reference
    /// cannot be resolved to an http(s) URL or lies outside the target's
    /// registrable domain while scope extension is off.
    pub fn normalize(&self, obs: &Observation) -> HunterResult<NormalizedObservation> {
        let raw = obs.raw_reference.trim();
        if is_non_navigational(raw) {
            return Err(HunterError::unresolvable(raw, "not a navigable reference"));
        }

        let origin = Url::parse(&obs.origin_document)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or_else(|| self.base.clone());
        let mut url = origin
            .join(raw)
            .map_err(|e| HunterError::unresolvable(raw, e))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(HunterError::unresolvable(
                raw,
                format!("unsupported scheme {}", url.scheme()),
            ));
        }
        let domain =
            registrable_domain(&url).ok_or_else(|| HunterError::unresolvable(raw, "no host"))?;
        if domain != self.scope && !self.extend_scope {
            return Err(HunterError::unresolvable(
                raw,
                format!("off-scope host ({domain} is not {})", self.scope),
            ));
        }

        let mut parameters = obs.parameter_hints.clone();
        parameters.extend(
            url.query_pairs()
                .map(|(k, _)| k.into_owned())
                .filter(|k| !k.is_empty()),
        );

        url.set_fragment(None);
        let path = canonical_path(url.path());
        url.set_path(&path);
        let query = url.query().map(sorted_query).filter(|q| !q.is_empty());
        url.set_query(query.as_deref());

        Ok(NormalizedObservation {
            canonical_url: restore_placeholders(url.as_str()),
            method: obs.method_hint.or(obs.form_method).unwrap_or_default(),
            tier: obs.tier,
            parameters,
        })
    }
}

/// Collapse repeated slashes and drop a single trailing slash (except root).
fn canonical_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Sort `k=v` pairs by key, then value. Empty pairs are dropped.
fn sorted_query(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| if v.is_empty() { (*k).to_string() } else { format!("{k}={v}") })
        .collect::<Vec<_>>()
        .join("&")
}

fn restore_placeholders(url: &str) -> String {
    url.replace("%7B", "{")
        .replace("%7b", "{")
        .replace("%7D", "}")
        .replace("%7d", "}")
}

/// Registrable domain of a URL's host.
///
/// IP literals and single-label hosts (`localhost`) are their own domain.
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
        Host::Domain(host) => {
            let host = host.trim_end_matches('.').to_ascii_lowercase();
            let labels: Vec<&str> = host.split('.').collect();
            if labels.len() <= 2 {
                return Some(host);
            }
            let n = labels.len();
            let suffix = labels[n - 2..].join(".");
            let keep = if TWO_LEVEL_SUFFIXES.contains(&suffix.as_str()) { 3 } else { 2 };
            Some(labels[n.saturating_sub(keep)..].join("."))
        }
    }
}
