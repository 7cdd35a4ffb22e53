//! Authentication by header and cookie injection.
//!
//! No login flows: callers supply what an authenticated browser would send.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

/// Credentials given on the command line.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// JSON object of header name to value.
    pub headers_json: Option<String>,
    /// JSON object of cookie name to value.
    pub cookies_json: Option<String>,
    pub bearer: Option<String>,
}

impl AuthOptions {
    pub fn is_empty(&self) -> bool {
        self.headers_json.is_none() && self.cookies_json.is_none() && self.bearer.is_none()
    }

    /// Headers to attach to every request. A bearer token replaces any
    /// `Authorization` header given in `headers_json`.
    pub fn headers(&self) -> Result<Vec<(String, String)>> {
        let mut headers: Vec<(String, String)> = Vec::new();

        if let Some(raw) = &self.headers_json {
            for (name, value) in parse_object(raw, "--auth-headers")? {
                set_header(&mut headers, &name, value);
            }
        }

        if let Some(raw) = &self.cookies_json {
            let cookie = parse_object(raw, "--cookies")?
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            if !cookie.is_empty() {
                set_header(&mut headers, "Cookie", cookie);
            }
        }

        if let Some(token) = &self.bearer {
            let token = token.trim();
            if token.is_empty() {
                bail!("--bearer token is empty");
            }
            set_header(&mut headers, "Authorization", format!("Bearer {token}"));
        }

        Ok(headers)
    }
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: String) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value));
}

/// Parse a flat JSON object. Scalar values are stringified; nested values
/// are rejected.
fn parse_object(raw: &str, flag: &str) -> Result<Vec<(String, String)>> {
    let map: Map<String, Value> =
        serde_json::from_str(raw).with_context(|| format!("{flag} must be a JSON object"))?;
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => bail!("{flag}: value for {key:?} must be a string, got {other}"),
            };
            Ok((key, value))
        })
        .collect()
}
