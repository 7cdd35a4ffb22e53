//! Reporting collaborator: renders ranked endpoints.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::Serialize;

use api_hunter::{group_by_band, ConfidenceBand, Endpoint, EndpointKey, SourceKind};

use crate::fetch::validate::{Reachability, ReachabilityMap};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary grouped by confidence.
    Console,
    Json,
    Csv,
    Html,
    /// One URL per line.
    List,
    /// Text report grouped by confidence band, with parameters.
    Detailed,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Console | Self::List | Self::Detailed => "txt",
        }
    }
}

/// A finished scan, ready to render.
pub struct Report<'a> {
    pub target: &'a str,
    pub generated_at: DateTime<Local>,
    pub endpoints: &'a [Endpoint],
    /// HEAD results, present only for validated scans.
    pub reachability: Option<&'a ReachabilityMap>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    timestamp: String,
    target: &'a str,
    total_endpoints: usize,
    endpoints: Vec<JsonEndpoint<'a>>,
}

#[derive(Serialize)]
struct JsonEndpoint<'a> {
    #[serde(flatten)]
    endpoint: &'a Endpoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    reachability: Option<&'a Reachability>,
}

impl<'a> Report<'a> {
    pub fn new(target: &'a str, endpoints: &'a [Endpoint]) -> Self {
        Self {
            target,
            generated_at: Local::now(),
            endpoints,
            reachability: None,
        }
    }

    /// Attach validation results. An empty map leaves the report unchanged.
    pub fn with_reachability(mut self, reachability: &'a ReachabilityMap) -> Self {
        self.reachability = Some(reachability).filter(|r| !r.is_empty());
        self
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        Ok(match format {
            ReportFormat::Console => self.console(),
            ReportFormat::Json => self.json()?,
            ReportFormat::Csv => self.csv(),
            ReportFormat::Html => self.html(),
            ReportFormat::List => self.list(),
            ReportFormat::Detailed => self.detailed(),
        })
    }

    fn reachability_of(&self, ep: &Endpoint) -> Option<&'a Reachability> {
        let key = EndpointKey {
            canonical_url: ep.canonical_url.clone(),
            method: ep.method,
        };
        self.reachability?.get(&key)
    }

    fn json(&self) -> Result<String> {
        let report = JsonReport {
            timestamp: self.generated_at.to_rfc3339(),
            target: self.target,
            total_endpoints: self.endpoints.len(),
            endpoints: self
                .endpoints
                .iter()
                .map(|endpoint| JsonEndpoint {
                    endpoint,
                    reachability: self.reachability_of(endpoint),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&report).context("failed to serialize JSON report")
    }

    fn csv(&self) -> String {
        let mut out = String::from("url,method,confidence,evidence_count,sources,parameters");
        if self.reachability.is_some() {
            out.push_str(",status,content_type");
        }
        out.push('\n');
        for ep in self.endpoints {
            let mut row = vec![
                csv_field(&ep.canonical_url),
                ep.method.to_string(),
                format!("{:.2}", ep.confidence),
                ep.evidence_count.to_string(),
                csv_field(&join_sources(ep)),
                csv_field(&join_params(ep)),
            ];
            if self.reachability.is_some() {
                let reach = self.reachability_of(ep);
                row.push(
                    reach
                        .and_then(|r| r.status)
                        .map(|code| code.to_string())
                        .unwrap_or_default(),
                );
                row.push(csv_field(
                    reach.and_then(|r| r.content_type.as_deref()).unwrap_or(""),
                ));
            }
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }

    fn list(&self) -> String {
        let mut out = format!(
            "# API endpoints discovered on {} at {}\n# Total endpoints: {}\n\n",
            self.target,
            self.generated_at.format("%Y-%m-%d %H:%M:%S"),
            self.endpoints.len()
        );
        for ep in self.endpoints {
            out.push_str(&ep.canonical_url);
            out.push('\n');
        }
        out
    }

    fn console(&self) -> String {
        if self.endpoints.is_empty() {
            return "No API endpoints discovered.\n".to_string();
        }
        let rule = "=".repeat(60);
        let mut out = format!(
            "API Hunter results for {} ({} endpoints)\n{rule}\n",
            self.target,
            self.endpoints.len()
        );

        let groups = group_by_band(self.endpoints);
        for (band, members) in &groups {
            out.push_str(&format!("\n{}:\n", band.label().to_uppercase()));
            for ep in members {
                out.push_str(&format!("  [{}] {}\n", ep.method, ep.canonical_url));
                out.push_str(&format!(
                    "      sources: {} | confidence: {:.2}\n",
                    join_sources(ep),
                    ep.confidence
                ));
                if *band == ConfidenceBand::High && !ep.parameters.is_empty() {
                    out.push_str(&format!("      parameters: {}\n", join_params(ep)));
                }
                if let Some(reach) = self.reachability_of(ep) {
                    out.push_str(&format!("      reachable: {}\n", reach.summary()));
                }
            }
        }

        out.push_str(&format!("\n{rule}\nSummary: {}\n", band_summary(&groups)));
        out
    }

    fn detailed(&self) -> String {
        if self.endpoints.is_empty() {
            return "No API endpoints discovered.\n".to_string();
        }
        let rule = "=".repeat(80);
        let mut out = format!("{rule}\nAPI ENDPOINTS DISCOVERY REPORT\n{rule}\n");
        out.push_str(&format!("Target URL: {}\n", self.target));
        out.push_str(&format!(
            "Scan Date: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "Total Endpoints Found: {}\n{rule}\n\n",
            self.endpoints.len()
        ));

        let groups = group_by_band(self.endpoints);
        for (band, members) in &groups {
            out.push_str(&format!(
                "{} ({} endpoints)\n{}\n",
                band.label().to_uppercase(),
                members.len(),
                "-".repeat(60)
            ));
            for (i, ep) in members.iter().enumerate() {
                out.push_str(&format!("{:2}. URL: {}\n", i + 1, ep.canonical_url));
                out.push_str(&format!("    Method: {}\n", ep.method));
                out.push_str(&format!("    Sources: {}\n", join_sources(ep)));
                out.push_str(&format!("    Confidence: {:.2}\n", ep.confidence));
                out.push_str(&format!("    Evidence: {}\n", ep.evidence_count));
                if !ep.parameters.is_empty() {
                    out.push_str(&format!("    Parameters: {}\n", join_params(ep)));
                }
                if let Some(reach) = self.reachability_of(ep) {
                    out.push_str(&format!("    Reachable: {}\n", reach.summary()));
                }
                out.push('\n');
            }
        }

        out.push_str(&format!("{rule}\nSUMMARY\n{rule}\n"));
        for band in [ConfidenceBand::High, ConfidenceBand::Medium, ConfidenceBand::Low] {
            let count = groups
                .iter()
                .find(|(b, _)| *b == band)
                .map_or(0, |(_, m)| m.len());
            out.push_str(&format!("{}: {count} endpoints\n", band.label()));
        }
        out.push_str(&format!("Total: {} endpoints\n{rule}\n", self.endpoints.len()));
        out
    }

    fn html(&self) -> String {
        let mut rows = String::new();
        for ep in self.endpoints {
            let class = match ConfidenceBand::of(ep.confidence) {
                ConfidenceBand::High => "high",
                ConfidenceBand::Medium => "medium",
                ConfidenceBand::Low => "low",
            };
            let params: String = ep
                .parameters
                .iter()
                .map(|p| format!("<span class=\"param\">{}</span>", escape_html(p)))
                .collect();
            let reach = match self.reachability_of(ep) {
                Some(r) => format!(
                    "<div class=\"reach {}\">Reachable: {}</div>",
                    if r.is_reachable() { "up" } else { "down" },
                    escape_html(&r.summary())
                ),
                None => String::new(),
            };
            rows.push_str(&format!(
                "<div class=\"endpoint\">\
                 <div class=\"endpoint-header\"><span class=\"method {method}\">{method}</span>\
                 <span class=\"confidence {class}\">Confidence: {confidence:.2}</span></div>\
                 <div class=\"url\">{url}</div>\
                 <div class=\"sources\">Sources: {sources} ({evidence} observations)</div>\
                 {reach}<div class=\"parameters\">{params}</div></div>\n",
                method = ep.method,
                confidence = ep.confidence,
                url = escape_html(&ep.canonical_url),
                sources = escape_html(&join_sources(ep)),
                evidence = ep.evidence_count,
            ));
        }

        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
             <title>API Hunter Report</title>\n<style>{HTML_STYLE}</style>\n</head>\n<body>\n\
             <div class=\"container\">\n<h1>API Hunter Report</h1>\n\
             <div class=\"summary\"><strong>Target URL:</strong> {target}<br>\
             <strong>Scan Time:</strong> {time}<br>\
             <strong>Total Endpoints Found:</strong> {total}</div>\n\
             <h2>Discovered API Endpoints</h2>\n{rows}</div>\n</body>\n</html>\n",
            target = escape_html(self.target),
            time = self.generated_at.to_rfc3339(),
            total = self.endpoints.len(),
        )
    }
}

const HTML_STYLE: &str = "\
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;margin:0;padding:20px;background:#f5f5f5}\
.container{max-width:1200px;margin:0 auto;background:#fff;padding:30px;border-radius:8px}\
h1{color:#2c3e50;border-bottom:3px solid #3498db;padding-bottom:10px}\
.summary{background:#ecf0f1;padding:15px;border-radius:5px;margin:20px 0}\
.endpoint{border:1px solid #ddd;margin:15px 0;border-radius:5px;padding:15px;background:#fafafa}\
.endpoint-header{display:flex;justify-content:space-between;margin-bottom:10px}\
.method{padding:3px 8px;border-radius:3px;font-weight:bold;font-size:12px;color:#fff;background:#7f8c8d}\
.GET{background:#27ae60}.POST{background:#f39c12}.PUT{background:#3498db}.DELETE{background:#e74c3c}.PATCH{background:#9b59b6}\
.confidence{font-weight:bold}.high{color:#27ae60}.medium{color:#f39c12}.low{color:#e74c3c}\
.url{font-family:'Courier New',monospace;background:#2c3e50;color:#ecf0f1;padding:8px;border-radius:3px;word-break:break-all}\
.sources{font-style:italic;color:#7f8c8d;font-size:14px}\
.param{display:inline-block;background:#3498db;color:#fff;padding:2px 6px;margin:2px;border-radius:3px;font-size:12px}\
.reach{font-size:13px;margin:4px 0}.up{color:#27ae60}.down{color:#e74c3c}";

fn join_sources(ep: &Endpoint) -> String {
    ep.sources
        .iter()
        .map(SourceKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_params(ep: &Endpoint) -> String {
    ep.parameters.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn band_summary(groups: &[(ConfidenceBand, Vec<&Endpoint>)]) -> String {
    let count = |band| groups.iter().find(|(b, _)| *b == band).map_or(0, |(_, m)| m.len());
    format!(
        "{} high, {} medium, {} low confidence",
        count(ConfidenceBand::High),
        count(ConfidenceBand::Medium),
        count(ConfidenceBand::Low)
    )
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `api_hunter_<host>_<YYYYmmdd_HHMMSS>.<ext>` for `--auto-save`.
pub fn auto_save_filename(target: &str, format: ReportFormat, at: DateTime<Local>) -> String {
    let host = url::Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "target".to_string());
    let host: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!(
        "api_hunter_{host}_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Write a rendered report, creating parent directories.
pub fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_hunter::Method;
    use chrono::TimeZone;

    fn endpoint(url: &str, method: Method, confidence: f64, sources: &[SourceKind], params: &[&str]) -> Endpoint {
        Endpoint {
            canonical_url: url.to_string(),
            method,
            parameters: params.iter().map(|p| p.to_string()).collect(),
            sources: sources.iter().copied().collect(),
            confidence,
            evidence_count: sources.len(),
            peak_score: confidence,
        }
    }

    fn sample() -> Vec<Endpoint> {
        vec![
            endpoint(
                "https://example.com/api/v1/users",
                Method::Get,
                1.0,
                &[SourceKind::Javascript, SourceKind::Swagger],
                &["id", "name"],
            ),
            endpoint("https://example.com/graphql", Method::Get, 0.6, &[SourceKind::CommonPath], &[]),
            endpoint(
                "https://example.com/search?a=1,2",
                Method::Post,
                0.4,
                &[SourceKind::Comment],
                &["a"],
            ),
        ]
    }

    fn report(endpoints: &[Endpoint]) -> Report<'_> {
        Report {
            target: "https://example.com",
            generated_at: Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
            endpoints,
            reachability: None,
        }
    }

    #[test]
    fn test_json_report() {
        let eps = sample();
        let text = report(&eps).render(ReportFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["total_endpoints"], 3);
        assert_eq!(v["target"], "https://example.com");
        assert_eq!(v["endpoints"][0]["canonical_url"], "https://example.com/api/v1/users");
        assert_eq!(v["endpoints"][0]["sources"], serde_json::json!(["javascript", "swagger"]));
        assert!(v["timestamp"].as_str().unwrap().starts_with("2024-03-01T12:30:05"));
    }

    #[test]
    fn test_csv_quoting() {
        let eps = sample();
        let text = report(&eps).render(ReportFormat::Csv).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "url,method,confidence,evidence_count,sources,parameters");
        assert_eq!(
            lines[1],
            "https://example.com/api/v1/users,GET,1.00,2,\"javascript, swagger\",\"id, name\""
        );
        assert_eq!(lines[3], "\"https://example.com/search?a=1,2\",POST,0.40,1,comment,a");
    }

    #[test]
    fn test_list_and_console() {
        let eps = sample();
        let r = report(&eps);
        let list = r.render(ReportFormat::List).unwrap();
        assert!(list.ends_with("https://example.com/api/v1/users\nhttps://example.com/graphql\nhttps://example.com/search?a=1,2\n"));

        let console = r.render(ReportFormat::Console).unwrap();
        assert!(console.contains("HIGH CONFIDENCE:"));
        assert!(console.contains("[GET] https://example.com/graphql"));
        assert!(console.contains("Summary: 1 high, 1 medium, 1 low confidence"));
    }

    #[test]
    fn test_detailed_groups() {
        let eps = sample();
        let text = report(&eps).render(ReportFormat::Detailed).unwrap();
        assert!(text.contains("Target URL: https://example.com"));
        assert!(text.contains("MEDIUM CONFIDENCE (1 endpoints)"));
        assert!(text.contains("    Parameters: id, name"));
        assert!(text.contains("Low Confidence: 1 endpoints"));
    }

    #[test]
    fn test_html_escapes() {
        let eps = vec![endpoint(
            "https://example.com/x?q=<script>",
            Method::Get,
            0.9,
            &[SourceKind::HtmlLink],
            &[],
        )];
        let html = report(&eps).render(ReportFormat::Html).unwrap();
        assert!(html.contains("https://example.com/x?q=&lt;script&gt;"));
        assert!(!html.contains("q=<script>"));
        assert!(html.contains("class=\"confidence high\""));
    }

    #[test]
    fn test_empty_report() {
        let r = report(&[]);
        assert_eq!(r.render(ReportFormat::Console).unwrap(), "No API endpoints discovered.\n");
        let v: serde_json::Value = serde_json::from_str(&r.render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(v["total_endpoints"], 0);
    }

    fn validated(endpoints: &[Endpoint]) -> ReachabilityMap {
        let mut map = ReachabilityMap::new();
        map.insert(
            EndpointKey {
                canonical_url: endpoints[0].canonical_url.clone(),
                method: endpoints[0].method,
            },
            Reachability {
                status: Some(200),
                content_type: Some("application/json".into()),
            },
        );
        map.insert(
            EndpointKey {
                canonical_url: endpoints[1].canonical_url.clone(),
                method: endpoints[1].method,
            },
            Reachability {
                status: None,
                content_type: None,
            },
        );
        map
    }

    #[test]
    fn test_reachability_in_reports() {
        let eps = sample();
        let map = validated(&eps);
        let r = report(&eps).with_reachability(&map);

        let v: serde_json::Value = serde_json::from_str(&r.render(ReportFormat::Json).unwrap()).unwrap();
        assert_eq!(v["endpoints"][0]["reachability"]["status"], 200);
        assert_eq!(v["endpoints"][0]["confidence"], 1.0);
        assert!(v["endpoints"][1]["reachability"]["status"].is_null());
        assert!(v["endpoints"][2].get("reachability").is_none());

        let csv = r.render(ReportFormat::Csv).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert!(lines[0].ends_with(",status,content_type"));
        assert!(lines[1].ends_with(",200,application/json"));
        assert!(lines[3].ends_with(",,"));

        let console = r.render(ReportFormat::Console).unwrap();
        assert!(console.contains("reachable: 200 application/json"));
        assert!(console.contains("reachable: unreachable"));
        assert!(r.render(ReportFormat::Html).unwrap().contains("class=\"reach up\""));
    }

    #[test]
    fn test_empty_reachability_is_ignored() {
        let eps = sample();
        let empty = ReachabilityMap::new();
        let r = report(&eps).with_reachability(&empty);
        let csv = r.render(ReportFormat::Csv).unwrap();
        assert_eq!(csv.lines().next(), Some("url,method,confidence,evidence_count,sources,parameters"));
    }

    #[test]
    fn test_auto_save_filename() {
        let at = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            auto_save_filename("https://api.example.com:8443/x", ReportFormat::Json, at),
            "api_hunter_api.example.com_20240301_123005.json"
        );
        assert_eq!(
            auto_save_filename("nonsense", ReportFormat::Detailed, at),
            "api_hunter_target_20240301_123005.txt"
        );
    }

    #[test]
    fn test_write_report_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extracts").join("report.csv");
        write_report(&path, "url\n").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "url\n");
    }
}
