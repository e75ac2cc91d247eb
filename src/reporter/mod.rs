// src/reporter/mod.rs
//
// Pure rendering of snapshots into the externally observable bodies. No I/O
// happens here; everything is a deterministic function of its input.

use crate::aggregator::Snapshot;
use crate::probe::ProbeResult;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Serialize)]
struct StatusBody<'a> {
    ok: bool,
    generated_at: &'a DateTime<Utc>,
    #[serde(serialize_with = "serialize_services")]
    services: &'a [ProbeResult],
}

#[derive(Serialize)]
struct ServiceBody<'a> {
    ok: bool,
    status_code: Option<u16>,
    latency_ms: u64,
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a ProbeResult> for ServiceBody<'a> {
    fn from(result: &'a ProbeResult) -> Self {
        Self {
            ok: result.ok,
            status_code: result.status_code,
            latency_ms: result.latency.as_millis() as u64,
            url: &result.target,
            error: result.error.map(|failure| failure.to_string()),
        }
    }
}

// Serialized as a map keyed by service name. Emitting the entries ourselves
// keeps registry order on the wire; a sorted map type would not.
fn serialize_services<S>(results: &&[ProbeResult], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(results.len()))?;
    for result in results.iter() {
        map.serialize_entry(&result.service_name, &ServiceBody::from(result))?;
    }
    map.end()
}

/// Serialize a snapshot into the `/status` response body.
pub fn render(snapshot: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string(&StatusBody {
        ok: snapshot.overall_ok,
        generated_at: &snapshot.generated_at,
        services: &snapshot.results,
    })
}

#[derive(Serialize)]
pub struct SelfCheck {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Liveness of the aggregation process itself: constant-time, performs no
/// downstream calls.
pub fn self_check() -> SelfCheck {
    SelfCheck {
        ok: true,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }
}

pub fn render_self_check() -> serde_json::Result<String> {
    serde_json::to_string(&self_check())
}

/// Server-rendered HTML view of a snapshot: one table row per service plus
/// an overall banner.
pub fn render_dashboard(snapshot: &Snapshot) -> String {
    let mut rows = String::new();
    for result in &snapshot.results {
        let status = if result.ok { "OK" } else { "DOWN" };
        let status_code = result
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string());
        let error = result
            .error
            .map(|failure| failure.to_string())
            .unwrap_or_default();

        rows.push_str(&format!(
            "      <tr>\
             <td>{name}</td>\
             <td><code>{target}</code></td>\
             <td>{status}</td>\
             <td>{status_code}</td>\
             <td>{latency}</td>\
             <td><code>{error}</code></td>\
             </tr>\n",
            name = escape(&result.service_name),
            target = escape(&result.target),
            status = status,
            status_code = status_code,
            latency = result.latency.as_millis(),
            error = escape(&error),
        ));
    }

    let overall = if snapshot.overall_ok { "HEALTHY" } else { "DEGRADED" };

    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>Service Health</title>
  <style>
    body {{ font-family: Arial, sans-serif; padding: 20px; }}
    table {{ border-collapse: collapse; width: 100%; }}
    th, td {{ border: 1px solid #ddd; padding: 8px; }}
    th {{ background: #f5f5f5; text-align: left; }}
    code {{ font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; }}
  </style>
</head>
<body>
  <h2>Service Health</h2>
  <p><b>Overall:</b> {overall}</p>
  <p><b>Generated (UTC):</b> {generated_at}</p>

  <table>
    <thead>
      <tr>
        <th>Service</th>
        <th>Target</th>
        <th>Status</th>
        <th>Code</th>
        <th>Latency (ms)</th>
        <th>Error</th>
      </tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>

  <p style="margin-top:12px;">JSON: <a href="/status">/status</a></p>
</body>
</html>
"#,
        overall = overall,
        generated_at = snapshot.generated_at.to_rfc3339(),
        rows = rows,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
