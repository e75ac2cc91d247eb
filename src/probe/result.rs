// src/probe/result.rs
use std::time::Duration;

/// Classified cause of a failed probe. The display form is the short
/// machine-readable string surfaced in the status body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("timeout")]
    Timeout,

    #[error("connection-refused")]
    ConnectionRefused,

    #[error("dns-failure")]
    DnsFailure,

    #[error("tls-error")]
    TlsError,

    /// Reachable, but the status code fell outside the health-positive range.
    #[error("http-error")]
    HttpError,

    /// The probe was still in flight when the aggregator's overall deadline
    /// fired. Assigned by the aggregator, never by a prober.
    #[error("global-deadline-exceeded")]
    GlobalDeadlineExceeded,

    #[error("unknown-transport-error")]
    UnknownTransport,
}

/// Status codes treated as healthy: any non-error response.
pub fn health_positive(status: u16) -> bool {
    (200..=399).contains(&status)
}

/// Outcome of exactly one probe attempt. Immutable once built; owned by the
/// aggregator that requested it.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub service_name: String,
    /// The concrete URL (or host:port) that was probed.
    pub target: String,
    pub reachable: bool,
    /// Present iff an HTTP response was received.
    pub status_code: Option<u16>,
    /// Always populated: elapsed time to the response, or the expired
    /// timeout value when none arrived.
    pub latency: Duration,
    pub ok: bool,
    /// Present iff the probe did not come back healthy.
    pub error: Option<ProbeFailure>,
}

impl ProbeResult {
    /// An HTTP response arrived; healthiness follows from the status code.
    pub fn from_status(service_name: &str, target: String, status: u16, latency: Duration) -> Self {
        let ok = health_positive(status);
        Self {
            service_name: service_name.to_string(),
            target,
            reachable: true,
            status_code: Some(status),
            latency,
            ok,
            error: if ok { None } else { Some(ProbeFailure::HttpError) },
        }
    }

    /// A raw TCP connect succeeded. No status code exists for these.
    pub fn tcp_open(service_name: &str, target: String, latency: Duration) -> Self {
        Self {
            service_name: service_name.to_string(),
            target,
            reachable: true,
            status_code: None,
            latency,
            ok: true,
            error: None,
        }
    }

    pub fn unreachable(
        service_name: &str,
        target: String,
        failure: ProbeFailure,
        latency: Duration,
    ) -> Self {
        Self {
            service_name: service_name.to_string(),
            target,
            reachable: false,
            status_code: None,
            latency,
            ok: false,
            error: Some(failure),
        }
    }
}
