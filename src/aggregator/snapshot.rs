// src/aggregator/snapshot.rs
use crate::probe::ProbeResult;
use chrono::{DateTime, Utc};

/// One complete, immutable, point-in-time view of the fleet.
///
/// Built fresh for every status request and discarded after rendering;
/// nothing is ever cached between requests.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// True iff every probe came back ok.
    pub overall_ok: bool,
    /// One entry per configured service, in registry order, regardless of
    /// which probes succeeded, failed or timed out.
    pub results: Vec<ProbeResult>,
    pub generated_at: DateTime<Utc>,
}
