// src/config/models.rs
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration file shape.
///
/// Every field falls back to a documented default; only the service list
/// itself is mandatory (and its validation lives in the registry, which
/// refuses to start with an empty or inconsistent one).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Hard cap on the wall-clock time of one whole aggregation sweep.
    #[serde(default = "default_global_timeout_ms")]
    pub global_timeout_ms: u64,

    /// Default per-service probe timeout; entries may override it.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

impl Config {
    pub fn global_timeout(&self) -> Duration {
        Duration::from_millis(self.global_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// One monitored service as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub name: String,
    #[serde(default)]
    pub kind: ProbeKind,
    pub url: String,
    /// Path appended to the base URL for http probes.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// HTTP verb used for the probe; some endpoints only implement HEAD.
    #[serde(default)]
    pub method: ProbeMethod,
    /// Overrides the global probe timeout when set.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Http,
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    #[default]
    Get,
    Head,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_global_timeout_ms() -> u64 {
    4_000
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_health_path() -> String {
    "/health".to_string()
}
