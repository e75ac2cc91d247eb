// src/registry/mod.rs
use crate::config::{Config, ProbeKind, ProbeMethod};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// A validated probe target. Built once by [`Registry::from_config`] and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub kind: ProbeKind,
    pub url: Url,
    pub health_path: String,
    pub method: ProbeMethod,
    pub timeout: Duration,
}

impl ServiceConfig {
    /// The concrete address this service is probed at, for reporting.
    pub fn target(&self) -> String {
        match self.kind {
            ProbeKind::Http => self
                .url
                .join(&self.health_path)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| self.url.to_string()),
            ProbeKind::Tcp => self.url.to_string(),
        }
    }
}

/// Immutable, loaded-once registry of monitored services.
///
/// Iteration order is configuration order, so every snapshot lists services
/// the same way across runs. No mutation API is exposed; reloading requires
/// a process restart.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<ServiceConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no services configured")]
    EmptyRegistry,

    #[error("duplicate service name: {0}")]
    DuplicateName(String),

    #[error("service {name}: invalid url {url:?}: {source}")]
    InvalidUrl {
        name: String,
        url: String,
        source: url::ParseError,
    },

    #[error("service {name}: unsupported scheme {scheme:?} for {kind} probe")]
    UnsupportedScheme {
        name: String,
        scheme: String,
        kind: &'static str,
    },

    #[error("service {name}: tcp probe requires an explicit host and port")]
    MissingHostPort { name: String },

    #[error("service {name}: invalid health path {path:?}")]
    InvalidHealthPath { name: String, path: String },

    #[error("service {0}: timeout must be positive")]
    InvalidTimeout(String),

    #[error("global timeout must be positive")]
    InvalidGlobalTimeout,
}

impl Registry {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if config.services.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }
        if config.global_timeout_ms == 0 || config.probe_timeout_ms == 0 {
            return Err(ConfigError::InvalidGlobalTimeout);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(config.services.len());

        for entry in &config.services {
            if !seen.insert(entry.name.clone()) {
                return Err(ConfigError::DuplicateName(entry.name.clone()));
            }

            let url = Url::parse(&entry.url).map_err(|source| ConfigError::InvalidUrl {
                name: entry.name.clone(),
                url: entry.url.clone(),
                source,
            })?;

            match entry.kind {
                ProbeKind::Http => {
                    if url.scheme() != "http" && url.scheme() != "https" {
                        return Err(ConfigError::UnsupportedScheme {
                            name: entry.name.clone(),
                            scheme: url.scheme().to_string(),
                            kind: "http",
                        });
                    }
                    // The join happens again on every probe; reject
                    // unjoinable paths here so the prober never has to.
                    if url.join(&entry.health_path).is_err() {
                        return Err(ConfigError::InvalidHealthPath {
                            name: entry.name.clone(),
                            path: entry.health_path.clone(),
                        });
                    }
                }
                ProbeKind::Tcp => {
                    if url.host_str().is_none() || url.port().is_none() {
                        return Err(ConfigError::MissingHostPort {
                            name: entry.name.clone(),
                        });
                    }
                }
            }

            let timeout_ms = entry.timeout_ms.unwrap_or(config.probe_timeout_ms);
            if timeout_ms == 0 {
                return Err(ConfigError::InvalidTimeout(entry.name.clone()));
            }

            entries.push(ServiceConfig {
                name: entry.name.clone(),
                kind: entry.kind,
                url,
                health_path: entry.health_path.clone(),
                method: entry.method,
                timeout: Duration::from_millis(timeout_ms),
            });
        }

        Ok(Self { entries })
    }

    /// Services in configuration order.
    pub fn entries(&self) -> &[ServiceConfig] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceEntry;

    fn base_config(services: Vec<ServiceEntry>) -> Config {
        Config {
            listen_addr: "127.0.0.1:0".to_string(),
            global_timeout_ms: 4_000,
            probe_timeout_ms: 2_000,
            services,
        }
    }

    fn http_entry(name: &str, url: &str) -> ServiceEntry {
        ServiceEntry {
            name: name.to_string(),
            kind: ProbeKind::Http,
            url: url.to_string(),
            health_path: "/health".to_string(),
            method: ProbeMethod::Get,
            timeout_ms: None,
        }
    }

    #[test]
    fn empty_service_list_is_rejected() {
        let err = Registry::from_config(&base_config(vec![])).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRegistry));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = base_config(vec![
            http_entry("api", "http://127.0.0.1:8001"),
            http_entry("api", "http://127.0.0.1:8002"),
        ]);
        let err = Registry::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName(name) if name == "api"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let config = base_config(vec![http_entry("api", "not a url")]);
        let err = Registry::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn non_http_scheme_is_rejected_for_http_probes() {
        let config = base_config(vec![http_entry("api", "ftp://127.0.0.1:21")]);
        let err = Registry::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { .. }));
    }

    #[test]
    fn tcp_probe_requires_host_and_port() {
        let mut entry = http_entry("redis", "tcp://127.0.0.1");
        entry.kind = ProbeKind::Tcp;
        let err = Registry::from_config(&base_config(vec![entry])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingHostPort { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut entry = http_entry("api", "http://127.0.0.1:8001");
        entry.timeout_ms = Some(0);
        let err = Registry::from_config(&base_config(vec![entry])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(name) if name == "api"));
    }

    #[test]
    fn zero_global_timeout_is_rejected() {
        let mut config = base_config(vec![http_entry("api", "http://127.0.0.1:8001")]);
        config.global_timeout_ms = 0;
        let err = Registry::from_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlobalTimeout));
    }

    #[test]
    fn entries_preserve_configuration_order() {
        let config = base_config(vec![
            http_entry("zeta", "http://127.0.0.1:8001"),
            http_entry("alpha", "http://127.0.0.1:8002"),
            http_entry("mid", "http://127.0.0.1:8003"),
        ]);
        let registry = Registry::from_config(&config).unwrap();
        let names: Vec<_> = registry.entries().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn per_service_timeout_overrides_global_default() {
        let mut slow = http_entry("slow", "http://127.0.0.1:8001");
        slow.timeout_ms = Some(5_000);
        let fast = http_entry("fast", "http://127.0.0.1:8002");
        let registry = Registry::from_config(&base_config(vec![slow, fast])).unwrap();
        assert_eq!(registry.entries()[0].timeout, Duration::from_millis(5_000));
        assert_eq!(registry.entries()[1].timeout, Duration::from_millis(2_000));
    }

    #[test]
    fn http_target_appends_health_path() {
        let registry = Registry::from_config(&base_config(vec![http_entry(
            "api",
            "http://127.0.0.1:8001",
        )]))
        .unwrap();
        assert_eq!(registry.entries()[0].target(), "http://127.0.0.1:8001/health");
    }
}
