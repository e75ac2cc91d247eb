// src/probe/prober.rs
use crate::config::{ProbeKind, ProbeMethod};
use crate::probe::result::{ProbeFailure, ProbeResult};
use crate::registry::ServiceConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes one health check against one configured service.
///
/// Implementations never fail: every transport problem is captured and
/// returned as a [`ProbeResult`], so a single flaky service cannot abort the
/// surrounding fan-out.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, config: &ServiceConfig) -> ProbeResult;
}

pub struct Prober {
    client: Client,
}

impl Prober {
    pub fn new() -> Self {
        // No client-level timeout: the per-service deadline is enforced
        // around each request instead.
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    async fn probe_http(&self, config: &ServiceConfig) -> ProbeResult {
        let url = match config.url.join(&config.health_path) {
            Ok(url) => url,
            // Unreachable in practice: the registry rejects unjoinable paths.
            Err(e) => {
                warn!("Service {}: cannot build health URL: {}", config.name, e);
                return ProbeResult::unreachable(
                    &config.name,
                    config.url.to_string(),
                    ProbeFailure::UnknownTransport,
                    Duration::ZERO,
                );
            }
        };
        let target = url.to_string();

        let request = match config.method {
            ProbeMethod::Get => self.client.get(url.as_str()),
            ProbeMethod::Head => self.client.head(url.as_str()),
        };

        let start = Instant::now();
        let result = timeout(config.timeout, request.send()).await;

        match result {
            Ok(Ok(response)) => {
                let latency = start.elapsed();
                let status = response.status().as_u16();
                debug!(
                    "Service {} responded HTTP {} in {}ms",
                    config.name,
                    status,
                    latency.as_millis()
                );
                ProbeResult::from_status(&config.name, target, status, latency)
            }
            Ok(Err(e)) => {
                let failure = classify_reqwest(&e);
                // On timeout the recorded latency is the configured value,
                // not the (equal but jittery) measured elapsed time.
                let latency = if failure == ProbeFailure::Timeout {
                    config.timeout
                } else {
                    start.elapsed()
                };
                debug!("Service {} unreachable: {} ({})", config.name, failure, e);
                ProbeResult::unreachable(&config.name, target, failure, latency)
            }
            Err(_) => {
                debug!(
                    "Service {} timed out after {}ms",
                    config.name,
                    config.timeout.as_millis()
                );
                ProbeResult::unreachable(&config.name, target, ProbeFailure::Timeout, config.timeout)
            }
        }
    }

    async fn probe_tcp(&self, config: &ServiceConfig) -> ProbeResult {
        let target = config.url.to_string();
        let (host, port) = match (config.url.host_str(), config.url.port()) {
            (Some(host), Some(port)) => (host.to_string(), port),
            // Unreachable in practice: the registry requires host and port.
            _ => {
                return ProbeResult::unreachable(
                    &config.name,
                    target,
                    ProbeFailure::UnknownTransport,
                    Duration::ZERO,
                )
            }
        };

        let start = Instant::now();
        match timeout(config.timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(stream)) => {
                let latency = start.elapsed();
                drop(stream);
                debug!(
                    "Service {} accepted tcp connect in {}ms",
                    config.name,
                    latency.as_millis()
                );
                ProbeResult::tcp_open(&config.name, target, latency)
            }
            Ok(Err(e)) => {
                let failure = classify_io(&e);
                debug!("Service {} unreachable: {} ({})", config.name, failure, e);
                ProbeResult::unreachable(&config.name, target, failure, start.elapsed())
            }
            Err(_) => {
                ProbeResult::unreachable(&config.name, target, ProbeFailure::Timeout, config.timeout)
            }
        }
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for Prober {
    async fn probe(&self, config: &ServiceConfig) -> ProbeResult {
        match config.kind {
            ProbeKind::Http => self.probe_http(config).await,
            ProbeKind::Tcp => self.probe_tcp(config).await,
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> ProbeFailure {
    if err.is_timeout() {
        return ProbeFailure::Timeout;
    }

    // The interesting cause (dns, tls, socket) sits somewhere down the
    // hyper error chain.
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("dns") || text.contains("lookup address") {
            return ProbeFailure::DnsFailure;
        }
        if text.contains("certificate") || text.contains("tls") || text.contains("ssl") {
            return ProbeFailure::TlsError;
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return ProbeFailure::ConnectionRefused,
                io::ErrorKind::TimedOut => return ProbeFailure::Timeout,
                _ => {}
            }
        }
        source = cause.source();
    }

    if err.is_connect() {
        ProbeFailure::ConnectionRefused
    } else {
        ProbeFailure::UnknownTransport
    }
}

fn classify_io(err: &io::Error) -> ProbeFailure {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ProbeFailure::ConnectionRefused,
        io::ErrorKind::TimedOut => ProbeFailure::Timeout,
        _ => {
            let text = err.to_string().to_ascii_lowercase();
            if text.contains("dns") || text.contains("lookup address") {
                ProbeFailure::DnsFailure
            } else {
                ProbeFailure::UnknownTransport
            }
        }
    }
}
