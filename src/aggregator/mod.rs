// src/aggregator/mod.rs
mod snapshot;

pub use snapshot::Snapshot;

use crate::probe::{Probe, ProbeFailure, ProbeResult};
use crate::registry::{ConfigError, Registry};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Fans one probe task out per registered service and fans the results back
/// in to a single [`Snapshot`].
///
/// Fan-out is intentionally unbounded: the registry is operator-controlled
/// and small. A worker pool would only become necessary if the target set
/// could grow without bound.
pub struct Aggregator {
    prober: Arc<dyn Probe>,
    global_deadline: Duration,
}

impl Aggregator {
    pub fn new(prober: Arc<dyn Probe>, global_deadline: Duration) -> Self {
        Self {
            prober,
            global_deadline,
        }
    }

    /// Probe every registered service concurrently and wait for all of them
    /// to reach a terminal state.
    ///
    /// Each probe runs under its own per-service timeout and, on top of
    /// that, under the aggregator's global deadline; a probe still in flight
    /// when the deadline fires is abandoned (dropping the future closes its
    /// connection) and recorded as `global-deadline-exceeded`. Downstream
    /// failures never surface as errors here; the only error condition is an
    /// unusable registry, caught before any probing begins.
    pub async fn aggregate(&self, registry: &Registry) -> Result<Snapshot, ConfigError> {
        if registry.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut tasks = Vec::with_capacity(registry.len());
        for entry in registry.entries() {
            let prober = self.prober.clone();
            let config = entry.clone();
            let deadline = self.global_deadline;

            tasks.push(tokio::spawn(async move {
                match timeout(deadline, prober.probe(&config)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            "Service {} abandoned at global deadline ({}ms)",
                            config.name,
                            deadline.as_millis()
                        );
                        ProbeResult::unreachable(
                            &config.name,
                            config.target(),
                            ProbeFailure::GlobalDeadlineExceeded,
                            deadline,
                        )
                    }
                }
            }));
        }

        // join_all preserves input order, so results line up with the
        // registry no matter which probe finished first.
        let joined = join_all(tasks).await;

        let mut results = Vec::with_capacity(joined.len());
        let mut healthy = 0usize;
        let mut unhealthy = 0usize;

        for (entry, task_result) in registry.entries().iter().zip(joined) {
            let result = match task_result {
                Ok(result) => result,
                Err(e) => {
                    error!("Probe task for {} failed to complete: {}", entry.name, e);
                    ProbeResult::unreachable(
                        &entry.name,
                        entry.target(),
                        ProbeFailure::UnknownTransport,
                        Duration::ZERO,
                    )
                }
            };

            if result.ok {
                healthy += 1;
                debug!("Service {} is healthy", result.service_name);
            } else {
                unhealthy += 1;
                warn!(
                    "Service {} is unhealthy: {:?}",
                    result.service_name, result.error
                );
            }
            results.push(result);
        }

        let overall_ok = results.iter().all(|r| r.ok);
        info!(
            "Health sweep complete: {} healthy, {} unhealthy",
            healthy, unhealthy
        );

        Ok(Snapshot {
            overall_ok,
            results,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProbeKind, ProbeMethod, ServiceEntry};
    use crate::registry::ServiceConfig;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Instant;

    #[derive(Clone, Copy)]
    enum Script {
        Status(u16),
        Fail(ProbeFailure),
        Hang(Duration),
        Panic,
    }

    struct ScriptedProbe {
        scripts: HashMap<String, Script>,
    }

    impl ScriptedProbe {
        fn new(scripts: Vec<(&str, Script)>) -> Arc<Self> {
            Arc::new(Self {
                scripts: scripts
                    .into_iter()
                    .map(|(name, s)| (name.to_string(), s))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn probe(&self, config: &ServiceConfig) -> ProbeResult {
            match self.scripts.get(&config.name).copied() {
                Some(Script::Status(status)) => ProbeResult::from_status(
                    &config.name,
                    config.target(),
                    status,
                    Duration::from_millis(5),
                ),
                Some(Script::Fail(failure)) => ProbeResult::unreachable(
                    &config.name,
                    config.target(),
                    failure,
                    Duration::from_millis(1),
                ),
                Some(Script::Hang(duration)) => {
                    tokio::time::sleep(duration).await;
                    ProbeResult::from_status(&config.name, config.target(), 200, duration)
                }
                Some(Script::Panic) => panic!("scripted probe failure"),
                None => ProbeResult::from_status(
                    &config.name,
                    config.target(),
                    200,
                    Duration::from_millis(5),
                ),
            }
        }
    }

    fn registry(names: &[&str]) -> Registry {
        let services = names
            .iter()
            .enumerate()
            .map(|(i, name)| ServiceEntry {
                name: name.to_string(),
                kind: ProbeKind::Http,
                url: format!("http://127.0.0.1:{}", 8000 + i),
                health_path: "/health".to_string(),
                method: ProbeMethod::Get,
                timeout_ms: None,
            })
            .collect();
        Registry::from_config(&Config {
            listen_addr: "127.0.0.1:0".to_string(),
            global_timeout_ms: 4_000,
            probe_timeout_ms: 2_000,
            services,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn all_healthy_yields_overall_ok() {
        let probe = ScriptedProbe::new(vec![("a", Script::Status(200)), ("b", Script::Status(204))]);
        let aggregator = Aggregator::new(probe, Duration::from_secs(1));

        let snapshot = aggregator.aggregate(&registry(&["a", "b"])).await.unwrap();

        assert!(snapshot.overall_ok);
        assert!(snapshot.results.iter().all(|r| r.ok));
    }

    #[tokio::test]
    async fn single_failure_marks_whole_fleet_unhealthy() {
        let probe = ScriptedProbe::new(vec![
            ("a", Script::Status(200)),
            ("b", Script::Fail(ProbeFailure::ConnectionRefused)),
            ("c", Script::Status(200)),
        ]);
        let aggregator = Aggregator::new(probe, Duration::from_secs(1));

        let snapshot = aggregator
            .aggregate(&registry(&["a", "b", "c"]))
            .await
            .unwrap();

        assert!(!snapshot.overall_ok);
        assert_eq!(snapshot.results[1].error, Some(ProbeFailure::ConnectionRefused));
    }

    #[tokio::test]
    async fn reachable_error_status_marks_fleet_unhealthy() {
        let probe = ScriptedProbe::new(vec![("a", Script::Status(200)), ("b", Script::Status(503))]);
        let aggregator = Aggregator::new(probe, Duration::from_secs(1));

        let snapshot = aggregator.aggregate(&registry(&["a", "b"])).await.unwrap();

        assert!(!snapshot.overall_ok);
        let b = &snapshot.results[1];
        assert!(b.reachable);
        assert!(!b.ok);
        assert_eq!(b.status_code, Some(503));
    }

    #[tokio::test]
    async fn every_service_appears_exactly_once_in_registry_order() {
        let probe = ScriptedProbe::new(vec![
            ("zeta", Script::Hang(Duration::from_millis(50))),
            ("alpha", Script::Fail(ProbeFailure::Timeout)),
            ("mid", Script::Status(200)),
        ]);
        let aggregator = Aggregator::new(probe, Duration::from_secs(1));
        let registry = registry(&["zeta", "alpha", "mid"]);

        // Completion order differs from registry order; output must not.
        for _ in 0..3 {
            let snapshot = aggregator.aggregate(&registry).await.unwrap();
            let names: Vec<_> = snapshot
                .results
                .iter()
                .map(|r| r.service_name.as_str())
                .collect();
            assert_eq!(names, ["zeta", "alpha", "mid"]);
        }
    }

    #[tokio::test]
    async fn hung_probe_is_cut_at_the_global_deadline() {
        let probe = ScriptedProbe::new(vec![
            ("hung", Script::Hang(Duration::from_secs(30))),
            ("fast", Script::Status(200)),
        ]);
        let aggregator = Aggregator::new(probe, Duration::from_millis(100));

        let start = Instant::now();
        let snapshot = aggregator
            .aggregate(&registry(&["hung", "fast"]))
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed < Duration::from_secs(2), "sweep took {:?}", elapsed);
        assert_eq!(snapshot.results.len(), 2);

        let hung = &snapshot.results[0];
        assert!(!hung.ok);
        assert_eq!(hung.error, Some(ProbeFailure::GlobalDeadlineExceeded));
        assert_eq!(hung.latency, Duration::from_millis(100));

        assert!(snapshot.results[1].ok);
        assert!(!snapshot.overall_ok);
    }

    #[tokio::test]
    async fn slow_probes_run_concurrently_not_serially() {
        let probe = ScriptedProbe::new(
            ["a", "b", "c", "d", "e"]
                .iter()
                .map(|name| (*name, Script::Hang(Duration::from_millis(150))))
                .collect(),
        );
        let aggregator = Aggregator::new(probe, Duration::from_secs(5));

        let start = Instant::now();
        let snapshot = aggregator
            .aggregate(&registry(&["a", "b", "c", "d", "e"]))
            .await
            .unwrap();

        // Five serialized probes would need 750ms.
        assert!(start.elapsed() < Duration::from_millis(600));
        assert!(snapshot.overall_ok);
    }

    #[tokio::test]
    async fn panicking_probe_is_recorded_not_dropped() {
        let probe = ScriptedProbe::new(vec![("bad", Script::Panic), ("good", Script::Status(200))]);
        let aggregator = Aggregator::new(probe, Duration::from_secs(1));

        let snapshot = aggregator
            .aggregate(&registry(&["bad", "good"]))
            .await
            .unwrap();

        assert_eq!(snapshot.results.len(), 2);
        let bad = &snapshot.results[0];
        assert!(!bad.ok);
        assert_eq!(bad.error, Some(ProbeFailure::UnknownTransport));
        assert!(!snapshot.overall_ok);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // overall_ok is the conjunction of per-service ok, nothing else.
            #[test]
            fn overall_ok_is_conjunction_of_statuses(statuses in prop::collection::vec(100u16..600, 1..12)) {
                let runtime = tokio::runtime::Runtime::new().unwrap();
                let names: Vec<String> = (0..statuses.len()).map(|i| format!("svc{}", i)).collect();
                let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let scripts = name_refs
                    .iter()
                    .zip(&statuses)
                    .map(|(name, status)| (*name, Script::Status(*status)))
                    .collect();

                let aggregator = Aggregator::new(ScriptedProbe::new(scripts), Duration::from_secs(1));
                let snapshot = runtime
                    .block_on(aggregator.aggregate(&registry(&name_refs)))
                    .unwrap();

                let expected = statuses.iter().all(|s| (200..=399).contains(s));
                prop_assert_eq!(snapshot.overall_ok, expected);
                prop_assert_eq!(snapshot.results.len(), statuses.len());
            }
        }
    }
}
