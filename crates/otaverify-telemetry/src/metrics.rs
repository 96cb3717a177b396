//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters the verification pipeline records.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across pipeline stages.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    actions_completed_total: IntCounterVec,
    partitions_hashed_total: IntCounterVec,
    bytes_hashed_total: IntCounter,
    payload_checks_total: IntCounterVec,
}

/// Snapshot of the scalar counters for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Total bytes fed into partition hashers.
    pub bytes_hashed_total: u64,
    /// Partitions whose digest matched the expected value.
    pub partitions_matched_total: u64,
    /// Partitions whose digest did not match the expected value.
    pub partitions_mismatched_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let actions_completed_total = counter_vec(
            "actions_completed_total",
            "Pipeline actions completed by type and completion code",
            &["action", "code"],
        )?;
        let partitions_hashed_total = counter_vec(
            "partitions_hashed_total",
            "Partition images hashed by verification step and outcome",
            &["step", "outcome"],
        )?;
        let bytes_hashed_total = IntCounter::with_opts(Opts::new(
            "bytes_hashed_total",
            "Bytes read from partition images and fed to the hasher",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "bytes_hashed_total",
            source,
        })?;
        let payload_checks_total = counter_vec(
            "payload_checks_total",
            "Payload header and signature checks by outcome",
            &["check", "outcome"],
        )?;

        register(&registry, "actions_completed_total", &actions_completed_total)?;
        register(&registry, "partitions_hashed_total", &partitions_hashed_total)?;
        register(&registry, "bytes_hashed_total", &bytes_hashed_total)?;
        register(&registry, "payload_checks_total", &payload_checks_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                actions_completed_total,
                partitions_hashed_total,
                bytes_hashed_total,
                payload_checks_total,
            }),
        })
    }

    /// Count an action completion for the given action type and code label.
    pub fn inc_action_completed(&self, action: &str, code: &str) {
        self.inner
            .actions_completed_total
            .with_label_values(&[action, code])
            .inc();
    }

    /// Count a hashed partition for the given step and whether it matched.
    pub fn inc_partition_hashed(&self, step: &str, matched: bool) {
        let outcome = if matched { "matched" } else { "mismatched" };
        self.inner
            .partitions_hashed_total
            .with_label_values(&[step, outcome])
            .inc();
    }

    /// Add bytes fed into a partition hasher.
    pub fn add_bytes_hashed(&self, bytes: u64) {
        self.inner.bytes_hashed_total.inc_by(bytes);
    }

    /// Count a payload check (`header`, `metadata_signature`, `payload_signature`).
    pub fn inc_payload_check(&self, check: &str, outcome: &str) {
        self.inner
            .payload_checks_total
            .with_label_values(&[check, outcome])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the scalar counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let partitions = |outcome: &str| -> u64 {
            ["target", "source"]
                .iter()
                .map(|step| {
                    self.inner
                        .partitions_hashed_total
                        .with_label_values(&[step, outcome])
                        .get()
                })
                .sum()
        };
        MetricsSnapshot {
            bytes_hashed_total: self.inner.bytes_hashed_total.get(),
            partitions_matched_total: partitions("matched"),
            partitions_mismatched_total: partitions("mismatched"),
        }
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
