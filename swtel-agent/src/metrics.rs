//! Exported Prometheus metrics.
//!
//! All collectors live in one explicit `Registry` owned by `AgentMetrics`,
//! which is handed to the engine at construction. Nothing is registered
//! globally, so tests can build as many engines as they like.

use std::collections::HashMap;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::config::MetricDefinition;
use crate::exporter::ExporterError;

const NODE: &str = "node";
const INTERFACE: &str = "interface";

/// Collectors updated by the engine.
#[derive(Debug)]
pub struct AgentMetrics {
    node: String,
    registry: Registry,
    counters: HashMap<String, IntCounterVec>,
    collect_duration: HistogramVec,
    collect_errors: IntCounterVec,
    archive_writes: IntCounterVec,
    archive_errors: IntCounterVec,
    counter_resets: IntCounterVec,
}

impl AgentMetrics {
    /// Register one counter per definition plus the agent's health metrics.
    /// `node` is the value of every `node` label.
    pub fn new(node: &str, definitions: &[MetricDefinition]) -> Result<Self, ExporterError> {
        let registry = Registry::new();

        let mut counters = HashMap::new();
        for def in definitions {
            let vec = IntCounterVec::new(
                Opts::new(def.name.as_str(), def.description.as_str()),
                &[NODE, INTERFACE],
            )?;
            registry.register(Box::new(vec.clone()))?;
            counters.insert(def.name.clone(), vec);
        }

        let collect_duration = HistogramVec::new(
            HistogramOpts::new(
                "swtel_collect_duration_seconds",
                "Duration of the SNMP round trip of a sampling cycle.",
            ),
            &[NODE],
        )?;
        registry.register(Box::new(collect_duration.clone()))?;

        let collect_errors = register_counter(
            &registry,
            "swtel_collect_errors_total",
            "Sampling cycles skipped because the fetch failed.",
            &[NODE],
        )?;
        let archive_writes = register_counter(
            &registry,
            "swtel_archive_writes_total",
            "Interval archives written.",
            &[NODE],
        )?;
        let archive_errors = register_counter(
            &registry,
            "swtel_archive_errors_total",
            "Interval archive writes that failed.",
            &[NODE],
        )?;
        let counter_resets = register_counter(
            &registry,
            "swtel_counter_resets_total",
            "Raw counter decreases treated as a fresh start.",
            &[NODE, INTERFACE],
        )?;

        Ok(Self {
            node: node.to_string(),
            registry,
            counters,
            collect_duration,
            collect_errors,
            archive_writes,
            archive_errors,
            counter_resets,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Add a delta to the cumulative counter of `metric` on `interface`.
    pub fn add_delta(&self, metric: &str, interface: &str, delta: u64) {
        match self.counters.get(metric) {
            Some(vec) => vec.with_label_values(&[&self.node, interface]).inc_by(delta),
            None => warn!(metric, "delta for unregistered metric dropped"),
        }
    }

    pub fn observe_collect_duration(&self, seconds: f64) {
        self.collect_duration
            .with_label_values(&[&self.node])
            .observe(seconds);
    }

    pub fn inc_collect_errors(&self) {
        self.collect_errors.with_label_values(&[&self.node]).inc();
    }

    pub fn inc_archive_writes(&self) {
        self.archive_writes.with_label_values(&[&self.node]).inc();
    }

    pub fn inc_archive_errors(&self) {
        self.archive_errors.with_label_values(&[&self.node]).inc();
    }

    pub fn inc_counter_resets(&self, interface: &str) {
        self.counter_resets
            .with_label_values(&[&self.node, interface])
            .inc();
    }

    /// Current cumulative total of `metric` on `interface`.
    pub fn delta_total(&self, metric: &str, interface: &str) -> u64 {
        self.counters
            .get(metric)
            .map(|vec| vec.with_label_values(&[&self.node, interface]).get())
            .unwrap_or(0)
    }

    pub fn collect_errors(&self) -> u64 {
        self.collect_errors.with_label_values(&[&self.node]).get()
    }

    pub fn collect_samples(&self) -> u64 {
        self.collect_duration
            .with_label_values(&[&self.node])
            .get_sample_count()
    }

    pub fn archive_writes(&self) -> u64 {
        self.archive_writes.with_label_values(&[&self.node]).get()
    }

    pub fn archive_errors(&self) -> u64 {
        self.archive_errors.with_label_values(&[&self.node]).get()
    }

    pub fn counter_resets(&self, interface: &str) -> u64 {
        self.counter_resets
            .with_label_values(&[&self.node, interface])
            .get()
    }

    /// Render the registry in the text exposition format.
    pub fn encode(&self) -> Result<String, ExporterError> {
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

fn register_counter(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntCounterVec, ExporterError> {
    let vec = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_metrics;

    const NODE_NAME: &str = "mlab2-abc0t.mlab-sandbox.measurement-lab.org";

    fn definitions() -> Vec<MetricDefinition> {
        parse_metrics(
            "- name: ifHCInOctets\n  description: Ingress octets.\n  oidStub: .1.3.6.1.2.1.31.1.1.1.6\n  mlabUplinkName: switch.octets.uplink.rx\n  mlabMachineName: switch.octets.local.rx\n",
        )
        .expect("definitions")
    }

    #[test]
    fn test_add_delta_accumulates_per_interface() {
        let metrics = AgentMetrics::new(NODE_NAME, &definitions()).expect("metrics");
        metrics.add_delta("ifHCInOctets", "xe-0/0/12", 45);
        metrics.add_delta("ifHCInOctets", "xe-0/0/12", 15);
        metrics.add_delta("ifHCInOctets", "xe-0/0/45", 7);

        assert_eq!(metrics.delta_total("ifHCInOctets", "xe-0/0/12"), 60);
        assert_eq!(metrics.delta_total("ifHCInOctets", "xe-0/0/45"), 7);
    }

    #[test]
    fn test_unknown_metric_is_ignored() {
        let metrics = AgentMetrics::new(NODE_NAME, &definitions()).expect("metrics");
        metrics.add_delta("ifHCOutOctets", "xe-0/0/12", 1);
        assert_eq!(metrics.delta_total("ifHCOutOctets", "xe-0/0/12"), 0);
    }

    #[test]
    fn test_health_counters() {
        let metrics = AgentMetrics::new(NODE_NAME, &definitions()).expect("metrics");
        metrics.inc_collect_errors();
        metrics.inc_archive_writes();
        metrics.inc_archive_writes();
        metrics.inc_archive_errors();
        metrics.inc_counter_resets("xe-0/0/12");
        metrics.observe_collect_duration(0.25);

        assert_eq!(metrics.collect_errors(), 1);
        assert_eq!(metrics.archive_writes(), 2);
        assert_eq!(metrics.archive_errors(), 1);
        assert_eq!(metrics.counter_resets("xe-0/0/12"), 1);
        assert_eq!(metrics.collect_samples(), 1);
    }

    #[test]
    fn test_encode_exposition() {
        let metrics = AgentMetrics::new(NODE_NAME, &definitions()).expect("metrics");
        metrics.add_delta("ifHCInOctets", "xe-0/0/12", 45);
        metrics.observe_collect_duration(0.1);

        let text = metrics.encode().expect("encode");
        assert!(text.contains("# HELP ifHCInOctets Ingress octets."));
        assert!(text.contains(&format!(
            "ifHCInOctets{{interface=\"xe-0/0/12\",node=\"{NODE_NAME}\"}} 45"
        )));
        assert!(text.contains("swtel_collect_duration_seconds_count"));
    }

    #[test]
    fn test_separate_registries_do_not_collide() {
        let a = AgentMetrics::new(NODE_NAME, &definitions()).expect("first");
        let b = AgentMetrics::new(NODE_NAME, &definitions()).expect("second");
        a.inc_collect_errors();
        assert_eq!(b.collect_errors(), 0);
    }

    #[test]
    fn test_invalid_metric_name_fails_registration() {
        let mut defs = definitions();
        defs[0].name = "bad-name".to_string();
        assert!(AgentMetrics::new(NODE_NAME, &defs).is_err());
    }

    #[test]
    fn test_health_metric_name_clash_fails_registration() {
        let mut defs = definitions();
        defs[0].name = "swtel_collect_errors_total".to_string();
        assert!(AgentMetrics::new(NODE_NAME, &defs).is_err());
    }
}
