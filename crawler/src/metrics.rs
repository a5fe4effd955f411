//! # Crawl Metrics
//!
//! Prometheus counters for a single crawl run. The crawler is a batch job,
//! not a daemon, so nothing scrapes it: the binary renders the registry in
//! the text exposition format at the end of the run (node_exporter
//! textfile-collector style) when asked to.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] so tests can
//! create as many independent instances as they like.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

/// Metric handles for one crawl.
///
/// Clone-friendly: every handle is internally reference counted.
#[derive(Clone)]
pub struct CrawlMetrics {
    /// Registry that owns all metrics below.
    registry: Registry,
    /// Probes issued (seed included).
    pub probes_started_total: IntCounter,
    /// Probes that returned a well-formed network_info.
    pub probes_succeeded_total: IntCounter,
    /// Probes that failed for any reason other than a timeout.
    pub probes_failed_total: IntCounter,
    /// Probes that hit the probe timeout.
    pub probes_timed_out_total: IntCounter,
    /// Probes currently waiting on the network.
    pub probes_in_flight: IntGauge,
    /// Distinct peer ids inserted into the discovery table.
    pub peers_discovered_total: IntCounter,
    /// Distinct producer accounts inserted into the mapping table.
    pub producers_discovered_total: IntCounter,
    /// Wall-clock duration of individual probes, in seconds.
    pub probe_duration_seconds: Histogram,
}

impl CrawlMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("stakemap".into()), None)
            .expect("failed to create prometheus registry");

        let probes_started_total = register_counter(
            &registry,
            "probes_started_total",
            "Total number of network_info probes issued",
        );
        let probes_succeeded_total = register_counter(
            &registry,
            "probes_succeeded_total",
            "Total number of probes that returned a usable network_info",
        );
        let probes_failed_total = register_counter(
            &registry,
            "probes_failed_total",
            "Total number of probes that failed (excluding timeouts)",
        );
        let probes_timed_out_total = register_counter(
            &registry,
            "probes_timed_out_total",
            "Total number of probes that exceeded the probe timeout",
        );

        let probes_in_flight =
            IntGauge::new("probes_in_flight", "Number of probes currently awaiting a response")
                .expect("metric creation");
        registry
            .register(Box::new(probes_in_flight.clone()))
            .expect("metric registration");

        let peers_discovered_total = register_counter(
            &registry,
            "peers_discovered_total",
            "Distinct peer ids discovered during the crawl",
        );
        let producers_discovered_total = register_counter(
            &registry,
            "producers_discovered_total",
            "Distinct producer accounts discovered during the crawl",
        );

        let probe_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "probe_duration_seconds",
                "Duration of individual network_info probes in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(probe_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            probes_started_total,
            probes_succeeded_total,
            probes_failed_total,
            probes_timed_out_total,
            probes_in_flight,
            peers_discovered_total,
            producers_discovered_total,
            probe_duration_seconds,
        }
    }

    /// Encodes all registered metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for CrawlMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("metric creation");
    registry
        .register(Box::new(counter.clone()))
        .expect("metric registration");
    counter
}
