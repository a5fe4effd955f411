//! # Network Crawler
//!
//! Walks the peer-to-peer graph outward from a single seed, asking every
//! node it can reach for its `network_info` and folding the answers into a
//! shared [`DiscoveryTables`].
//!
//! ## Traversal
//!
//! ```text
//! level 1   seed ──────────────► reports hop-1 peers  (recorded, probed)
//! level 2   hop-1 peers ───────► reports hop-2 peers  (recorded, probed)
//! level 3   hop-2 peers ───────► reports hop-3 peers  (recorded only)
//! ```
//!
//! - A peer id is probed at most once: only the merge that *inserts* it may
//!   schedule its probe. This is what makes the walk terminate on cycles.
//! - Producer mappings are collected from every successful probe at any
//!   level. They come for free with the response.
//! - It is not a strict BFS. Probes of different levels overlap, and a peer
//!   first reported by a deep node keeps that depth even if a shallower node
//!   reports it later.
//!
//! ## Scheduling
//!
//! The coordinator owns a `JoinSet` of probe tasks. Each task waits for a
//! semaphore permit, probes under a timeout, merges the result, and returns
//! the follow-up targets it earned; the coordinator spawns them. The crawl
//! is complete when the set drains, i.e. every probe ever scheduled has
//! settled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_NODE_RPC_PORT, MAX_CONCURRENT_PROBES, MAX_CRAWL_DEPTH, PROBE_TIMEOUT};
use crate::discovery::DiscoveryTables;
use crate::error::ProbeError;
use crate::metrics::CrawlMetrics;
use crate::probe::{rpc_endpoint_for, NodeProbe};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for a crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Port assumed to serve RPC on every discovered peer's host.
    pub node_rpc_port: u16,
    /// Highest level that still schedules probes of newly found peers.
    /// The seed is level 1.
    pub max_depth: u8,
    /// Upper bound on a single probe, connect to last byte.
    pub probe_timeout: Duration,
    /// Probes allowed in flight at once.
    pub max_concurrent_probes: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            node_rpc_port: DEFAULT_NODE_RPC_PORT,
            max_depth: MAX_CRAWL_DEPTH,
            probe_timeout: PROBE_TIMEOUT,
            max_concurrent_probes: MAX_CONCURRENT_PROBES,
        }
    }
}

/// A scheduled probe.
#[derive(Debug, Clone)]
struct ProbeTarget {
    /// RPC base URL to probe.
    endpoint: String,
    /// 1 for the seed, parent level + 1 for everything else.
    level: u8,
    /// Peer id the endpoint was derived from. `None` for the seed.
    peer_id: Option<String>,
}

impl ProbeTarget {
    fn seed(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            level: 1,
            peer_id: None,
        }
    }

    fn is_seed(&self) -> bool {
        self.peer_id.is_none()
    }
}

/// State shared by every probe task of one crawl.
struct CrawlShared<P> {
    probe: Arc<P>,
    tables: Arc<DiscoveryTables>,
    limiter: Arc<Semaphore>,
    metrics: CrawlMetrics,
    config: CrawlConfig,
}

impl<P> Clone for CrawlShared<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            tables: Arc::clone(&self.tables),
            limiter: Arc::clone(&self.limiter),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Bounded-depth concurrent crawler over any [`NodeProbe`].
pub struct NetworkCrawler<P> {
    probe: Arc<P>,
    config: CrawlConfig,
    metrics: CrawlMetrics,
}

impl<P: NodeProbe> NetworkCrawler<P> {
    /// Creates a crawler with its own fresh metrics.
    pub fn new(probe: P, config: CrawlConfig) -> Self {
        Self {
            probe: Arc::new(probe),
            config,
            metrics: CrawlMetrics::new(),
        }
    }

    /// Reports into the given metrics instead of a private one.
    pub fn with_metrics(mut self, metrics: CrawlMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics this crawler reports into.
    pub fn metrics(&self) -> &CrawlMetrics {
        &self.metrics
    }

    /// Crawls outward from `seed` (an RPC base URL) and returns the
    /// completed discovery tables.
    ///
    /// Never fails: unreachable nodes, the seed included, simply contribute
    /// nothing. An unreachable seed therefore yields empty tables.
    pub async fn crawl(&self, seed: &str) -> DiscoveryTables {
        let started = Instant::now();
        let shared = CrawlShared {
            probe: Arc::clone(&self.probe),
            tables: Arc::new(DiscoveryTables::new()),
            limiter: Arc::new(Semaphore::new(self.config.max_concurrent_probes.max(1))),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        };

        info!(
            seed,
            max_depth = self.config.max_depth,
            rpc_port = self.config.node_rpc_port,
            max_concurrent = self.config.max_concurrent_probes,
            "starting crawl"
        );

        let mut tasks = JoinSet::new();
        tasks.spawn(run_probe(shared.clone(), ProbeTarget::seed(seed)));

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(follow_ups) => {
                    for target in follow_ups {
                        tasks.spawn(run_probe(shared.clone(), target));
                    }
                }
                Err(e) => warn!(error = %e, "probe task did not complete"),
            }
        }

        info!(
            peers = shared.tables.peer_count(),
            producers = shared.tables.producer_count(),
            probes = self.metrics.probes_started_total.get(),
            succeeded = self.metrics.probes_succeeded_total.get(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crawl complete"
        );

        let CrawlShared { tables, .. } = shared;
        Arc::try_unwrap(tables).unwrap_or_else(|still_shared| (*still_shared).clone())
    }
}

/// Probes one target, merges its answer and returns the probes it unlocks.
async fn run_probe<P: NodeProbe>(shared: CrawlShared<P>, target: ProbeTarget) -> Vec<ProbeTarget> {
    let result = {
        // The semaphore is never closed, so acquisition only fails if that
        // invariant is broken; treat it like any other failed probe.
        let _permit = match shared.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => return Vec::new(),
        };

        let metrics = &shared.metrics;
        metrics.probes_started_total.inc();
        metrics.probes_in_flight.inc();
        let timer = metrics.probe_duration_seconds.start_timer();

        let timeout = shared.config.probe_timeout;
        let result = match tokio::time::timeout(timeout, shared.probe.probe(&target.endpoint)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        timer.observe_duration();
        metrics.probes_in_flight.dec();
        result
    };

    let info = match result {
        Ok(info) => {
            shared.metrics.probes_succeeded_total.inc();
            info
        }
        Err(err) => {
            if err.is_timeout() {
                shared.metrics.probes_timed_out_total.inc();
            } else {
                shared.metrics.probes_failed_total.inc();
            }
            if target.is_seed() {
                warn!(endpoint = %target.endpoint, error = %err, "seed probe failed, nothing to crawl");
            } else {
                // Most peers do not expose RPC on the guessed port.
                debug!(
                    endpoint = %target.endpoint,
                    peer_id = target.peer_id.as_deref().unwrap_or_default(),
                    level = target.level,
                    error = %err,
                    "probe failed"
                );
            }
            return Vec::new();
        }
    };

    let outcome = shared.tables.merge(&info);
    shared
        .metrics
        .peers_discovered_total
        .inc_by(outcome.new_peers.len() as u64);
    shared
        .metrics
        .producers_discovered_total
        .inc_by(outcome.new_producers as u64);

    debug!(
        endpoint = %target.endpoint,
        level = target.level,
        reported_peers = info.active_peers.len(),
        new_peers = outcome.new_peers.len(),
        new_producers = outcome.new_producers,
        "probe succeeded"
    );

    if target.level >= shared.config.max_depth {
        return Vec::new();
    }

    let next_level = target.level + 1;
    outcome
        .new_peers
        .into_iter()
        .filter_map(|peer| {
            let addr = peer.addr?;
            match rpc_endpoint_for(&addr, shared.config.node_rpc_port) {
                Ok(endpoint) => Some(ProbeTarget {
                    endpoint,
                    level: next_level,
                    peer_id: Some(peer.peer_id),
                }),
                Err(err) => {
                    debug!(peer_id = %peer.peer_id, error = %err, "peer address not probeable");
                    None
                }
            }
        })
        .collect()
}
