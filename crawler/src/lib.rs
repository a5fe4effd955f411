// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # stakemap: Crawler & Stake Correlation Library
//!
//! Maps validator stake onto the physical machines that actually hold it.
//! A proof-of-stake network will happily tell you *who* stakes *how much*;
//! it is much less forthcoming about *where* those validators run. This
//! crate answers the second question by walking the peer-to-peer graph
//! through each node's diagnostic `network_info` endpoint and joining what
//! it finds against the chain's own validator list.
//!
//! ## Architecture
//!
//! - **config**: Endpoints, ports, depth limits and other constants.
//! - **rpc**: Wire types for the status, network_info and JSON-RPC calls.
//! - **source**: Trusted status / stake sources. Failures here are fatal.
//! - **probe**: Single-node `network_info` probes. Failures here are noise.
//! - **discovery**: Concurrent first-writer-wins discovery tables.
//! - **crawler**: The bounded-depth concurrent graph walk.
//! - **stake**: Exact yocto-denominated stake arithmetic.
//! - **correlate**: Stake → IP aggregation.
//! - **report**: Output document shaping and the JSON file sink.
//! - **metrics**: Prometheus counters for a single crawl run.
//!
//! ## Ground Rules
//!
//! 1. Only the trusted sources can abort a run. Everything the crawl touches
//!    is attacker-influenced and degrades into "unknown" instead of failing.
//! 2. Stake never passes through a float.
//! 3. The crawl is a bounded snapshot. It ends, even on a cyclic graph.

pub mod config;
pub mod correlate;
pub mod crawler;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod report;
pub mod rpc;
pub mod source;
pub mod stake;

pub use correlate::{correlate, AggregatedNode, NodeKey, NodeMap};
pub use crawler::{CrawlConfig, NetworkCrawler};
pub use discovery::{DiscoveryTables, PeerRecord, ProducerMapping};
pub use error::{ClientBuildError, FetchError, ProbeError, ReportError};
pub use metrics::CrawlMetrics;
pub use probe::{HttpProbe, NodeProbe};
pub use report::{JsonFileSink, OutputShape, Report, ReportBuilder, ReportSink, RunSummary};
pub use rpc::{ActivePeer, KnownProducer, NetworkInfo};
pub use source::{RpcClient, RpcConfig, StakeSource, StatusSource, ValidatorRecord};
pub use stake::Stake;
