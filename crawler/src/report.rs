//! # Report
//!
//! Renders a [`NodeMap`] into the JSON document the run produces:
//!
//! ```json
//! {
//!     "timestamp": "2026-10-18 12:00:00",
//!     "collection_method": "api_and_crawl",
//!     "chain_data": "NEAR staking validators",
//!     "nodes": {
//!         "1.2.3.4": {
//!             "is_validator": true,
//!             "stake": 50.0,
//!             "address": "ed25519:...",
//!             "extra_info": {}
//!         }
//!     }
//! }
//! ```
//!
//! `stake` is a JSON number in tokens, written digit for digit from the
//! exact yocto integer. With [`OutputShape::Flat`] `nodes` is a list
//! instead and every entry carries its key as `ip`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use tracing::info;

use crate::config::{CHAIN_DATA_LABEL, COLLECTION_METHOD, REPORT_TIMESTAMP_FORMAT};
use crate::correlate::{resolve, AggregatedNode, NodeKey, NodeMap};
use crate::discovery::DiscoveryTables;
use crate::error::ReportError;
use crate::source::ValidatorRecord;
use crate::stake::{serialize_as_tokens, Stake};

// ---------------------------------------------------------------------------
// Shape
// ---------------------------------------------------------------------------

/// Layout of the `nodes` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputShape {
    /// Object keyed by IP (and `"unknown"`).
    #[default]
    IpMap,
    /// Array of entries, each with an `ip` field.
    Flat,
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpMap => f.write_str("ip-map"),
            Self::Flat => f.write_str("flat"),
        }
    }
}

impl FromStr for OutputShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ip-map" | "ipmap" | "map" => Ok(Self::IpMap),
            "flat" | "list" => Ok(Self::Flat),
            other => Err(format!("unknown output shape: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// One aggregated node as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeEntry {
    /// Node key; only present in the flat shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub is_validator: bool,
    #[serde(serialize_with = "serialize_as_tokens")]
    pub stake: Stake,
    /// First peer id seen on this node, `null` if none.
    pub address: Option<String>,
    pub extra_info: ExtraInfo,
}

/// Secondary identities collapsed onto a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtraInfo {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other_addresses: Vec<Option<String>>,
}

/// `nodes` in either shape.
///
/// Both keep [`NodeMap`] order: IPs ascending, the unknown bucket last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportNodes {
    /// Written as a JSON object, one key per node.
    ByIp(Vec<(String, NodeEntry)>),
    Flat(Vec<NodeEntry>),
}

impl ReportNodes {
    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            Self::ByIp(nodes) => nodes.len(),
            Self::Flat(nodes) => nodes.len(),
        }
    }
}

impl Serialize for ReportNodes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::ByIp(nodes) => {
                serializer.collect_map(nodes.iter().map(|(key, node)| (key, node)))
            }
            Self::Flat(nodes) => nodes.serialize(serializer),
        }
    }
}

/// The full output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Local wall-clock time of the run, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub collection_method: String,
    pub chain_data: String,
    pub nodes: ReportNodes,
}

impl Report {
    /// Renders the report as 4-space indented JSON.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, ReportError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Turns a [`NodeMap`] into a [`Report`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportBuilder {
    shape: OutputShape,
}

impl ReportBuilder {
    pub fn new(shape: OutputShape) -> Self {
        Self { shape }
    }

    /// Builds the report stamped with the current local time.
    pub fn build(&self, nodes: &NodeMap) -> Report {
        self.build_at(nodes, Local::now())
    }

    /// Builds the report stamped with `at`.
    pub fn build_at(&self, nodes: &NodeMap, at: DateTime<Local>) -> Report {
        let nodes = match self.shape {
            OutputShape::IpMap => ReportNodes::ByIp(
                nodes
                    .iter()
                    .map(|node| (node.key.to_string(), entry(node, false)))
                    .collect(),
            ),
            OutputShape::Flat => {
                ReportNodes::Flat(nodes.iter().map(|node| entry(node, true)).collect())
            }
        };

        Report {
            timestamp: at.format(REPORT_TIMESTAMP_FORMAT).to_string(),
            collection_method: COLLECTION_METHOD.to_string(),
            chain_data: CHAIN_DATA_LABEL.to_string(),
            nodes,
        }
    }
}

fn entry(node: &AggregatedNode, with_ip: bool) -> NodeEntry {
    NodeEntry {
        ip: with_ip.then(|| node.key.to_string()),
        is_validator: node.is_validator,
        stake: node.stake.clone(),
        address: node.address().map(str::to_string),
        extra_info: ExtraInfo {
            other_addresses: node.other_addresses().to_vec(),
        },
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for a finished report.
pub trait ReportSink {
    /// Persists the report. Returns where it went, for logging.
    fn write(&self, report: &Report) -> Result<PathBuf, ReportError>;
}

/// Writes the report as a JSON file, creating the directory if needed.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
    file_name: String,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    /// Full path of the file this sink writes.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl ReportSink for JsonFileSink {
    fn write(&self, report: &Report) -> Result<PathBuf, ReportError> {
        let body = report.to_json_pretty()?;

        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;

        let path = self.path();
        fs::write(&path, body).map_err(|source| io_error(&path, source))?;
        Ok(path)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Headline numbers for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Validators in the stake list.
    pub validators: usize,
    /// Stake summed over the stake list.
    pub total_stake: Stake,
    /// Validators in the `/status` list.
    pub status_validators: usize,
    /// `/status` validators whose account resolves to an IP.
    pub status_resolved: usize,
    /// Distinct peers discovered by the crawl.
    pub peers: usize,
    /// Distinct producer mappings discovered by the crawl.
    pub producers: usize,
    /// Stake that could not be placed on any IP.
    pub unknown_stake: Stake,
}

impl RunSummary {
    pub fn compute(
        stakes: &[ValidatorRecord],
        status_accounts: &[String],
        tables: &DiscoveryTables,
        nodes: &NodeMap,
    ) -> Self {
        let status_resolved = status_accounts
            .iter()
            .filter(|account| matches!(resolve(account, tables).1, NodeKey::Ip(_)))
            .count();

        Self {
            validators: stakes.len(),
            total_stake: stakes.iter().map(|record| &record.stake).sum(),
            status_validators: status_accounts.len(),
            status_resolved,
            peers: tables.peer_count(),
            producers: tables.producer_count(),
            unknown_stake: nodes
                .unknown()
                .map(|node| node.stake.clone())
                .unwrap_or_default(),
        }
    }

    /// Emits the summary as a single info event.
    pub fn log(&self) {
        info!(
            validators = self.validators,
            total_stake = %self.total_stake,
            status_validators = self.status_validators,
            status_resolved = self.status_resolved,
            peers = self.peers,
            producers = self.producers,
            unknown_stake = %self.unknown_stake,
            "run summary"
        );
    }
}
