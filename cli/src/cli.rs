//! # CLI Interface
//!
//! Defines the command-line argument structure for `stakemap` using `clap`
//! derive. Two subcommands: `crawl` and `version`. Every `crawl` flag can
//! also come from a `STAKEMAP_*` environment variable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stakemap_crawler::config::{
    DEFAULT_NODE_RPC_PORT, DEFAULT_REPORT_FILE, DEFAULT_RPC_URL, DEFAULT_SEED_URL,
    MAX_CONCURRENT_PROBES, MAX_CRAWL_DEPTH, PROBE_TIMEOUT,
};
use stakemap_crawler::OutputShape;

/// Default location of the settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "config/SettingsConfig.json";

/// Validator stake → IP mapper.
///
/// Crawls the p2p graph from a seed node, fetches the current validator
/// set with its stake, and writes a JSON report of stake per IP.
#[derive(Parser, Debug)]
#[command(
    name = "stakemap",
    about = "Map validator stake onto the IPs that host it",
    version,
    propagate_version = true
)]
pub struct StakemapCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl the network, correlate stake and write the report.
    Crawl(CrawlArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `crawl` subcommand.
#[derive(Parser, Debug)]
pub struct CrawlArgs {
    /// Trusted RPC endpoint for `/status` and the `validators` call.
    #[arg(long, env = "STAKEMAP_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// RPC endpoint of the node the crawl starts from.
    #[arg(long, env = "STAKEMAP_SEED_URL", default_value = DEFAULT_SEED_URL)]
    pub seed_url: String,

    /// RPC port assumed on every discovered peer.
    #[arg(long, env = "STAKEMAP_NODE_RPC_PORT", default_value_t = DEFAULT_NODE_RPC_PORT)]
    pub node_rpc_port: u16,

    /// Deepest level probed. The seed is level 1.
    #[arg(
        long,
        env = "STAKEMAP_MAX_DEPTH",
        default_value_t = MAX_CRAWL_DEPTH,
        value_parser = clap::value_parser!(u8).range(1..)
    )]
    pub max_depth: u8,

    /// Per-probe timeout in seconds.
    #[arg(
        long,
        env = "STAKEMAP_PROBE_TIMEOUT_SECS",
        default_value_t = PROBE_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub probe_timeout_secs: u64,

    /// Maximum number of probes in flight.
    #[arg(long, env = "STAKEMAP_CONCURRENCY", default_value_t = MAX_CONCURRENT_PROBES)]
    pub concurrency: usize,

    /// Path to the settings file holding `output_folder`.
    #[arg(long, short = 'c', env = "STAKEMAP_SETTINGS", default_value = DEFAULT_SETTINGS_PATH)]
    pub settings: PathBuf,

    /// Output directory. Takes precedence over the settings file.
    #[arg(long, short = 'o', env = "STAKEMAP_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Report file name inside the output directory.
    #[arg(long, env = "STAKEMAP_OUTPUT_FILE", default_value = DEFAULT_REPORT_FILE)]
    pub output_file: String,

    /// Layout of `nodes` in the report: `ip-map` or `flat`.
    #[arg(long, env = "STAKEMAP_OUTPUT_SHAPE", default_value_t = OutputShape::IpMap)]
    pub shape: OutputShape,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "STAKEMAP_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Write Prometheus text-format crawl metrics to this file at exit.
    #[arg(long, env = "STAKEMAP_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,
}
