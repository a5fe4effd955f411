// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # stakemap
//!
//! Entry point for the `stakemap` binary. Parses CLI arguments, initializes
//! logging, runs the crawl alongside the status and stake fetches, and
//! writes the stake-per-IP report.
//!
//! The binary supports two subcommands:
//!
//! - `crawl`: crawl, correlate and write the report
//! - `version`: print build version information

mod cli;
mod logging;
mod settings;

use std::fs;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use stakemap_crawler::config::RPC_REQUEST_TIMEOUT;
use stakemap_crawler::{
    correlate, CrawlConfig, CrawlMetrics, DiscoveryTables, HttpProbe, JsonFileSink,
    NetworkCrawler, ReportBuilder, ReportSink, RpcClient, RpcConfig, RunSummary, StakeSource,
    StatusSource, ValidatorRecord,
};

use cli::{Commands, CrawlArgs, StakemapCli};
use logging::{LogFormat, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StakemapCli::parse();

    match cli.command {
        Commands::Crawl(args) => run_crawl(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// One full run: fetch, crawl, correlate, report.
async fn run_crawl(args: CrawlArgs) -> Result<()> {
    logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::from_str_lossy(&args.log_format));

    // Settle the output location before touching the network.
    let output_dir = settings::resolve_output_dir(args.output_dir.as_deref(), &args.settings)?;

    let crawl_config = CrawlConfig {
        node_rpc_port: args.node_rpc_port,
        max_depth: args.max_depth,
        probe_timeout: Duration::from_secs(args.probe_timeout_secs),
        max_concurrent_probes: args.concurrency,
    };

    tracing::info!(
        rpc_url = %args.rpc_url,
        seed_url = %args.seed_url,
        max_depth = crawl_config.max_depth,
        node_rpc_port = crawl_config.node_rpc_port,
        concurrency = crawl_config.max_concurrent_probes,
        output_dir = %output_dir.display(),
        "starting stakemap"
    );

    let rpc = RpcClient::new(RpcConfig {
        url: args.rpc_url.clone(),
        timeout: RPC_REQUEST_TIMEOUT,
    })
    .context("failed to set up RPC client")?;
    let probe =
        HttpProbe::new(crawl_config.probe_timeout).context("failed to set up probe client")?;
    let crawler = NetworkCrawler::new(probe, crawl_config);

    let (accounts, stakes, tables) = gather(&rpc, crawler.crawl(&args.seed_url)).await?;

    let nodes = correlate(&stakes, &tables);
    let report = ReportBuilder::new(args.shape).build(&nodes);

    let sink = JsonFileSink::new(&output_dir, &args.output_file);
    let path = sink
        .write(&report)
        .with_context(|| format!("failed to write report to {}", sink.path().display()))?;
    tracing::info!(path = %path.display(), nodes = report.nodes.len(), "report written");

    if let Some(metrics_path) = &args.metrics_file {
        write_metrics(crawler.metrics(), metrics_path)?;
    }

    RunSummary::compute(&stakes, &accounts, &tables, &nodes).log();
    Ok(())
}

/// Runs the crawl alongside both trusted fetches. A failed fetch ends the
/// run at once and drops the crawl still in progress.
async fn gather<S, C>(
    source: &S,
    crawl: C,
) -> Result<(Vec<String>, Vec<ValidatorRecord>, DiscoveryTables)>
where
    S: StatusSource + StakeSource,
    C: Future<Output = DiscoveryTables>,
{
    tokio::try_join!(
        async {
            source
                .fetch_accounts()
                .await
                .context("failed to fetch validator list from /status")
        },
        async {
            source
                .fetch_stakes()
                .await
                .context("failed to fetch validator stakes")
        },
        async { Ok::<_, anyhow::Error>(crawl.await) },
    )
}

/// Dumps the crawl metrics in Prometheus text format.
fn write_metrics(metrics: &CrawlMetrics, path: &Path) -> Result<()> {
    let text = metrics.encode().context("failed to encode metrics")?;
    fs::write(path, text)
        .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    tracing::info!(path = %path.display(), "metrics written");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("stakemap {}", env!("CARGO_PKG_VERSION"));
    println!("rustc    {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
