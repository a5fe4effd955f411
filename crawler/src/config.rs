//! # Crawler Configuration & Constants
//!
//! Every endpoint, port and limit the crawler relies on lives here. The
//! defaults target NEAR mainnet; the CLI can override all of them.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Trusted RPC endpoint serving `/status`, `/network_info` and JSON-RPC.
pub const DEFAULT_RPC_URL: &str = "https://rpc.mainnet.near.org";

/// Seed for the crawl. Same host as the trusted RPC by default: it is the
/// one node guaranteed to expose `network_info` over HTTPS.
pub const DEFAULT_SEED_URL: &str = DEFAULT_RPC_URL;

/// Path of the per-node diagnostic endpoint listing peers and producers.
pub const NETWORK_INFO_PATH: &str = "/network_info";

/// Path of the chain status endpoint listing the validator accounts.
pub const STATUS_PATH: &str = "/status";

/// JSON-RPC method returning current validators and their stake.
pub const VALIDATORS_METHOD: &str = "validators";

/// Default RPC port of a NEAR node. Peers only advertise their p2p address
/// (usually `:24567`), so we guess the RPC lives on this port of the same
/// host. Most guesses fail; that is expected.
pub const DEFAULT_NODE_RPC_PORT: u16 = 3030;

// ---------------------------------------------------------------------------
// Crawl Limits
// ---------------------------------------------------------------------------

/// Maximum probe level. The seed is probed at level 1, so peers up to three
/// hops away from the seed end up in the discovery table.
pub const MAX_CRAWL_DEPTH: u8 = 3;

/// Per-probe timeout. Nodes that cannot answer a tiny JSON document in five
/// seconds are pruned from this run.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on simultaneously in-flight probes, so the crawler does not hammer
/// the network it is measuring.
pub const MAX_CONCURRENT_PROBES: usize = 64;

/// Timeout for the trusted status / stake calls.
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("stakemap/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Denomination
// ---------------------------------------------------------------------------

/// Decimal exponent of the smallest stake unit: 1 token = 10^24 yocto.
pub const YOCTO_DECIMALS: u32 = 24;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Key used in the report for stake whose IP could not be resolved.
pub const UNKNOWN_NODE_KEY: &str = "unknown";

/// Value of the report's `collection_method` field.
pub const COLLECTION_METHOD: &str = "api_and_crawl";

/// Value of the report's `chain_data` field.
pub const CHAIN_DATA_LABEL: &str = "NEAR staking validators";

/// Report file name inside the output folder.
pub const DEFAULT_REPORT_FILE: &str = "near.json";

/// Format of the report's local `timestamp` field.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_timeout_shorter_than_rpc_timeout() {
        // A single stuck probe must never outlive the trusted calls.
        assert!(PROBE_TIMEOUT < RPC_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_depth_and_concurrency_are_positive() {
        assert!(MAX_CRAWL_DEPTH >= 1);
        assert!(MAX_CONCURRENT_PROBES > 0);
    }

    #[test]
    fn test_paths_are_absolute() {
        assert!(NETWORK_INFO_PATH.starts_with('/'));
        assert!(STATUS_PATH.starts_with('/'));
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("stakemap/"));
        assert!(USER_AGENT.len() > "stakemap/".len());
    }
}
