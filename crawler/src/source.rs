//! # Trusted Sources
//!
//! The two calls whose answers we take at face value: the validator list
//! from `/status` and the per-validator stake from the `validators`
//! JSON-RPC method. Unlike crawl probes, a failure here leaves us with
//! nothing worth reporting, so every error is a [`FetchError`] and the
//! caller aborts the run.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{DEFAULT_RPC_URL, RPC_REQUEST_TIMEOUT, STATUS_PATH, USER_AGENT};
use crate::error::{ClientBuildError, FetchError};
use crate::rpc::{RpcRequest, RpcResponse, StatusResponse, ValidatorsResult};
use crate::stake::Stake;

/// A validator and its current stake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorRecord {
    /// Validator account id.
    pub account_id: String,
    /// Current stake, exact, in yocto.
    pub stake: Stake,
}

impl ValidatorRecord {
    /// Convenience constructor.
    pub fn new(account_id: impl Into<String>, stake: Stake) -> Self {
        Self {
            account_id: account_id.into(),
            stake,
        }
    }
}

/// Source of the canonical validator account list.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Validator account ids, in the order the chain lists them.
    async fn fetch_accounts(&self) -> Result<Vec<String>, FetchError>;
}

/// Source of current per-validator stake.
#[async_trait]
pub trait StakeSource: Send + Sync {
    /// One record per validator account, in the order the chain lists them.
    async fn fetch_stakes(&self) -> Result<Vec<ValidatorRecord>, FetchError>;
}

/// Connection settings for the trusted RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Base URL, e.g. `https://rpc.mainnet.near.org`.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            timeout: RPC_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP client for the trusted RPC endpoint. Implements both sources.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    /// Creates a client for the configured endpoint.
    pub fn new(config: RpcConfig) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
        })
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl StatusSource for RpcClient {
    async fn fetch_accounts(&self) -> Result<Vec<String>, FetchError> {
        let url = format!("{}{}", self.url, STATUS_PATH);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let status: StatusResponse = Self::decode(&url, response).await?;
        let accounts: Vec<String> = status
            .validators
            .into_iter()
            .map(|v| v.account_id)
            .collect();

        debug!(count = accounts.len(), "fetched status validators");
        Ok(accounts)
    }
}

#[async_trait]
impl StakeSource for RpcClient {
    async fn fetch_stakes(&self) -> Result<Vec<ValidatorRecord>, FetchError> {
        let url = self.url.clone();

        let response = self
            .client
            .post(&url)
            .json(&RpcRequest::validators())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        let rpc: RpcResponse<ValidatorsResult> = Self::decode(&url, response).await?;

        if let Some(err) = rpc.error {
            return Err(FetchError::Rpc {
                url,
                code: err.code,
                message: err.message,
            });
        }

        let result = rpc.result.ok_or_else(|| FetchError::Malformed {
            url: url.clone(),
            reason: "response carries neither result nor error".to_string(),
        })?;

        let records = dedup_by_account(
            result
                .current_validators
                .into_iter()
                .map(|v| ValidatorRecord::new(v.account_id, v.stake)),
        );

        debug!(count = records.len(), "fetched current validators");
        Ok(records)
    }
}

/// Keeps the first record per account id. A repeated account would
/// otherwise have its stake counted twice.
fn dedup_by_account(records: impl IntoIterator<Item = ValidatorRecord>) -> Vec<ValidatorRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let fresh = seen.insert(record.account_id.clone());
            if !fresh {
                warn!(account_id = %record.account_id, "duplicate validator in stake list, ignoring");
            }
            fresh
        })
        .collect()
}
