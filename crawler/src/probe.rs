//! # Node Probes
//!
//! A probe asks one node for its `network_info`. Probes run against
//! arbitrary machines on the internet, most of which never agreed to talk
//! to us, so every failure mode here is ordinary: refused connections,
//! firewalls that swallow SYNs, HTML error pages, half-written JSON. All of
//! them surface as a [`ProbeError`] and none of them is ever fatal.
//!
//! Peers only advertise their p2p address. The RPC endpoint we probe is a
//! guess: same host, well-known RPC port (see [`rpc_endpoint_for`]).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{NETWORK_INFO_PATH, USER_AGENT};
use crate::discovery::host_of;
use crate::error::{ClientBuildError, ProbeError};
use crate::rpc::NetworkInfo;

/// Something that can fetch a node's `network_info`.
///
/// `endpoint` is an RPC base URL such as `http://1.2.3.4:3030` or
/// `https://rpc.mainnet.near.org`. Implementations append the path.
#[async_trait]
pub trait NodeProbe: Send + Sync + 'static {
    /// Fetches the node's active peers and known producers.
    async fn probe(&self, endpoint: &str) -> Result<NetworkInfo, ProbeError>;
}

/// Builds the RPC base URL for a peer from its reported p2p address.
///
/// `"1.2.3.4:24567"` with port 3030 → `"http://1.2.3.4:3030"`. IPv6 hosts
/// are bracketed.
pub fn rpc_endpoint_for(p2p_addr: &str, rpc_port: u16) -> Result<String, ProbeError> {
    let host = host_of(p2p_addr).ok_or_else(|| ProbeError::BadAddress(p2p_addr.to_string()))?;

    if host.contains(':') {
        Ok(format!("http://[{}]:{}", host, rpc_port))
    } else {
        Ok(format!("http://{}:{}", host, rpc_port))
    }
}

/// [`NodeProbe`] over plain HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    /// Creates a probe whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ClientBuildError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> ProbeError {
        if err.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else {
            ProbeError::from_reqwest(err)
        }
    }
}

#[async_trait]
impl NodeProbe for HttpProbe {
    async fn probe(&self, endpoint: &str) -> Result<NetworkInfo, ProbeError> {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), NETWORK_INFO_PATH);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        response
            .json::<NetworkInfo>()
            .await
            .map_err(|e| self.classify(e))
    }
}
