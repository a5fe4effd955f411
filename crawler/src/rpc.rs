//! # Wire Types
//!
//! Request and response shapes for the three endpoints the crawler talks
//! to. Only the fields we actually use are modelled; everything else in the
//! (rather chatty) node responses is ignored by serde.
//!
//! | Endpoint                 | Type                          |
//! |--------------------------|-------------------------------|
//! | `GET /status`            | [`StatusResponse`]            |
//! | `GET /network_info`      | [`NetworkInfo`]               |
//! | `POST /` `validators`    | [`RpcResponse<ValidatorsResult>`] |

use serde::{Deserialize, Serialize};

use crate::stake::Stake;

// ---------------------------------------------------------------------------
// network_info
// ---------------------------------------------------------------------------

/// A node's view of the network: who it is connected to, and which
/// validator accounts it has seen announced by which peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Peers the node currently holds an open connection to.
    #[serde(default)]
    pub active_peers: Vec<ActivePeer>,
    /// Account → peer announcements the node has observed.
    #[serde(default)]
    pub known_producers: Vec<KnownProducer>,
}

/// Entry of `active_peers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePeer {
    /// Opaque network-layer peer id (e.g. `ed25519:...`).
    pub id: String,
    /// p2p socket address as seen by the reporting node. Inbound peers are
    /// sometimes reported without one.
    #[serde(default)]
    pub addr: Option<String>,
}

/// Entry of `known_producers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownProducer {
    /// Validator account id.
    pub account_id: String,
    /// Peer id the account was announced from.
    pub peer_id: String,
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// The subset of `/status` we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    /// Validators of the current epoch.
    #[serde(default)]
    pub validators: Vec<StatusValidator>,
}

/// Entry of `/status` `validators`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusValidator {
    /// Validator account id.
    pub account_id: String,
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version. Always "2.0".
    pub jsonrpc: String,
    /// Request identifier. The node echoes it back; we never look at it.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

impl RpcRequest {
    /// Builds a request with the conventional throwaway id.
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: serde_json::Value::String("dontcare".to_string()),
            method: method.into(),
            params,
        }
    }

    /// The `validators` call for the latest epoch: `params: [null]`.
    pub fn validators() -> Self {
        Self::new(
            crate::config::VALIDATORS_METHOD,
            serde_json::Value::Array(vec![serde_json::Value::Null]),
        )
    }
}

/// A JSON-RPC 2.0 response with a typed result.
///
/// Exactly one of `result` or `error` should be set. A node that sends
/// neither is treated as malformed by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    /// The successful result.
    pub result: Option<T>,
    /// The error, if the call failed.
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Result payload of the `validators` call.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorsResult {
    /// Validators of the current epoch with their stake.
    pub current_validators: Vec<CurrentValidator>,
}

/// Entry of `current_validators`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentValidator {
    /// Validator account id.
    pub account_id: String,
    /// Stake in yocto, sent as a decimal string.
    pub stake: Stake,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validators_request_has_null_params() {
        let req = RpcRequest::validators();
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "validators");
        assert_eq!(json["params"], serde_json::json!([null]));
        assert_eq!(json["id"], "dontcare");
    }

    #[test]
    fn network_info_ignores_extra_fields_and_missing_lists() {
        let body = r#"{
            "active_peers": [
                {"id": "ed25519:A", "addr": "1.2.3.4:24567", "account_id": null},
                {"id": "ed25519:B", "addr": null}
            ],
            "num_active_peers": 2,
            "peer_max_count": 40
        }"#;
        let info: NetworkInfo = serde_json::from_str(body).unwrap();

        assert_eq!(info.active_peers.len(), 2);
        assert_eq!(info.active_peers[0].addr.as_deref(), Some("1.2.3.4:24567"));
        assert!(info.active_peers[1].addr.is_none());
        assert!(info.known_producers.is_empty());
    }

    #[test]
    fn rpc_response_with_error_parses() {
        let body = r#"{"jsonrpc":"2.0","id":"dontcare","error":{"code":-32000,"message":"Server error","data":"busy"}}"#;
        let resp: RpcResponse<ValidatorsResult> = serde_json::from_str(body).unwrap();

        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.message, "Server error");
    }

    #[test]
    fn validators_result_parses_string_stake() {
        let body = r#"{"jsonrpc":"2.0","id":"dontcare","result":{"current_validators":[
            {"account_id":"alice.near","stake":"50000000000000000000000000","is_slashed":false}
        ]}}"#;
        let resp: RpcResponse<ValidatorsResult> = serde_json::from_str(body).unwrap();
        let validators = resp.result.unwrap().current_validators;

        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].account_id, "alice.near");
        assert_eq!(validators[0].stake.to_string(), "50.0");
    }
}
