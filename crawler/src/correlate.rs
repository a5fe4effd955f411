//! # Stake Correlation
//!
//! Joins the stake list against the crawl's discovery tables:
//!
//! ```text
//! account_id ──(producers)──► peer_id ──(peers)──► host:port ──► IP
//! ```
//!
//! and sums stake per IP. Several validators (and several peer ids) often
//! share one machine or one NAT; they collapse into a single
//! [`AggregatedNode`] whose peer id list keeps every identity seen there.
//!
//! Anything that does not resolve lands in the [`NodeKey::Unknown`] bucket.
//! Nothing is dropped, so the total stake across all nodes always equals
//! the total stake of the input.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use tracing::debug;

use crate::config::UNKNOWN_NODE_KEY;
use crate::discovery::{host_of, DiscoveryTables};
use crate::source::ValidatorRecord;
use crate::stake::Stake;

/// Key of an aggregated node: a bare IP, or the unknown bucket.
///
/// Ordered so that the unknown bucket sorts after every IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// Resolved host (port stripped).
    Ip(String),
    /// Validators whose producer mapping or peer address is missing.
    Unknown,
}

impl NodeKey {
    /// The key as it appears in the report.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ip(ip) => ip,
            Self::Unknown => UNKNOWN_NODE_KEY,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stake aggregated onto one IP (or onto the unknown bucket).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedNode {
    /// Where this stake lives.
    pub key: NodeKey,
    /// Sum of the stake of every validator resolving here.
    pub stake: Stake,
    /// Always true for nodes built from the stake list.
    pub is_validator: bool,
    /// Peer id of every validator collapsed onto this node, in stake-list
    /// order. `None` marks a validator with no producer mapping at all.
    pub peer_ids: Vec<Option<String>>,
    /// Validator accounts collapsed onto this node, in stake-list order.
    pub accounts: Vec<String>,
}

impl AggregatedNode {
    fn new(key: NodeKey, record: &ValidatorRecord, peer_id: Option<String>) -> Self {
        Self {
            key,
            stake: record.stake.clone(),
            is_validator: true,
            peer_ids: vec![peer_id],
            accounts: vec![record.account_id.clone()],
        }
    }

    fn absorb(&mut self, record: &ValidatorRecord, peer_id: Option<String>) {
        self.stake += &record.stake;
        self.peer_ids.push(peer_id);
        self.accounts.push(record.account_id.clone());
    }

    /// Peer id of the first validator that resolved here.
    pub fn address(&self) -> Option<&str> {
        self.peer_ids.first().and_then(|p| p.as_deref())
    }

    /// Peer ids of every later validator that collapsed onto this node.
    pub fn other_addresses(&self) -> &[Option<String>] {
        self.peer_ids.get(1..).unwrap_or(&[])
    }
}

/// Aggregated nodes keyed by IP, unknown bucket last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMap {
    nodes: BTreeMap<NodeKey, AggregatedNode>,
}

impl NodeMap {
    /// Node for a bare IP.
    pub fn ip(&self, ip: &str) -> Option<&AggregatedNode> {
        self.nodes.get(&NodeKey::Ip(ip.to_string()))
    }

    /// The unknown bucket, if any validator landed in it.
    pub fn unknown(&self) -> Option<&AggregatedNode> {
        self.nodes.get(&NodeKey::Unknown)
    }

    /// Number of nodes, unknown bucket included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no validator was correlated at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in key order.
    pub fn iter(&self) -> btree_map::Values<'_, NodeKey, AggregatedNode> {
        self.nodes.values()
    }

    /// Stake summed over every node.
    pub fn total_stake(&self) -> Stake {
        self.nodes.values().map(|node| &node.stake).sum()
    }
}

impl<'a> IntoIterator for &'a NodeMap {
    type Item = &'a AggregatedNode;
    type IntoIter = btree_map::Values<'a, NodeKey, AggregatedNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Resolves a validator account to its IP through the discovery tables.
///
/// Returns the peer id (if the account has a producer mapping) and the key.
/// A host spelled like the unknown bucket's key is treated as unresolved,
/// so no peer can claim a report key of its own next to the bucket.
pub fn resolve(account_id: &str, tables: &DiscoveryTables) -> (Option<String>, NodeKey) {
    let peer_id = tables.producer_peer(account_id);

    let ip = peer_id
        .as_deref()
        .and_then(|peer| tables.peer_addr(peer))
        .and_then(|addr| host_of(&addr).map(str::to_string))
        .filter(|host| !host.eq_ignore_ascii_case(UNKNOWN_NODE_KEY));

    let key = match ip {
        Some(ip) => NodeKey::Ip(ip),
        None => NodeKey::Unknown,
    };
    (peer_id, key)
}

/// Aggregates validator stake by the IP each validator resolves to.
pub fn correlate(validators: &[ValidatorRecord], tables: &DiscoveryTables) -> NodeMap {
    let mut map = NodeMap::default();

    for (index, record) in validators.iter().enumerate() {
        let (peer_id, key) = resolve(&record.account_id, tables);

        debug!(
            index = index + 1,
            account_id = %record.account_id,
            peer_id = peer_id.as_deref().unwrap_or("-"),
            node = %key,
            stake = %record.stake,
            "correlated validator"
        );

        match map.nodes.entry(key) {
            btree_map::Entry::Occupied(mut slot) => slot.get_mut().absorb(record, peer_id),
            btree_map::Entry::Vacant(slot) => {
                let node = AggregatedNode::new(slot.key().clone(), record, peer_id);
                slot.insert(node);
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(peers: &[(&str, &str)], producers: &[(&str, &str)]) -> DiscoveryTables {
        let tables = DiscoveryTables::new();
        for (id, addr) in peers {
            tables.insert_peer(id, Some(addr));
        }
        for (account, peer) in producers {
            tables.insert_producer(account, peer);
        }
        tables
    }

    #[test]
    fn example_scenario() {
        let tables = tables(
            &[("P1", "1.2.3.4:24567"), ("P2", "5.6.7.8:24567")],
            &[("alice.near", "P1")],
        );
        let validators = vec![ValidatorRecord::new(
            "alice.near",
            Stake::parse_yocto("50000000000000000000000000").unwrap(),
        )];

        let nodes = correlate(&validators, &tables);

        assert_eq!(nodes.len(), 1);
        let node = nodes.ip("1.2.3.4").unwrap();
        assert_eq!(node.stake.to_string(), "50.0");
        assert!(node.is_validator);
        assert_eq!(node.address(), Some("P1"));
        assert!(node.other_addresses().is_empty());
        assert!(nodes.ip("5.6.7.8").is_none());
    }

    #[test]
    fn validators_sharing_an_ip_collapse() {
        let tables = tables(
            &[("P1", "1.2.3.4:24567"), ("P2", "1.2.3.4:24568")],
            &[("alice.near", "P1"), ("bob.near", "P2")],
        );
        let validators = vec![
            ValidatorRecord::new("alice.near", Stake::from_tokens(10)),
            ValidatorRecord::new("bob.near", Stake::from_tokens(5)),
        ];

        let nodes = correlate(&validators, &tables);

        assert_eq!(nodes.len(), 1);
        let node = nodes.ip("1.2.3.4").unwrap();
        assert_eq!(node.stake, Stake::from_tokens(15));
        assert_eq!(node.peer_ids, vec![Some("P1".to_string()), Some("P2".to_string())]);
        assert_eq!(node.address(), Some("P1"));
        assert_eq!(node.other_addresses(), &[Some("P2".to_string())]);
        assert_eq!(node.accounts, vec!["alice.near", "bob.near"]);
    }

    #[test]
    fn unmapped_validator_lands_in_unknown() {
        let tables = tables(&[("P1", "1.2.3.4:24567")], &[]);
        let validators = vec![ValidatorRecord::new("ghost.near", Stake::from_tokens(7))];

        let nodes = correlate(&validators, &tables);

        let unknown = nodes.unknown().unwrap();
        assert_eq!(unknown.stake, Stake::from_tokens(7));
        assert_eq!(unknown.peer_ids, vec![None]);
        assert_eq!(unknown.address(), None);
    }

    #[test]
    fn mapped_peer_without_address_lands_in_unknown() {
        let tables = tables(&[], &[("alice.near", "P9")]);
        let validators = vec![
            ValidatorRecord::new("alice.near", Stake::from_tokens(3)),
            ValidatorRecord::new("ghost.near", Stake::from_tokens(4)),
        ];

        let nodes = correlate(&validators, &tables);

        assert_eq!(nodes.len(), 1);
        let unknown = nodes.unknown().unwrap();
        assert_eq!(unknown.stake, Stake::from_tokens(7));
        assert_eq!(unknown.address(), Some("P9"));
        assert_eq!(unknown.other_addresses(), &[None]);
    }

    #[test]
    fn stake_is_conserved() {
        let tables = tables(
            &[
                ("P1", "1.2.3.4:24567"),
                ("P2", "1.2.3.4:24567"),
                ("P3", "[2001:db8::1]:24567"),
            ],
            &[("a.near", "P1"), ("b.near", "P2"), ("c.near", "P3"), ("d.near", "P404")],
        );
        let validators: Vec<ValidatorRecord> = [
            ("a.near", "1000000000000000000000001"),
            ("b.near", "123456789012345678901234567890"),
            ("c.near", "7"),
            ("d.near", "999999999999999999999999"),
            ("e.near", "42000000000000000000000000"),
        ]
        .iter()
        .map(|(account, raw)| ValidatorRecord::new(*account, Stake::parse_yocto(raw).unwrap()))
        .collect();

        let nodes = correlate(&validators, &tables);

        let input: Stake = validators.iter().map(|v| &v.stake).sum();
        assert_eq!(nodes.total_stake(), input);

        let contributors: usize = nodes.iter().map(|n| n.accounts.len()).sum();
        assert_eq!(contributors, validators.len());
        assert!(nodes.ip("2001:db8::1").is_some());
    }

    #[test]
    fn host_named_like_the_unknown_bucket_is_unresolved() {
        let tables = tables(
            &[("P1", "unknown:24567"), ("P2", "UNKNOWN")],
            &[("evil.near", "P1"), ("odd.near", "P2")],
        );
        let validators = vec![
            ValidatorRecord::new("evil.near", Stake::from_tokens(1)),
            ValidatorRecord::new("odd.near", Stake::from_tokens(2)),
            ValidatorRecord::new("ghost.near", Stake::from_tokens(1000)),
        ];

        let nodes = correlate(&validators, &tables);

        assert_eq!(nodes.len(), 1);
        assert!(nodes.ip("unknown").is_none());
        let unknown = nodes.unknown().unwrap();
        assert_eq!(unknown.stake, Stake::from_tokens(1003));
        assert_eq!(unknown.address(), Some("P1"));
    }

    #[test]
    fn unknown_sorts_last() {
        let tables = tables(&[("P1", "9.9.9.9:24567")], &[("a.near", "P1")]);
        let validators = vec![
            ValidatorRecord::new("z.near", Stake::from_tokens(1)),
            ValidatorRecord::new("a.near", Stake::from_tokens(1)),
        ];

        let nodes = correlate(&validators, &tables);
        let keys: Vec<&str> = nodes.iter().map(|n| n.key.as_str()).collect();

        assert_eq!(keys, vec!["9.9.9.9", "unknown"]);
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let nodes = correlate(&[], &DiscoveryTables::new());
        assert!(nodes.is_empty());
        assert!(nodes.total_stake().is_zero());
    }
}
