//! # Discovery Tables
//!
//! The two tables the crawl fills in: peer id → address, and validator
//! account → peer id. Both are written concurrently by every in-flight
//! probe and both follow the same rule: **first writer wins**. A peer or
//! producer reported a second time is a no-op, never an update, so the
//! result does not depend on how the merges interleave beyond "who got
//! there first".
//!
//! ## Design
//!
//! - `DashMap` gives us an atomic insert-if-absent through its entry API, so
//!   concurrent merges never lose an insert and no lock is ever held across a
//!   network call (merges only happen after a probe has fully returned).
//! - The insert methods report whether the key was new. The crawler relies
//!   on that to decide which peers still need a probe.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::rpc::NetworkInfo;

/// A peer discovered during the crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRecord {
    /// Opaque network-layer peer id.
    pub peer_id: String,
    /// p2p address (`host:port`) as first reported, if any.
    pub addr: Option<String>,
}

impl PeerRecord {
    /// The host part of the address, i.e. the IP for all practical purposes.
    pub fn ip(&self) -> Option<&str> {
        self.addr.as_deref().and_then(host_of)
    }
}

/// A validator account announced from a given peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerMapping {
    /// Validator account id.
    pub account_id: String,
    /// Peer id the account was first seen announced from.
    pub peer_id: String,
}

/// What a single merge added to the tables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Peers that were not in the table before this merge, in report order.
    pub new_peers: Vec<PeerRecord>,
    /// Number of producer mappings that were new.
    pub new_producers: usize,
}

/// Concurrent peer and producer tables for one crawl run.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryTables {
    peers: DashMap<String, Option<String>>,
    producers: DashMap<String, String>,
}

impl DiscoveryTables {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a peer unless its id is already known.
    ///
    /// Returns `true` if the peer was inserted by this call.
    pub fn insert_peer(&self, peer_id: &str, addr: Option<&str>) -> bool {
        match self.peers.entry(peer_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(addr.map(str::to_string));
                true
            }
        }
    }

    /// Records a producer mapping unless the account is already mapped.
    ///
    /// Returns `true` if the mapping was inserted by this call.
    pub fn insert_producer(&self, account_id: &str, peer_id: &str) -> bool {
        match self.producers.entry(account_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(peer_id.to_string());
                true
            }
        }
    }

    /// Folds one node's `network_info` into the tables.
    pub fn merge(&self, info: &NetworkInfo) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for peer in &info.active_peers {
            if self.insert_peer(&peer.id, peer.addr.as_deref()) {
                outcome.new_peers.push(PeerRecord {
                    peer_id: peer.id.clone(),
                    addr: peer.addr.clone(),
                });
            }
        }

        for producer in &info.known_producers {
            if self.insert_producer(&producer.account_id, &producer.peer_id) {
                outcome.new_producers += 1;
            }
        }

        outcome
    }

    /// Address recorded for a peer id. `None` if the peer is unknown or was
    /// reported without an address.
    pub fn peer_addr(&self, peer_id: &str) -> Option<String> {
        self.peers.get(peer_id).and_then(|addr| addr.value().clone())
    }

    /// Whether the peer id is in the table at all.
    pub fn contains_peer(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    /// Peer id recorded for a validator account.
    pub fn producer_peer(&self, account_id: &str) -> Option<String> {
        self.producers.get(account_id).map(|peer| peer.value().clone())
    }

    /// Number of distinct peers discovered.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Number of distinct producer accounts discovered.
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Snapshot of the peer table, sorted by peer id.
    pub fn peers(&self) -> Vec<PeerRecord> {
        let mut peers: Vec<PeerRecord> = self
            .peers
            .iter()
            .map(|entry| PeerRecord {
                peer_id: entry.key().clone(),
                addr: entry.value().clone(),
            })
            .collect();
        peers.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        peers
    }

    /// Snapshot of the producer table, sorted by account id.
    pub fn producers(&self) -> Vec<ProducerMapping> {
        let mut producers: Vec<ProducerMapping> = self
            .producers
            .iter()
            .map(|entry| ProducerMapping {
                account_id: entry.key().clone(),
                peer_id: entry.value().clone(),
            })
            .collect();
        producers.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        producers
    }
}

/// Strips the port from a `host:port` address.
///
/// Handles `1.2.3.4:24567`, bare hosts, `[::1]:24567` and bare IPv6
/// literals. Returns `None` for an empty host.
pub fn host_of(addr: &str) -> Option<&str> {
    let addr = addr.trim();

    let host = if let Some(rest) = addr.strip_prefix('[') {
        rest.split_once(']').map(|(host, _)| host)?
    } else if addr.matches(':').count() > 1 {
        // Unbracketed IPv6 literal; there is no port to strip.
        addr
    } else {
        addr.split_once(':').map_or(addr, |(host, _)| host)
    };

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{ActivePeer, KnownProducer};
    use std::sync::Arc;

    fn peer(id: &str, addr: &str) -> ActivePeer {
        ActivePeer {
            id: id.to_string(),
            addr: Some(addr.to_string()),
        }
    }

    fn producer(account: &str, peer_id: &str) -> KnownProducer {
        KnownProducer {
            account_id: account.to_string(),
            peer_id: peer_id.to_string(),
        }
    }

    #[test]
    fn first_reported_address_wins() {
        let tables = DiscoveryTables::new();

        let first = NetworkInfo {
            active_peers: vec![peer("P1", "1.2.3.4:24567")],
            known_producers: vec![],
        };
        let second = NetworkInfo {
            active_peers: vec![peer("P1", "9.9.9.9:24567")],
            known_producers: vec![],
        };

        assert_eq!(tables.merge(&first).new_peers.len(), 1);
        assert!(tables.merge(&second).new_peers.is_empty());

        assert_eq!(tables.peer_count(), 1);
        assert_eq!(tables.peer_addr("P1").as_deref(), Some("1.2.3.4:24567"));
    }

    #[test]
    fn first_producer_mapping_wins() {
        let tables = DiscoveryTables::new();
        let info = NetworkInfo {
            active_peers: vec![],
            known_producers: vec![producer("alice.near", "P1"), producer("alice.near", "P2")],
        };

        let outcome = tables.merge(&info);
        assert_eq!(outcome.new_producers, 1);
        assert_eq!(tables.producer_peer("alice.near").as_deref(), Some("P1"));
    }

    #[test]
    fn peers_without_address_are_still_recorded() {
        let tables = DiscoveryTables::new();
        assert!(tables.insert_peer("P1", None));
        assert!(tables.contains_peer("P1"));
        assert!(tables.peer_addr("P1").is_none());

        // A later report with an address does not upgrade the record.
        assert!(!tables.insert_peer("P1", Some("1.2.3.4:24567")));
        assert!(tables.peer_addr("P1").is_none());
    }

    #[test]
    fn concurrent_inserts_have_exactly_one_winner() {
        let tables = Arc::new(DiscoveryTables::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let tables = Arc::clone(&tables);
                std::thread::spawn(move || {
                    let addr = format!("10.0.0.{}:24567", i);
                    tables.insert_peer("P1", Some(&addr))
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(tables.peer_count(), 1);
    }

    #[test]
    fn snapshots_are_sorted() {
        let tables = DiscoveryTables::new();
        tables.insert_peer("P2", Some("5.6.7.8:24567"));
        tables.insert_peer("P1", Some("1.2.3.4:24567"));
        tables.insert_producer("bob.near", "P2");
        tables.insert_producer("alice.near", "P1");

        let peers = tables.peers();
        assert_eq!(peers[0].peer_id, "P1");
        assert_eq!(peers[0].ip(), Some("1.2.3.4"));

        let producers = tables.producers();
        assert_eq!(producers[0].account_id, "alice.near");
    }

    #[test]
    fn host_of_strips_ports() {
        assert_eq!(host_of("1.2.3.4:24567"), Some("1.2.3.4"));
        assert_eq!(host_of("1.2.3.4"), Some("1.2.3.4"));
        assert_eq!(host_of("node.example.com:24567"), Some("node.example.com"));
        assert_eq!(host_of("[2001:db8::1]:24567"), Some("2001:db8::1"));
        assert_eq!(host_of("2001:db8::1"), Some("2001:db8::1"));
        assert_eq!(host_of(":24567"), None);
        assert_eq!(host_of(""), None);
        assert_eq!(host_of("[]:24567"), None);
    }
}
