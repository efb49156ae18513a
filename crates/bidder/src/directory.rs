//! Replica directory: the bidder's address → connection map.
//!
//! The configured address set is fixed. Each address is either connected or
//! absent; absent addresses are retried on the next [`ReplicaDirectory::resolve`].
//! The map lock only guards lookups, inserts and removals and is never held
//! across a connect or an RPC.

use crate::replica_client::{with_timeout, ReplicaConnector};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// A connected replica usable for the current round.
#[derive(Debug, Clone)]
pub struct LiveReplica<H> {
    pub addr: String,
    pub handle: H,
}

pub struct ReplicaDirectory<C: ReplicaConnector> {
    addresses: Vec<String>,
    connector: Arc<C>,
    connections: Mutex<HashMap<String, C::Handle>>,
    connect_timeout: Duration,
}

impl<C: ReplicaConnector> std::fmt::Debug for ReplicaDirectory<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaDirectory")
            .field("addresses", &self.addresses)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl<C: ReplicaConnector> ReplicaDirectory<C> {
    pub fn new(addresses: Vec<String>, connector: Arc<C>, connect_timeout: Duration) -> Self {
        let mut seen = std::collections::HashSet::new();
        let addresses = addresses
            .into_iter()
            .filter(|a| seen.insert(a.clone()))
            .collect();
        Self {
            addresses,
            connector,
            connections: Mutex::new(HashMap::new()),
            connect_timeout,
        }
    }

    /// The configured address set, in configuration order.
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Return a live replica for every configured address that is connected
    /// or can be connected now, in configuration order.
    ///
    /// Addresses that fail to connect are left out of this call's result
    /// and tried again on the next call.
    pub async fn resolve(&self) -> Vec<LiveReplica<C::Handle>> {
        let mut slots: Vec<Option<C::Handle>> = {
            let conns = self.connections.lock().await;
            self.addresses
                .iter()
                .map(|addr| conns.get(addr).cloned())
                .collect()
        };

        let missing: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect();

        if !missing.is_empty() {
            let attempts = missing.iter().map(|&i| {
                let addr = &self.addresses[i];
                async move {
                    let result =
                        with_timeout(self.connect_timeout, self.connector.connect(addr)).await;
                    (i, result)
                }
            });

            let mut established = Vec::new();
            for (i, result) in join_all(attempts).await {
                match result {
                    Ok(handle) => established.push((i, handle)),
                    Err(e) => {
                        tracing::debug!("replica {} unreachable: {}", self.addresses[i], e);
                    }
                }
            }

            if !established.is_empty() {
                let m = auction_metrics::metrics();
                let mut conns = self.connections.lock().await;
                for (i, handle) in established {
                    let addr = &self.addresses[i];
                    // A concurrent resolve may have connected first; keep its handle.
                    let kept = conns.entry(addr.clone()).or_insert_with(|| {
                        m.connects.inc();
                        tracing::info!("connected to replica {}", addr);
                        handle
                    });
                    slots[i] = Some(kept.clone());
                }
            }
        }

        self.addresses
            .iter()
            .zip(slots)
            .filter_map(|(addr, slot)| {
                slot.map(|handle| LiveReplica {
                    addr: addr.clone(),
                    handle,
                })
            })
            .collect()
    }

    /// Drop the connection for `addr` so the next `resolve` reconnects.
    ///
    /// Returns `false` if there was nothing to drop.
    pub async fn evict(&self, addr: &str) -> bool {
        let removed = self.connections.lock().await.remove(addr).is_some();
        if removed {
            auction_metrics::metrics().evictions.inc();
            tracing::warn!("evicted replica {}", addr);
        }
        removed
    }

    /// Number of addresses that currently hold a connection.
    pub async fn connected_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_connected(&self, addr: &str) -> bool {
        self.connections.lock().await.contains_key(addr)
    }
}
