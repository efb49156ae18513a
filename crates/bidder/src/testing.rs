//! Scriptable in-process replicas for unit tests.

use crate::replica_client::{ReplicaConnector, ReplicaError, ReplicaHandle};
use auction_common::{Amount, BidResult, BidStatus};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

#[derive(Default)]
struct MockState {
    results: HashMap<String, BidResult>,
    unreachable: HashSet<String>,
    failing: HashSet<String>,
    connect_delays: HashMap<String, Duration>,
    rpc_delays: HashMap<String, Duration>,
    failing_gets: HashMap<String, usize>,
    connects: HashMap<String, usize>,
    get_calls: usize,
    bids: Vec<(String, Amount, String)>,
}

/// A connector whose replicas behave like real ones (strictly increasing
/// bids, closed replicas refuse) but can be made unreachable, failing or
/// slow per address.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn with_replicas(addrs: &[String]) -> Self {
        let mock = Self::default();
        for addr in addrs {
            mock.set_result(addr, BidResult::opening());
        }
        mock
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_result(&self, addr: &str, result: BidResult) {
        self.with_state(|s| s.results.insert(addr.to_string(), result));
    }

    pub fn result(&self, addr: &str) -> Option<BidResult> {
        self.with_state(|s| s.results.get(addr).cloned())
    }

    pub fn close(&self, addr: &str) {
        self.with_state(|s| {
            if let Some(r) = s.results.get_mut(addr) {
                r.status = BidStatus::AuctionOver;
            }
        });
    }

    pub fn set_unreachable(&self, addr: &str, on: bool) {
        self.with_state(|s| toggle(&mut s.unreachable, addr, on));
    }

    /// RPCs on existing connections fail; new connections are refused too.
    pub fn set_failing(&self, addr: &str, on: bool) {
        self.with_state(|s| {
            toggle(&mut s.failing, addr, on);
            toggle(&mut s.unreachable, addr, on);
        });
    }

    pub fn set_connect_delay(&self, addr: &str, delay: Duration) {
        self.with_state(|s| s.connect_delays.insert(addr.to_string(), delay));
    }

    pub fn set_rpc_delay(&self, addr: &str, delay: Duration) {
        self.with_state(|s| s.rpc_delays.insert(addr.to_string(), delay));
    }

    /// Fail the next `n` `get_result` calls on `addr`, then answer normally.
    pub fn fail_next_gets(&self, addr: &str, n: usize) {
        self.with_state(|s| s.failing_gets.insert(addr.to_string(), n));
    }

    pub fn connect_count(&self, addr: &str) -> usize {
        self.with_state(|s| s.connects.get(addr).copied().unwrap_or(0))
    }

    pub fn get_calls(&self) -> usize {
        self.with_state(|s| s.get_calls)
    }

    pub fn bids(&self) -> Vec<(String, Amount, String)> {
        self.with_state(|s| s.bids.clone())
    }
}

fn toggle(set: &mut HashSet<String>, addr: &str, on: bool) {
    if on {
        set.insert(addr.to_string());
    } else {
        set.remove(addr);
    }
}

#[async_trait::async_trait]
impl ReplicaConnector for MockConnector {
    type Handle = MockHandle;

    async fn connect(&self, addr: &str) -> Result<MockHandle, ReplicaError> {
        let delay = self.with_state(|s| s.connect_delays.get(addr).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with_state(|s| {
            *s.connects.entry(addr.to_string()).or_default() += 1;
            if s.unreachable.contains(addr) || !s.results.contains_key(addr) {
                Err(ReplicaError::ConnectFailed {
                    addr: addr.to_string(),
                    reason: "connection refused".into(),
                })
            } else {
                Ok(())
            }
        })?;
        Ok(MockHandle {
            addr: addr.to_string(),
            mock: self.clone(),
        })
    }
}

#[derive(Clone)]
pub(crate) struct MockHandle {
    addr: String,
    mock: MockConnector,
}

impl MockHandle {
    async fn delay(&self) -> Result<(), ReplicaError> {
        let delay = self.mock.with_state(|s| s.rpc_delays.get(&self.addr).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.mock.with_state(|s| {
            if s.failing.contains(&self.addr) {
                Err(ReplicaError::RpcFailed("replica down".into()))
            } else {
                Ok(())
            }
        })
    }
}

#[async_trait::async_trait]
impl ReplicaHandle for MockHandle {
    async fn get_result(&self) -> Result<BidResult, ReplicaError> {
        self.delay().await?;
        self.mock.with_state(|s| {
            s.get_calls += 1;
            if let Some(left) = s.failing_gets.get_mut(&self.addr).filter(|n| **n > 0) {
                *left -= 1;
                return Err(ReplicaError::RpcFailed("transient read failure".into()));
            }
            s.results
                .get(&self.addr)
                .cloned()
                .ok_or_else(|| ReplicaError::RpcFailed("unknown replica".into()))
        })
    }

    async fn make_bid(&self, amount: Amount, bidder_id: &str) -> Result<BidResult, ReplicaError> {
        self.delay().await?;
        self.mock.with_state(|s| {
            s.bids
                .push((self.addr.clone(), amount, bidder_id.to_string()));
            let current = s
                .results
                .get_mut(&self.addr)
                .ok_or_else(|| ReplicaError::RpcFailed("unknown replica".into()))?;
            if current.is_over() {
                return Ok(BidResult::rejected(BidStatus::AuctionOver));
            }
            if amount <= current.amount {
                return Ok(BidResult::rejected(BidStatus::TooLow));
            }
            *current = BidResult::new(amount, bidder_id, BidStatus::Ok);
            Ok(current.clone())
        })
    }
}
