//! Multi-replica tests for the bidder stack.
//!
//! Real `Auction` state machines sit behind an in-memory connector wrapped
//! in `ChaosConnector`, so the directory, fan-out and bidding loop run
//! against replicas that can crash, recover and close independently.

use auction_bidder::bidding_loop::RoundOutcome;
use auction_bidder::chaos::{ChaosConfig, ChaosConnector};
use auction_bidder::{
    get_highest, BiddingLoop, LoopConfig, LoopState, ReplicaConnector, ReplicaDirectory,
    ReplicaError, ReplicaHandle,
};
use auction_common::{Amount, BidResult, BidStatus};
use auction_replica::Auction;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Duration;

// ────────────────────────── InMemConnector ──────────────────────────

/// Dispatches to the `Auction` registered under each address.
struct InMemConnector {
    registry: HashMap<String, Auction>,
}

#[derive(Clone)]
struct InMemHandle {
    auction: Auction,
}

#[async_trait::async_trait]
impl ReplicaConnector for InMemConnector {
    type Handle = InMemHandle;

    async fn connect(&self, addr: &str) -> Result<InMemHandle, ReplicaError> {
        let auction = self
            .registry
            .get(addr)
            .cloned()
            .ok_or_else(|| ReplicaError::ConnectFailed {
                addr: addr.to_string(),
                reason: "no such replica".into(),
            })?;
        Ok(InMemHandle { auction })
    }
}

#[async_trait::async_trait]
impl ReplicaHandle for InMemHandle {
    async fn get_result(&self) -> Result<BidResult, ReplicaError> {
        Ok(self.auction.result().await)
    }

    async fn make_bid(&self, amount: Amount, bidder_id: &str) -> Result<BidResult, ReplicaError> {
        Ok(self.auction.make_bid(amount, bidder_id).await.into_reply())
    }
}

// ────────────────────────── TestCluster ──────────────────────────

struct TestCluster {
    addrs: Vec<String>,
    replicas: Vec<Auction>,
    chaos: ChaosConnector<InMemConnector>,
}

impl TestCluster {
    fn new(n: usize) -> Self {
        let addrs: Vec<String> = (1..=n).map(|i| format!("auctionserver{}:5000", i)).collect();
        let replicas: Vec<Auction> = (0..n).map(|_| Auction::new()).collect();
        let registry = addrs
            .iter()
            .cloned()
            .zip(replicas.iter().cloned())
            .collect();
        let chaos = ChaosConnector::new(InMemConnector { registry }, ChaosConfig::default());
        Self {
            addrs,
            replicas,
            chaos,
        }
    }

    fn directory(&self) -> ReplicaDirectory<ChaosConnector<InMemConnector>> {
        ReplicaDirectory::new(
            self.addrs.clone(),
            Arc::new(self.chaos.clone()),
            Duration::from_millis(200),
        )
    }

    fn bidder(&self, name: &str) -> BiddingLoop<ChaosConnector<InMemConnector>> {
        BiddingLoop::new(
            Arc::new(self.directory()),
            name,
            LoopConfig {
                rpc_timeout: Duration::from_millis(200),
                round_interval: Duration::from_millis(1),
                max_backoff: Duration::from_millis(50),
            },
        )
    }
}

// ────────────────────────── Tests ──────────────────────────

#[tokio::test]
async fn test_read_skips_crashed_replica() {
    let cluster = TestCluster::new(3);
    cluster.replicas[0].make_bid(12, "x").await;
    cluster.replicas[1].make_bid(50, "y").await;
    cluster.replicas[2].make_bid(31, "z").await;

    let dir = cluster.directory();
    let live = dir.resolve().await;
    assert_eq!(live.len(), 3);

    cluster.chaos.crash("auctionserver2:5000").await;
    let agg = get_highest(&dir, &live, Duration::from_millis(200))
        .await
        .unwrap();

    assert_eq!(agg.highest, BidResult::new(31, "z", BidStatus::Ok));
    assert_eq!(agg.responses, 2);
    assert!(!dir.is_connected("auctionserver2:5000").await);

    // Still down: the next resolve leaves it out.
    assert_eq!(dir.resolve().await.len(), 2);
}

#[tokio::test]
async fn test_bid_reaches_recovered_replica() {
    let cluster = TestCluster::new(3);
    let mut bidder = cluster.bidder("me");
    cluster.replicas[0].make_bid(4, "rival").await;

    cluster.chaos.crash("auctionserver3:5000").await;
    let outcome = bidder.run_round().await;
    assert!(matches!(outcome, RoundOutcome::Bid { amount: 5, .. }));
    assert_eq!(cluster.replicas[2].result().await.amount, 0);

    cluster.chaos.recover("auctionserver3:5000").await;
    cluster.replicas[1].make_bid(9, "rival").await;

    let outcome = bidder.run_round().await;
    assert!(matches!(outcome, RoundOutcome::Bid { amount: 10, .. }));
    for replica in &cluster.replicas {
        let r = replica.result().await;
        assert_eq!(r.amount, 10);
        assert_eq!(r.bidder_id, "me");
    }
}

#[tokio::test]
async fn test_single_closed_replica_stops_the_loop() {
    let cluster = TestCluster::new(3);
    cluster.replicas[0].make_bid(8, "early").await;
    cluster.replicas[0].close().await;
    cluster.replicas[1].make_bid(20, "late").await;

    let mut bidder = cluster.bidder("me");
    let outcome = bidder.run_round().await;
    assert_eq!(
        outcome,
        RoundOutcome::Closed(BidResult::new(8, "early", BidStatus::AuctionOver))
    );
    assert_eq!(bidder.state(), LoopState::Closed);
    assert_eq!(cluster.replicas[1].result().await.bidder_id, "late");
}

#[tokio::test]
async fn test_all_replicas_down_then_back() {
    let cluster = TestCluster::new(2);
    let mut bidder = cluster.bidder("me");
    for addr in &cluster.addrs {
        cluster.chaos.crash(addr).await;
    }

    for _ in 0..3 {
        assert_eq!(bidder.run_round().await, RoundOutcome::Unavailable);
    }

    cluster.chaos.recover("auctionserver1:5000").await;
    assert!(matches!(
        bidder.run_round().await,
        RoundOutcome::Bid { amount: 1, .. }
    ));
    assert_eq!(cluster.replicas[0].result().await.bidder_id, "me");
}

#[tokio::test(start_paused = true)]
async fn test_two_bidders_race_until_close() {
    let cluster = TestCluster::new(3);
    for replica in &cluster.replicas {
        replica.spawn_close_timer(Duration::from_secs(1));
    }

    let alice = tokio::spawn(cluster.bidder("alice").run());
    let bob = tokio::spawn(cluster.bidder("bob").run());
    let outcomes = [("alice", alice.await.unwrap()), ("bob", bob.await.unwrap())];

    let mut frozen = Vec::new();
    for replica in &cluster.replicas {
        let r = replica.result().await;
        assert!(r.is_over());
        frozen.push(r);
    }

    for (name, outcome) in &outcomes {
        // Each bidder reports the frozen state of a replica it saw closed.
        assert!(outcome.result.is_over());
        assert!(outcome.result.amount > 0);
        assert!(frozen.contains(&outcome.result), "{}: {:?}", name, outcome);
        assert_eq!(outcome.won, outcome.result.bidder_id == *name);
        assert!(outcome.bids_placed > 0);
    }

    let top = frozen.iter().map(|r| r.amount).max().unwrap();
    let leader = frozen.iter().find(|r| r.amount == top).unwrap();
    assert!(leader.bidder_id == "alice" || leader.bidder_id == "bob");
}
