//! Fan-out writer: best-effort broadcast of one bid to every live replica.

use crate::directory::{LiveReplica, ReplicaDirectory};
use crate::fanout::fan_out;
use crate::replica_client::{ReplicaConnector, ReplicaHandle};
use auction_common::{Amount, BidStatus};
use tokio::time::Duration;

/// Per-status tally of one broadcast, for logging.
///
/// This is not a decision: the next read round decides what happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub accepted: usize,
    pub too_low: usize,
    pub closed: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.accepted + self.too_low + self.closed + self.failed
    }
}

/// Send `amount` on behalf of `bidder_id` to every replica in `live`,
/// concurrently, and wait for every call to settle.
///
/// A bid may land on only some replicas. Failed replicas are evicted from
/// `directory` and otherwise ignored.
pub async fn broadcast_bid<C: ReplicaConnector>(
    directory: &ReplicaDirectory<C>,
    live: &[LiveReplica<C::Handle>],
    amount: Amount,
    bidder_id: &str,
    rpc_timeout: Duration,
) -> BroadcastReport {
    let replies = fan_out(directory, live, "make_bid", rpc_timeout, |handle| {
        let bidder_id = bidder_id.to_string();
        async move { handle.make_bid(amount, &bidder_id).await }
    })
    .await;

    let mut report = BroadcastReport {
        failed: live.len() - replies.len(),
        ..Default::default()
    };
    for (addr, reply) in &replies {
        match reply.status {
            BidStatus::Ok => report.accepted += 1,
            BidStatus::TooLow => report.too_low += 1,
            BidStatus::AuctionOver => report.closed += 1,
        }
        tracing::debug!("bid {} on {}: {}", amount, addr, reply.status);
    }
    report
}
