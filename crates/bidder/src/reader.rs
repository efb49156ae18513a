//! Fan-out reader: query every live replica and reduce to the best known bid.

use crate::directory::{LiveReplica, ReplicaDirectory};
use crate::fanout::fan_out;
use crate::replica_client::{ReplicaConnector, ReplicaHandle};
use auction_common::BidResult;
use tokio::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FanOutError {
    #[error("no replica answered")]
    NoReplicasAvailable,
}

/// The best known auction state for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedResult {
    /// Highest bid seen this round.
    pub highest: BidResult,
    /// How many replicas answered.
    pub responses: usize,
}

/// Reduce replica answers to the highest bid.
///
/// The maximum amount wins and the earliest answer wins a tie. If any
/// replica reports the auction over, only closed replicas are considered:
/// their frozen state is final. Returns `None` for an empty input.
pub fn reduce_highest<I>(results: I) -> Option<AggregatedResult>
where
    I: IntoIterator<Item = BidResult>,
{
    let mut best_open: Option<BidResult> = None;
    let mut best_closed: Option<BidResult> = None;
    let mut responses = 0usize;

    for result in results {
        responses += 1;
        let slot = if result.is_over() {
            &mut best_closed
        } else {
            &mut best_open
        };
        let better = match slot {
            Some(best) => result.amount > best.amount,
            None => true,
        };
        if better {
            *slot = Some(result);
        }
    }

    let highest = best_closed.or(best_open)?;
    Some(AggregatedResult { highest, responses })
}

/// Ask every replica in `live` for its current result, concurrently, and
/// reduce the answers with [`reduce_highest`].
///
/// Replicas that fail or time out are evicted from `directory`. If none
/// answers the round fails with [`FanOutError::NoReplicasAvailable`].
pub async fn get_highest<C: ReplicaConnector>(
    directory: &ReplicaDirectory<C>,
    live: &[LiveReplica<C::Handle>],
    rpc_timeout: Duration,
) -> Result<AggregatedResult, FanOutError> {
    let answers = fan_out(directory, live, "get_result", rpc_timeout, |handle| async move {
        handle.get_result().await
    })
    .await;

    for (addr, result) in &answers {
        tracing::debug!("{} reports {}", addr, result);
    }

    reduce_highest(answers.into_iter().map(|(_, r)| r)).ok_or(FanOutError::NoReplicasAvailable)
}
