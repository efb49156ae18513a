//! The bidder's control loop.
//!
//! Each round reads the best known bid from every reachable replica, then
//! either stops (auction over), holds (we already lead) or broadcasts a bid
//! one higher than the best known amount. Phases of one round never
//! overlap, and the loop issues no calls once it has seen the auction close.

use crate::directory::ReplicaDirectory;
use crate::reader::{get_highest, FanOutError};
use crate::replica_client::ReplicaConnector;
use crate::writer::{broadcast_bid, BroadcastReport};
use auction_common::{Amount, BidResult};
use std::sync::Arc;
use tokio::time::Duration;

/// First backoff step after a round in which no replica answered.
const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Deadline for each individual RPC.
    pub rpc_timeout: Duration,
    /// Pause between rounds. Zero polls as fast as the replicas answer.
    pub round_interval: Duration,
    /// Ceiling for the exponential backoff while no replica answers.
    pub max_backoff: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(2),
            round_interval: Duration::ZERO,
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// Where the loop is within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    RoundStart,
    Reading,
    Deciding,
    Writing,
    Closed,
}

/// What to do with an aggregated read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The auction is over; this is the final result.
    Close(BidResult),
    /// We already lead, or no higher amount is representable.
    Hold,
    /// Broadcast this amount.
    Outbid(Amount),
}

/// Decide the next step given the best known bid.
pub fn decide(highest: &BidResult, bidder_id: &str) -> Decision {
    if highest.is_over() {
        return Decision::Close(highest.clone());
    }
    if highest.is_led_by(bidder_id) {
        return Decision::Hold;
    }
    match highest.amount.checked_add(1) {
        Some(candidate) => Decision::Outbid(candidate),
        None => {
            tracing::warn!("highest bid {} cannot be outbid", highest.amount);
            Decision::Hold
        }
    }
}

/// Result of a single round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// No replica answered the read.
    Unavailable,
    /// We lead; nothing was written.
    Held,
    /// A bid was broadcast.
    Bid {
        amount: Amount,
        report: BroadcastReport,
    },
    /// The auction is over.
    Closed(BidResult),
}

/// How the auction ended, from this bidder's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionOutcome {
    pub result: BidResult,
    pub won: bool,
    pub rounds: u64,
    pub bids_placed: u64,
}

pub struct BiddingLoop<C: ReplicaConnector> {
    directory: Arc<ReplicaDirectory<C>>,
    bidder_id: String,
    config: LoopConfig,
    state: LoopState,
    final_result: Option<BidResult>,
    rounds: u64,
    bids_placed: u64,
    failed_streak: u32,
}

impl<C: ReplicaConnector> std::fmt::Debug for BiddingLoop<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiddingLoop")
            .field("bidder_id", &self.bidder_id)
            .field("state", &self.state)
            .field("rounds", &self.rounds)
            .finish_non_exhaustive()
    }
}

impl<C: ReplicaConnector> BiddingLoop<C> {
    pub fn new(
        directory: Arc<ReplicaDirectory<C>>,
        bidder_id: impl Into<String>,
        config: LoopConfig,
    ) -> Self {
        Self {
            directory,
            bidder_id: bidder_id.into(),
            config,
            state: LoopState::RoundStart,
            final_result: None,
            rounds: 0,
            bids_placed: 0,
            failed_streak: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn bidder_id(&self) -> &str {
        &self.bidder_id
    }

    /// Run one read → decide → (write) round.
    ///
    /// Once closed, returns the final result again without contacting any
    /// replica.
    pub async fn run_round(&mut self) -> RoundOutcome {
        if let Some(result) = &self.final_result {
            return RoundOutcome::Closed(result.clone());
        }

        self.rounds += 1;
        auction_metrics::metrics().rounds.inc();

        self.state = LoopState::Reading;
        let live = self.directory.resolve().await;
        let read = get_highest(&*self.directory, &live, self.config.rpc_timeout).await;
        let aggregate = match read {
            Ok(aggregate) => aggregate,
            Err(FanOutError::NoReplicasAvailable) => {
                self.failed_streak = self.failed_streak.saturating_add(1);
                auction_metrics::metrics().failed_rounds.inc();
                tracing::warn!(
                    "no replica answered ({} of {} configured, {} failed round(s) in a row)",
                    live.len(),
                    self.directory.addresses().len(),
                    self.failed_streak
                );
                self.state = LoopState::RoundStart;
                return RoundOutcome::Unavailable;
            }
        };
        self.failed_streak = 0;

        self.state = LoopState::Deciding;
        let highest = aggregate.highest;
        tracing::debug!(
            "round {}: highest is {} ({} replica(s) answered)",
            self.rounds,
            highest,
            aggregate.responses
        );

        match decide(&highest, &self.bidder_id) {
            Decision::Close(result) => {
                self.state = LoopState::Closed;
                tracing::info!(
                    "auction is over, winner is {} with {}",
                    result.bidder_id,
                    result.amount
                );
                self.final_result = Some(result.clone());
                RoundOutcome::Closed(result)
            }
            Decision::Hold => {
                self.state = LoopState::RoundStart;
                RoundOutcome::Held
            }
            Decision::Outbid(amount) => {
                self.state = LoopState::Writing;
                tracing::info!(
                    "outbidding {} ({}) with {}",
                    highest.bidder_id,
                    highest.amount,
                    amount
                );
                // Evictions during the read may have changed the live set.
                let live = self.directory.resolve().await;
                let report = broadcast_bid(
                    &*self.directory,
                    &live,
                    amount,
                    &self.bidder_id,
                    self.config.rpc_timeout,
                )
                .await;
                self.bids_placed += 1;
                auction_metrics::metrics().bids_placed.inc();
                tracing::debug!(
                    "bid {} accepted by {}/{} replica(s)",
                    amount,
                    report.accepted,
                    report.attempted()
                );
                self.state = LoopState::RoundStart;
                RoundOutcome::Bid { amount, report }
            }
        }
    }

    /// Backoff before retrying after `failed_streak` empty rounds.
    fn backoff(&self) -> Duration {
        if self.config.max_backoff.is_zero() || self.failed_streak == 0 {
            return self.config.round_interval;
        }
        let exp = self.failed_streak.saturating_sub(1).min(16);
        let step = INITIAL_BACKOFF.saturating_mul(1u32 << exp);
        step.max(self.config.round_interval)
            .min(self.config.max_backoff.max(self.config.round_interval))
    }

    /// Bid until some replica reports the auction over.
    pub async fn run(mut self) -> AuctionOutcome {
        tracing::info!(
            "bidder {} starting against {} replica(s)",
            self.bidder_id,
            self.directory.addresses().len()
        );
        loop {
            let pause = match self.run_round().await {
                RoundOutcome::Closed(result) => {
                    let won = result.is_led_by(&self.bidder_id);
                    if won {
                        tracing::info!("we won the auction with {}", result.amount);
                    }
                    return AuctionOutcome {
                        result,
                        won,
                        rounds: self.rounds,
                        bids_placed: self.bids_placed,
                    };
                }
                RoundOutcome::Unavailable => self.backoff(),
                RoundOutcome::Held | RoundOutcome::Bid { .. } => self.config.round_interval,
            };
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            } else {
                // Keep a tight loop from starving other tasks.
                tokio::task::yield_now().await;
            }
        }
    }
}
