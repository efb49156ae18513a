//! Per-replica auction state machine.
//!
//! Each replica owns one [`Auction`]: a single highest-bid record behind a
//! replica-wide lock. Bids must strictly increase the amount, and a one-shot
//! close timer moves the auction from open to closed after a fixed duration.
//! Replicas never talk to each other.

use auction_common::{Amount, BidResult, BidStatus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Outcome of [`Auction::make_bid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidOutcome {
    /// The bid became the new highest bid. Carries the new state.
    Accepted(BidResult),
    /// The bid did not beat `current`.
    TooLow { current: BidResult },
    /// The auction is closed. Carries the frozen final state.
    Closed { result: BidResult },
}

impl BidOutcome {
    pub fn status(&self) -> BidStatus {
        match self {
            BidOutcome::Accepted(_) => BidStatus::Ok,
            BidOutcome::TooLow { .. } => BidStatus::TooLow,
            BidOutcome::Closed { .. } => BidStatus::AuctionOver,
        }
    }

    /// The reply sent over the wire: the new state on success, a bare
    /// status on rejection.
    pub fn into_reply(self) -> BidResult {
        match self {
            BidOutcome::Accepted(result) => result,
            other => BidResult::rejected(other.status()),
        }
    }
}

/// The authoritative highest-bid state of one replica.
#[derive(Debug, Clone)]
pub struct Auction {
    state: Arc<Mutex<BidResult>>,
}

impl Default for Auction {
    fn default() -> Self {
        Self::new()
    }
}

impl Auction {
    /// A new open auction with no bids.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BidResult::opening())),
        }
    }

    /// Try to raise the highest bid to `amount` on behalf of `bidder_id`.
    ///
    /// Ties are rejected: only a strictly greater amount is accepted.
    pub async fn make_bid(&self, amount: Amount, bidder_id: &str) -> BidOutcome {
        let m = auction_metrics::metrics();
        let mut state = self.state.lock().await;

        if state.is_over() {
            tracing::info!(
                "bid of {} by {} refused, auction is closed",
                amount,
                bidder_id
            );
            m.bids_rejected.with_label_values(&["auction_over"]).inc();
            return BidOutcome::Closed {
                result: state.clone(),
            };
        }

        if amount <= state.amount {
            tracing::info!(
                "bid of {} by {} too low, beaten by {} from {}",
                amount,
                bidder_id,
                state.amount,
                state.bidder_id
            );
            m.bids_rejected.with_label_values(&["too_low"]).inc();
            return BidOutcome::TooLow {
                current: state.clone(),
            };
        }

        tracing::info!(
            "new highest bid {} from {} beats {} from {}",
            amount,
            bidder_id,
            state.amount,
            state.bidder_id
        );
        *state = BidResult::new(amount, bidder_id, BidStatus::Ok);
        m.bids_accepted.inc();
        BidOutcome::Accepted(state.clone())
    }

    /// Snapshot of the current state.
    pub async fn result(&self) -> BidResult {
        self.state.lock().await.clone()
    }

    /// Close the auction, freezing amount and bidder.
    ///
    /// Returns `false` if it was already closed.
    pub async fn close(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.is_over() {
            return false;
        }
        state.status = BidStatus::AuctionOver;
        tracing::info!(
            "auction ended, winning bid was {} by {}",
            state.amount,
            state.bidder_id
        );
        true
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.is_over()
    }

    /// Spawn the one-shot timer that closes the auction after `duration`.
    pub fn spawn_close_timer(&self, duration: Duration) -> tokio::task::JoinHandle<()> {
        let auction = self.clone();
        tracing::info!("auction open for {:?}", duration);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            auction.close().await;
        })
    }
}
