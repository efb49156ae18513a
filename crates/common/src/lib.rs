//! auction-common: shared types for the replicated auction.
//!
//! Provides the `BidResult` value that replicas return for every RPC and
//! the `BidStatus` outcome enumeration both sides agree on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bid amounts travel as `int32` on the wire.
pub type Amount = i32;

/// Bidder identity recorded by a replica before anyone has bid.
pub const NO_BIDDER: &str = "no bidder yet";

// ---------------------------------------------------------------------------
// BidStatus
// ---------------------------------------------------------------------------

/// Outcome attached to every `BidResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidStatus {
    /// The auction is open. On a `MakeBid` reply it also means the bid was accepted.
    Ok,
    /// The bid was not strictly greater than the current highest bid.
    TooLow,
    /// The auction has closed; the result is final.
    AuctionOver,
}

impl BidStatus {
    pub fn is_over(self) -> bool {
        matches!(self, BidStatus::AuctionOver)
    }

    /// Short label used for logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            BidStatus::Ok => "ok",
            BidStatus::TooLow => "too_low",
            BidStatus::AuctionOver => "auction_over",
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BidResult
// ---------------------------------------------------------------------------

/// A replica's view of the auction: highest amount, who bid it, and status.
///
/// This is an owned value. Replicas hand out copies of their state, never
/// references into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidResult {
    pub amount: Amount,
    pub bidder_id: String,
    pub status: BidStatus,
}

impl BidResult {
    pub fn new(amount: Amount, bidder_id: impl Into<String>, status: BidStatus) -> Self {
        Self {
            amount,
            bidder_id: bidder_id.into(),
            status,
        }
    }

    /// The state of a freshly started replica: nothing bid, auction open.
    pub fn opening() -> Self {
        Self::new(0, NO_BIDDER, BidStatus::Ok)
    }

    /// A bare rejection carrying only a status, as replicas reply to a refused bid.
    pub fn rejected(status: BidStatus) -> Self {
        Self::new(0, String::new(), status)
    }

    pub fn is_over(&self) -> bool {
        self.status.is_over()
    }

    /// Whether `bidder_id` currently holds the highest bid.
    pub fn is_led_by(&self, bidder_id: &str) -> bool {
        self.bidder_id == bidder_id
    }
}

impl fmt::Display for BidResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} ({})", self.amount, self.bidder_id, self.status)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A wire value that does not map onto a known `BidStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown bid status {0}")]
pub struct UnknownStatus(pub i32);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
