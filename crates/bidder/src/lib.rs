//! Bidder-side coordination over a set of independent auction replicas.
//!
//! Provides: a replica directory with lazy (re)connection and eviction,
//! concurrent fan-out reads reduced to a single best-known bid, a
//! best-effort fan-out bid broadcast, and the bidding loop that drives
//! them until some replica reports the auction closed.

pub mod bidding_loop;
pub mod chaos;
pub mod directory;
mod fanout;
pub mod reader;
pub mod replica_client;
pub mod writer;

#[cfg(test)]
mod testing;

pub use bidding_loop::{AuctionOutcome, BiddingLoop, Decision, LoopConfig, LoopState};
pub use directory::{LiveReplica, ReplicaDirectory};
pub use reader::{get_highest, reduce_highest, AggregatedResult, FanOutError};
pub use replica_client::{ReplicaConnector, ReplicaError, ReplicaHandle};
pub use writer::{broadcast_bid, BroadcastReport};
