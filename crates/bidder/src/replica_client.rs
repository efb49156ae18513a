//! Abstraction over bidder-to-replica RPCs.
//!
//! Concrete implementation lives in `auction-net::replica_client`. Tests use
//! in-memory connectors.

use auction_common::{Amount, BidResult};
use std::future::Future;
use tokio::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplicaError {
    #[error("connect to {addr} failed: {reason}")]
    ConnectFailed { addr: String, reason: String },
    #[error("RPC failed: {0}")]
    RpcFailed(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

/// An established connection to one replica.
///
/// Handles are cheap to clone; clones share the underlying connection.
#[async_trait::async_trait]
pub trait ReplicaHandle: Clone + Send + Sync + 'static {
    /// Fetch the replica's current highest bid.
    async fn get_result(&self) -> Result<BidResult, ReplicaError>;

    /// Submit a bid. Rejections come back as `Ok` with a non-`Ok` status.
    async fn make_bid(&self, amount: Amount, bidder_id: &str) -> Result<BidResult, ReplicaError>;
}

/// Establishes connections to replicas by address.
///
/// Same split as the replica handle: a trait here, a gRPC implementation
/// in the `net` crate.
#[async_trait::async_trait]
pub trait ReplicaConnector: Send + Sync + 'static {
    type Handle: ReplicaHandle;

    async fn connect(&self, addr: &str) -> Result<Self::Handle, ReplicaError>;
}

/// Run `fut` under `deadline`, mapping expiry to [`ReplicaError::Timeout`].
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> Result<T, ReplicaError>
where
    F: Future<Output = Result<T, ReplicaError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ReplicaError::Timeout(deadline)),
    }
}
