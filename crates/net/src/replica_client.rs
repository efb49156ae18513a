//! gRPC client implementing the bidder's `ReplicaConnector`.
//!
//! `GrpcConnector` opens one tonic channel per replica address; the
//! bidder's directory caches the resulting `GrpcReplicaHandle` and drops
//! it when an RPC fails.

use crate::convert;
use auction_bidder::{ReplicaConnector, ReplicaError, ReplicaHandle};
use auction_common::{Amount, BidResult};
use auction_proto::auction::auction_client::AuctionClient;
use tokio::time::Duration;
use tonic::transport::{Channel, Endpoint};

/// Opens insecure HTTP/2 channels to replicas.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait::async_trait]
impl ReplicaConnector for GrpcConnector {
    type Handle = GrpcReplicaHandle;

    async fn connect(&self, addr: &str) -> Result<GrpcReplicaHandle, ReplicaError> {
        let connect_failed = |reason: String| ReplicaError::ConnectFailed {
            addr: addr.to_string(),
            reason,
        };

        let endpoint = Endpoint::from_shared(format!("http://{}", addr))
            .map_err(|e| connect_failed(format!("invalid endpoint: {}", e)))?
            .connect_timeout(self.connect_timeout);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| connect_failed(e.to_string()))?;

        Ok(GrpcReplicaHandle {
            addr: addr.to_string(),
            client: AuctionClient::new(channel),
        })
    }
}

/// A connected replica. Clones share the underlying channel.
#[derive(Debug, Clone)]
pub struct GrpcReplicaHandle {
    addr: String,
    client: AuctionClient<Channel>,
}

impl GrpcReplicaHandle {
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

fn rpc_failed(rpc: &str, status: tonic::Status) -> ReplicaError {
    ReplicaError::RpcFailed(format!("{} RPC failed: {}", rpc, status))
}

#[async_trait::async_trait]
impl ReplicaHandle for GrpcReplicaHandle {
    async fn get_result(&self) -> Result<BidResult, ReplicaError> {
        let _timer = auction_metrics::start_rpc_timer("get_result", "outbound");

        let mut client = self.client.clone();
        let resp = client
            .get_result(auction_proto::auction::GetResultRequest {})
            .await
            .map_err(|e| rpc_failed("get_result", e))?;

        convert::result_from_proto(resp.into_inner())
            .map_err(|e| ReplicaError::RpcFailed(format!("bad reply from {}: {}", self.addr, e)))
    }

    async fn make_bid(&self, amount: Amount, bidder_id: &str) -> Result<BidResult, ReplicaError> {
        let _timer = auction_metrics::start_rpc_timer("make_bid", "outbound");

        let mut client = self.client.clone();
        let resp = client
            .make_bid(auction_proto::auction::Bid {
                amount,
                bidder_id: bidder_id.to_string(),
            })
            .await
            .map_err(|e| rpc_failed("make_bid", e))?;

        convert::result_from_proto(resp.into_inner())
            .map_err(|e| ReplicaError::RpcFailed(format!("bad reply from {}: {}", self.addr, e)))
    }
}
