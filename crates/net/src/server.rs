//! gRPC service implementation.
//!
//! Bridges the tonic-generated `Auction` service trait to a replica's
//! `Auction` state machine.

use crate::convert;
use auction_replica::Auction;

pub struct AuctionService {
    pub auction: Auction,
}

impl std::fmt::Debug for AuctionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionService").finish_non_exhaustive()
    }
}

#[tonic::async_trait]
impl auction_proto::auction::auction_server::Auction for AuctionService {
    async fn make_bid(
        &self,
        request: tonic::Request<auction_proto::auction::Bid>,
    ) -> Result<tonic::Response<auction_proto::auction::BidResult>, tonic::Status> {
        let _timer = auction_metrics::start_rpc_timer("make_bid", "inbound");
        let bid = request.into_inner();
        if bid.amount < 0 {
            return Err(tonic::Status::invalid_argument("amount must be >= 0"));
        }
        if bid.bidder_id.is_empty() {
            return Err(tonic::Status::invalid_argument("missing bidder_id"));
        }

        let outcome = self.auction.make_bid(bid.amount, &bid.bidder_id).await;
        Ok(tonic::Response::new(convert::result_to_proto(
            &outcome.into_reply(),
        )))
    }

    async fn get_result(
        &self,
        _request: tonic::Request<auction_proto::auction::GetResultRequest>,
    ) -> Result<tonic::Response<auction_proto::auction::BidResult>, tonic::Status> {
        let _timer = auction_metrics::start_rpc_timer("get_result", "inbound");
        let result = self.auction.result().await;
        tracing::debug!("get_result: highest bid is {}", result);
        Ok(tonic::Response::new(convert::result_to_proto(&result)))
    }
}
