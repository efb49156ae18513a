//! Generated gRPC code for the auction protobuf definitions.

/// Auction replica service (MakeBid, GetResult) and its messages.
pub mod auction {
    tonic::include_proto!("auction.v1");
}
