//! gRPC networking layer for the auction.
//!
//! Provides:
//! - `GrpcConnector` / `GrpcReplicaHandle`: implement the bidder's
//!   `ReplicaConnector` / `ReplicaHandle` over tonic
//! - `AuctionService`: bridges the Auction proto to a replica's `Auction`
//! - `build_server`: assembles the service into a tonic `Router`

#![allow(clippy::result_large_err)]

pub mod convert;
pub mod replica_client;
pub mod server;

pub use replica_client::{GrpcConnector, GrpcReplicaHandle};
pub use server::AuctionService;

use auction_replica::Auction;

/// Build a tonic `Router` serving `auction`.
pub fn build_server(auction: Auction) -> tonic::transport::server::Router {
    let svc = AuctionService { auction };
    tonic::transport::Server::builder()
        .add_service(auction_proto::auction::auction_server::AuctionServer::new(svc))
}
