//! auction-bidder: races the other bidders across every replica.
//!
//! Loads config (optional YAML path as the first argument, then
//! `BIDDER_NAME` and `SERVERS` from the environment), connects to the
//! replica set lazily and bids until some replica reports the auction over.

use auction_bidder::{BiddingLoop, LoopConfig, ReplicaDirectory};
use auction_net::GrpcConnector;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    auction_metrics::init_tracing();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = auction_config::bidder_from_env(config_path.as_deref())?;

    let addresses = config.replicas.resolve_addresses();
    tracing::info!(
        "bidder {} using replicas {:?}",
        config.bidder_id,
        addresses
    );

    auction_metrics::spawn_metrics_server(config.metrics_port);

    let connector = Arc::new(GrpcConnector::new(config.connect_timeout()));
    let directory = Arc::new(ReplicaDirectory::new(
        addresses,
        connector,
        config.connect_timeout(),
    ));
    let loop_config = LoopConfig {
        rpc_timeout: config.rpc_timeout(),
        round_interval: config.round_interval(),
        max_backoff: config.max_backoff(),
    };
    let bidding = BiddingLoop::new(directory, config.bidder_id.clone(), loop_config);
    let me = bidding.bidder_id().to_string();

    tokio::select! {
        outcome = bidding.run() => {
            tracing::info!(
                "{}: auction over, winner {} with {} after {} round(s), {} bid(s) placed{}",
                me,
                outcome.result.bidder_id,
                outcome.result.amount,
                outcome.rounds,
                outcome.bids_placed,
                if outcome.won { " (we won)" } else { "" }
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("{}: received Ctrl+C, shutting down", me);
        }
    }

    Ok(())
}
