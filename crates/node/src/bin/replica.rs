//! auction-replica: one independent auction server.
//!
//! Loads config (optional YAML path as the first argument, then `PORT` and
//! `AUCTION_DURATION_SECS` from the environment), starts the close timer and
//! serves the auction gRPC service until Ctrl+C.

use auction_replica::Auction;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    auction_metrics::init_tracing();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = auction_config::replica_from_env(config_path.as_deref())?;

    let auction = Auction::new();
    tracing::info!(
        "auction open on {} for {}s",
        config.listen,
        config.auction_duration_secs
    );
    auction.spawn_close_timer(config.auction_duration());

    auction_metrics::spawn_metrics_server(config.metrics_port);

    let router = auction_net::build_server(auction.clone());

    // Serve with graceful shutdown on Ctrl+C
    tokio::select! {
        result = router.serve(config.listen) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
        }
    }

    tracing::info!("final state: {}", auction.result().await);
    Ok(())
}
