//! Per-phase task group shared by the reader and the writer.

use crate::directory::{LiveReplica, ReplicaDirectory};
use crate::replica_client::{with_timeout, ReplicaConnector, ReplicaError};
use futures::future::join_all;
use std::future::Future;
use tokio::time::Duration;

/// Run `call` against every live replica concurrently, one task each, each
/// under its own `rpc_timeout`, and wait for all of them.
///
/// Failed or timed-out replicas are evicted from `directory` and left out.
/// Successes come back in the order of `live`. No task outlives this call.
pub(crate) async fn fan_out<C, F, Fut, T>(
    directory: &ReplicaDirectory<C>,
    live: &[LiveReplica<C::Handle>],
    rpc_type: &'static str,
    rpc_timeout: Duration,
    call: F,
) -> Vec<(String, T)>
where
    C: ReplicaConnector,
    F: Fn(C::Handle) -> Fut,
    Fut: Future<Output = Result<T, ReplicaError>> + Send + 'static,
    T: Send + 'static,
{
    let tasks: Vec<_> = live
        .iter()
        .map(|replica| tokio::spawn(with_timeout(rpc_timeout, call(replica.handle.clone()))))
        .collect();

    let mut successes = Vec::with_capacity(live.len());
    for (replica, joined) in live.iter().zip(join_all(tasks).await) {
        let result = joined.unwrap_or_else(|e| Err(ReplicaError::RpcFailed(e.to_string())));
        match result {
            Ok(value) => successes.push((replica.addr.clone(), value)),
            Err(e) => {
                tracing::warn!("{} on {} failed: {}", rpc_type, replica.addr, e);
                auction_metrics::metrics()
                    .rpc_failures_by_type
                    .with_label_values(&[rpc_type])
                    .inc();
                directory.evict(&replica.addr).await;
            }
        }
    }
    successes
}
