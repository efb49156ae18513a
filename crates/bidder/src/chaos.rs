//! Chaos injection wrapper for [`ReplicaConnector`].
//!
//! [`ChaosConnector`] wraps any `C: ReplicaConnector` and injects
//! configurable failures: random errors, per-address crashes, and latency.
//! Handles it hands out consult the same shared state on every call, so a
//! replica marked as crashed also fails RPCs on connections made earlier.

use crate::replica_client::{ReplicaConnector, ReplicaError, ReplicaHandle};
use auction_common::{Amount, BidResult};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Configuration for chaos injection.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Probability of failing an RPC \[0.0, 1.0\].
    pub failure_rate: f64,
    /// Fixed latency injected before forwarding.
    pub latency: Duration,
    /// Random additional latency in \[0, jitter\].
    pub jitter: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

/// Upper bound of the random jitter in whole milliseconds, saturating.
fn max_jitter_ms(jitter: Duration) -> u64 {
    u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default)]
struct ChaosState {
    crashed: HashSet<String>,
    slow: HashMap<String, Duration>,
}

#[derive(Debug)]
struct Shared {
    config: RwLock<ChaosConfig>,
    state: RwLock<ChaosState>,
}

impl Shared {
    /// Apply chaos checks for `addr`: returns Err if the request should fail.
    async fn maybe_fail(&self, addr: &str) -> Result<(), ReplicaError> {
        let extra = {
            let state = self.state.read().await;
            if state.crashed.contains(addr) {
                return Err(ReplicaError::RpcFailed(format!(
                    "chaos: {} marked as crashed",
                    addr
                )));
            }
            state.slow.get(addr).copied().unwrap_or(Duration::ZERO)
        };

        let (delay, failure_rate) = {
            let config = self.config.read().await;
            let jitter_ms = if config.jitter.is_zero() {
                0
            } else {
                rand::thread_rng().gen_range(0..=max_jitter_ms(config.jitter))
            };
            let delay = config
                .latency
                .saturating_add(extra)
                .saturating_add(Duration::from_millis(jitter_ms));
            (delay, config.failure_rate)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if failure_rate > 0.0 && rand::thread_rng().gen_bool(failure_rate.min(1.0)) {
            return Err(ReplicaError::RpcFailed("chaos: random failure".into()));
        }

        Ok(())
    }
}

/// A [`ReplicaConnector`] wrapper that injects chaos.
pub struct ChaosConnector<C: ReplicaConnector> {
    inner: Arc<C>,
    shared: Arc<Shared>,
}

impl<C: ReplicaConnector> std::fmt::Debug for ChaosConnector<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosConnector").finish_non_exhaustive()
    }
}

impl<C: ReplicaConnector> Clone for ChaosConnector<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<C: ReplicaConnector> ChaosConnector<C> {
    pub fn new(inner: C, config: ChaosConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                state: RwLock::new(ChaosState::default()),
            }),
        }
    }

    /// Make `addr` refuse connections and fail every RPC until recovered.
    pub async fn crash(&self, addr: &str) {
        self.shared.state.write().await.crashed.insert(addr.to_string());
    }

    /// Undo [`ChaosConnector::crash`].
    pub async fn recover(&self, addr: &str) {
        self.shared.state.write().await.crashed.remove(addr);
    }

    /// Add `delay` to every RPC on `addr`.
    pub async fn slow_down(&self, addr: &str, delay: Duration) {
        self.shared
            .state
            .write()
            .await
            .slow
            .insert(addr.to_string(), delay);
    }

    /// Dynamically update the random failure rate.
    pub async fn set_failure_rate(&self, rate: f64) {
        self.shared.config.write().await.failure_rate = rate;
    }
}

#[async_trait::async_trait]
impl<C: ReplicaConnector> ReplicaConnector for ChaosConnector<C> {
    type Handle = ChaosHandle<C::Handle>;

    async fn connect(&self, addr: &str) -> Result<Self::Handle, ReplicaError> {
        if self.shared.state.read().await.crashed.contains(addr) {
            return Err(ReplicaError::ConnectFailed {
                addr: addr.to_string(),
                reason: "chaos: replica crashed".into(),
            });
        }
        let inner = self.inner.connect(addr).await?;
        Ok(ChaosHandle {
            addr: addr.to_string(),
            inner,
            shared: self.shared.clone(),
        })
    }
}

/// Handle produced by [`ChaosConnector`].
#[derive(Debug)]
pub struct ChaosHandle<H> {
    addr: String,
    inner: H,
    shared: Arc<Shared>,
}

impl<H: Clone> Clone for ChaosHandle<H> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr.clone(),
            inner: self.inner.clone(),
            shared: self.shared.clone(),
        }
    }
}

#[async_trait::async_trait]
impl<H: ReplicaHandle> ReplicaHandle for ChaosHandle<H> {
    async fn get_result(&self) -> Result<BidResult, ReplicaError> {
        self.shared.maybe_fail(&self.addr).await?;
        self.inner.get_result().await
    }

    async fn make_bid(&self, amount: Amount, bidder_id: &str) -> Result<BidResult, ReplicaError> {
        self.shared.maybe_fail(&self.addr).await?;
        self.inner.make_bid(amount, bidder_id).await
    }
}

// ────────────────────────── Tests ──────────────────────────
