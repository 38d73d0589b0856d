//! Shared RPC gate.
//!
//! Every remote call in the system goes through one injected gate rather
//! than ambient global throttling state. The gate enforces two things:
//! a minimum interval between calls, and at most one call in flight.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::{Mutex, MutexGuard};

/// Serializes and paces all outbound RPC calls.
pub struct RpcGate {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    in_flight: Mutex<()>,
}

impl RpcGate {
    /// Creates a gate with the given minimum interval between calls.
    /// A zero interval disables pacing; calls are still serialized.
    pub fn new(min_interval: Duration) -> Self {
        let quota =
            Quota::with_period(min_interval).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            limiter: RateLimiter::direct(quota),
            in_flight: Mutex::new(()),
        }
    }

    /// Waits for the pacing quota and the in-flight slot, then returns a
    /// permit. The permit must be held for the duration of the RPC call.
    pub async fn acquire(&self) -> RpcPermit<'_> {
        let guard = self.in_flight.lock().await;
        self.limiter.until_ready().await;
        RpcPermit { _guard: guard }
    }
}

impl std::fmt::Debug for RpcGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcGate").finish_non_exhaustive()
    }
}

/// Proof that the caller holds the single in-flight RPC slot.
pub struct RpcPermit<'a> {
    _guard: MutexGuard<'a, ()>,
}
