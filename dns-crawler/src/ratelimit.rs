//! Outbound query rate limiting. `resolver.py` leaves a comment noting this
//! concern ("Ratelimiter code should go in dt_resolver.py") without
//! implementing it; this module makes it real. A simple token bucket
//! refilled on a fixed interval, in the same spirit as the `governor` crate
//! used for DNS-adjacent rate limiting elsewhere in the example pack, but
//! hand-rolled here on top of `tokio::sync::Semaphore` + a refill task so no
//! extra dependency is needed for what is, in the end, one counter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Bounds outbound UDP query concurrency. `None` means unlimited, which is
/// the default unless `--rate-limit-per-second` is set.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Option<Arc<Semaphore>>,
}

impl RateLimiter {
    pub fn unlimited() -> Self {
        RateLimiter { inner: None }
    }

    /// Permits up to `per_second` queries to proceed per one-second window.
    /// Spawns a background task that tops the semaphore back up to
    /// `per_second` permits every second; the task runs for the lifetime of
    /// the process (there is no shutdown signal, matching this crawler's
    /// one-shot-process lifetime).
    pub fn limited(per_second: u32) -> Self {
        let semaphore = Arc::new(Semaphore::new(per_second as usize));
        let refill = semaphore.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                let available = refill.available_permits();
                if available < per_second as usize {
                    refill.add_permits(per_second as usize - available);
                }
            }
        });
        RateLimiter {
            inner: Some(semaphore),
        }
    }

    pub async fn acquire(&self) {
        if let Some(semaphore) = &self.inner {
            let permit = semaphore.clone().acquire_owned().await;
            // Permit is intentionally leaked rather than held: it represents
            // "one query issued this window", not "one query in flight".
            if let Ok(permit) = permit {
                permit.forget();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_never_blocks() {
        let limiter = RateLimiter::unlimited();
        for _ in 0..1000 {
            limiter.acquire().await;
        }
    }

    #[tokio::test]
    async fn limited_bounds_immediate_throughput() {
        let limiter = RateLimiter::limited(2);
        limiter.acquire().await;
        limiter.acquire().await;
        let third = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(third.is_err(), "third acquire should block until refill");
    }
}
