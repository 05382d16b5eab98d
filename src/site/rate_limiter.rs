//! Global Rate Limiter + Ban Barrier (§4.C).
//!
//! One limiter instance gates every main-site request; a second, separate
//! instance gates thumbnail CDN requests. Both enforce a minimum
//! inter-request interval by serializing `acquire()` through a lock that
//! remembers the last permit's wall time. The ban barrier is a shared
//! deadline all callers await before every acquire; it's lifted by the
//! passage of time, not by an explicit unlock.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Serializes callers to a minimum interval and blocks them behind a shared
/// ban deadline. Cloning is cheap (`Arc`-free here since the struct itself
/// is small and shared via `Arc<RateLimiter>` by its owner — see
/// `state.rs`).
pub struct RateLimiter {
    interval: Duration,
    last_permit: Mutex<Option<Instant>>,
    ban_until: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_permit: Mutex::new(None),
            ban_until: Mutex::new(None),
        }
    }

    /// Raise the ban barrier to `now + duration`. Last-writer-wins: a racing
    /// write from a concurrent `Banned` detection may clobber this one, but
    /// since all writers only ever push the deadline forward from "now" at
    /// roughly the same time, the effective barrier is `max(existing, new)`
    /// within the brief overlap window (§5, §9).
    pub fn raise_ban(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut guard = self.ban_until.lock();
        if guard.map(|d| deadline > d).unwrap_or(true) {
            *guard = Some(deadline);
        }
    }

    /// Block until the ban barrier (if any) has elapsed, then block until
    /// the minimum inter-request interval has elapsed since the last
    /// permit, and record this call's wall time as the new last permit.
    pub async fn acquire(&self) {
        loop {
            let ban_wait = {
                let guard = self.ban_until.lock();
                guard.and_then(|deadline| deadline.checked_duration_since(Instant::now()))
            };
            match ban_wait {
                Some(d) if !d.is_zero() => sleep(d).await,
                _ => break,
            }
        }

        let wait = {
            let mut guard = self.last_permit.lock();
            let now = Instant::now();
            let wait = match *guard {
                Some(last) => self.interval.saturating_sub(now.duration_since(last)),
                None => Duration::ZERO,
            };
            *guard = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn consecutive_acquires_are_spaced_by_the_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(100));

        let t0 = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = t0.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn ban_barrier_delays_the_next_acquire_by_at_least_the_ban_duration() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(1)));
        limiter.acquire().await;

        let t_ban = Instant::now();
        limiter.raise_ban(Duration::from_secs(5));

        limiter.acquire().await;
        assert!(t_ban.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_bans_leave_the_barrier_at_the_max_deadline() {
        let limiter = RateLimiter::new(Duration::from_millis(1));
        limiter.raise_ban(Duration::from_secs(2));
        limiter.raise_ban(Duration::from_secs(10));
        // A shorter, later-arriving ban must not shrink the barrier.
        limiter.raise_ban(Duration::from_secs(1));

        let t0 = Instant::now();
        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(10));
    }
}
