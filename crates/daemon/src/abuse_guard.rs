//! Per-address failure tracking with exponential lockout.
//!
//! Every privileged request is run through [`AbuseGuard::authenticate`]. An
//! address that fails more than [`FAILURE_THRESHOLD`] times is refused without
//! a credential check until its block window has passed. Each time a block
//! window is served the next one doubles. [`AbuseGuard::clear`] forgets every
//! address and is driven by [`spawn_reset`] on a long period so the table
//! cannot grow without bound.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Failures tolerated before an address is blocked.
pub const FAILURE_THRESHOLD: u32 = 3;
/// Length of the first block window.
pub const INITIAL_BLOCK: Duration = Duration::from_secs(10);
/// How often every entry is forgotten.
pub const RESET_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockEntry {
    fail_count: u32,
    last_failure_at: Instant,
    block_duration: Duration,
}

/// Why a privileged request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing basic auth credentials")]
    MissingCredentials,

    #[error("username or password is invalid")]
    InvalidCredentials,

    #[error("too many failed attempts, retry in {}s", .retry_after.as_secs().max(1))]
    Blocked { retry_after: Duration },
}

#[derive(Debug)]
pub struct AbuseGuard {
    entries: Mutex<HashMap<String, BlockEntry>>,
    threshold: u32,
    initial_block: Duration,
}

impl Default for AbuseGuard {
    fn default() -> Self {
        Self::new(FAILURE_THRESHOLD, INITIAL_BLOCK)
    }
}

impl AbuseGuard {
    pub fn new(threshold: u32, initial_block: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            threshold,
            initial_block,
        }
    }

    /// Gate `check` behind the lockout state of `addr`.
    ///
    /// The whole read, maybe-reset, check and record sequence runs under one
    /// lock, so concurrent attempts from the same address are counted
    /// exactly. A blocked attempt never calls `check` and leaves the entry as
    /// it was. A successful check leaves the entry as it was too.
    pub fn authenticate<F>(&self, addr: &str, now: Instant, check: F) -> Result<(), AuthError>
    where
        F: FnOnce() -> Result<(), AuthError>,
    {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(addr) {
            if entry.fail_count > self.threshold {
                let release_at = entry.last_failure_at + entry.block_duration;
                if now < release_at {
                    tracing::warn!(
                        ip = %addr,
                        block_secs = entry.block_duration.as_secs(),
                        "blocked ip, too many failed attempts"
                    );
                    return Err(AuthError::Blocked {
                        retry_after: release_at - now,
                    });
                }

                entry.fail_count = 0;
                entry.block_duration *= 2;
            }
        }

        let result = check();

        if result.is_err() {
            match entries.get_mut(addr) {
                Some(entry) => {
                    entry.fail_count += 1;
                    entry.last_failure_at = now;
                }
                None => {
                    entries.insert(
                        addr.to_string(),
                        BlockEntry {
                            fail_count: 1,
                            last_failure_at: now,
                            block_duration: self.initial_block,
                        },
                    );
                }
            }
        }

        result
    }

    /// Forget every address.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let n = entries.len();
        entries.clear();
        tracing::info!(cleared = n, "abuse guard reset");
    }

    /// Number of addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries.lock().len()
    }

    #[cfg(test)]
    fn block_duration(&self, addr: &str) -> Option<Duration> {
        self.entries.lock().get(addr).map(|e| e.block_duration)
    }
}

/// Clear `guard` every `period` until shutdown is signalled.
pub fn spawn_reset(
    guard: std::sync::Arc<AbuseGuard>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => guard.clear(),
                _ = shutdown_rx.changed() => {
                    tracing::debug!("abuse guard reset task stopping");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const ADDR: &str = "203.0.113.7";

    fn fail() -> Result<(), AuthError> {
        Err(AuthError::InvalidCredentials)
    }

    fn pass() -> Result<(), AuthError> {
        Ok(())
    }

    #[test]
    fn test_success_creates_no_entry() {
        let guard = AbuseGuard::default();
        guard.authenticate(ADDR, Instant::now(), pass).unwrap();
        assert_eq!(guard.tracked(), 0);
    }

    #[test]
    fn test_threshold_failures_are_all_checked() {
        let guard = AbuseGuard::default();
        let now = Instant::now();

        for _ in 0..=FAILURE_THRESHOLD {
            assert_eq!(
                guard.authenticate(ADDR, now, fail),
                Err(AuthError::InvalidCredentials)
            );
        }

        let mut called = false;
        let result = guard.authenticate(ADDR, now, || {
            called = true;
            Ok(())
        });
        assert!(matches!(result, Err(AuthError::Blocked { .. })));
        assert!(!called);
    }

    #[test]
    fn test_blocked_even_with_valid_credentials() {
        let guard = AbuseGuard::default();
        let now = Instant::now();
        for _ in 0..4 {
            let _ = guard.authenticate(ADDR, now, fail);
        }

        assert!(matches!(
            guard.authenticate(ADDR, now + Duration::from_secs(9), pass),
            Err(AuthError::Blocked { retry_after }) if retry_after == Duration::from_secs(1)
        ));
    }

    #[test]
    fn test_block_doubles_after_release() {
        let guard = AbuseGuard::default();
        let mut now = Instant::now();
        for _ in 0..4 {
            let _ = guard.authenticate(ADDR, now, fail);
        }
        assert_eq!(guard.block_duration(ADDR), Some(INITIAL_BLOCK));

        // one attempt is let through once the window has passed
        now += INITIAL_BLOCK;
        assert_eq!(
            guard.authenticate(ADDR, now, fail),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(guard.block_duration(ADDR), Some(INITIAL_BLOCK * 2));

        // three more failures push it back over the threshold
        for _ in 0..3 {
            let _ = guard.authenticate(ADDR, now, fail);
        }
        assert!(matches!(
            guard.authenticate(ADDR, now + INITIAL_BLOCK, pass),
            Err(AuthError::Blocked { .. })
        ));
        assert!(guard
            .authenticate(ADDR, now + INITIAL_BLOCK * 2, pass)
            .is_ok());
        assert_eq!(guard.block_duration(ADDR), Some(INITIAL_BLOCK * 4));
    }

    #[test]
    fn test_blocked_attempt_changes_nothing() {
        let guard = AbuseGuard::default();
        let start = Instant::now();
        for _ in 0..4 {
            let _ = guard.authenticate(ADDR, start, fail);
        }

        // hammering while blocked must not extend the window
        for s in 1..10 {
            let _ = guard.authenticate(ADDR, start + Duration::from_secs(s), fail);
        }
        assert!(guard
            .authenticate(ADDR, start + INITIAL_BLOCK, pass)
            .is_ok());
    }

    #[test]
    fn test_success_keeps_history() {
        let guard = AbuseGuard::default();
        let now = Instant::now();
        for _ in 0..3 {
            let _ = guard.authenticate(ADDR, now, fail);
        }
        guard.authenticate(ADDR, now, pass).unwrap();

        // the fourth failure still counts toward the block
        let _ = guard.authenticate(ADDR, now, fail);
        assert!(matches!(
            guard.authenticate(ADDR, now, pass),
            Err(AuthError::Blocked { .. })
        ));
    }

    #[test]
    fn test_addresses_are_independent() {
        let guard = AbuseGuard::default();
        let now = Instant::now();
        for _ in 0..4 {
            let _ = guard.authenticate(ADDR, now, fail);
        }
        assert!(guard.authenticate("198.51.100.1", now, pass).is_ok());
    }

    #[test]
    fn test_clear_returns_to_clean() {
        let guard = AbuseGuard::default();
        let now = Instant::now();
        for _ in 0..4 {
            let _ = guard.authenticate(ADDR, now, fail);
        }

        guard.clear();
        assert_eq!(guard.tracked(), 0);

        let mut called = false;
        guard
            .authenticate(ADDR, now, || {
                called = true;
                Ok(())
            })
            .unwrap();
        assert!(called);
    }

    #[test]
    fn test_concurrent_failures_are_counted_exactly() {
        let guard = Arc::new(AbuseGuard::new(u32::MAX, INITIAL_BLOCK));
        let now = Instant::now();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = guard.authenticate(ADDR, now, fail);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(guard.tracked(), 1);
        assert_eq!(guard.entries.lock()[ADDR].fail_count, 800);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_task_clears_on_period() {
        let guard = Arc::new(AbuseGuard::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let handle = spawn_reset(guard.clone(), RESET_PERIOD, shutdown_rx);

        for _ in 0..4 {
            let _ = guard.authenticate(ADDR, Instant::now(), fail);
        }
        assert_eq!(guard.tracked(), 1);

        tokio::time::sleep(RESET_PERIOD - Duration::from_secs(1)).await;
        assert_eq!(guard.tracked(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(guard.tracked(), 0);
        assert!(guard.authenticate(ADDR, Instant::now(), pass).is_ok());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
