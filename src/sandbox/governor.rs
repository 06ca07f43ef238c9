//! Cooperative wall-clock budget for one evaluation.
//!
//! The interpreter polls [`TimeoutGovernor::should_interrupt`] at points of its
//! own choosing. The governor never preempts anything: a blocking native call
//! (such as a host `fetch` callback) runs to completion before the next poll.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct TimeoutGovernor {
    timeout_ms: i64,
    epoch: Instant,
    /// Nanoseconds between `epoch` and the start of the current eval.
    started_at: AtomicU64,
    timed_out: AtomicBool,
}

impl TimeoutGovernor {
    /// `timeout_ms <= 0` disables the budget.
    pub fn new(timeout_ms: i64) -> Self {
        Self {
            timeout_ms,
            epoch: Instant::now(),
            started_at: AtomicU64::new(0),
            timed_out: AtomicBool::new(false),
        }
    }

    /// Start a fresh budget: records the start time and clears the latch.
    pub fn arm(&self) {
        let now = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.started_at.store(now, Ordering::SeqCst);
        self.timed_out.store(false, Ordering::SeqCst);
    }

    /// Interrupt predicate. Returns `true` to request an abort; once it has
    /// done so, every later poll in the same eval also returns `true`.
    pub fn should_interrupt(&self) -> bool {
        if self.timed_out.load(Ordering::SeqCst) {
            return true;
        }
        if !self.is_enabled() {
            return false;
        }

        if self.elapsed() > Duration::from_millis(self.timeout_ms.unsigned_abs()) {
            self.timed_out.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout_ms > 0
    }

    /// Time since the last [`arm`](Self::arm).
    pub fn elapsed(&self) -> Duration {
        let started = Duration::from_nanos(self.started_at.load(Ordering::SeqCst));
        self.epoch.elapsed().saturating_sub(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_within_budget_does_not_interrupt() {
        let governor = TimeoutGovernor::new(10_000);
        governor.arm();
        assert!(!governor.should_interrupt());
        assert!(!governor.timed_out());
    }

    #[test]
    fn test_expired_budget_latches() {
        let governor = TimeoutGovernor::new(5);
        governor.arm();
        sleep(Duration::from_millis(20));
        assert!(governor.should_interrupt());
        assert!(governor.timed_out());
        assert!(governor.should_interrupt());
    }

    #[test]
    fn test_arm_resets_latch() {
        let governor = TimeoutGovernor::new(200);
        governor.arm();
        sleep(Duration::from_millis(250));
        assert!(governor.should_interrupt());

        governor.arm();
        assert!(!governor.timed_out());
        assert!(!governor.should_interrupt());
    }

    #[test]
    fn test_non_positive_timeout_disables() {
        for timeout in [0, -1] {
            let governor = TimeoutGovernor::new(timeout);
            governor.arm();
            sleep(Duration::from_millis(5));
            assert!(!governor.should_interrupt());
            assert!(!governor.is_enabled());
        }
    }
}
