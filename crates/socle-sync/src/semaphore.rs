//! Counting semaphores whose counter sign encodes parked waiters.
//!
//! The token counter goes negative when threads block: `-n` means `n`
//! waiters are registered. Releases that observe a negative previous value
//! transfer wakeups through a separate futex word, so the fast path (tokens
//! available, nobody parked) is a single atomic RMW in userspace.

use std::hint;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use crate::deadline::Deadline;
use crate::park::{self, WaitOutcome};

/// Counter plus wakeup transfer word, shared by both semaphore flavors.
struct Core {
    /// Tokens when positive, `-waiters` when negative.
    counter: AtomicI64,
    /// Issued-but-unconsumed wakeups; also the futex cell waiters park on.
    wakeups: AtomicU32,
}

impl Core {
    const fn new(tokens: i64) -> Self {
        Self {
            counter: AtomicI64::new(tokens),
            wakeups: AtomicU32::new(0),
        }
    }

    /// Unconditionally takes a token slot. Returns `true` if a token was
    /// available; `false` means the caller is now a registered waiter.
    fn take_slot(&self) -> bool {
        self.counter.fetch_sub(1, Ordering::Acquire) > 0
    }

    /// Takes a token only if one is available, without ever registering.
    fn try_take(&self) -> bool {
        let mut current = self.counter.load(Ordering::Relaxed);
        while current > 0 {
            match self.counter.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    fn consume_wakeup(&self) -> bool {
        let mut current = self.wakeups.load(Ordering::Acquire);
        while current > 0 {
            match self.wakeups.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Parks until a wakeup is consumed. Entered only after [`take_slot`]
    /// returned `false`.
    ///
    /// [`take_slot`]: Core::take_slot
    fn wait(&self) {
        loop {
            if self.consume_wakeup() {
                return;
            }
            park::wait(&self.wakeups, 0);
        }
    }

    /// Timed variant of [`wait`](Core::wait). On expiry the waiter either
    /// deregisters (counter still negative: hand the slot back) or detects
    /// that a release already covered it and consumes that wakeup instead
    /// of failing.
    fn timed_wait(&self, timeout: Duration) -> bool {
        let deadline = Deadline::after(timeout);
        loop {
            if self.consume_wakeup() {
                return true;
            }
            if let WaitOutcome::TimedOut = park::wait_until(&self.wakeups, 0, &deadline) {
                return self.abandon_slot();
            }
        }
    }

    fn abandon_slot(&self) -> bool {
        loop {
            let count = self.counter.load(Ordering::Acquire);
            if count < 0 {
                if self
                    .counter
                    .compare_exchange_weak(count, count + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return false;
                }
            } else if self.consume_wakeup() {
                // A release raced the expiry and already counted us; its
                // wakeup is ours and the acquire succeeds after all.
                return true;
            } else {
                // Counter says we are covered but the releasing thread has
                // not published the wakeup yet. It lands in a few
                // instructions; spin for it.
                hint::spin_loop();
            }
        }
    }

    /// Publishes `granted` new tokens that `release` already added to the
    /// counter, waking waiters covered by them.
    fn publish_wakeups(&self, prev: i64, granted: i64) {
        if prev < 0 && granted > 0 {
            let covered = granted.min(-prev).min(u32::MAX as i64) as u32;
            self.wakeups.fetch_add(covered, Ordering::Release);
            park::wake_n(&self.wakeups, covered);
        }
    }

    fn reset_and_release_waiters(&self) {
        let prev = self.counter.swap(0, Ordering::AcqRel);
        if prev < 0 {
            let parked = (-prev).min(u32::MAX as i64) as u32;
            self.wakeups.fetch_add(parked, Ordering::Release);
            park::wake_all(&self.wakeups);
        }
    }

    /// Destruction with registered waiters is a protocol violation.
    fn assert_no_waiters(&mut self) {
        let count = *self.counter.get_mut();
        assert!(count >= 0, "semaphore destroyed with waiters present");
    }
}

/// Counting semaphore whose token count never exceeds a construction-time
/// cap.
///
/// [`release`](CappedSemaphore::release) clamps: tokens past the cap are
/// dropped rather than stored, so a producer that over-releases cannot
/// build up an unbounded backlog of permits.
pub struct CappedSemaphore {
    core: Core,
    cap: u32,
}

impl CappedSemaphore {
    /// Creates a semaphore holding zero tokens with capacity `cap`.
    pub const fn new(cap: u32) -> Self {
        Self {
            core: Core::new(0),
            cap,
        }
    }

    /// Takes one token, parking until a release provides it.
    pub fn acquire(&self) {
        if !self.core.take_slot() {
            self.core.wait();
        }
    }

    /// Takes one token if immediately available.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.core.try_take()
    }

    /// Takes one token, giving up after `timeout`. Returns `true` if a
    /// token was acquired.
    pub fn try_timed_acquire(&self, timeout: Duration) -> bool {
        if self.core.take_slot() {
            return true;
        }
        self.core.timed_wait(timeout)
    }

    /// Adds up to `count` tokens, waking covered waiters. Tokens beyond
    /// the cap are discarded.
    pub fn release(&self, count: u32) {
        if count == 0 {
            return;
        }
        let mut current = self.core.counter.load(Ordering::Relaxed);
        loop {
            let next = (current + count as i64).min(self.cap as i64);
            if next == current {
                return;
            }
            match self.core.counter.compare_exchange_weak(
                current,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.core.publish_wakeups(current, next - current);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Drops all stored tokens and releases every parked waiter.
    pub fn reset_and_release_waiters(&self) {
        self.core.reset_and_release_waiters();
    }

    /// The construction-time token cap.
    #[inline]
    pub fn cap(&self) -> u32 {
        self.cap
    }
}

impl Drop for CappedSemaphore {
    fn drop(&mut self) {
        self.core.assert_no_waiters();
    }
}

impl std::fmt::Debug for CappedSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CappedSemaphore")
            .field("counter", &self.core.counter.load(Ordering::Relaxed))
            .field("cap", &self.cap)
            .finish()
    }
}

/// Counting semaphore for token counts far beyond any realistic waiter
/// population.
///
/// Up to [`MAX_GUARANTEED_COUNT`](Self::MAX_GUARANTEED_COUNT) tokens are
/// stored exactly. Past that the counter is periodically clamped back down,
/// so a pathological release storm can never wrap the counter into the
/// waiter-encoding negative range.
pub struct HighCapacitySemaphore {
    core: Core,
}

impl HighCapacitySemaphore {
    /// Token count the semaphore is guaranteed to store without loss.
    pub const MAX_GUARANTEED_COUNT: i64 = i64::MAX / 4;

    /// Creates a semaphore holding zero tokens.
    pub const fn new() -> Self {
        Self { core: Core::new(0) }
    }

    /// Takes one token, parking until a release provides it.
    pub fn acquire(&self) {
        if !self.core.take_slot() {
            self.core.wait();
        }
    }

    /// Takes one token if immediately available.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.core.try_take()
    }

    /// Takes one token, giving up after `timeout`. Returns `true` if a
    /// token was acquired.
    pub fn try_timed_acquire(&self, timeout: Duration) -> bool {
        if self.core.take_slot() {
            return true;
        }
        self.core.timed_wait(timeout)
    }

    /// Adds `count` tokens, waking covered waiters.
    pub fn release(&self, count: u32) {
        if count == 0 {
            return;
        }
        let prev = self.core.counter.fetch_add(count as i64, Ordering::Release);
        if prev < 0 {
            self.core.publish_wakeups(prev, count as i64);
        } else if prev > 2 * Self::MAX_GUARANTEED_COUNT {
            self.clamp_excess();
        }
    }

    /// Drops all stored tokens and releases every parked waiter.
    pub fn reset_and_release_waiters(&self) {
        self.core.reset_and_release_waiters();
    }

    fn clamp_excess(&self) {
        let mut current = self.core.counter.load(Ordering::Relaxed);
        while current > Self::MAX_GUARANTEED_COUNT {
            match self.core.counter.compare_exchange_weak(
                current,
                Self::MAX_GUARANTEED_COUNT,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for HighCapacitySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HighCapacitySemaphore {
    fn drop(&mut self) {
        self.core.assert_no_waiters();
    }
}

impl std::fmt::Debug for HighCapacitySemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighCapacitySemaphore")
            .field("counter", &self.core.counter.load(Ordering::Relaxed))
            .finish()
    }
}
