use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::deadline::Deadline;
use crate::park::{self, WaitOutcome};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// Futex-based mutual exclusion lock.
///
/// The state word holds `UNLOCKED`, `LOCKED`, or `CONTENDED`; entering
/// threads inflate it past `LOCKED` with a single `fetch_add` and collapse
/// it back to `CONTENDED` while they wait. An uncontended acquire/release
/// pair never leaves userspace.
///
/// There is no owner bookkeeping: any thread may call [`release`], which
/// makes the raw API usable as a binary semaphore. [`guard`] layers RAII
/// scoping on top for the common case.
///
/// [`release`]: Lock::release
/// [`guard`]: Lock::guard
pub struct Lock {
    state: AtomicU32,
}

impl Lock {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Acquires the lock, parking until it becomes available.
    pub fn acquire(&self) {
        if self.state.fetch_add(1, Ordering::Acquire) == UNLOCKED {
            return;
        }
        // The add inflated the word past LOCKED. Collapse to CONTENDED so
        // the holder knows to wake somebody, then park until the word moves.
        loop {
            if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return;
            }
            park::wait(&self.state, CONTENDED);
        }
    }

    /// Acquires the lock only if it is free right now.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Acquires the lock, giving up after `timeout`.
    ///
    /// Returns `true` if the lock was acquired.
    pub fn try_timed_acquire(&self, timeout: Duration) -> bool {
        if self.state.fetch_add(1, Ordering::Acquire) == UNLOCKED {
            return true;
        }
        let deadline = Deadline::after(timeout);
        loop {
            if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return true;
            }
            if let WaitOutcome::TimedOut = park::wait_until(&self.state, CONTENDED, &deadline) {
                // One last swap: either a release raced the expiry and the
                // lock is ours after all, or we leave the word CONTENDED so
                // the holder's release still wakes a remaining waiter.
                return self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED;
            }
        }
    }

    /// Releases the lock and wakes one waiter if any thread is parked.
    ///
    /// Calling this without holding the lock corrupts the protocol.
    pub fn release(&self) {
        let prev = self.state.swap(UNLOCKED, Ordering::Release);
        debug_assert_ne!(prev, UNLOCKED, "release of an unheld lock");
        if prev > LOCKED {
            park::wake_one(&self.state);
        }
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn guard(&self) -> LockGuard<'_> {
        self.acquire();
        LockGuard { lock: self }
    }

    /// [`guard`](Lock::guard) without blocking; `None` if the lock is held.
    pub fn try_guard(&self) -> Option<LockGuard<'_>> {
        self.try_acquire().then(|| LockGuard { lock: self })
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let state = *self.state.get_mut();
        assert!(state <= LOCKED, "lock destroyed with waiters present");
    }
}

impl std::fmt::Debug for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.load(Ordering::Relaxed) {
            UNLOCKED => "unlocked",
            LOCKED => "locked",
            _ => "contended",
        };
        f.debug_struct("Lock").field("state", &state).finish()
    }
}

/// RAII scope for [`Lock`]; releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_acquire_release_cycle() {
        let lock = Lock::new();
        lock.acquire();
        assert!(!lock.try_acquire());
        lock.release();
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = Lock::new();
        {
            let _held = lock.guard();
            assert!(lock.try_guard().is_none());
        }
        assert!(lock.try_guard().is_some());
    }

    #[test]
    fn test_timed_acquire_times_out_while_held() {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let contender = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.try_timed_acquire(Duration::from_millis(20)))
        };
        assert!(!contender.join().unwrap());
        lock.release();
        assert!(lock.try_timed_acquire(Duration::from_secs(5)));
        lock.release();
    }

    #[test]
    fn test_release_after_expired_waiter_still_works() {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let contender = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.try_timed_acquire(Duration::from_millis(10)))
        };
        assert!(!contender.join().unwrap());
        // The expired waiter left the word marked contended; release must
        // still restore a usable lock.
        lock.release();
        lock.acquire();
        lock.release();
    }

    struct Shared {
        lock: Lock,
        value: UnsafeCell<u64>,
    }

    // The test threads only touch `value` while holding `lock`.
    unsafe impl Sync for Shared {}

    #[test]
    fn test_mutual_exclusion_under_contention() {
        const THREADS: usize = 4;
        const ROUNDS: u64 = 10_000;

        let shared = Arc::new(Shared {
            lock: Lock::new(),
            value: UnsafeCell::new(0),
        });
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        let _held = shared.lock.guard();
                        unsafe { *shared.value.get() += 1 };
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(unsafe { *shared.value.get() }, THREADS as u64 * ROUNDS);
    }

    #[test]
    fn test_release_from_another_thread() {
        let lock = Arc::new(Lock::new());
        lock.acquire();
        let releaser = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.release())
        };
        releaser.join().unwrap();
        assert!(lock.try_acquire());
        lock.release();
    }
}
