use std::hint;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::deadline::Deadline;
use crate::lock::Lock;
use crate::park::{self, WaitOutcome};

/// Condition variable for use with [`Lock`].
///
/// `waiters` counts threads registered in a wait; `notify` moves up to
/// `count` of them into `wakeups`, which doubles as the futex cell. A
/// notification is never issued beyond the registered count, so notifies
/// against an idle condition variable are free and leave nothing behind.
///
/// The usual discipline applies: the predicate is written under the lock,
/// and `wait` can return spuriously, so callers re-check in a loop.
pub struct ConditionVariable {
    waiters: AtomicU32,
    wakeups: AtomicU32,
}

impl ConditionVariable {
    pub const fn new() -> Self {
        Self {
            waiters: AtomicU32::new(0),
            wakeups: AtomicU32::new(0),
        }
    }

    /// Atomically releases `lock` and parks until notified, then reacquires
    /// `lock` before returning.
    ///
    /// `lock` must be held by the calling thread.
    pub fn wait(&self, lock: &Lock) {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        lock.release();
        loop {
            if self.consume_wakeup() {
                break;
            }
            park::wait(&self.wakeups, 0);
        }
        lock.acquire();
    }

    /// [`wait`](ConditionVariable::wait) bounded by `timeout`.
    ///
    /// Returns `true` if a notification was consumed, `false` on expiry.
    /// The lock is reacquired before returning either way.
    pub fn timed_wait(&self, lock: &Lock, timeout: Duration) -> bool {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        lock.release();
        let deadline = Deadline::after(timeout);
        let notified = loop {
            if self.consume_wakeup() {
                break true;
            }
            if let WaitOutcome::TimedOut = park::wait_until(&self.wakeups, 0, &deadline) {
                break self.deregister();
            }
        };
        lock.acquire();
        notified
    }

    /// Wakes up to `count` waiting threads.
    pub fn notify(&self, count: u32) {
        let mut current = self.waiters.load(Ordering::Relaxed);
        loop {
            if current == 0 || count == 0 {
                return;
            }
            let moved = current.min(count);
            match self.waiters.compare_exchange_weak(
                current,
                current - moved,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.wakeups.fetch_add(moved, Ordering::Release);
                    park::wake_n(&self.wakeups, moved);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Wakes every waiting thread.
    pub fn notify_all(&self) {
        self.notify(u32::MAX);
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

    /// Timeout path: remove our registration, unless a notify already
    /// converted it into a wakeup, in which case that wakeup is ours.
    fn deregister(&self) -> bool {
        let mut current = self.waiters.load(Ordering::Relaxed);
        loop {
            if current > 0 {
                match self.waiters.compare_exchange_weak(
                    current,
                    current - 1,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return false,
                    Err(actual) => current = actual,
                }
            } else if self.consume_wakeup() {
                return true;
            } else {
                // All registrations (ours included) were claimed by a
                // notifier that has not yet published its wakeups. Spin
                // until ours lands.
                hint::spin_loop();
                current = self.waiters.load(Ordering::Relaxed);
            }
        }
    }
}

impl Default for ConditionVariable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConditionVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionVariable")
            .field("waiters", &self.waiters.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    struct Checkpoint {
        lock: Lock,
        cond: ConditionVariable,
        ready: AtomicU32,
    }

    #[test]
    fn test_notify_one_wakes_one() {
        let shared = Arc::new(Checkpoint {
            lock: Lock::new(),
            cond: ConditionVariable::new(),
            ready: AtomicU32::new(0),
        });
        let waiter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared.lock.acquire();
                while shared.ready.load(Ordering::Relaxed) == 0 {
                    shared.cond.wait(&shared.lock);
                }
                shared.lock.release();
            })
        };
        thread::sleep(Duration::from_millis(10));
        shared.lock.acquire();
        shared.ready.store(1, Ordering::Relaxed);
        shared.cond.notify(1);
        shared.lock.release();
        waiter.join().unwrap();
    }

    #[test]
    fn test_notify_all_wakes_everyone() {
        let shared = Arc::new(Checkpoint {
            lock: Lock::new(),
            cond: ConditionVariable::new(),
            ready: AtomicU32::new(0),
        });
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared.lock.acquire();
                    while shared.ready.load(Ordering::Relaxed) == 0 {
                        shared.cond.wait(&shared.lock);
                    }
                    shared.lock.release();
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(10));
        shared.lock.acquire();
        shared.ready.store(1, Ordering::Relaxed);
        shared.cond.notify_all();
        shared.lock.release();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn test_notify_without_waiters_leaves_nothing_behind() {
        let shared = Checkpoint {
            lock: Lock::new(),
            cond: ConditionVariable::new(),
            ready: AtomicU32::new(0),
        };
        // Nobody is registered, so these must not bank wakeups.
        shared.cond.notify(1);
        shared.cond.notify_all();
        shared.lock.acquire();
        let notified = shared.cond.timed_wait(&shared.lock, Duration::from_millis(20));
        shared.lock.release();
        assert!(!notified);
    }

    #[test]
    fn test_timed_wait_reports_notification() {
        let shared = Arc::new(Checkpoint {
            lock: Lock::new(),
            cond: ConditionVariable::new(),
            ready: AtomicU32::new(0),
        });
        let waiter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                shared.lock.acquire();
                let mut notified = false;
                while shared.ready.load(Ordering::Relaxed) == 0 {
                    notified = shared.cond.timed_wait(&shared.lock, Duration::from_secs(10));
                }
                shared.lock.release();
                notified
            })
        };
        thread::sleep(Duration::from_millis(10));
        shared.lock.acquire();
        shared.ready.store(1, Ordering::Relaxed);
        shared.cond.notify(1);
        shared.lock.release();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_producer_consumer_handoff() {
        const ITEMS: u64 = 1_000;

        struct Channel {
            lock: Lock,
            cond: ConditionVariable,
            queued: AtomicU64,
            consumed: AtomicU64,
        }

        let channel = Arc::new(Channel {
            lock: Lock::new(),
            cond: ConditionVariable::new(),
            queued: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        });
        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut taken = 0;
                while taken < ITEMS {
                    channel.lock.acquire();
                    while channel.queued.load(Ordering::Relaxed)
                        == channel.consumed.load(Ordering::Relaxed)
                    {
                        channel.cond.wait(&channel.lock);
                    }
                    channel.consumed.fetch_add(1, Ordering::Relaxed);
                    channel.lock.release();
                    taken += 1;
                }
                taken
            })
        };
        for _ in 0..ITEMS {
            channel.lock.acquire();
            channel.queued.fetch_add(1, Ordering::Relaxed);
            channel.cond.notify(1);
            channel.lock.release();
        }
        assert_eq!(consumer.join().unwrap(), ITEMS);
    }
}
