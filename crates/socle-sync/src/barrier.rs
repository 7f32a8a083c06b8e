use std::sync::atomic::{AtomicU32, Ordering};

use socle_atomic::CachePadded;

use crate::lock::Lock;
use crate::semaphore::HighCapacitySemaphore;

/// Cyclic thread barrier.
///
/// Threads block in [`acquire`](Barrier::acquire) until `threshold` of them
/// have arrived, then all proceed and the barrier rearms for the next
/// round. Consecutive rounds hand out tokens from two alternating
/// semaphores, so a thread that races ahead into round `n + 1` draws from
/// the other semaphore and can never steal a token from a round-`n`
/// straggler.
///
/// The barrier serves a fixed party: at most `threshold` threads may use
/// it. Two rounds of lead are enough to wrap back onto a semaphore that
/// still owes tokens, so extra threads would be able to drain a token
/// banked for an earlier round's straggler.
pub struct Barrier {
    threshold: u32,
    lock: Lock,
    // Both guarded by `lock`; atomics only so the struct stays Sync.
    arrived: AtomicU32,
    round: AtomicU32,
    tokens: [CachePadded<HighCapacitySemaphore>; 2],
}

impl Barrier {
    /// Creates a barrier that opens once `threshold` threads arrive.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub const fn new(threshold: u32) -> Self {
        assert!(threshold > 0, "barrier threshold must be at least 1");
        Self {
            threshold,
            lock: Lock::new(),
            arrived: AtomicU32::new(0),
            round: AtomicU32::new(0),
            tokens: [
                CachePadded::new(HighCapacitySemaphore::new()),
                CachePadded::new(HighCapacitySemaphore::new()),
            ],
        }
    }

    /// Blocks until `threshold` threads (this one included) have arrived.
    pub fn acquire(&self) {
        self.lock.acquire();
        let round = self.round.load(Ordering::Relaxed) as usize & 1;
        let arrived = self.arrived.load(Ordering::Relaxed) + 1;
        let last = arrived == self.threshold;
        if last {
            // Rearm before anyone from the next round can enter.
            self.arrived.store(0, Ordering::Relaxed);
            self.round.fetch_add(1, Ordering::Relaxed);
        } else {
            self.arrived.store(arrived, Ordering::Relaxed);
        }
        self.lock.release();

        if last {
            if self.threshold > 1 {
                self.tokens[round].release(self.threshold - 1);
            }
        } else {
            self.tokens[round].acquire();
        }
    }

    /// The number of threads each round waits for.
    #[inline]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl std::fmt::Debug for Barrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Barrier")
            .field("threshold", &self.threshold)
            .field("arrived", &self.arrived.load(Ordering::Relaxed))
            .field("round", &self.round.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn test_threshold_one_never_blocks() {
        let barrier = Barrier::new(1);
        for _ in 0..10 {
            barrier.acquire();
        }
    }

    #[test]
    fn test_all_threads_pass_together() {
        const THREADS: u32 = 4;

        let barrier = Arc::new(Barrier::new(THREADS));
        let arrived = Arc::new(AtomicU64::new(0));
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let arrived = Arc::clone(&arrived);
                thread::spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    barrier.acquire();
                    // Nobody passes until all have arrived.
                    assert_eq!(arrived.load(Ordering::SeqCst), THREADS as u64);
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn test_rounds_stay_separated() {
        const THREADS: u32 = 4;
        const ROUNDS: u64 = 1_000;

        let barrier = Arc::new(Barrier::new(THREADS));
        let checkpoint = Arc::new(AtomicU64::new(0));
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let checkpoint = Arc::clone(&checkpoint);
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        checkpoint.fetch_add(1, Ordering::SeqCst);
                        barrier.acquire();
                        // The count is frozen between the two barriers: all
                        // threads have incremented for this round and none
                        // may increment for the next yet.
                        let seen = checkpoint.load(Ordering::SeqCst);
                        assert_eq!(seen, (round + 1) * THREADS as u64);
                        barrier.acquire();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(checkpoint.load(Ordering::SeqCst), ROUNDS * THREADS as u64);
    }
}
