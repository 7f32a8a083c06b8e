//! Cross-primitive rendezvous: phased computation over a barrier, and a
//! bounded handoff built from a lock plus two condition variables.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use socle::{Barrier, ConditionVariable, Lock};

#[test]
fn test_barrier_keeps_phases_in_lockstep() {
    const THREADS: u32 = 4;
    const ROUNDS: u64 = 1_000;

    let barrier = Arc::new(Barrier::new(THREADS));
    let sum = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let sum = Arc::clone(&sum);
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    sum.fetch_add(1, Ordering::Relaxed);
                    barrier.acquire();
                    // Everyone contributed before anyone proceeds.
                    assert_eq!(sum.load(Ordering::Relaxed), (round + 1) * THREADS as u64);
                    barrier.acquire();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(sum.load(Ordering::Relaxed), ROUNDS * THREADS as u64);
}

const BUFFER_CAP: usize = 4;

/// Bounded single-buffer handoff in the classic lock/condvar shape.
struct Handoff {
    lock: Lock,
    not_empty: ConditionVariable,
    not_full: ConditionVariable,
    items: UnsafeCell<VecDeque<u64>>,
}

// The deque is only touched between lock.acquire() and lock.release().
unsafe impl Sync for Handoff {}

impl Handoff {
    fn new() -> Self {
        Self {
            lock: Lock::new(),
            not_empty: ConditionVariable::new(),
            not_full: ConditionVariable::new(),
            items: UnsafeCell::new(VecDeque::with_capacity(BUFFER_CAP)),
        }
    }

    fn push(&self, value: u64) {
        self.lock.acquire();
        while unsafe { &*self.items.get() }.len() == BUFFER_CAP {
            self.not_full.wait(&self.lock);
        }
        unsafe { &mut *self.items.get() }.push_back(value);
        self.lock.release();
        self.not_empty.notify(1);
    }

    fn pop(&self) -> u64 {
        self.lock.acquire();
        loop {
            if let Some(value) = unsafe { &mut *self.items.get() }.pop_front() {
                self.lock.release();
                self.not_full.notify(1);
                return value;
            }
            self.not_empty.wait(&self.lock);
        }
    }
}

#[test]
fn test_bounded_handoff_delivers_everything() {
    const PRODUCERS: u64 = 2;
    const CONSUMERS: u64 = 2;
    const PER_PRODUCER: u64 = 2_000;
    const PER_CONSUMER: u64 = PRODUCERS * PER_PRODUCER / CONSUMERS;

    let handoff = Arc::new(Handoff::new());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let handoff = Arc::clone(&handoff);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    handoff.push(producer * PER_PRODUCER + i);
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let handoff = Arc::clone(&handoff);
            thread::spawn(move || (0..PER_CONSUMER).map(|_| handoff.pop()).sum::<u64>())
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    let received: u64 = consumers
        .into_iter()
        .map(|consumer| consumer.join().unwrap())
        .sum();

    let total = PRODUCERS * PER_PRODUCER;
    assert_eq!(received, total * (total - 1) / 2);
    assert!(unsafe { &*handoff.items.get() }.is_empty());
}
