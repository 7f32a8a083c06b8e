use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::deadline::Deadline;
use crate::park::{self, WaitOutcome};

// Low two bits hold the gate state, the rest a wrapping generation.
const STATE_MASK: u32 = 0b11;
const RESET_NO_WAITERS: u32 = 0;
const RESET_WAITERS: u32 = 1;
const SET: u32 = 2;
const GENERATION_ONE: u32 = 0b100;

#[inline]
fn state(word: u32) -> u32 {
    word & STATE_MASK
}

#[inline]
fn generation(word: u32) -> u32 {
    word >> 2
}

/// Manual-reset event gate.
///
/// While set, any number of acquires pass through without blocking. While
/// reset, acquires park until the next [`set`] or
/// [`reset_and_release_waiters`]. Releasing bumps the generation field, and
/// waiters treat any generation change as their release signal, so a
/// set/reset pair that happens while a waiter is between its park and its
/// re-check cannot strand it.
///
/// The two reset states differ only in whether waiters might be parked.
/// Transitions out of `RESET_NO_WAITERS` skip the generation bump and the
/// wake syscall; a stale waiter flag costs one redundant wake and nothing
/// else.
///
/// [`set`]: EventSemaphore::set
/// [`reset_and_release_waiters`]: EventSemaphore::reset_and_release_waiters
pub struct EventSemaphore {
    word: AtomicU32,
}

impl EventSemaphore {
    /// Creates the event in the reset (closed) state.
    pub const fn new() -> Self {
        Self {
            word: AtomicU32::new(RESET_NO_WAITERS),
        }
    }

    /// Opens the gate and releases every parked waiter.
    pub fn set(&self) {
        let mut current = self.word.load(Ordering::Relaxed);
        loop {
            let next = match state(current) {
                SET => return,
                RESET_NO_WAITERS => (current & !STATE_MASK) | SET,
                _ => (current.wrapping_add(GENERATION_ONE) & !STATE_MASK) | SET,
            };
            match self.word.compare_exchange_weak(
                current,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    if state(current) == RESET_WAITERS {
                        park::wake_all(&self.word);
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Closes the gate. Threads already past [`acquire`](EventSemaphore::acquire)
    /// are unaffected.
    pub fn reset(&self) {
        let mut current = self.word.load(Ordering::Relaxed);
        loop {
            if state(current) != SET {
                return;
            }
            let next = (current & !STATE_MASK) | RESET_NO_WAITERS;
            match self.word.compare_exchange_weak(
                current,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Closes the gate, releasing any currently parked waiters on the way.
    ///
    /// Waiters released this way return from `acquire` even though the gate
    /// ends up closed.
    pub fn reset_and_release_waiters(&self) {
        let mut current = self.word.load(Ordering::Relaxed);
        loop {
            let next = match state(current) {
                RESET_NO_WAITERS => return,
                SET => (current & !STATE_MASK) | RESET_NO_WAITERS,
                _ => (current.wrapping_add(GENERATION_ONE) & !STATE_MASK) | RESET_NO_WAITERS,
            };
            match self.word.compare_exchange_weak(
                current,
                next,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    if state(current) == RESET_WAITERS {
                        park::wake_all(&self.word);
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Passes through if the gate is open, otherwise parks until it opens.
    pub fn acquire(&self) {
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            match state(current) {
                SET => return,
                RESET_NO_WAITERS => {
                    // Raise the waiter flag for the generation we observed.
                    let flagged = (current & !STATE_MASK) | RESET_WAITERS;
                    match self.word.compare_exchange_weak(
                        current,
                        flagged,
                        Ordering::Acquire,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => current = flagged,
                        Err(actual) => current = actual,
                    }
                }
                _ => {
                    park::wait(&self.word, current);
                    let reloaded = self.word.load(Ordering::Acquire);
                    if generation(reloaded) != generation(current) {
                        return;
                    }
                    current = reloaded;
                }
            }
        }
    }

    /// Passes through only if the gate is open right now.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        state(self.word.load(Ordering::Acquire)) == SET
    }

    /// [`acquire`](EventSemaphore::acquire) bounded by `timeout`. Returns
    /// `true` if the gate opened (or released its waiters) in time.
    pub fn try_timed_acquire(&self, timeout: Duration) -> bool {
        let deadline = Deadline::after(timeout);
        let mut current = self.word.load(Ordering::Acquire);
        loop {
            match state(current) {
                SET => return true,
                RESET_NO_WAITERS => {
                    let flagged = (current & !STATE_MASK) | RESET_WAITERS;
                    match self.word.compare_exchange_weak(
                        current,
                        flagged,
                        Ordering::Acquire,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => current = flagged,
                        Err(actual) => current = actual,
                    }
                }
                _ => {
                    let outcome = park::wait_until(&self.word, current, &deadline);
                    let reloaded = self.word.load(Ordering::Acquire);
                    if generation(reloaded) != generation(current) {
                        return true;
                    }
                    if let WaitOutcome::TimedOut = outcome {
                        // The waiter flag stays up: a later set pays one
                        // redundant wake instead of us scanning for other
                        // parked threads here.
                        return state(reloaded) == SET;
                    }
                    current = reloaded;
                }
            }
        }
    }
}

impl Default for EventSemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = self.word.load(Ordering::Relaxed);
        let state = match state(word) {
            SET => "set",
            RESET_WAITERS => "reset (waiters)",
            _ => "reset",
        };
        f.debug_struct("EventSemaphore")
            .field("state", &state)
            .field("generation", &generation(word))
            .finish()
    }
}
