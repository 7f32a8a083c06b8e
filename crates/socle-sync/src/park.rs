//! OS-level thread parking keyed on a 32-bit atomic word.
//!
//! Every blocking primitive in this crate bottoms out here: spin in
//! userspace first, then hand the futex word to the kernel. On Linux this
//! is `futex(2)` with `FUTEX_WAIT_PRIVATE` / `FUTEX_WAKE_PRIVATE`; other
//! targets emulate it with a fixed table of mutex/condvar buckets hashed
//! by cell address.
//!
//! Waits are allowed to return spuriously. Callers always re-check their
//! protocol word in a loop, so a stray wakeup costs one retry and nothing
//! else.

use std::sync::atomic::AtomicU32;

use crate::deadline::Deadline;

/// Why a timed wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken by a waker, by a value change, or spuriously.
    Woken,
    /// The deadline expired while parked.
    TimedOut,
}

/// Parks the calling thread while `cell` still holds `expected`.
///
/// Returns immediately if the value already differs. May wake spuriously.
#[inline]
pub fn wait(cell: &AtomicU32, expected: u32) {
    imp::wait(cell, expected);
}

/// Like [`wait`], but gives up once `deadline` expires.
#[inline]
pub fn wait_until(cell: &AtomicU32, expected: u32, deadline: &Deadline) -> WaitOutcome {
    let Some(remaining) = deadline.remaining() else {
        return WaitOutcome::TimedOut;
    };
    imp::wait_for(cell, expected, remaining)
}

/// Wakes at most one thread parked on `cell`.
#[inline]
pub fn wake_one(cell: &AtomicU32) {
    imp::wake(cell, 1);
}

/// Wakes up to `count` threads parked on `cell`.
#[inline]
pub fn wake_n(cell: &AtomicU32, count: u32) {
    if count > 0 {
        imp::wake(cell, count.min(i32::MAX as u32) as i32);
    }
}

/// Wakes every thread parked on `cell`.
#[inline]
pub fn wake_all(cell: &AtomicU32) {
    imp::wake(cell, i32::MAX);
}

#[cfg(target_os = "linux")]
mod imp {
    use std::ptr;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use super::WaitOutcome;

    unsafe fn sys_futex(
        cell: &AtomicU32,
        op: libc::c_int,
        value: u32,
        timeout: *const libc::timespec,
    ) -> libc::c_long {
        // SAFETY: the word stays valid for the duration of the call and the
        // remaining arguments match the FUTEX_WAIT/FUTEX_WAKE contract.
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                cell.as_ptr(),
                op | libc::FUTEX_PRIVATE_FLAG,
                value,
                timeout,
            )
        }
    }

    pub(super) fn wait(cell: &AtomicU32, expected: u32) {
        // EAGAIN means the word no longer holds `expected`, EINTR is a
        // signal; both hand control back to the caller's re-check loop.
        let _ = unsafe { sys_futex(cell, libc::FUTEX_WAIT, expected, ptr::null()) };
    }

    pub(super) fn wait_for(cell: &AtomicU32, expected: u32, remaining: Duration) -> WaitOutcome {
        // FUTEX_WAIT takes a relative timeout.
        let ts = libc::timespec {
            tv_sec: remaining.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
            tv_nsec: remaining.subsec_nanos() as libc::c_long,
        };
        let rc = unsafe { sys_futex(cell, libc::FUTEX_WAIT, expected, &ts) };
        if rc == -1
            && std::io::Error::last_os_error().raw_os_error() == Some(libc::ETIMEDOUT)
        {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Woken
        }
    }

    pub(super) fn wake(cell: &AtomicU32, count: i32) {
        let _ = unsafe { sys_futex(cell, libc::FUTEX_WAKE, count as u32, ptr::null()) };
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Condvar, Mutex};
    use std::time::Duration;

    use super::WaitOutcome;

    struct Bucket {
        lock: Mutex<()>,
        cond: Condvar,
    }

    const BUCKET: Bucket = Bucket {
        lock: Mutex::new(()),
        cond: Condvar::new(),
    };
    const BUCKET_COUNT: usize = 64;

    /// Waiters hash into a fixed bucket table by cell address. Distinct
    /// cells may share a bucket, so wakes notify the whole bucket and rely
    /// on waiters re-checking their own word.
    static TABLE: [Bucket; BUCKET_COUNT] = [BUCKET; BUCKET_COUNT];

    fn bucket(cell: &AtomicU32) -> &'static Bucket {
        let addr = cell as *const AtomicU32 as usize;
        &TABLE[(addr >> 2) & (BUCKET_COUNT - 1)]
    }

    fn guard(bucket: &Bucket) -> std::sync::MutexGuard<'_, ()> {
        bucket.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(super) fn wait(cell: &AtomicU32, expected: u32) {
        let bucket = bucket(cell);
        let held = guard(bucket);
        if cell.load(Ordering::Acquire) != expected {
            return;
        }
        let _held = bucket
            .cond
            .wait(held)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    pub(super) fn wait_for(cell: &AtomicU32, expected: u32, remaining: Duration) -> WaitOutcome {
        let bucket = bucket(cell);
        let held = guard(bucket);
        if cell.load(Ordering::Acquire) != expected {
            return WaitOutcome::Woken;
        }
        let (_held, result) = bucket
            .cond
            .wait_timeout(held, remaining)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if result.timed_out() {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Woken
        }
    }

    pub(super) fn wake(cell: &AtomicU32, _count: i32) {
        let bucket = bucket(cell);
        // Taking the bucket lock fences against waiters between their value
        // check and their park.
        drop(guard(bucket));
        bucket.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::deadline::Deadline;

    #[test]
    fn test_wait_returns_when_value_differs() {
        let cell = AtomicU32::new(7);
        // Expected value is stale, so this must not block.
        wait(&cell, 3);
    }

    #[test]
    fn test_timed_wait_expires() {
        let cell = AtomicU32::new(0);
        let deadline = Deadline::after(Duration::from_millis(20));
        loop {
            match wait_until(&cell, 0, &deadline) {
                WaitOutcome::TimedOut => break,
                WaitOutcome::Woken => continue,
            }
        }
    }

    #[test]
    fn test_wake_releases_parked_thread() {
        let cell = Arc::new(AtomicU32::new(0));
        let parked = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                while cell.load(Ordering::Acquire) == 0 {
                    wait(&cell, 0);
                }
            })
        };
        thread::sleep(Duration::from_millis(10));
        cell.store(1, Ordering::Release);
        wake_one(&cell);
        parked.join().unwrap();
    }

    #[test]
    fn test_wake_all_releases_every_waiter() {
        let cell = Arc::new(AtomicU32::new(0));
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    while cell.load(Ordering::Acquire) == 0 {
                        wait(&cell, 0);
                    }
                })
            })
            .collect();
        thread::sleep(Duration::from_millis(10));
        cell.store(1, Ordering::Release);
        wake_all(&cell);
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
