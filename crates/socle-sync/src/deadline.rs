use std::time::{Duration, Instant};

/// Absolute expiry computed once per timed operation.
///
/// Timed waits re-park after spurious wakeups, so the remaining budget has
/// to be recomputed on every iteration rather than passing the original
/// timeout back to the OS.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// `None` means the timeout was too large to represent; the deadline
    /// never expires.
    end: Option<Instant>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            end: Instant::now().checked_add(timeout),
        }
    }

    /// Time left until expiry, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        match self.end {
            Some(end) => {
                let now = Instant::now();
                if now >= end { None } else { Some(end - now) }
            }
            None => Some(Duration::MAX),
        }
    }
}
