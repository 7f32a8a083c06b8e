//! Futex-backed synchronization primitives.
//!
//! Every primitive here follows the same recipe: the contended state lives
//! in one or two atomic words, the uncontended paths are pure userspace
//! RMW operations, and blocking bottoms out in [`park`], which wraps
//! `futex(2)` on Linux and a mutex/condvar table elsewhere.
//!
//! # Contents
//!
//! - [`Lock`]: three-state mutual exclusion lock with RAII [`LockGuard`]
//! - [`CappedSemaphore`] / [`HighCapacitySemaphore`]: counting semaphores
//!   whose counter sign encodes parked waiters
//! - [`EventSemaphore`]: manual-reset gate with a generation counter
//! - [`ConditionVariable`]: predicate waits against a [`Lock`]
//! - [`Barrier`]: cyclic rendezvous over two alternating semaphores
//!
//! Blocking primitives are not async: they park OS threads. Pair them with
//! the nonblocking structures in `socle-queue` when building schedulers or
//! pools on top.

mod barrier;
mod condvar;
mod deadline;
mod event;
mod lock;
pub mod park;
mod semaphore;

pub use barrier::Barrier;
pub use condvar::ConditionVariable;
pub use deadline::Deadline;
pub use event::EventSemaphore;
pub use lock::{Lock, LockGuard};
pub use semaphore::{CappedSemaphore, HighCapacitySemaphore};
