//! Intrusive lock-free node queues and stacks.
//!
//! Callers own the nodes; the containers only rearrange links:
//!
//! - [`MpmcNodeQueue`] / [`MpmcNodeStack`]: any thread may produce or
//!   consume; ABA is defeated by a generation tag carried next to the
//!   pointer in one double-width atomic word
//! - [`MpscNodeQueue`] / [`MpscNodeStack`]: any thread may produce, one
//!   consumer at a time proceeds past an exclusive-access bit; built for
//!   polling consumers
//!
//! A node is a caller-defined type with an embedded [`NodeLink`], wired up
//! through the [`QueueNode`] trait:
//!
//! ```
//! use core::ptr::NonNull;
//! use socle_queue::{MpmcNodeQueue, NodeLink, QueueNode};
//!
//! struct Job {
//!     link: NodeLink<Job>,
//!     payload: u64,
//! }
//!
//! unsafe impl QueueNode for Job {
//!     fn link(&self) -> &NodeLink<Self> {
//!         &self.link
//!     }
//! }
//!
//! let queue = MpmcNodeQueue::<Job>::new();
//! let job = Box::leak(Box::new(Job { link: NodeLink::new(), payload: 7 }));
//! unsafe { queue.push_back(NonNull::from(job)) };
//!
//! let popped = queue.try_pop_front().unwrap();
//! assert_eq!(unsafe { popped.as_ref() }.payload, 7);
//! drop(unsafe { Box::from_raw(popped.as_ptr()) });
//! ```
//!
//! `try_pop_*` returning `None` is not an emptiness claim: an in-flight
//! push or a lost consumer-bit race also produce it. Only `is_empty()`
//! (back/top pointer null) is authoritative.
//!
//! # Loom Testing
//!
//! ```text
//! cargo test -p socle-queue --features loom
//! ```

#![no_std]

#[cfg(any(test, feature = "loom"))]
extern crate std;

pub mod mpmc;
pub mod mpsc;
pub mod node;

pub use mpmc::{MpmcNodeQueue, MpmcNodeStack};
pub use mpsc::{MpscNodeQueue, MpscNodeStack};
pub use node::{NodeLink, QueueNode, chain};
