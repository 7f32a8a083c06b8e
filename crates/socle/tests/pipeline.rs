//! End-to-end pipeline: jobs carved from the segregated allocator flow
//! through an mpmc queue from many producers to many consumers, released
//! simultaneously by an event gate.

use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use socle::{
    BucketConfig, EventSemaphore, MpmcNodeQueue, NodeLink, QueueNode, SegregatedAllocator,
};

struct Job {
    link: NodeLink<Job>,
    id: u64,
}

unsafe impl QueueNode for Job {
    fn link(&self) -> &NodeLink<Self> {
        &self.link
    }
}

#[test]
fn test_allocator_fed_mpmc_pipeline() {
    const PRODUCERS: u64 = 8;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: u64 = 1_000;
    const TOTAL: u64 = PRODUCERS * PER_PRODUCER;

    let alloc = Arc::new(SegregatedAllocator::new(
        BucketConfig::new(64, 4096, 4).unwrap(),
    ));
    let queue = Arc::new(MpmcNodeQueue::<Job>::new());
    let start = Arc::new(EventSemaphore::new());
    let producers_done = Arc::new(AtomicBool::new(false));
    let seen: Arc<Vec<AtomicBool>> =
        Arc::new((0..TOTAL).map(|_| AtomicBool::new(false)).collect());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let alloc = Arc::clone(&alloc);
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.acquire();
                for i in 0..PER_PRODUCER {
                    let block = alloc.allocate(size_of::<Job>()).unwrap();
                    let job: NonNull<Job> = block.cast();
                    unsafe {
                        ptr::write(
                            job.as_ptr(),
                            Job {
                                link: NodeLink::new(),
                                id: producer * PER_PRODUCER + i,
                            },
                        );
                        queue.push_back(job);
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let alloc = Arc::clone(&alloc);
            let queue = Arc::clone(&queue);
            let producers_done = Arc::clone(&producers_done);
            let seen = Arc::clone(&seen);
            thread::spawn(move || loop {
                match queue.try_pop_front() {
                    Some(job) => {
                        let id = unsafe { job.as_ref() }.id;
                        let duplicate = seen[id as usize].swap(true, Ordering::Relaxed);
                        assert!(!duplicate, "job {id} delivered twice");
                        unsafe { alloc.deallocate(job.cast(), size_of::<Job>()) };
                    }
                    None => {
                        // None is not an emptiness claim while producers run;
                        // after they finish, is_empty() is authoritative.
                        if producers_done.load(Ordering::Acquire) && queue.is_empty() {
                            return;
                        }
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    start.set();
    for producer in producers {
        producer.join().unwrap();
    }
    producers_done.store(true, Ordering::Release);
    for consumer in consumers {
        consumer.join().unwrap();
    }

    assert!(queue.is_empty());
    for (id, flag) in seen.iter().enumerate() {
        assert!(flag.load(Ordering::Relaxed), "job {id} was lost");
    }

    // Every job went back to its bucket.
    let status = alloc.status();
    assert_eq!(status.free, status.capacity);
}
