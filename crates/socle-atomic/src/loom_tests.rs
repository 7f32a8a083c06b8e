#![cfg(all(test, feature = "loom"))]

use crate::cell::Atomic;
use crate::sync::{Ordering, thread};
use crate::tagged::{AtomicTaggedPtr, TaggedPtr};
use loom::sync::Arc;

#[test]
fn atomic_update_no_lost_increments() {
    loom::model(|| {
        let cell = Arc::new(Atomic::new(0u32));

        let t1 = thread::spawn({
            let cell = cell.clone();
            move || {
                cell.update(Ordering::AcqRel, Ordering::Acquire, |v| v + 1);
            }
        });

        let t2 = thread::spawn({
            let cell = cell.clone();
            move || {
                cell.update(Ordering::AcqRel, Ordering::Acquire, |v| v + 1);
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        assert_eq!(cell.load(Ordering::Acquire), 2);
    });
}

#[test]
fn tagged_cas_single_winner() {
    loom::model(|| {
        let cell = Arc::new(AtomicTaggedPtr::<u8>::new(TaggedPtr::null()));

        let race = |cell: Arc<AtomicTaggedPtr<u8>>| {
            let observed = TaggedPtr::null();
            cell.compare_exchange(
                observed,
                observed.bumped(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        };

        let t1 = thread::spawn({
            let cell = cell.clone();
            move || race(cell)
        });
        let t2 = thread::spawn({
            let cell = cell.clone();
            move || race(cell)
        });

        let r1 = t1.join().unwrap();
        let r2 = t2.join().unwrap();

        // Both expected the same {null, 0} pair; the tag bump makes the
        // second swing fail.
        assert!(r1 != r2);
        assert_eq!(cell.load(Ordering::Acquire).tag(), 1);
    });
}
