//! Process-wide thread identities.
//!
//! Lock words store the holder's identity as a 32-bit integer, with zero
//! reserved for "no owner". OS thread ids fit neither constraint: they can
//! be reused and need not fit in 32 bits. Instead, identities come from a
//! process-wide monotonically increasing counter and are cached in a
//! thread-local slot on a thread's first lock operation.

use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU32, Ordering::Relaxed};

/// Identity zero means "no owner", so the allocator starts at one. The
/// counter is never reclaimed and wraps only past 2^32 - 1 distinct threads
/// in one process lifetime, which is outside the operating envelope.
static ALLOCATOR: AtomicU32 = AtomicU32::new(1);

std::thread_local! {
    static TID: NonZeroU32 = NonZeroU32::new(ALLOCATOR.fetch_add(1, Relaxed))
        .expect("thread identity space exhausted");
}

/// Returns this thread's identity, assigning one on the first call.
#[inline]
pub(crate) fn current() -> NonZeroU32 {
    TID.with(|tid| *tid)
}

#[cfg(all(not(loom), test))]
mod test {
    use std::sync::mpsc::channel;
    use std::thread;

    use super::current;

    #[test]
    fn stable_within_a_thread() {
        assert_eq!(current(), current());
    }

    #[test]
    fn distinct_across_threads() {
        let mine = current();
        let (tx, rx) = channel();
        for _ in 0..8 {
            let tx = tx.clone();
            thread::spawn(move || tx.send(current()).unwrap());
        }
        drop(tx);
        let mut seen = vec![mine];
        while let Ok(tid) = rx.recv() {
            assert!(!seen.contains(&tid));
            seen.push(tid);
        }
    }
}
