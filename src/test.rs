//! A generic test suite, instantiated by every lock variant.
//!
//! The functions here are written against [`RawLock`] alone, so each
//! variant's test module picks a relax policy and runs the same battery.
//!
//! [`RawLock`]: crate::lock::RawLock

#[cfg(not(loom))]
pub(crate) mod tests {
    // A few cases descend from the test suite of Rust's own Mutex, adapted
    // to shared-access guards and the raw locking surface.
    //
    // Copyright 2014 The Rust Project Developers.
    //
    // Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
    // http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
    // <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
    // option. This file may not be copied, modified, or distributed
    // except according to those terms.

    use std::cell::Cell;
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::thread;
    use std::time::Duration;

    use crate::lock::RawLock;
    use crate::mutex::Mutex;

    type Int = u32;

    #[derive(Eq, PartialEq, Debug)]
    pub struct NonCopy(Int);

    const ITERS: Int = 1000;
    const CONCURRENCY: Int = 3;
    const EXPECTED_VALUE: Int = ITERS * CONCURRENCY * 2;

    pub fn smoke<L: RawLock>() {
        let mutex = Mutex::<Int, L>::new(1);
        drop(mutex.lock());
        drop(mutex.lock());
    }

    pub fn guard_debug_display<L: RawLock>() {
        let value = 42;
        let mutex = Mutex::<Int, L>::new(value);
        mutex.lock_then(|guard| {
            assert_eq!(format!("{value:?}"), format!("{guard:?}"));
            assert_eq!(format!("{value}"), format!("{guard}"));
        });
    }

    pub fn mutex_debug<L: RawLock>() {
        let value = 42;
        let mutex = Mutex::<Int, L>::new(value);
        let msg = format!("Mutex {{ data: {value:?} }}");
        assert_eq!(msg, format!("{mutex:?}"));
    }

    pub fn mutex_default<L: RawLock>() {
        let mut mutex = Mutex::<Int, L>::default();
        assert_eq!(Int::default(), *mutex.get_mut());
    }

    pub fn mutex_from<L: RawLock>() {
        let value = 42;
        let mut mutex = Mutex::<Int, L>::from(value);
        assert_eq!(value, *mutex.get_mut());
    }

    pub fn get_mut<L: RawLock>() {
        let mut mutex = Mutex::<NonCopy, L>::new(NonCopy(10));
        *mutex.get_mut() = NonCopy(20);
        assert_eq!(*mutex.get_mut(), NonCopy(20));
    }

    pub fn into_inner<L: RawLock>() {
        let mutex = Mutex::<NonCopy, L>::new(NonCopy(10));
        assert_eq!(mutex.into_inner(), NonCopy(10));
    }

    /// Nested acquisition and balanced release by one thread leave the lock
    /// free for everyone else.
    pub fn reentrant_same_thread<L>()
    where
        L: RawLock + Send + Sync + 'static,
    {
        let lock = Arc::new(L::new());
        lock.lock();
        lock.lock();
        lock.lock();
        // The owner's try always succeeds.
        assert!(lock.try_lock());
        unsafe {
            lock.unlock();
            lock.unlock();
            lock.unlock();
            lock.unlock();
        }
        let c_lock = Arc::clone(&lock);
        thread::spawn(move || {
            assert!(c_lock.try_lock());
            unsafe { c_lock.unlock() };
        })
        .join()
        .unwrap();
    }

    /// Single-threaded nesting to a large depth returns cleanly.
    pub fn deep_nesting<L: RawLock>() {
        const DEPTH: usize = 1_000_000;
        let lock = L::new();
        for _ in 0..DEPTH {
            lock.lock();
        }
        for _ in 0..DEPTH {
            unsafe { lock.unlock() };
        }
        assert!(lock.try_lock());
        unsafe { lock.unlock() };
    }

    /// While one thread holds the lock, another's try fails; after the
    /// release it succeeds.
    pub fn exclusion_two_threads<L>()
    where
        L: RawLock + Send + Sync + 'static,
    {
        let lock = Arc::new(L::new());
        let (failed_tx, failed_rx) = channel();
        let (released_tx, released_rx) = channel();
        lock.lock();
        let c_lock = Arc::clone(&lock);
        let other = thread::spawn(move || {
            assert!(!c_lock.try_lock());
            failed_tx.send(()).unwrap();
            released_rx.recv().unwrap();
            assert!(c_lock.try_lock());
            unsafe { c_lock.unlock() };
        });
        failed_rx.recv().unwrap();
        unsafe { lock.unlock() };
        released_tx.send(()).unwrap();
        other.join().unwrap();
    }

    /// A doubly nested hold keeps excluding others until the release that
    /// balances the first acquisition.
    pub fn reentrant_exclusion<L>()
    where
        L: RawLock + Send + Sync + 'static,
    {
        let lock = Arc::new(L::new());
        let (probe_tx, probe_rx) = channel();
        let (probed_tx, probed_rx) = channel();
        let c_lock = Arc::clone(&lock);
        let other = thread::spawn(move || {
            probe_rx.recv().unwrap();
            assert!(!c_lock.try_lock());
            probed_tx.send(()).unwrap();
            probe_rx.recv().unwrap();
            assert!(!c_lock.try_lock());
            probed_tx.send(()).unwrap();
            probe_rx.recv().unwrap();
            assert!(c_lock.try_lock());
            unsafe { c_lock.unlock() };
            probed_tx.send(()).unwrap();
        });
        lock.lock();
        lock.lock();
        probe_tx.send(()).unwrap();
        probed_rx.recv().unwrap();
        // One release down, still held.
        unsafe { lock.unlock() };
        probe_tx.send(()).unwrap();
        probed_rx.recv().unwrap();
        // Balanced, now free.
        unsafe { lock.unlock() };
        probe_tx.send(()).unwrap();
        probed_rx.recv().unwrap();
        other.join().unwrap();
    }

    pub fn lots_and_lots_lock<L>()
    where
        L: RawLock + Send + Sync + 'static,
    {
        let data = Arc::new(Mutex::<Cell<Int>, L>::new(Cell::new(0)));
        let (tx, rx) = channel();
        for _ in 0..CONCURRENCY {
            for _ in 0..2 {
                let data = Arc::clone(&data);
                let tx = tx.clone();
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        data.lock_then(|guard| guard.set(guard.get() + 1));
                    }
                    tx.send(()).unwrap();
                });
            }
        }
        drop(tx);
        for _ in 0..2 * CONCURRENCY {
            rx.recv().unwrap();
        }
        assert_eq!(data.lock_then(|guard| guard.get()), EXPECTED_VALUE);
    }

    /// Nested critical sections under contention never overlap: no
    /// increment is lost.
    pub fn contention_many_threads<L>()
    where
        L: RawLock + Send + Sync + 'static,
    {
        const THREADS: Int = 8;
        const PER_THREAD: Int = 100;
        let data = Arc::new(Mutex::<Cell<Int>, L>::new(Cell::new(0)));
        let (tx, rx) = channel();
        for _ in 0..THREADS {
            let data = Arc::clone(&data);
            let tx = tx.clone();
            thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    let outer = data.lock();
                    let inner = data.lock();
                    inner.set(inner.get() + 1);
                    drop(inner);
                    drop(outer);
                }
                tx.send(()).unwrap();
            });
        }
        drop(tx);
        for _ in 0..THREADS {
            rx.recv().unwrap();
        }
        assert_eq!(data.lock().get(), THREADS * PER_THREAD);
    }

    /// Waiters acquire in the order they queued up behind the holder.
    pub fn fifo_handoff<L>()
    where
        L: RawLock + Send + Sync + 'static,
    {
        let lock = Arc::new(L::new());
        let order = Arc::new(StdMutex::new(Vec::new()));
        lock.lock();
        let mut waiters = Vec::new();
        for i in 0..3 {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            waiters.push(thread::spawn(move || {
                lock.lock();
                order.lock().unwrap().push(i);
                unsafe { lock.unlock() };
            }));
            // Leave the waiter ample time to take its place in line before
            // the next one starts.
            thread::sleep(Duration::from_millis(100));
        }
        unsafe { lock.unlock() };
        for waiter in waiters {
            waiter.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
