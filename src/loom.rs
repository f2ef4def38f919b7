//! Loom models for the lock family.
//!
//! Compiled under `--cfg loom` only. Each model drives the public locking
//! surface with a couple of threads and lets Loom enumerate the
//! interleavings; data accesses go through the Loom cell behind
//! [`MutexGuard`], so any execution in which mutual exclusion or
//! reentrancy breaks fails the model.
//!
//! [`MutexGuard`]: crate::mutex::MutexGuard

pub(crate) mod models {
    use loom::sync::Arc;
    use loom::{model, thread};

    use crate::lock::RawLock;
    use crate::mutex::Mutex;

    type Int = usize;

    /// Increments the shared integer under a single acquisition.
    fn inc<L: RawLock>(data: &Arc<Mutex<Int, L>>) {
        // SAFETY: the guard holds the lock and this is the thread's only
        // access to the data, which is exactly what the model is checking.
        data.lock_then(|guard| guard.with_mut(|value| unsafe { *value += 1 }));
    }

    /// Increments the shared integer under a nested acquisition.
    fn inc_nested<L: RawLock>(data: &Arc<Mutex<Int, L>>) {
        data.lock_then(|_outer| {
            // SAFETY: as in `inc`, the nested guard is the only access.
            data.lock_then(|guard| guard.with_mut(|value| unsafe { *value += 1 }));
        });
    }

    /// Gets the shared integer.
    ///
    /// Runs on a fresh thread: the model's main thread must never lock,
    /// because the queue variant would then park Loom atomics in main
    /// thread locals that outlive the execution they belong to.
    fn get<L: RawLock + Send + Sync + 'static>(data: &Arc<Mutex<Int, L>>) -> Int {
        let data = Arc::clone(data);
        thread::spawn(move || data.lock_then(|guard| guard.with(|value| *value)))
            .join()
            .unwrap()
    }

    /// Evaluates that concurrent `lock` calls serialize all mutations of
    /// the shared data, therefore no data races.
    pub(crate) fn lock_join<L: RawLock + Send + Sync + 'static>() {
        model(|| {
            const RUNS: usize = 2;
            let data = Arc::new(Mutex::<Int, L>::new(0));
            let handles: [_; RUNS] = core::array::from_fn(|_| {
                let data = Arc::clone(&data);
                thread::spawn(move || inc(&data))
            });
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(RUNS, get(&data));
        });
    }

    /// As [`lock_join`], with every thread reentering before it mutates.
    pub(crate) fn reentrant_lock_join<L: RawLock + Send + Sync + 'static>() {
        model(|| {
            const RUNS: usize = 2;
            let data = Arc::new(Mutex::<Int, L>::new(0));
            let handles: [_; RUNS] = core::array::from_fn(|_| {
                let data = Arc::clone(&data);
                thread::spawn(move || inc_nested(&data))
            });
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(RUNS, get(&data));
        });
    }
}
