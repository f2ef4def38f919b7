//! Contention benchmark for the lock family.
//!
//! Sweeps thread counts and nesting depths over every lock variant, in two
//! shapes per configuration:
//!
//! - *back and forth*: hold one outer acquisition and run nested
//!   acquire/touch/release pairs inside it;
//! - *flat nesting*: acquire to the full depth, touch the shared data once,
//!   then release all the way down.
//!
//! Each critical section bumps two cache-padded plain counters, so lost
//! updates (a mutual exclusion failure) are detectable by comparing their
//! final sum against the reported totals. Results are appended to a CSV
//! file, one `Sum` row plus one `ForEachThread` row per thread for every
//! configuration.

use std::cell::UnsafeCell;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_utils::CachePadded;
use log::{info, warn};

use retlock::relax::{Adaptive, Backoff, Spin, Yield};
use retlock::{queue, sameline, split, RawLock};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const CSV_HEADER: &str = "Version,LockType,Type,BackAndForth,ThreadCount,ThreadID,\
                          Iteration,LockAcquisitionCount,ElapsedTime,OPS";

#[derive(Parser, Debug)]
#[command(
    name = "retlock-bench",
    version,
    disable_version_flag = true,
    about = "Benchmark for reentrant locking"
)]
struct Args {
    /// Print the current version number.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Number of worker threads at the top of the sweep.
    #[arg(short = 't', long = "thread", default_value_t = 4)]
    threads: usize,

    /// Number of nested acquisitions per iteration at the top of the sweep.
    #[arg(short = 'r', long = "recursion", default_value_t = 8)]
    recursion: usize,

    /// Seconds to run each configuration.
    #[arg(short = 'd', long = "duration", default_value_t = 10)]
    duration: u64,

    /// CSV file the results are appended to.
    #[arg(short = 'f', long = "file", default_value = "benchmark.csv")]
    filename: PathBuf,
}

#[derive(Clone)]
struct RunConfig {
    filename: PathBuf,
    num_threads: usize,
    iteration: usize,
    duration: u64,
    back_and_forth: bool,
}

/// The data every critical section touches: two plain counters on separate
/// cache lines, the classic shape for measuring lock overhead rather than
/// data contention.
#[derive(Default)]
struct SharedVar {
    foo: CachePadded<UnsafeCell<u64>>,
    bar: CachePadded<UnsafeCell<u64>>,
}

// SAFETY: the cells are only written inside critical sections of the lock
// under measurement, and only read after every worker has been joined.
unsafe impl Sync for SharedVar {}

impl SharedVar {
    /// Bumps both counters.
    ///
    /// # Safety
    ///
    /// The caller must be inside a critical section of the benchmarked lock.
    unsafe fn bump(&self) {
        unsafe {
            *self.foo.get() += 1;
            *self.bar.get() += 1;
        }
    }

    /// Reads the final counter sum. Valid once all workers have stopped.
    fn total(&self) -> u64 {
        // SAFETY: exclusive access, the workers have been joined.
        unsafe { *self.foo.get() + *self.bar.get() }
    }
}

/// The surface the workers drive: acquire and release without guard
/// scoping, so asymmetric nesting patterns are expressible.
trait BenchLock: Send + Sync + 'static {
    const REENTRANT: bool = true;

    fn new() -> Self;

    fn acquire(&self);

    /// # Safety
    ///
    /// The calling thread must hold the lock.
    unsafe fn release(&self);
}

/// Adapter for this crate's own locks.
struct Raw<L>(L);

impl<L: RawLock + Send + Sync + 'static> BenchLock for Raw<L> {
    fn new() -> Self {
        Self(L::new())
    }

    #[inline]
    fn acquire(&self) {
        self.0.lock();
    }

    #[inline]
    unsafe fn release(&self) {
        unsafe { self.0.unlock() }
    }
}

/// The non-reentrant OS-primitive baseline.
struct OsMutex(parking_lot::Mutex<()>);

impl BenchLock for OsMutex {
    const REENTRANT: bool = false;

    fn new() -> Self {
        Self(parking_lot::Mutex::new(()))
    }

    #[inline]
    fn acquire(&self) {
        mem::forget(self.0.lock());
    }

    #[inline]
    unsafe fn release(&self) {
        unsafe { self.0.force_unlock() }
    }
}

/// The reentrant OS-primitive baseline.
struct OsReentrantMutex(parking_lot::ReentrantMutex<()>);

impl BenchLock for OsReentrantMutex {
    fn new() -> Self {
        Self(parking_lot::ReentrantMutex::new(()))
    }

    #[inline]
    fn acquire(&self) {
        mem::forget(self.0.lock());
    }

    #[inline]
    unsafe fn release(&self) {
        unsafe { self.0.force_unlock() }
    }
}

/// Runs critical sections until told to stop; returns how many were
/// entered. Every critical section bumps the shared counters exactly once.
fn worker<L: BenchLock>(
    lock: &L,
    shared: &SharedVar,
    c: &RunConfig,
    start: &AtomicBool,
    stop: &AtomicBool,
) -> u64 {
    while !start.load(Relaxed) {
        thread::yield_now();
    }
    let mut sections = 0u64;
    while !stop.load(Relaxed) {
        if !L::REENTRANT {
            // Lock and unlock around every touch, no nesting.
            for _ in 0..c.iteration {
                lock.acquire();
                // SAFETY: inside the critical section.
                unsafe { shared.bump() };
                sections += 1;
                unsafe { lock.release() };
            }
        } else if c.back_and_forth {
            lock.acquire();
            unsafe { shared.bump() };
            sections += 1;
            for _ in 1..c.iteration {
                lock.acquire();
                unsafe { shared.bump() };
                sections += 1;
                unsafe { lock.release() };
            }
            unsafe { lock.release() };
        } else {
            for _ in 0..c.iteration {
                lock.acquire();
            }
            unsafe { shared.bump() };
            sections += 1;
            for _ in 0..c.iteration {
                unsafe { lock.release() };
            }
        }
    }
    sections
}

fn benchmark<L: BenchLock>(c: &RunConfig, lock_name: &str) -> io::Result<()> {
    info!(
        "lock {} thread {} iteration {} back-and-forth {}",
        lock_name, c.num_threads, c.iteration, c.back_and_forth
    );
    let lock = Arc::new(L::new());
    let shared = Arc::new(SharedVar::default());
    let start = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(c.num_threads);
    for _ in 0..c.num_threads {
        let lock = Arc::clone(&lock);
        let shared = Arc::clone(&shared);
        let c = c.clone();
        let start = Arc::clone(&start);
        let stop = Arc::clone(&stop);
        handles.push(thread::spawn(move || worker::<L>(&lock, &shared, &c, &start, &stop)));
    }

    start.store(true, Relaxed);
    let begin = Instant::now();
    thread::sleep(Duration::from_secs(c.duration));
    stop.store(true, Relaxed);

    let counts: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let elapsed = begin.elapsed();

    let total: u64 = counts.iter().sum();
    let ops = (total as f64 / elapsed.as_secs_f64()).round() as u64;
    if shared.total() != 2 * total {
        warn!(
            "lock {}: shared sum {} does not match 2 x {} critical sections, \
             updates were lost",
            lock_name,
            shared.total(),
            total
        );
    }
    info!("lock {}: {} critical sections, {} ops/s", lock_name, total, ops);

    append_csv(c, lock_name, &counts, elapsed.as_millis(), ops)
}

fn append_csv(
    c: &RunConfig,
    lock_name: &str,
    counts: &[u64],
    elapsed_ms: u128,
    ops: u64,
) -> io::Result<()> {
    let exists = c.filename.exists();
    let mut csv = OpenOptions::new().append(true).create(true).open(&c.filename)?;
    if !exists {
        writeln!(csv, "{CSV_HEADER}")?;
    }
    let total: u64 = counts.iter().sum();
    writeln!(
        csv,
        "{},\"{}\",\"Sum\",{},{},{},{},{},{},{}",
        VERSION,
        lock_name,
        c.back_and_forth as u8,
        c.num_threads,
        0,
        c.iteration,
        total,
        elapsed_ms,
        ops
    )?;
    for (i, count) in counts.iter().enumerate() {
        writeln!(
            csv,
            "{},\"{}\",\"ForEachThread\",{},{},{},{},{},{},{}",
            VERSION,
            lock_name,
            c.back_and_forth as u8,
            c.num_threads,
            i + 1,
            c.iteration,
            count,
            elapsed_ms,
            ops
        )?;
    }
    Ok(())
}

/// Benchmarks every lock variant under one configuration.
fn work(c: &RunConfig) -> io::Result<()> {
    benchmark::<OsMutex>(c, "parking_lot::Mutex")?;
    benchmark::<OsReentrantMutex>(c, "parking_lot::ReentrantMutex")?;

    benchmark::<Raw<queue::RawMutex<Spin>>>(c, "MCS")?;
    benchmark::<Raw<queue::RawMutex<Yield>>>(c, "MCS+Yield")?;
    benchmark::<Raw<queue::RawMutex<Adaptive, true>>>(c, "MCS+Adap")?;

    benchmark::<Raw<sameline::RawMutex<Spin>>>(c, "NoSleep")?;
    benchmark::<Raw<sameline::RawMutex<Yield>>>(c, "Yield")?;
    benchmark::<Raw<sameline::RawMutex<Backoff>>>(c, "Exponential")?;
    benchmark::<Raw<sameline::RawMutex<Adaptive>>>(c, "Adaptive")?;

    benchmark::<Raw<split::RawMutex<Spin>>>(c, "NoSleep+Split")?;
    benchmark::<Raw<split::RawMutex<Yield>>>(c, "Yield+Split")?;
    benchmark::<Raw<split::RawMutex<Backoff>>>(c, "Exp+Split")?;
    benchmark::<Raw<split::RawMutex<Adaptive>>>(c, "Adap+Split")?;
    Ok(())
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut thread_counts = Vec::new();
    let mut threads = args.threads.max(1);
    while threads > 0 {
        thread_counts.push(threads);
        threads = threads.saturating_sub(4);
    }
    if thread_counts.last() != Some(&1) {
        thread_counts.push(1);
    }

    for back_and_forth in [false, true] {
        let mut iteration = args.recursion.max(1);
        loop {
            for &num_threads in &thread_counts {
                let c = RunConfig {
                    filename: args.filename.clone(),
                    num_threads,
                    iteration,
                    duration: args.duration,
                    back_and_forth,
                };
                work(&c)?;
            }
            if iteration == 1 {
                break;
            }
            iteration = if iteration <= 4 { 1 } else { iteration - 4 };
        }
    }
    Ok(())
}
