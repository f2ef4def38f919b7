//! A family of reentrant mutual-exclusion locks shaped to keep contention
//! cheap on multicore hardware.
//!
//! Every lock in this crate may be acquired repeatedly by the thread that
//! already holds it, and is freed by the matching number of releases. The
//! variants differ in how they lay out their state across cache lines and in
//! how waiters burn (or yield) their time, so that workloads with different
//! reentrance and contention profiles can be measured against each other
//! behind one interface:
//!
//! - [`split`] keeps the atomic lock word and the holder's recursion counter
//!   on separate cache lines, and publishes a smoothed estimate of the last
//!   holder's nesting depth that waiters may use to pace themselves.
//! - [`sameline`] packs the owner and the recursion counter into a single
//!   64-bit word, trading atomic stores on the reentry path for a smaller
//!   footprint.
//! - [`queue`] is an MCS-style queue lock: each waiter spins on a flag in its
//!   own, locally-accessible node, which avoids bouncing the hot lock word
//!   between caches and grants the lock in FIFO order among distinct threads.
//!
//! All variants expose the same three operations, `lock`, `try_lock` and
//! `unlock`, through the [`RawLock`] trait, and all of them can be paired
//! with any of the waiting policies from the [`relax`] module. The policy is
//! a type parameter, so the choice is compiled into the spin loop rather than
//! branched on at runtime.
//!
//! ## Spinlock use cases
//!
//! It is noteworthy to mention that [spinlocks are usually not what you want].
//! The majority of use cases are well covered by OS-based mutexes like
//! [`std::sync::Mutex`] or `parking_lot::Mutex`, which park waiting threads
//! instead of burning cycles. Busy-wait locks pay off only when critical
//! sections are short and the cost of a context switch dominates, which is
//! precisely the regime this crate is written to explore.
//!
//! ## Protected data
//!
//! [`Mutex`] wraps a value of type `T` behind any of the raw locks. Because
//! acquisitions may nest, its RAII guard hands out *shared* references only;
//! mutate through [`Cell`], [`RefCell`] or atomics, the same way you would
//! with a reentrant mutex from the standard library.
//!
//! ```
//! use std::cell::Cell;
//! use std::sync::Arc;
//! use std::thread;
//!
//! // A queue lock that yields while waiting in line.
//! use retlock::queue::yields::Mutex;
//!
//! let counter = Arc::new(Mutex::new(Cell::new(0)));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let counter = Arc::clone(&counter);
//!         thread::spawn(move || {
//!             let outer = counter.lock();
//!             // Reentry is thread-local and cannot deadlock.
//!             let inner = counter.lock();
//!             inner.set(inner.get() + 1);
//!             drop(inner);
//!             drop(outer);
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(counter.lock().get(), 4);
//! ```
//!
//! ## Features
//!
//! This crate does not enable any feature by default. The `bench` feature
//! builds the `retlock-bench` binary, a contention benchmark that sweeps
//! thread counts and nesting depths over every variant and appends its
//! measurements to a CSV file.
//!
//! [spinlocks are usually not what you want]: https://matklad.github.io/2020/01/02/spinlocks-considered-harmful.html
//! [`Cell`]: core::cell::Cell
//! [`RefCell`]: core::cell::RefCell

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::inline_always)]
#![warn(rust_2021_compatibility)]
#![warn(missing_docs)]

#[cfg(not(all(target_has_atomic = "64", target_pointer_width = "64")))]
compile_error!("the packed lock words require a 64-bit target with lock-free 64-bit atomics");

pub mod queue;
pub mod relax;
pub mod sameline;
pub mod split;

mod lock;
mod mutex;

pub use lock::RawLock;
pub use mutex::{Mutex, MutexGuard};

pub(crate) mod cfg;
pub(crate) mod tid;

#[cfg(test)]
pub(crate) mod test;

#[cfg(all(loom, test))]
pub(crate) mod loom;
