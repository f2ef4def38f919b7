//! Aliases that resolve to either `core`/`std` primitives or their Loom
//! instrumented counterparts, depending on whether the crate is compiled
//! under `--cfg loom` for model checking.

pub(crate) mod atomic {
    #[cfg(all(loom, test))]
    pub(crate) use loom::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64};

    #[cfg(not(all(loom, test)))]
    pub(crate) use core::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64};
}

pub(crate) mod hint {
    #[cfg(all(loom, test))]
    pub(crate) use loom::hint::spin_loop;

    #[cfg(not(all(loom, test)))]
    pub(crate) use core::hint::spin_loop;
}

pub(crate) mod thread {
    #[cfg(all(loom, test))]
    pub(crate) use loom::thread::yield_now;

    #[cfg(not(all(loom, test)))]
    pub(crate) use std::thread::yield_now;
}

pub(crate) mod cell {
    #[cfg(all(loom, test))]
    pub(crate) use self::loom_cell::UnsafeCell;

    #[cfg(not(all(loom, test)))]
    pub(crate) use self::core_cell::UnsafeCell;

    #[cfg(all(loom, test))]
    mod loom_cell {
        /// A Loom backed cell for the data a lock protects.
        #[derive(Debug)]
        pub(crate) struct UnsafeCell<T: ?Sized>(loom::cell::UnsafeCell<T>);

        impl<T> UnsafeCell<T> {
            pub(crate) fn new(value: T) -> Self {
                Self(loom::cell::UnsafeCell::new(value))
            }
        }

        impl<T: ?Sized> UnsafeCell<T> {
            /// Runs `f` against a shared reference to the underlying data.
            ///
            /// # Safety
            ///
            /// Caller must guarantee there is no active exclusive access to
            /// the underlying data for the whole duration of `f`.
            pub(crate) unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
            where
                F: FnOnce(&T) -> Ret,
            {
                self.0.with(|ptr| f(unsafe { &*ptr }))
            }

            /// The Loom cell itself, so models can track guard accesses.
            pub(crate) fn loom_cell(&self) -> &loom::cell::UnsafeCell<T> {
                &self.0
            }
        }
    }

    #[cfg(not(all(loom, test)))]
    mod core_cell {
        /// A thin wrapper over [`core::cell::UnsafeCell`] mirroring the API
        /// of the Loom backed variant.
        #[derive(Debug)]
        pub(crate) struct UnsafeCell<T: ?Sized>(core::cell::UnsafeCell<T>);

        impl<T> UnsafeCell<T> {
            pub(crate) const fn new(value: T) -> Self {
                Self(core::cell::UnsafeCell::new(value))
            }

            pub(crate) fn into_inner(self) -> T {
                self.0.into_inner()
            }
        }

        impl<T: ?Sized> UnsafeCell<T> {
            pub(crate) fn get(&self) -> *mut T {
                self.0.get()
            }

            pub(crate) fn get_mut(&mut self) -> &mut T {
                // SAFETY: the exclusive borrow of self covers the access.
                unsafe { &mut *self.0.get() }
            }

            /// Runs `f` against a shared reference to the underlying data.
            ///
            /// # Safety
            ///
            /// Caller must guarantee there is no active exclusive access to
            /// the underlying data for the whole duration of `f`.
            pub(crate) unsafe fn with_unchecked<F, Ret>(&self, f: F) -> Ret
            where
                F: FnOnce(&T) -> Ret,
            {
                f(unsafe { &*self.0.get() })
            }
        }
    }
}
