//! A value wrapped behind any of the raw locks, with scoped acquisition.

use core::fmt::{self, Debug, Display, Formatter};
use core::marker::PhantomData;

#[cfg(not(all(loom, test)))]
use core::ops::Deref;

use crate::cfg::cell::UnsafeCell;
use crate::lock::RawLock;

/// A reentrant mutual exclusion primitive useful for protecting shared data.
///
/// The mutex is generic over the raw lock `L`, so every lock variant in this
/// crate shares one data-carrying wrapper. The data can only be accessed
/// through the RAII guards returned by [`lock`] and [`try_lock`], which
/// guarantee the data is only ever touched while the mutex is held.
///
/// Because the same thread may hold several guards at once, guards hand out
/// *shared* references only. Wrap the data in [`Cell`], [`RefCell`] or
/// atomics to mutate it, as with any reentrant mutex.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use retlock::split::spins::Mutex;
///
/// let mutex = Mutex::new(Cell::new(0));
///
/// let outer = mutex.lock();
/// let inner = mutex.lock();
/// inner.set(inner.get() + 1);
/// drop(inner);
/// drop(outer);
///
/// assert_eq!(mutex.lock().get(), 1);
/// ```
///
/// [`lock`]: Mutex::lock
/// [`try_lock`]: Mutex::try_lock
/// [`Cell`]: core::cell::Cell
/// [`RefCell`]: core::cell::RefCell
pub struct Mutex<T: ?Sized, L> {
    raw: L,
    data: UnsafeCell<T>,
}

// Holding the lock hands out shared references to the data from the locking
// thread only, so `T: Send` is both necessary and sufficient for sharing
// the mutex, same as `std::sync::ReentrantLock`.
unsafe impl<T: ?Sized + Send, L: Send> Send for Mutex<T, L> {}
unsafe impl<T: ?Sized + Send, L: Sync> Sync for Mutex<T, L> {}

impl<T, L: RawLock> Mutex<T, L> {
    /// Creates a new mutex in an unlocked state ready for use.
    ///
    /// # Examples
    ///
    /// ```
    /// use retlock::sameline::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    /// assert_eq!(*mutex.lock(), 0);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Self { raw: L::new(), data: UnsafeCell::new(value) }
    }

    /// Consumes this mutex, returning the underlying data.
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, L: RawLock> Mutex<T, L> {
    /// Acquires this mutex, waiting until it is able to do so.
    ///
    /// Returns a guard that releases one level of the hold when dropped. If
    /// the current thread already holds the mutex this is non-blocking and
    /// guaranteed to succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::thread;
    ///
    /// use retlock::queue::spins::Mutex;
    ///
    /// let mutex = Arc::new(Mutex::new(10));
    /// let c_mutex = Arc::clone(&mutex);
    ///
    /// thread::spawn(move || {
    ///     assert_eq!(*c_mutex.lock(), 10);
    /// })
    /// .join().expect("thread::spawn failed");
    /// ```
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, L> {
        self.raw.lock();
        MutexGuard::new(self)
    }

    /// Attempts to acquire this mutex without waiting.
    ///
    /// Returns `None` if another thread holds the mutex. Always succeeds if
    /// the current thread already holds it.
    ///
    /// # Examples
    ///
    /// ```
    /// use retlock::split::yields::Mutex;
    ///
    /// let mutex = Mutex::new(0);
    ///
    /// let guard = mutex.try_lock().expect("uncontended");
    /// // Reentrant tries always succeed.
    /// assert!(mutex.try_lock().is_some());
    /// # drop(guard);
    /// ```
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, L>> {
        self.raw.try_lock().then(|| MutexGuard::new(self))
    }

    /// Acquires this mutex and then runs the closure against its guard.
    ///
    /// # Examples
    ///
    /// ```
    /// use retlock::sameline::spins::Mutex;
    ///
    /// let mutex = Mutex::new(42);
    /// assert_eq!(mutex.lock_then(|guard| *guard), 42);
    /// ```
    #[inline]
    pub fn lock_then<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(MutexGuard<'_, T, L>) -> Ret,
    {
        f(self.lock())
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs
    /// to take place: the mutable borrow statically guarantees no guards
    /// exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use retlock::split::spins::Mutex;
    ///
    /// let mut mutex = Mutex::new(0);
    /// *mutex.get_mut() = 10;
    /// assert_eq!(*mutex.lock(), 10);
    /// ```
    #[cfg(not(all(loom, test)))]
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default, L: RawLock> Default for Mutex<T, L> {
    /// Creates a `Mutex<T, L>` with the `Default` value for `T`.
    #[inline]
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl<T, L: RawLock> From<T> for Mutex<T, L> {
    /// Creates a `Mutex<T, L>` from an instance of `T`.
    #[inline]
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + Debug, L: RawLock> Debug for Mutex<T, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        self.lock_then(|guard| guard.with(|data| d.field("data", &data).finish()))
    }
}

/// An RAII implementation of a "scoped lock" of a mutex. When this structure
/// is dropped (falls out of scope), one level of the hold is released.
///
/// The data protected by the mutex can be accessed through this guard via
/// its [`Deref`] implementation. There is no `DerefMut`: several guards may
/// be live on the owning thread at once.
///
/// [`Deref`]: core::ops::Deref
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized, L: RawLock> {
    lock: &'a Mutex<T, L>,
    // Unlocking must happen on the thread that acquired, so the guard stays
    // on it.
    marker: PhantomData<*mut ()>,
}

unsafe impl<T: ?Sized + Sync, L: RawLock + Sync> Sync for MutexGuard<'_, T, L> {}

impl<'a, T: ?Sized, L: RawLock> MutexGuard<'a, T, L> {
    const fn new(lock: &'a Mutex<T, L>) -> Self {
        Self { lock, marker: PhantomData }
    }

    /// Runs `f` against a shared reference to the underlying data.
    pub(crate) fn with<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(&T) -> Ret,
    {
        // SAFETY: a live guard means this thread holds the lock, and guards
        // only ever hand out shared references.
        unsafe { self.lock.data.with_unchecked(f) }
    }

    /// Runs `f` against the Loom tracked mutable pointer to the underlying
    /// data, so models observe the access.
    ///
    /// Callers must not let this overlap any other access to the data; the
    /// models take one guard per thread and touch the data exactly once.
    #[cfg(all(loom, test))]
    pub(crate) fn with_mut<F, Ret>(&self, f: F) -> Ret
    where
        F: FnOnce(*mut T) -> Ret,
    {
        self.lock.data.loom_cell().with_mut(f)
    }
}

impl<T: ?Sized, L: RawLock> Drop for MutexGuard<'_, T, L> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: guards are neither sent nor cloned, so this drop runs on
        // the thread that acquired, exactly once per acquisition.
        unsafe { self.lock.raw.unlock() }
    }
}

impl<T: ?Sized + Debug, L: RawLock> Debug for MutexGuard<'_, T, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|data| data.fmt(f))
    }
}

impl<T: ?Sized + Display, L: RawLock> Display for MutexGuard<'_, T, L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.with(|data| data.fmt(f))
    }
}

#[cfg(not(all(loom, test)))]
impl<T: ?Sized, L: RawLock> Deref for MutexGuard<'_, T, L> {
    type Target = T;

    /// Dereferences the guard to access the underlying data.
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: a live guard means this thread holds the lock, and guards
        // only ever hand out shared references.
        unsafe { &*self.lock.data.get() }
    }
}

#[cfg(all(not(loom), test))]
mod test {
    use crate::relax::Yield;
    use crate::test::tests;

    type Lock = crate::split::RawMutex<Yield>;

    #[test]
    fn smoke() {
        tests::smoke::<Lock>();
    }

    #[test]
    fn test_guard_debug_display() {
        tests::guard_debug_display::<Lock>();
    }

    #[test]
    fn test_mutex_debug() {
        tests::mutex_debug::<Lock>();
    }

    #[test]
    fn test_mutex_default() {
        tests::mutex_default::<Lock>();
    }

    #[test]
    fn test_mutex_from() {
        tests::mutex_from::<Lock>();
    }

    #[test]
    fn test_get_mut() {
        tests::get_mut::<Lock>();
    }

    #[test]
    fn test_into_inner() {
        tests::into_inner::<Lock>();
    }
}
