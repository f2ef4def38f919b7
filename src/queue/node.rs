use core::cell::{Cell, RefCell};
use core::ptr::{self, NonNull};
use std::collections::HashMap;

use crossbeam_utils::CachePadded;

use crate::cfg::atomic::{AtomicPtr, AtomicU32};

/// A per-thread queue node. One node exists for each (thread, lock) pair
/// that has ever met, handed out by [`of`] and reused for every acquisition
/// of that lock by that thread.
///
/// The waiter spins on its own `waiting` flag; the predecessor stores into
/// it to hand the lock over. `next` is written once by the successor while
/// linking in and read by this node's owner on release. `depth` is this
/// thread's recursion depth while it holds the lock and is touched by no
/// one else.
pub(crate) struct Node {
    pub(crate) next: AtomicPtr<Node>,
    pub(crate) waiting: AtomicU32,
    pub(crate) depth: Cell<u64>,
}

impl Node {
    fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            waiting: AtomicU32::new(0),
            depth: Cell::new(0),
        }
    }
}

std::thread_local! {
    /// This thread's queue nodes, keyed by lock address. Entries live until
    /// the thread exits; the boxes give the nodes stable addresses that the
    /// queue protocol can link.
    static NODES: RefCell<HashMap<usize, Box<CachePadded<Node>>>> =
        RefCell::new(HashMap::new());
}

/// Returns this thread's node for the lock at `lock`, creating it on first
/// use. This is the only allocation on the locking path, paid once per
/// (thread, lock) pair.
///
/// The pointer stays valid until the thread exits. A lock address may be
/// reused after its lock is dropped; the stale node this maps to is
/// indistinguishable from a fresh one, because a correctly used node is
/// left with a zero depth and acquisition reinitializes every other field.
pub(crate) fn of(lock: usize) -> NonNull<Node> {
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        let node = nodes
            .entry(lock)
            .or_insert_with(|| Box::new(CachePadded::new(Node::new())));
        NonNull::from(&***node)
    })
}
