//! Allocators that observe or sabotage block traffic.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

use indexmap::IndexMap;
use vailed_core::alloc::SYSTEM;
use vailed_core::Allocator;

/// Records every live block handed out through it.
///
/// Backed by the system allocator. Live blocks are kept in allocation
/// order so a leak report lists the oldest block first. Releasing or
/// reallocating an unknown pointer, or passing a layout that differs from
/// the recorded one, panics: that is a double free or a header corruption
/// in the code under test.
///
/// Zero-sized requests panic too. Every vector block carries a header, and
/// header-less copies skip the allocator when they are empty, so a
/// zero-sized request is always a bug.
#[derive(Default)]
pub struct TrackingAllocator {
    live: RefCell<IndexMap<usize, Layout>>,
    allocations: Cell<usize>,
    reallocations: Cell<usize>,
    releases: Cell<usize>,
}

impl TrackingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks allocated and not yet released.
    pub fn live_blocks(&self) -> usize {
        self.live.borrow().len()
    }

    /// Bytes held by live blocks.
    pub fn live_bytes(&self) -> usize {
        self.live.borrow().values().map(Layout::size).sum()
    }

    /// Successful `allocate` calls so far.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Successful `reallocate` calls so far.
    pub fn reallocations(&self) -> usize {
        self.reallocations.get()
    }

    /// `release` calls so far.
    pub fn releases(&self) -> usize {
        self.releases.get()
    }

    /// Whether `ptr` is the base of a live block.
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.live.borrow().contains_key(&(ptr as usize))
    }

    /// Panic with a listing of every live block, oldest first.
    pub fn assert_no_leaks(&self) {
        let live = self.live.borrow();
        if live.is_empty() {
            return;
        }
        let listing: Vec<String> = live
            .iter()
            .map(|(addr, layout)| format!("{addr:#x} ({} bytes)", layout.size()))
            .collect();
        panic!("{} leaked block(s): {}", live.len(), listing.join(", "));
    }

    fn expect_live(&self, addr: usize, layout: Layout, op: &str) {
        match self.live.borrow().get(&addr) {
            Some(recorded) => assert_eq!(
                *recorded, layout,
                "{op} of block {addr:#x} with a layout that differs from its allocation"
            ),
            None => panic!("{op} of unknown block {addr:#x} (double free?)"),
        }
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        assert!(layout.size() > 0, "zero-sized allocation request");
        let ptr = SYSTEM.allocate(layout)?;
        self.live.borrow_mut().insert(ptr.as_ptr() as usize, layout);
        self.allocations.set(self.allocations.get() + 1);
        Some(ptr)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let addr = ptr.as_ptr() as usize;
        self.expect_live(addr, old, "reallocate");
        assert!(new_size > 0, "zero-sized reallocation request");
        let new = Layout::from_size_align(new_size, old.align()).ok()?;
        // SAFETY: the block is live and was allocated by SYSTEM for `old`.
        let moved = unsafe { SYSTEM.reallocate(ptr, old, new_size) }?;
        let mut live = self.live.borrow_mut();
        live.shift_remove(&addr);
        live.insert(moved.as_ptr() as usize, new);
        self.reallocations.set(self.reallocations.get() + 1);
        Some(moved)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let addr = ptr.as_ptr() as usize;
        self.expect_live(addr, layout, "release");
        self.live.borrow_mut().shift_remove(&addr);
        self.releases.set(self.releases.get() + 1);
        // SAFETY: the block is live and was allocated by SYSTEM for `layout`.
        unsafe { SYSTEM.release(ptr, layout) }
    }
}

/// Succeeds a fixed number of allocate/reallocate calls, then returns
/// `None` for every further request until the budget is reset.
///
/// Releases always succeed. Block bookkeeping is delegated to an inner
/// [`TrackingAllocator`], reachable through [`tracker`](Self::tracker).
pub struct FailingAllocator {
    tracker: TrackingAllocator,
    budget: Cell<Option<usize>>,
}

impl FailingAllocator {
    /// Allow `successes` allocate/reallocate calls before failing.
    pub fn after(successes: usize) -> Self {
        Self {
            tracker: TrackingAllocator::new(),
            budget: Cell::new(Some(successes)),
        }
    }

    /// Fail every request.
    pub fn always() -> Self {
        Self::after(0)
    }

    /// Replace the remaining budget. `None` never fails.
    pub fn set_budget(&self, successes: Option<usize>) {
        self.budget.set(successes);
    }

    /// The bookkeeping allocator behind this one.
    pub fn tracker(&self) -> &TrackingAllocator {
        &self.tracker
    }

    fn spend(&self) -> bool {
        match self.budget.get() {
            None => true,
            Some(0) => false,
            Some(n) => {
                self.budget.set(Some(n - 1));
                true
            }
        }
    }
}

impl Allocator for FailingAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if !self.spend() {
            return None;
        }
        self.tracker.allocate(layout)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if !self.spend() {
            return None;
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.tracker.reallocate(ptr, old, new_size) }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract.
        unsafe { self.tracker.release(ptr, layout) }
    }
}
