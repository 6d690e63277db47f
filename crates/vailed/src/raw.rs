//! The type-erased header-prefixed block.
//!
//! [`RawVailed`] knows element sizes only at runtime, which lets the typed
//! [`VailedVec`](crate::VailedVec) and the C surface share one engine. It
//! owns no destructor: blocks are released explicitly with
//! [`RawVailed::release`].
//!
//! Block layout, with `align = max(align_of::<Header>(), element_align)`:
//!
//! ```text
//! base                                   element pointer
//! │                                      │
//! ▼                                      ▼
//! [ pad ][ Header (HEADER_SIZE bytes) ][ e0 ][ e1 ] ... [ e(cap-1) ]
//! └──────────── prefix ───────────────┘
//! ```
//!
//! `prefix` is `HEADER_SIZE` rounded up to `align`, so the header always
//! sits exactly `HEADER_SIZE` bytes before the elements and both are
//! aligned.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use vailed_core::{Allocator, VecConfig, VecError};

use crate::error::Retained;

/// Metadata stored immediately before element 0.
#[repr(C)]
#[derive(Debug)]
pub struct Header<A: ?Sized> {
    /// Elements the block can hold without reallocating.
    pub capacity: usize,
    /// Elements currently initialized. Never exceeds `capacity`.
    pub length: usize,
    /// Byte size of one element, fixed at creation.
    pub element_size: usize,
    /// Alignment of one element, fixed at creation.
    pub element_align: usize,
    /// Non-owning reference to the allocator that owns the block.
    pub allocator: *const A,
}

/// Result of an operation that consumes a raw block.
pub type Relocated<A> = Result<RawVailed<A>, Retained<RawVailed<A>>>;

/// Handle to a live header-prefixed block.
///
/// The handle is the element pointer. It is not `Copy`: operations that may
/// reallocate consume it and return the (possibly moved) replacement.
pub struct RawVailed<A: ?Sized> {
    elements: NonNull<u8>,
    _allocator: PhantomData<*const A>,
}

impl<A: Allocator + ?Sized> RawVailed<A> {
    /// Distance from the header to element 0.
    pub const HEADER_SIZE: usize = mem::size_of::<Header<A>>();

    fn block_align(element_align: usize) -> usize {
        mem::align_of::<Header<A>>().max(element_align)
    }

    fn prefix(element_align: usize) -> usize {
        Self::HEADER_SIZE.next_multiple_of(Self::block_align(element_align))
    }

    fn block_layout(element: Layout, capacity: usize) -> Result<Layout, VecError> {
        let overflow = || VecError::capacity_overflow(capacity, element.size());
        let bytes = capacity
            .checked_mul(element.size())
            .and_then(|b| b.checked_add(Self::prefix(element.align())))
            .ok_or_else(overflow)?;
        Layout::from_size_align(bytes, Self::block_align(element.align())).map_err(|_| overflow())
    }

    /// Allocate a block for `capacity` elements of `element` layout.
    ///
    /// The header is written with `length = 0`.
    ///
    /// # Safety
    ///
    /// `allocator` must outlive the block: every later operation on this
    /// handle dereferences the pointer stored in the header.
    pub unsafe fn init(element: Layout, capacity: usize, allocator: &A) -> Result<Self, VecError> {
        let layout = match Self::block_layout(element, capacity) {
            Ok(layout) => layout,
            Err(e) => {
                diag!("init: {e}");
                return Err(e);
            }
        };
        let Some(base) = allocator.allocate(layout) else {
            diag!("init: allocation of {} bytes failed", layout.size());
            return Err(VecError::AllocationFailure {
                bytes: layout.size(),
            });
        };
        let prefix = Self::prefix(element.align());
        // SAFETY: the block is `layout.size() >= prefix` bytes long.
        let elements = unsafe { base.add(prefix) };
        let header = Header {
            capacity,
            length: 0,
            element_size: element.size(),
            element_align: element.align(),
            allocator: allocator as *const A,
        };
        // SAFETY: the header slot lies inside the block and is aligned
        // because `prefix - HEADER_SIZE` is a multiple of the header
        // alignment.
        unsafe {
            elements
                .sub(Self::HEADER_SIZE)
                .cast::<Header<A>>()
                .write(header)
        };
        Ok(Self::wrap(elements))
    }

    /// Rebuild a handle from an element pointer.
    ///
    /// # Safety
    ///
    /// `elements` must come from [`RawVailed::into_raw`] (or
    /// [`as_ptr`](RawVailed::as_ptr) of a handle that is no longer used)
    /// of a block that is still live, and its allocator must still be live.
    pub unsafe fn from_raw(elements: NonNull<u8>) -> Self {
        Self::wrap(elements)
    }

    fn wrap(elements: NonNull<u8>) -> Self {
        Self {
            elements,
            _allocator: PhantomData,
        }
    }

    /// Give up the handle, returning the element pointer.
    pub fn into_raw(self) -> NonNull<u8> {
        self.elements
    }

    /// The element pointer.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.elements
    }

    fn header_ptr(&self) -> *mut Header<A> {
        self.elements
            .as_ptr()
            .wrapping_sub(Self::HEADER_SIZE)
            .cast::<Header<A>>()
    }

    /// The metadata header.
    pub fn header(&self) -> &Header<A> {
        // SAFETY: a handle always refers to a live block whose header was
        // written by `init` (constructor invariant).
        let header = unsafe { &*self.header_ptr() };
        #[cfg(feature = "debug-diagnostics")]
        self.assert_aligned(header);
        header
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header<A> {
        // SAFETY: as in `header`; `&mut self` gives exclusive access.
        unsafe { &mut *self.header_ptr() }
    }

    #[cfg(feature = "debug-diagnostics")]
    fn assert_aligned(&self, header: &Header<A>) {
        let addr = self.elements.as_ptr() as usize;
        assert_eq!(
            addr % Self::block_align(header.element_align),
            0,
            "vailed: element pointer {addr:#x} is misaligned"
        );
        assert_eq!(
            (addr - Self::HEADER_SIZE) % mem::align_of::<Header<A>>(),
            0,
            "vailed: header at {:#x} is misaligned",
            addr - Self::HEADER_SIZE
        );
    }

    /// Whether both the element pointer and the header are aligned.
    pub fn is_aligned(&self) -> bool {
        let addr = self.elements.as_ptr() as usize;
        let header = self.header();
        addr % Self::block_align(header.element_align) == 0
            && (addr - Self::HEADER_SIZE) % mem::align_of::<Header<A>>() == 0
    }

    /// Elements the block can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.header().capacity
    }

    /// Elements currently initialized.
    pub fn len(&self) -> usize {
        self.header().length
    }

    /// Whether the length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte size of one element.
    pub fn element_size(&self) -> usize {
        self.header().element_size
    }

    /// Whether one more element fits without growing.
    pub fn can_append(&self) -> bool {
        let header = self.header();
        header.length < header.capacity
    }

    /// [`can_append`](Self::can_append) as a result: [`VecError::Full`] when
    /// no slot is free.
    pub fn check_room(&self) -> Result<(), VecError> {
        if self.can_append() {
            Ok(())
        } else {
            Err(VecError::Full {
                capacity: self.capacity(),
            })
        }
    }

    /// Set the length. Rejects lengths above capacity.
    ///
    /// Bytes are not touched: lengthening exposes whatever the slots hold.
    pub fn set_len(&mut self, length: usize) -> Result<(), VecError> {
        let capacity = self.capacity();
        if length > capacity {
            diag!("set_len: length {length} exceeds capacity {capacity}");
            return Err(VecError::invalid(format!(
                "length {length} exceeds capacity {capacity}"
            )));
        }
        self.header_mut().length = length;
        Ok(())
    }

    fn element_layout(&self) -> Layout {
        let header = self.header();
        // SAFETY: the pair was validated by `Layout::from_size_align` when
        // the block was created (`init` takes a `Layout`).
        unsafe { Layout::from_size_align_unchecked(header.element_size, header.element_align) }
    }

    fn base(&self) -> NonNull<u8> {
        let prefix = Self::prefix(self.header().element_align);
        // SAFETY: element 0 is exactly `prefix` bytes past the block start.
        unsafe { self.elements.sub(prefix) }
    }

    fn allocator(&self) -> Option<&A> {
        // SAFETY: the allocator outlives the block (`init` contract).
        unsafe { self.header().allocator.as_ref() }
    }

    /// Pointer to slot `index`. Slots at or past the length are
    /// uninitialized; `index == capacity` is the one-past-the-end pointer.
    pub fn slot(&self, index: usize) -> *mut u8 {
        debug_assert!(index <= self.capacity());
        self.elements
            .as_ptr()
            .wrapping_add(index * self.element_size())
    }

    /// Reallocate to hold exactly `capacity` elements.
    ///
    /// A capacity below the current length is rejected. On any failure the
    /// block is untouched and handed back.
    pub fn resize(self, capacity: usize) -> Relocated<A> {
        let length = self.len();
        if capacity < length {
            diag!("resize: capacity {capacity} is below length {length}");
            return Err(Retained::new(
                self,
                VecError::invalid(format!("capacity {capacity} is below length {length}")),
            ));
        }
        self.reallocate(capacity)
    }

    /// Resize to the current length.
    pub fn shrink_to_fit(self) -> Relocated<A> {
        let length = self.len();
        self.resize(length)
    }

    /// Make room for one more element, growing to `(capacity + 1) * 2` when
    /// full.
    pub fn reserve_one(self) -> Relocated<A> {
        if self.can_append() {
            return Ok(self);
        }
        let capacity = self.capacity();
        match VecConfig::grow_one(capacity) {
            Some(next) => self.reallocate(next),
            None => {
                let element_size = self.element_size();
                Err(Retained::new(
                    self,
                    VecError::capacity_overflow(capacity, element_size),
                ))
            }
        }
    }

    /// Make room for `additional` more elements in one reallocation.
    pub fn reserve(self, additional: usize) -> Relocated<A> {
        let (length, capacity) = (self.len(), self.capacity());
        let Some(needed) = length.checked_add(additional) else {
            let element_size = self.element_size();
            return Err(Retained::new(
                self,
                VecError::capacity_overflow(usize::MAX, element_size),
            ));
        };
        if needed <= capacity {
            return Ok(self);
        }
        self.reallocate(VecConfig::grow_batch(capacity, needed))
    }

    fn reallocate(self, capacity: usize) -> Relocated<A> {
        let element = self.element_layout();
        let old = match Self::block_layout(element, self.capacity()) {
            Ok(layout) => layout,
            Err(e) => return Err(Retained::new(self, e)),
        };
        let new = match Self::block_layout(element, capacity) {
            Ok(layout) => layout,
            Err(e) => {
                diag!("resize: {e}");
                return Err(Retained::new(self, e));
            }
        };
        let Some(allocator) = self.allocator() else {
            diag!("resize: null allocator in header");
            return Err(Retained::new(self, VecError::invalid("null allocator in header")));
        };
        // SAFETY: `base`/`old` describe the live block this allocator
        // handed out.
        let moved = unsafe { allocator.reallocate(self.base(), old, new.size()) };
        let Some(base) = moved else {
            diag!("resize: reallocation to {} bytes failed", new.size());
            return Err(Retained::new(
                self,
                VecError::AllocationFailure { bytes: new.size() },
            ));
        };
        // SAFETY: the new block is `new.size() >= prefix` bytes long and
        // begins with the preserved header.
        let elements = unsafe { base.add(Self::prefix(element.align())) };
        let mut raw = Self::wrap(elements);
        raw.header_mut().capacity = capacity;
        Ok(raw)
    }

    /// Release the block through the allocator stored in its header.
    ///
    /// Element destructors are not run. If the header carries no allocator
    /// the block cannot be released and is leaked.
    pub fn release(self) -> Result<(), VecError> {
        let Some(allocator) = self.allocator() else {
            diag!("release: null allocator in header");
            return Err(VecError::invalid("null allocator in header"));
        };
        let layout = Self::block_layout(self.element_layout(), self.capacity())?;
        // SAFETY: the handle is consumed, so the block is released once.
        unsafe { allocator.release(self.base(), layout) };
        Ok(())
    }

    /// Shift `[index, length)` right by one slot and bump the length.
    ///
    /// # Safety
    ///
    /// Requires `index <= length < capacity`. Slot `index` keeps a bitwise
    /// duplicate of its old contents and must be overwritten before it is
    /// read as an owned value.
    pub unsafe fn open_gap(&mut self, index: usize) {
        let (length, size) = (self.len(), self.element_size());
        debug_assert!(index <= length && length < self.capacity());
        // SAFETY: both ranges lie inside the element buffer; `ptr::copy`
        // handles the overlap.
        unsafe { ptr::copy(self.slot(index), self.slot(index + 1), (length - index) * size) };
        self.header_mut().length = length + 1;
    }

    /// Shift `(index, length)` left by one slot and drop the length by one,
    /// preserving the order of the remaining elements.
    ///
    /// # Safety
    ///
    /// Requires `index < length`. The element in slot `index` must already
    /// have been moved out.
    pub unsafe fn close_gap(&mut self, index: usize) {
        let (length, size) = (self.len(), self.element_size());
        debug_assert!(index < length);
        // SAFETY: both ranges lie inside the initialized prefix.
        unsafe { ptr::copy(self.slot(index + 1), self.slot(index), (length - index - 1) * size) };
        self.header_mut().length = length - 1;
    }

    /// Move the last element into slot `index` and drop the length by one.
    ///
    /// # Safety
    ///
    /// Requires `index < length`. The element in slot `index` must already
    /// have been moved out.
    pub unsafe fn swap_out(&mut self, index: usize) {
        let (length, size) = (self.len(), self.element_size());
        debug_assert!(index < length);
        let last = length - 1;
        if index != last {
            // SAFETY: distinct, in-bounds slots.
            unsafe { ptr::copy_nonoverlapping(self.slot(last), self.slot(index), size) };
        }
        self.header_mut().length = last;
    }
}

impl<A: Allocator + ?Sized> fmt::Debug for RawVailed<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawVailed")
            .field("elements", &self.elements)
            .field("capacity", &self.capacity())
            .field("length", &self.len())
            .field("element_size", &self.element_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vailed_core::SystemAllocator;
    use vailed_test_utils::{FailingAllocator, TrackingAllocator};

    fn int_block(capacity: usize, alloc: &TrackingAllocator) -> RawVailed<TrackingAllocator> {
        unsafe { RawVailed::init(Layout::new::<u32>(), capacity, alloc).unwrap() }
    }

    fn push_u32(raw: RawVailed<TrackingAllocator>, value: u32) -> RawVailed<TrackingAllocator> {
        let mut raw = raw.reserve_one().unwrap();
        let len = raw.len();
        unsafe { raw.slot(len).cast::<u32>().write(value) };
        raw.set_len(len + 1).unwrap();
        raw
    }

    fn read_u32(raw: &RawVailed<TrackingAllocator>, index: usize) -> u32 {
        unsafe { raw.slot(index).cast::<u32>().read() }
    }

    #[test]
    fn header_sits_right_before_elements() {
        let alloc = TrackingAllocator::new();
        let raw = int_block(8, &alloc);
        let header_addr = raw.header() as *const Header<TrackingAllocator> as usize;
        assert_eq!(
            header_addr + RawVailed::<TrackingAllocator>::HEADER_SIZE,
            raw.as_ptr().as_ptr() as usize
        );
        assert!(raw.is_aligned());
        raw.release().unwrap();
        alloc.assert_no_leaks();
    }

    #[test]
    fn init_writes_header_fields() {
        let alloc = TrackingAllocator::new();
        let raw = int_block(16, &alloc);
        assert_eq!(raw.capacity(), 16);
        assert_eq!(raw.len(), 0);
        assert_eq!(raw.element_size(), 4);
        assert_eq!(raw.header().element_align, 4);
        raw.release().unwrap();
    }

    #[test]
    fn over_aligned_elements_stay_aligned() {
        #[repr(align(64))]
        struct Wide([u8; 64]);
        let alloc = TrackingAllocator::new();
        let raw = unsafe { RawVailed::init(Layout::new::<Wide>(), 3, &alloc).unwrap() };
        assert_eq!(raw.as_ptr().as_ptr() as usize % 64, 0);
        assert!(raw.is_aligned());
        let raw = raw.resize(40).unwrap();
        assert_eq!(raw.as_ptr().as_ptr() as usize % 64, 0);
        raw.release().unwrap();
        alloc.assert_no_leaks();
    }

    #[test]
    fn reserve_one_doubles_plus_one() {
        let alloc = TrackingAllocator::new();
        let mut raw = int_block(0, &alloc);
        raw = push_u32(raw, 7);
        assert_eq!(raw.capacity(), 2);
        raw = push_u32(raw, 8);
        raw = push_u32(raw, 9);
        assert_eq!(raw.capacity(), 6);
        assert_eq!((read_u32(&raw, 0), read_u32(&raw, 2)), (7, 9));
        raw.release().unwrap();
        alloc.assert_no_leaks();
    }

    #[test]
    fn reserve_batch_jumps_past_doubling() {
        let alloc = TrackingAllocator::new();
        let raw = int_block(4, &alloc);
        let raw = raw.reserve(100).unwrap();
        assert_eq!(raw.capacity(), 100);
        let raw = raw.reserve(50).unwrap();
        assert_eq!(raw.capacity(), 100);
        raw.release().unwrap();
    }

    #[test]
    fn resize_below_length_is_rejected() {
        let alloc = TrackingAllocator::new();
        let mut raw = int_block(4, &alloc);
        for v in 0..4 {
            raw = push_u32(raw, v);
        }
        let retained = raw.resize(2).unwrap_err();
        assert!(matches!(retained.error(), VecError::InvalidArgument { .. }));
        let raw = retained.into_vector();
        assert_eq!(raw.capacity(), 4);
        assert_eq!(raw.len(), 4);
        raw.release().unwrap();
    }

    #[test]
    fn debug_shows_header_fields() {
        let alloc = TrackingAllocator::new();
        let raw = push_u32(int_block(4, &alloc), 7);
        let shown = format!("{raw:?}");
        assert!(shown.starts_with("RawVailed"));
        assert!(shown.contains("capacity: 4"));
        assert!(shown.contains("length: 1"));
        assert!(shown.contains("element_size: 4"));
        raw.release().unwrap();
    }

    #[test]
    fn set_len_is_bounds_checked() {
        let alloc = TrackingAllocator::new();
        let mut raw = int_block(4, &alloc);
        assert!(raw.set_len(5).is_err());
        raw.set_len(4).unwrap();
        assert_eq!(raw.len(), 4);
        raw.release().unwrap();
    }

    #[test]
    fn failed_reallocation_leaves_block_untouched() {
        let alloc = FailingAllocator::after(1);
        let mut raw = unsafe { RawVailed::init(Layout::new::<u32>(), 1, &alloc).unwrap() };
        unsafe { raw.slot(0).cast::<u32>().write(41) };
        raw.set_len(1).unwrap();
        let before = raw.as_ptr();
        let retained = raw.reserve_one().unwrap_err();
        assert!(matches!(
            retained.error(),
            VecError::AllocationFailure { .. }
        ));
        let raw = retained.into_vector();
        assert_eq!(raw.as_ptr(), before);
        assert_eq!((raw.len(), raw.capacity()), (1, 1));
        assert_eq!(unsafe { raw.slot(0).cast::<u32>().read() }, 41);
        raw.release().unwrap();
        alloc.tracker().assert_no_leaks();
    }

    #[test]
    fn gap_moves_preserve_neighbours() {
        let alloc = TrackingAllocator::new();
        let mut raw = int_block(8, &alloc);
        for v in [10, 20, 30] {
            raw = push_u32(raw, v);
        }
        unsafe {
            raw.open_gap(1);
            raw.slot(1).cast::<u32>().write(15);
        }
        let values: Vec<u32> = (0..raw.len()).map(|i| read_u32(&raw, i)).collect();
        assert_eq!(values, [10, 15, 20, 30]);

        unsafe { raw.close_gap(0) };
        let values: Vec<u32> = (0..raw.len()).map(|i| read_u32(&raw, i)).collect();
        assert_eq!(values, [15, 20, 30]);

        unsafe { raw.swap_out(0) };
        let values: Vec<u32> = (0..raw.len()).map(|i| read_u32(&raw, i)).collect();
        assert_eq!(values, [30, 20]);
        raw.release().unwrap();
    }

    #[test]
    fn capacity_overflow_is_reported_not_allocated() {
        let err = unsafe { RawVailed::init(Layout::new::<u64>(), usize::MAX / 2, &SystemAllocator) }
            .err()
            .unwrap();
        assert!(matches!(err, VecError::InvalidArgument { .. }));
    }

    #[test]
    fn into_raw_round_trips_the_handle() {
        let alloc = TrackingAllocator::new();
        let raw = int_block(2, &alloc);
        let ptr = raw.into_raw();
        let raw = unsafe { RawVailed::<TrackingAllocator>::from_raw(ptr) };
        assert_eq!(raw.capacity(), 2);
        raw.release().unwrap();
        alloc.assert_no_leaks();
    }
}
