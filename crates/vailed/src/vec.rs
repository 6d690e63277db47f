//! The typed vector.
//!
//! [`VailedVec`] is a pointer-sized handle to a header-prefixed block of
//! `T`. It dereferences to `[T]` for reading, writing and iteration.
//! Operations that may reallocate (`push_back`, `push_many`, `insert`,
//! `resize`, `reserve`, `shrink_to_fit`) take the vector by value and
//! return the replacement, so a stale handle cannot be used after a move.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::slice;

use vailed_core::alloc::SYSTEM;
use vailed_core::{Allocator, SystemAllocator, VecConfig, VecError};

use crate::copy::PlainBuffer;
use crate::error::Retained;
use crate::raw::{RawVailed, Relocated};

/// A growable array whose metadata lives just before its elements.
///
/// The allocator is borrowed for `'a` and never owned; any number of
/// vectors may share one. Dropping the vector drops its elements and
/// releases the block through that allocator.
///
/// ```
/// use vailed::VailedVec;
///
/// let v = VailedVec::new().unwrap();
/// let v = v.push_back(10).unwrap().push_back(20).unwrap();
/// assert_eq!(&v[..], &[10, 20]);
/// ```
pub struct VailedVec<'a, T, A: Allocator + ?Sized = SystemAllocator> {
    raw: RawVailed<A>,
    _marker: PhantomData<(T, &'a A)>,
}

/// Result of an operation that consumes a vector.
pub type Grown<'a, T, A> = Result<VailedVec<'a, T, A>, Retained<VailedVec<'a, T, A>>>;

// SAFETY: the vector owns its elements like `Vec<T>`; the allocator is only
// reached through a shared reference.
unsafe impl<T: Send, A: Allocator + Sync + ?Sized> Send for VailedVec<'_, T, A> {}

// SAFETY: `&VailedVec` only hands out `&T` and `&A`.
unsafe impl<T: Sync, A: Allocator + Sync + ?Sized> Sync for VailedVec<'_, T, A> {}

impl<T> VailedVec<'static, T> {
    /// An empty vector with the default capacity on the system allocator.
    pub fn new() -> Result<Self, VecError> {
        Self::with_capacity(VecConfig::DEFAULT_CAPACITY)
    }

    /// An empty vector with room for `capacity` elements on the system
    /// allocator.
    pub fn with_capacity(capacity: usize) -> Result<Self, VecError> {
        Self::with_capacity_in(capacity, &SYSTEM)
    }

    /// An empty vector built from `config` on the system allocator.
    pub fn from_config(config: &VecConfig) -> Result<Self, VecError> {
        Self::from_config_in(config, &SYSTEM)
    }
}

impl<'a, T, A: Allocator + ?Sized> VailedVec<'a, T, A> {
    /// An empty vector with the default capacity.
    pub fn new_in(allocator: &'a A) -> Result<Self, VecError> {
        Self::with_capacity_in(VecConfig::DEFAULT_CAPACITY, allocator)
    }

    /// An empty vector built from `config`.
    pub fn from_config_in(config: &VecConfig, allocator: &'a A) -> Result<Self, VecError> {
        Self::with_capacity_in(config.initial_capacity, allocator)
    }

    /// An empty vector with room for `capacity` elements.
    pub fn with_capacity_in(capacity: usize, allocator: &'a A) -> Result<Self, VecError> {
        // SAFETY: the `'a` borrow keeps the allocator alive at least as long
        // as the vector.
        let raw = unsafe { RawVailed::init(Layout::new::<T>(), capacity, allocator)? };
        Ok(Self::wrap(raw))
    }

    fn wrap(raw: RawVailed<A>) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    fn into_block(self) -> RawVailed<A> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the block has a single owner.
        unsafe { ptr::read(&this.raw) }
    }

    fn relocated(result: Relocated<A>) -> Grown<'a, T, A> {
        result.map(Self::wrap).map_err(|r| r.map(Self::wrap))
    }

    /// Drop every element and release the block.
    ///
    /// Equivalent to dropping the vector, except that a release failure is
    /// reported instead of swallowed.
    pub fn free(mut self) -> Result<(), VecError> {
        self.clear();
        self.into_block().release()
    }

    /// Elements currently stored.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Whether no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Elements the current block holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Byte size of one element as recorded in the header.
    pub fn element_size(&self) -> usize {
        self.raw.element_size()
    }

    /// Whether one more element fits without growing.
    pub fn can_append(&self) -> bool {
        self.raw.can_append()
    }

    /// `Ok` when one more element fits without growing, otherwise the
    /// advisory [`VecError::Full`].
    pub fn check_room(&self) -> Result<(), VecError> {
        self.raw.check_room()
    }

    /// The allocator this vector was created with.
    pub fn allocator(&self) -> &'a A {
        // SAFETY: set from a `&'a A` at construction and never changed.
        unsafe { &*self.raw.header().allocator }
    }

    /// The type-erased block behind this vector.
    pub fn as_raw(&self) -> &RawVailed<A> {
        &self.raw
    }

    /// Pointer to element 0. Valid until the next relocating operation.
    pub fn as_ptr(&self) -> *const T {
        self.raw.as_ptr().as_ptr().cast::<T>()
    }

    /// Mutable pointer to element 0. Valid until the next relocating
    /// operation.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.raw.as_ptr().as_ptr().cast::<T>()
    }

    /// The stored elements.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialized and aligned.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len()) }
    }

    /// The stored elements, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        // SAFETY: as in `as_slice`; `&mut self` is exclusive.
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// Set the length directly.
    ///
    /// Lengths above capacity are rejected with
    /// [`VecError::InvalidArgument`]. Shortening does not drop the
    /// elements it cuts off.
    ///
    /// # Safety
    ///
    /// Every slot below `length` must hold an initialized `T`.
    pub unsafe fn set_length(&mut self, length: usize) -> Result<(), VecError> {
        self.raw.set_len(length)
    }

    /// Write `item` into the first free slot.
    ///
    /// # Safety
    ///
    /// Requires `len < capacity`.
    unsafe fn push_unchecked(&mut self, item: T) {
        let len = self.len();
        // SAFETY: the slot is in bounds and uninitialized (caller contract).
        unsafe { self.raw.slot(len).cast::<T>().write(item) };
        self.raw.header_mut().length = len + 1;
    }

    /// Append `item`, growing to `(capacity + 1) * 2` when full.
    ///
    /// On allocation failure the vector is returned unchanged and `item` is
    /// dropped. Use [`try_push_back`](Self::try_push_back) to get it back.
    pub fn push_back(self, item: T) -> Grown<'a, T, A> {
        self.try_push_back(item).map_err(|(retained, _)| retained)
    }

    /// Like [`push_back`](Self::push_back), but hands `item` back alongside
    /// the unchanged vector when growing fails.
    pub fn try_push_back(self, item: T) -> Result<Self, (Retained<Self>, T)> {
        match Self::relocated(self.into_block().reserve_one()) {
            Ok(mut this) => {
                // SAFETY: `reserve_one` guarantees a free slot.
                unsafe { this.push_unchecked(item) };
                Ok(this)
            }
            Err(retained) => Err((retained, item)),
        }
    }

    /// Append `item` only if it fits without growing.
    ///
    /// Hands the item back with [`VecError::Full`] otherwise.
    pub fn push_within_capacity(&mut self, item: T) -> Result<(), (T, VecError)> {
        if let Err(e) = self.check_room() {
            return Err((item, e));
        }
        // SAFETY: checked above.
        unsafe { self.push_unchecked(item) };
        Ok(())
    }

    /// Append clones of every element of `items`, growing at most once.
    pub fn push_many(self, items: &[T]) -> Grown<'a, T, A>
    where
        T: Clone,
    {
        let mut this = Self::relocated(self.into_block().reserve(items.len()))?;
        for item in items {
            // SAFETY: `reserve` made room for all of `items`.
            unsafe { this.push_unchecked(item.clone()) };
        }
        Ok(this)
    }

    /// Insert `item` at `index`, shifting later elements right.
    ///
    /// `index == len` appends. `index > len` fails with
    /// [`VecError::IndexOutOfBounds`] and changes nothing.
    pub fn insert(self, index: usize, item: T) -> Grown<'a, T, A> {
        let length = self.len();
        if index > length {
            diag!("insert: index {index} out of bounds for length {length}");
            return Err(Retained::new(
                self,
                VecError::IndexOutOfBounds { index, length },
            ));
        }
        let mut this = Self::relocated(self.into_block().reserve_one())?;
        // SAFETY: `index <= len < capacity` after `reserve_one`; the gap is
        // filled immediately.
        unsafe {
            this.raw.open_gap(index);
            this.raw.slot(index).cast::<T>().write(item);
        }
        Ok(this)
    }

    /// Remove and return the last element, or [`VecError::Empty`].
    pub fn pop_back(&mut self) -> Result<T, VecError> {
        let length = self.len();
        if length == 0 {
            diag!("pop_back: empty vector");
            return Err(VecError::Empty);
        }
        self.raw.header_mut().length = length - 1;
        // SAFETY: the slot was initialized and is now past the length.
        Ok(unsafe { self.raw.slot(length - 1).cast::<T>().read() })
    }

    #[cfg_attr(not(feature = "debug-diagnostics"), allow(unused_variables))]
    fn checked_index(&self, index: usize, op: &str) -> Result<(), VecError> {
        let length = self.len();
        if index >= length {
            diag!("{op}: index {index} out of bounds for length {length}");
            return Err(VecError::IndexOutOfBounds { index, length });
        }
        Ok(())
    }

    /// Remove and return the element at `index` in O(1) by moving the last
    /// element into its place. Does not preserve order.
    pub fn remove(&mut self, index: usize) -> Result<T, VecError> {
        self.checked_index(index, "remove")?;
        // SAFETY: `index < len`; the slot is vacated by `swap_out`.
        unsafe {
            let item = self.raw.slot(index).cast::<T>().read();
            self.raw.swap_out(index);
            Ok(item)
        }
    }

    /// Remove and return the element at `index`, shifting later elements
    /// left so the remaining order is preserved. O(n).
    pub fn remove_ordered(&mut self, index: usize) -> Result<T, VecError> {
        self.checked_index(index, "remove_ordered")?;
        // SAFETY: `index < len`; the slot is vacated by `close_gap`.
        unsafe {
            let item = self.raw.slot(index).cast::<T>().read();
            self.raw.close_gap(index);
            Ok(item)
        }
    }

    /// Drop elements past `length`. No effect if `length >= len`.
    pub fn truncate(&mut self, length: usize) {
        let old = self.len();
        if length >= old {
            return;
        }
        // Shorten first so a panicking destructor cannot cause a double drop.
        self.raw.header_mut().length = length;
        // SAFETY: slots `length..old` were initialized and are now
        // unreachable.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.as_mut_ptr().add(length),
                old - length,
            ))
        };
    }

    /// Drop every element. The capacity is kept.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Reallocate to exactly `capacity` slots.
    ///
    /// A capacity below the length fails with
    /// [`VecError::InvalidArgument`]; nothing is truncated.
    pub fn resize(self, capacity: usize) -> Grown<'a, T, A> {
        Self::relocated(self.into_block().resize(capacity))
    }

    /// Reallocate so that capacity equals length.
    pub fn shrink_to_fit(self) -> Grown<'a, T, A> {
        Self::relocated(self.into_block().shrink_to_fit())
    }

    /// Make room for `additional` more elements in at most one reallocation.
    pub fn reserve(self, additional: usize) -> Grown<'a, T, A> {
        Self::relocated(self.into_block().reserve(additional))
    }

    /// Copy the elements into a header-less buffer from `allocator`.
    ///
    /// An empty vector yields an empty buffer without touching the
    /// allocator; only a real allocation failure is an error.
    pub fn normal_copy<'b, B: Allocator + ?Sized>(
        &self,
        allocator: &'b B,
    ) -> Result<PlainBuffer<'b, T, B>, VecError>
    where
        T: Clone,
    {
        PlainBuffer::copy_in(self.as_slice(), allocator)
    }

    /// A new vector on the same allocator holding clones of the elements,
    /// with capacity equal to the length.
    pub fn try_clone(&self) -> Result<Self, VecError>
    where
        T: Clone,
    {
        let copy = Self::with_capacity_in(self.len(), self.allocator())?;
        Ok(copy.push_many(self.as_slice())?)
    }
}

impl<T, A: Allocator + ?Sized> Drop for VailedVec<'_, T, A> {
    fn drop(&mut self) {
        self.clear();
        // SAFETY: `self.raw` is not used again after this read.
        let raw = unsafe { ptr::read(&self.raw) };
        if let Err(_e) = raw.release() {
            diag!("drop: {_e}");
        }
    }
}

impl<T, A: Allocator + ?Sized> Deref for VailedVec<'_, T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator + ?Sized> DerefMut for VailedVec<'_, T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, A: Allocator + ?Sized> AsRef<[T]> for VailedVec<'_, T, A> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<'v, T, A: Allocator + ?Sized> IntoIterator for &'v VailedVec<'_, T, A> {
    type Item = &'v T;
    type IntoIter = slice::Iter<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'v, T, A: Allocator + ?Sized> IntoIterator for &'v mut VailedVec<'_, T, A> {
    type Item = &'v mut T;
    type IntoIter = slice::IterMut<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: fmt::Debug, A: Allocator + ?Sized> fmt::Debug for VailedVec<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
