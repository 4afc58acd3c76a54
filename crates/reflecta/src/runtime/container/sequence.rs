//! Sequence descriptors.

use super::iterator::{ConstSequenceIterator, Cursor, IteratorFns, SequenceIterator};
use super::ops::{
    Container, Erase, IndexedAccess, MutableElements, PopBack, PopFront, PositionalInsert,
    PushBack, PushFront, UnorderedInsert,
};
use super::{AddRemoveCapabilities, IteratorCapabilities, Position};
use crate::runtime::meta_type::{MetaType, MetaTypeOf};
use reflecta_mem::global_arena;
use std::fmt;
use std::marker::PhantomData;

type SizeFn = unsafe fn(*const u8) -> usize;
type ClearFn = unsafe fn(*mut u8);
type ElementFn = unsafe fn(*const u8, usize) -> *const u8;
type SetElementFn = unsafe fn(*mut u8, usize, *const u8) -> bool;
type AddFn = unsafe fn(*mut u8, *const u8);
type RemoveFn = unsafe fn(*mut u8) -> bool;
type InsertFn = unsafe fn(*mut u8, usize, *const u8);
type EraseFn = unsafe fn(*mut u8, usize) -> bool;
type EraseRangeFn = unsafe fn(*mut u8, usize, usize) -> bool;

/// Operation table of one sequential container type.
///
/// Every operation takes the container as a raw pointer plus, where
/// needed, raw pointers to values of [`value_meta_type`](Self::value_meta_type).
/// Values passed in are copied; the container never takes ownership of
/// caller storage. Output pointers must hold an initialized value, which
/// is replaced.
pub struct SequenceDescriptor {
    value_meta: MetaType,
    add_remove: AddRemoveCapabilities,
    iterator: Option<IteratorFns>,
    const_iterator: Option<IteratorFns>,
    size: Option<SizeFn>,
    clear: Option<ClearFn>,
    element_at: Option<ElementFn>,
    value_at_index: Option<ElementFn>,
    set_value_at_index: Option<SetElementFn>,
    set_value_at_position: Option<SetElementFn>,
    add_at_begin: Option<AddFn>,
    add_at_end: Option<AddFn>,
    add_unordered: Option<AddFn>,
    remove_at_begin: Option<RemoveFn>,
    remove_at_end: Option<RemoveFn>,
    insert_at: Option<InsertFn>,
    erase_at: Option<EraseFn>,
    erase_range: Option<EraseRangeFn>,
}

impl SequenceDescriptor {
    /// Starts a descriptor for container `C` with size, clear and const
    /// iteration wired.
    #[must_use]
    pub fn builder<C: Container>() -> SequenceDescriptorBuilder<C> {
        SequenceDescriptorBuilder {
            descriptor: SequenceDescriptor {
                value_meta: C::Item::meta_type(),
                add_remove: AddRemoveCapabilities::empty(),
                iterator: None,
                const_iterator: Some(IteratorFns::for_sequence::<C>()),
                size: Some(size_thunk::<C>),
                clear: Some(clear_thunk::<C>),
                element_at: Some(element_thunk::<C>),
                value_at_index: None,
                set_value_at_index: None,
                set_value_at_position: None,
                add_at_begin: None,
                add_at_end: None,
                add_unordered: None,
                remove_at_begin: None,
                remove_at_end: None,
                insert_at: None,
                erase_at: None,
                erase_range: None,
            },
            _container: PhantomData,
        }
    }

    /// Element type.
    #[must_use]
    pub fn value_meta_type(&self) -> MetaType {
        self.value_meta
    }

    /// Add and remove capabilities.
    #[must_use]
    pub fn add_remove_capabilities(&self) -> AddRemoveCapabilities {
        self.add_remove
    }

    /// Category of mutable iterators; empty if there are none.
    #[must_use]
    pub fn iterator_capabilities(&self) -> IteratorCapabilities {
        self.iterator
            .as_ref()
            .map_or(IteratorCapabilities::empty(), IteratorFns::capabilities)
    }

    /// Category of const iterators; empty if there are none.
    #[must_use]
    pub fn const_iterator_capabilities(&self) -> IteratorCapabilities {
        self.const_iterator
            .as_ref()
            .map_or(IteratorCapabilities::empty(), IteratorFns::capabilities)
    }

    // ========================================================================
    // Capability checks
    // ========================================================================

    /// Returns true if `size` is available.
    #[must_use]
    pub fn has_size(&self) -> bool {
        self.size.is_some()
    }

    /// Returns true if `clear` is available.
    #[must_use]
    pub fn has_clear(&self) -> bool {
        self.clear.is_some()
    }

    /// Returns true if values can be read by index.
    #[must_use]
    pub fn has_value_at_index(&self) -> bool {
        self.value_at_index.is_some()
    }

    /// Returns true if values can be replaced by index.
    #[must_use]
    pub fn has_set_value_at_index(&self) -> bool {
        self.set_value_at_index.is_some()
    }

    /// Returns true if mutable iterators are available.
    #[must_use]
    pub fn has_iterator(&self) -> bool {
        self.iterator.is_some()
    }

    /// Returns true if const iterators are available.
    #[must_use]
    pub fn has_const_iterator(&self) -> bool {
        self.const_iterator.is_some()
    }

    /// Returns true if values can be replaced through an iterator.
    #[must_use]
    pub fn has_set_value_at_iterator(&self) -> bool {
        self.iterator.is_some() && self.set_value_at_position.is_some()
    }

    /// Returns true if values can be inserted through an iterator hint.
    #[must_use]
    pub fn has_insert_value_at_iterator(&self) -> bool {
        self.iterator.is_some() && (self.insert_at.is_some() || self.add_unordered.is_some())
    }

    /// Returns true if values can be erased through an iterator.
    #[must_use]
    pub fn has_erase_value_at_iterator(&self) -> bool {
        self.iterator.is_some() && self.erase_at.is_some()
    }

    /// Returns true if ranges can be erased through two iterators.
    #[must_use]
    pub fn has_erase_range_at_iterator(&self) -> bool {
        self.iterator.is_some() && self.erase_range.is_some()
    }

    /// Returns true if values can be added at all.
    #[must_use]
    pub fn can_add_value(&self) -> bool {
        self.add_at_begin.is_some() || self.add_at_end.is_some() || self.add_unordered.is_some()
    }

    /// Returns true if values can be added at the front.
    #[must_use]
    pub fn can_add_value_at_begin(&self) -> bool {
        self.add_remove
            .contains(AddRemoveCapabilities::CAN_ADD_AT_BEGIN)
    }

    /// Returns true if values can be added at the back.
    #[must_use]
    pub fn can_add_value_at_end(&self) -> bool {
        self.add_remove.contains(AddRemoveCapabilities::CAN_ADD_AT_END)
    }

    /// Returns true if values can be removed at all.
    #[must_use]
    pub fn can_remove_value(&self) -> bool {
        self.remove_at_begin.is_some() || self.remove_at_end.is_some()
    }

    /// Returns true if values can be removed from the front.
    #[must_use]
    pub fn can_remove_value_at_begin(&self) -> bool {
        self.add_remove
            .contains(AddRemoveCapabilities::CAN_REMOVE_AT_BEGIN)
    }

    /// Returns true if values can be removed from the back.
    #[must_use]
    pub fn can_remove_value_at_end(&self) -> bool {
        self.add_remove
            .contains(AddRemoveCapabilities::CAN_REMOVE_AT_END)
    }

    /// Returns true if adding and removing at both ends always succeeds.
    #[must_use]
    pub fn is_sortable(&self) -> bool {
        self.add_remove.contains(
            AddRemoveCapabilities::CAN_ADD_AT_BEGIN
                | AddRemoveCapabilities::CAN_ADD_AT_END
                | AddRemoveCapabilities::CAN_REMOVE_AT_BEGIN
                | AddRemoveCapabilities::CAN_REMOVE_AT_END,
        )
    }

    // ========================================================================
    // Whole-container and indexed operations
    // ========================================================================

    /// Number of elements; 0 if unsupported.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type.
    #[must_use]
    pub unsafe fn size(&self, container: *const u8) -> usize {
        match self.size {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container) },
            None => 0,
        }
    }

    /// Removes every element.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type.
    pub unsafe fn clear(&self, container: *mut u8) {
        if let Some(f) = self.clear {
            // SAFETY: forwarded caller contract.
            unsafe { f(container) }
        }
    }

    /// Copies the element at `index` into `out`.
    ///
    /// Returns false if indexed access is unsupported or `index` is out of
    /// range; `out` is untouched then.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type
    /// and `out` to an initialized value of the element type.
    pub unsafe fn value_at_index(&self, container: *const u8, index: usize, out: *mut u8) -> bool {
        let Some(f) = self.value_at_index else {
            return false;
        };
        // SAFETY: forwarded caller contract.
        unsafe { self.copy_out(f(container, index), out) }
    }

    /// Replaces the element at `index` with a copy of `value`.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type
    /// and `value` to an initialized value of the element type.
    pub unsafe fn set_value_at_index(&self, container: *mut u8, index: usize, value: *const u8) -> bool {
        match self.set_value_at_index {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container, index, value) },
            None => false,
        }
    }

    /// Pointer to the element at an iteration position; null if unsupported
    /// or out of range.
    pub(crate) unsafe fn element_ptr(&self, container: *const u8, pos: usize) -> *const u8 {
        match self.element_at {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container, pos) },
            None => std::ptr::null(),
        }
    }

    unsafe fn copy_out(&self, src: *const u8, out: *mut u8) -> bool {
        if src.is_null() || out.is_null() {
            return false;
        }
        // SAFETY: src is a live element, out holds an initialized element.
        unsafe { self.value_meta.assign(out, src) }
    }

    // ========================================================================
    // Add / remove
    // ========================================================================

    fn add_fn(&self, position: Position) -> Option<AddFn> {
        match position {
            Position::AtBegin => self.add_at_begin,
            Position::AtEnd => self.add_at_end,
            Position::Unspecified => self
                .add_at_end
                .or(self.add_at_begin)
                .or(self.add_unordered),
        }
    }

    fn remove_fn(&self, position: Position) -> Option<RemoveFn> {
        match position {
            Position::AtBegin => self.remove_at_begin,
            Position::AtEnd => self.remove_at_end,
            Position::Unspecified => self.remove_at_end.or(self.remove_at_begin),
        }
    }

    /// Adds a copy of `value`.
    ///
    /// With both ends supported the requested side is used and
    /// `Unspecified` means the back. With one end supported `Unspecified`
    /// routes to it. With neither, `Unspecified` adds wherever the
    /// container puts new values (a hash set, say). An explicitly requested
    /// side that is unsupported adds nothing and returns false.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type
    /// and `value` to an initialized value of the element type.
    pub unsafe fn add_value(&self, container: *mut u8, value: *const u8, position: Position) -> bool {
        match self.add_fn(position) {
            Some(f) => {
                // SAFETY: forwarded caller contract.
                unsafe { f(container, value) };
                true
            }
            None => false,
        }
    }

    /// Adds a copy of `value` at the front.
    ///
    /// # Safety
    ///
    /// See [`add_value`](Self::add_value).
    pub unsafe fn add_value_at_begin(&self, container: *mut u8, value: *const u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.add_value(container, value, Position::AtBegin) }
    }

    /// Adds a copy of `value` at the back.
    ///
    /// # Safety
    ///
    /// See [`add_value`](Self::add_value).
    pub unsafe fn add_value_at_end(&self, container: *mut u8, value: *const u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.add_value(container, value, Position::AtEnd) }
    }

    /// Removes one element, routed like [`add_value`](Self::add_value).
    ///
    /// Returns false if unsupported or the container is empty.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type.
    pub unsafe fn remove_value(&self, container: *mut u8, position: Position) -> bool {
        match self.remove_fn(position) {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container) },
            None => false,
        }
    }

    /// Removes the first element.
    ///
    /// # Safety
    ///
    /// See [`remove_value`](Self::remove_value).
    pub unsafe fn remove_value_at_begin(&self, container: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.remove_value(container, Position::AtBegin) }
    }

    /// Removes the last element.
    ///
    /// # Safety
    ///
    /// See [`remove_value`](Self::remove_value).
    pub unsafe fn remove_value_at_end(&self, container: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.remove_value(container, Position::AtEnd) }
    }

    // ========================================================================
    // Iterators
    // ========================================================================

    /// Mutable iterator at the first element.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type
    /// that outlives the iterator and is not written to while it is used.
    #[must_use]
    pub unsafe fn begin(&'static self, container: *mut u8) -> Option<SequenceIterator> {
        let fns = self.iterator.as_ref()?;
        // SAFETY: forwarded caller contract.
        SequenceIterator::from_raw(unsafe { fns.begin(container) }, fns)
    }

    /// Mutable iterator past the last element.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin).
    #[must_use]
    pub unsafe fn end(&'static self, container: *mut u8) -> Option<SequenceIterator> {
        let fns = self.iterator.as_ref()?;
        // SAFETY: forwarded caller contract.
        SequenceIterator::from_raw(unsafe { fns.end(container) }, fns)
    }

    /// Const iterator at the first element.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin).
    #[must_use]
    pub unsafe fn const_begin(&'static self, container: *const u8) -> Option<ConstSequenceIterator> {
        let fns = self.const_iterator.as_ref()?;
        // SAFETY: const iterators never write through the pointer.
        ConstSequenceIterator::from_raw(unsafe { fns.begin(container.cast_mut()) }, fns)
    }

    /// Const iterator past the last element.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin).
    #[must_use]
    pub unsafe fn const_end(&'static self, container: *const u8) -> Option<ConstSequenceIterator> {
        let fns = self.const_iterator.as_ref()?;
        // SAFETY: const iterators never write through the pointer.
        ConstSequenceIterator::from_raw(unsafe { fns.end(container.cast_mut()) }, fns)
    }

    /// Releases a mutable iterator. Equivalent to dropping it.
    pub fn destroy_iterator(&self, iterator: SequenceIterator) {
        drop(iterator);
    }

    /// Releases a const iterator. Equivalent to dropping it.
    pub fn destroy_const_iterator(&self, iterator: ConstSequenceIterator) {
        drop(iterator);
    }

    /// Copies the element under a mutable iterator into `out`.
    ///
    /// # Safety
    ///
    /// The iterator's container must still be alive and unmodified since
    /// the iterator was created; `out` must hold an initialized element.
    pub unsafe fn value_at_iterator(&self, iterator: &SequenceIterator, out: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.value_at_cursor(iterator.cursor(), out) }
    }

    /// Copies the element under a const iterator into `out`.
    ///
    /// # Safety
    ///
    /// See [`value_at_iterator`](Self::value_at_iterator).
    pub unsafe fn value_at_const_iterator(&self, iterator: &ConstSequenceIterator, out: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.value_at_cursor(iterator.cursor(), out) }
    }

    unsafe fn value_at_cursor(&self, cursor: Cursor, out: *mut u8) -> bool {
        // SAFETY: the cursor's container is live per the caller's contract.
        unsafe { self.copy_out(self.element_ptr(cursor.container, cursor.pos), out) }
    }

    /// Replaces the element under the iterator with a copy of `value`.
    ///
    /// # Safety
    ///
    /// See [`value_at_iterator`](Self::value_at_iterator); `value` must
    /// point to an initialized element.
    pub unsafe fn set_value_at_iterator(&self, iterator: &SequenceIterator, value: *const u8) -> bool {
        let Some(f) = self.set_value_at_position else {
            return false;
        };
        let cursor = iterator.cursor();
        // SAFETY: forwarded caller contract.
        unsafe { f(cursor.container, cursor.pos, value) }
    }

    /// Inserts a copy of `value` using the iterator as a hint.
    ///
    /// Ordered containers insert immediately before the hint. Containers
    /// that only support unordered insertion ignore it.
    ///
    /// # Safety
    ///
    /// See [`set_value_at_iterator`](Self::set_value_at_iterator).
    pub unsafe fn insert_value_at_iterator(&self, iterator: &SequenceIterator, value: *const u8) -> bool {
        let cursor = iterator.cursor();
        match (self.insert_at, self.add_unordered) {
            (Some(f), _) => {
                // SAFETY: forwarded caller contract.
                unsafe { f(cursor.container, cursor.pos, value) };
                true
            }
            (None, Some(f)) => {
                // SAFETY: forwarded caller contract.
                unsafe { f(cursor.container, value) };
                true
            }
            (None, None) => false,
        }
    }

    /// Erases the element under the iterator.
    ///
    /// # Safety
    ///
    /// See [`value_at_iterator`](Self::value_at_iterator).
    pub unsafe fn erase_value_at_iterator(&self, iterator: &SequenceIterator) -> bool {
        let Some(f) = self.erase_at else {
            return false;
        };
        let cursor = iterator.cursor();
        // SAFETY: forwarded caller contract.
        unsafe { f(cursor.container, cursor.pos) }
    }

    /// Erases the elements from `first` up to, not including, `last`.
    ///
    /// Returns false if unsupported or the iterators belong to different
    /// containers.
    ///
    /// # Safety
    ///
    /// See [`value_at_iterator`](Self::value_at_iterator).
    pub unsafe fn erase_range_at_iterator(&self, first: &SequenceIterator, last: &SequenceIterator) -> bool {
        let Some(f) = self.erase_range else {
            return false;
        };
        let (first, last) = (first.cursor(), last.cursor());
        if first.container != last.container {
            return false;
        }
        // SAFETY: forwarded caller contract.
        unsafe { f(first.container, first.pos, last.pos) }
    }
}

impl fmt::Debug for SequenceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceDescriptor")
            .field("value", &self.value_meta)
            .field("add_remove", &self.add_remove)
            .field("iterator", &self.iterator_capabilities())
            .field("const_iterator", &self.const_iterator_capabilities())
            .finish_non_exhaustive()
    }
}

/// Typed builder for [`SequenceDescriptor`].
///
/// Each capability method exists only when `C` implements the matching
/// trait from [`ops`](super::ops).
///
/// # Example
///
/// ```
/// use reflecta::runtime::container::SequenceDescriptor;
/// use std::collections::VecDeque;
///
/// let seq = SequenceDescriptor::builder::<VecDeque<i32>>()
///     .push_back()
///     .pop_front()
///     .build();
/// assert!(seq.can_add_value_at_end());
/// assert!(!seq.can_add_value_at_begin());
/// assert!(seq.can_remove_value_at_begin());
/// ```
pub struct SequenceDescriptorBuilder<C> {
    descriptor: SequenceDescriptor,
    _container: PhantomData<fn() -> C>,
}

impl<C: Container> SequenceDescriptorBuilder<C> {
    fn with_iterator(mut self) -> Self {
        if self.descriptor.iterator.is_none() {
            self.descriptor.iterator = Some(IteratorFns::for_sequence::<C>());
        }
        self
    }

    /// Moves the descriptor into the metadata arena.
    #[must_use]
    pub fn build(self) -> &'static SequenceDescriptor {
        global_arena().alloc(self.descriptor)
    }
}

impl<C: PushBack> SequenceDescriptorBuilder<C> {
    /// Wires adding at the back.
    #[must_use]
    pub fn push_back(mut self) -> Self {
        self.descriptor.add_at_end = Some(push_back_thunk::<C>);
        self.descriptor.add_remove |= AddRemoveCapabilities::CAN_ADD_AT_END;
        self
    }
}

impl<C: PushFront> SequenceDescriptorBuilder<C> {
    /// Wires adding at the front.
    #[must_use]
    pub fn push_front(mut self) -> Self {
        self.descriptor.add_at_begin = Some(push_front_thunk::<C>);
        self.descriptor.add_remove |= AddRemoveCapabilities::CAN_ADD_AT_BEGIN;
        self
    }
}

impl<C: PopBack> SequenceDescriptorBuilder<C> {
    /// Wires removing at the back.
    #[must_use]
    pub fn pop_back(mut self) -> Self {
        self.descriptor.remove_at_end = Some(pop_back_thunk::<C>);
        self.descriptor.add_remove |= AddRemoveCapabilities::CAN_REMOVE_AT_END;
        self
    }
}

impl<C: PopFront> SequenceDescriptorBuilder<C> {
    /// Wires removing at the front.
    #[must_use]
    pub fn pop_front(mut self) -> Self {
        self.descriptor.remove_at_begin = Some(pop_front_thunk::<C>);
        self.descriptor.add_remove |= AddRemoveCapabilities::CAN_REMOVE_AT_BEGIN;
        self
    }
}

impl<C: MutableElements> SequenceDescriptorBuilder<C> {
    /// Wires mutable iteration and replacing elements through iterators.
    #[must_use]
    pub fn mutable_elements(mut self) -> Self {
        self.descriptor.set_value_at_position = Some(set_element_thunk::<C>);
        self.with_iterator()
    }
}

impl<C: IndexedAccess> SequenceDescriptorBuilder<C> {
    /// Wires reading and replacing elements by index.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.descriptor.value_at_index = Some(element_thunk::<C>);
        self.descriptor.set_value_at_index = Some(set_element_thunk::<C>);
        self.mutable_elements()
    }
}

impl<C: PositionalInsert> SequenceDescriptorBuilder<C> {
    /// Wires inserting before an iterator.
    #[must_use]
    pub fn positional_insert(mut self) -> Self {
        self.descriptor.insert_at = Some(insert_thunk::<C>);
        self.with_iterator()
    }
}

impl<C: UnorderedInsert> SequenceDescriptorBuilder<C> {
    /// Wires adding at a container-chosen location.
    #[must_use]
    pub fn unordered_insert(mut self) -> Self {
        self.descriptor.add_unordered = Some(unordered_insert_thunk::<C>);
        self.descriptor.add_remove |= AddRemoveCapabilities::CAN_ADD;
        self.with_iterator()
    }
}

impl<C: Erase> SequenceDescriptorBuilder<C> {
    /// Wires erasing through iterators.
    #[must_use]
    pub fn erase(mut self) -> Self {
        self.descriptor.erase_at = Some(erase_thunk::<C>);
        self.descriptor.erase_range = Some(erase_range_thunk::<C>);
        self.with_iterator()
    }
}

// ============================================================================
// Thunks
// ============================================================================

unsafe fn size_thunk<C: Container>(c: *const u8) -> usize {
    // SAFETY: c points to a live C.
    unsafe { &*c.cast::<C>() }.item_count()
}

unsafe fn clear_thunk<C: Container>(c: *mut u8) {
    // SAFETY: c points to a live C.
    unsafe { &mut *c.cast::<C>() }.remove_all();
}

unsafe fn element_thunk<C: Container>(c: *const u8, pos: usize) -> *const u8 {
    // SAFETY: c points to a live C.
    unsafe { &*c.cast::<C>() }
        .item_at(pos)
        .map_or(std::ptr::null(), |item| (item as *const C::Item).cast())
}

unsafe fn read_item<C: Container>(value: *const u8) -> C::Item {
    // SAFETY: value points to a live element; the copy is taken before the
    // container is borrowed mutably, so value may alias an element.
    unsafe { &*value.cast::<C::Item>() }.clone()
}

unsafe fn set_element_thunk<C: MutableElements>(c: *mut u8, pos: usize, value: *const u8) -> bool {
    // SAFETY: see read_item.
    let value = unsafe { read_item::<C>(value) };
    // SAFETY: c points to a live C.
    match unsafe { &mut *c.cast::<C>() }.item_at_mut(pos) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

unsafe fn push_back_thunk<C: PushBack>(c: *mut u8, value: *const u8) {
    // SAFETY: see read_item.
    let value = unsafe { read_item::<C>(value) };
    // SAFETY: c points to a live C.
    unsafe { &mut *c.cast::<C>() }.push_back_item(value);
}

unsafe fn push_front_thunk<C: PushFront>(c: *mut u8, value: *const u8) {
    // SAFETY: see read_item.
    let value = unsafe { read_item::<C>(value) };
    // SAFETY: c points to a live C.
    unsafe { &mut *c.cast::<C>() }.push_front_item(value);
}

unsafe fn unordered_insert_thunk<C: UnorderedInsert>(c: *mut u8, value: *const u8) {
    // SAFETY: see read_item.
    let value = unsafe { read_item::<C>(value) };
    // SAFETY: c points to a live C.
    unsafe { &mut *c.cast::<C>() }.insert_item(value);
}

unsafe fn pop_back_thunk<C: PopBack>(c: *mut u8) -> bool {
    // SAFETY: c points to a live C.
    unsafe { &mut *c.cast::<C>() }.pop_back_item()
}

unsafe fn pop_front_thunk<C: PopFront>(c: *mut u8) -> bool {
    // SAFETY: c points to a live C.
    unsafe { &mut *c.cast::<C>() }.pop_front_item()
}

unsafe fn insert_thunk<C: PositionalInsert>(c: *mut u8, pos: usize, value: *const u8) {
    // SAFETY: see read_item.
    let value = unsafe { read_item::<C>(value) };
    // SAFETY: c points to a live C.
    let container = unsafe { &mut *c.cast::<C>() };
    let pos = pos.min(container.item_count());
    container.insert_item_at(pos, value);
}

unsafe fn erase_thunk<C: Erase>(c: *mut u8, pos: usize) -> bool {
    // SAFETY: c points to a live C.
    let container = unsafe { &mut *c.cast::<C>() };
    if pos >= container.item_count() {
        return false;
    }
    container.erase_item_at(pos);
    true
}

unsafe fn erase_range_thunk<C: Erase>(c: *mut u8, first: usize, last: usize) -> bool {
    // SAFETY: c points to a live C.
    let container = unsafe { &mut *c.cast::<C>() };
    let last = last.min(container.item_count());
    if first > last {
        return false;
    }
    container.erase_item_range(first, last);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::container::SequenceSupport;

    fn ptr<T>(value: &T) -> *const u8 {
        (value as *const T).cast()
    }

    fn ptr_mut<T>(value: &mut T) -> *mut u8 {
        (value as *mut T).cast()
    }

    #[test]
    fn test_vec_scenario() {
        let seq = Vec::<i32>::sequence_descriptor();
        let mut v = vec![1, 2, 3];
        let c = ptr_mut(&mut v);
        let mut out = 0i32;

        unsafe {
            assert_eq!(seq.size(c), 3);
            assert!(seq.value_at_index(c, 1, ptr_mut(&mut out)));
            assert_eq!(out, 2);
            assert!(seq.add_value_at_end(c, ptr(&4i32)));
            assert_eq!(seq.size(c), 4);
            assert!(seq.value_at_index(c, 3, ptr_mut(&mut out)));
            assert_eq!(out, 4);
            assert!(!seq.value_at_index(c, 9, ptr_mut(&mut out)));
        }
    }

    #[test]
    fn test_push_back_only_routing() {
        let seq = Vec::<i32>::sequence_descriptor();
        assert!(!seq.can_add_value_at_begin());
        assert!(seq.can_add_value_at_end());
        assert!(!seq.is_sortable());

        let mut a = vec![1];
        let mut b = vec![1];
        unsafe {
            assert!(seq.add_value(ptr_mut(&mut a), ptr(&2i32), Position::Unspecified));
            assert!(seq.add_value_at_end(ptr_mut(&mut b), ptr(&2i32)));
            assert!(!seq.add_value_at_begin(ptr_mut(&mut b), ptr(&0i32)));
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_iterator_insert_and_erase() {
        let seq = Vec::<i32>::sequence_descriptor();
        let mut v = vec![10, 20, 30];
        let c = ptr_mut(&mut v);

        unsafe {
            let mut it = seq.begin(c).unwrap();
            assert!(it.advance(1));
            assert!(seq.insert_value_at_iterator(&it, ptr(&15i32)));
        }
        assert_eq!(v, [10, 15, 20, 30]);

        unsafe {
            let c = ptr_mut(&mut v);
            let mut first = seq.begin(c).unwrap();
            first.advance(1);
            let mut last = first.clone();
            last.advance(2);
            assert_eq!(last.diff(&first), 2);
            assert!(seq.erase_range_at_iterator(&first, &last));
        }
        assert_eq!(v, [10, 30]);
    }

    #[test]
    fn test_iterators_walk_and_compare() {
        let seq = Vec::<i32>::sequence_descriptor();
        let v = vec![1, 2, 3];
        let mut sum = 0;
        unsafe {
            let mut it = seq.const_begin(ptr(&v)).unwrap();
            let end = seq.const_end(ptr(&v)).unwrap();
            let mut out = 0i32;
            while it != end {
                assert!(seq.value_at_const_iterator(&it, ptr_mut(&mut out)));
                sum += out;
                it.advance(1);
            }
            assert_eq!(end.diff(&seq.const_begin(ptr(&v)).unwrap()), 3);
        }
        assert_eq!(sum, 6);
    }
}
