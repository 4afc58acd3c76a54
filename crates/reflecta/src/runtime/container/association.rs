//! Association descriptors.

use super::iterator::{AssociationIterator, ConstAssociationIterator, Cursor, IteratorFns};
use super::ops::AssociativeContainer;
use super::IteratorCapabilities;
use crate::runtime::meta_type::{MetaType, MetaTypeOf};
use reflecta_mem::global_arena;
use std::fmt;

type SizeFn = unsafe fn(*const u8) -> usize;
type ClearFn = unsafe fn(*mut u8);
type KeyFn = unsafe fn(*const u8, *const u8) -> bool;
type KeyMutFn = unsafe fn(*mut u8, *const u8);
type PositionOfFn = unsafe fn(*const u8, *const u8) -> Option<usize>;
type MappedAtKeyFn = unsafe fn(*const u8, *const u8) -> *const u8;
type SetMappedAtKeyFn = unsafe fn(*mut u8, *const u8, *const u8);
type AtPositionFn = unsafe fn(*const u8, usize) -> *const u8;
type SetAtPositionFn = unsafe fn(*mut u8, usize, *const u8) -> bool;
type EraseAtPositionFn = unsafe fn(*mut u8, usize) -> bool;

/// Operation table of one keyed container type.
///
/// Sets are associations without a mapped type: the mapped operations are
/// absent and [`mapped_meta_type`](Self::mapped_meta_type) is invalid.
pub struct AssociationDescriptor {
    key_meta: MetaType,
    mapped_meta: MetaType,
    iterator: Option<IteratorFns>,
    const_iterator: Option<IteratorFns>,
    size: Option<SizeFn>,
    clear: Option<ClearFn>,
    contains_key: Option<KeyFn>,
    insert_key: Option<KeyMutFn>,
    remove_key: Option<KeyMutFn>,
    position_of: Option<PositionOfFn>,
    mapped_at_key: Option<MappedAtKeyFn>,
    set_mapped_at_key: Option<SetMappedAtKeyFn>,
    key_at_position: Option<AtPositionFn>,
    mapped_at_position: Option<AtPositionFn>,
    set_mapped_at_position: Option<SetAtPositionFn>,
    erase_at_position: Option<EraseAtPositionFn>,
}

impl AssociationDescriptor {
    /// Builds the descriptor of `C` in the metadata arena.
    ///
    /// Callers normally go through
    /// [`AssociationSupport`](super::AssociationSupport), which interns the
    /// result.
    #[must_use]
    pub fn for_container<C: AssociativeContainer>() -> &'static AssociationDescriptor {
        let has_mapped = C::HAS_MAPPED;
        global_arena().alloc(AssociationDescriptor {
            key_meta: C::Key::meta_type(),
            mapped_meta: if has_mapped {
                C::Mapped::meta_type()
            } else {
                MetaType::invalid()
            },
            iterator: Some(IteratorFns::for_association::<C>()),
            const_iterator: Some(IteratorFns::for_association::<C>()),
            size: Some(size_thunk::<C>),
            clear: Some(clear_thunk::<C>),
            contains_key: Some(contains_thunk::<C>),
            insert_key: Some(insert_key_thunk::<C>),
            remove_key: Some(remove_key_thunk::<C>),
            position_of: Some(position_of_thunk::<C>),
            mapped_at_key: has_mapped.then_some(mapped_at_key_thunk::<C> as MappedAtKeyFn),
            set_mapped_at_key: has_mapped
                .then_some(set_mapped_at_key_thunk::<C> as SetMappedAtKeyFn),
            key_at_position: Some(key_at_position_thunk::<C>),
            mapped_at_position: has_mapped
                .then_some(mapped_at_position_thunk::<C> as AtPositionFn),
            set_mapped_at_position: has_mapped
                .then_some(set_mapped_at_position_thunk::<C> as SetAtPositionFn),
            erase_at_position: Some(erase_at_position_thunk::<C>),
        })
    }

    /// Key type.
    #[must_use]
    pub fn key_meta_type(&self) -> MetaType {
        self.key_meta
    }

    /// Mapped type; invalid for sets.
    #[must_use]
    pub fn mapped_meta_type(&self) -> MetaType {
        self.mapped_meta
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

    /// Returns true if keys can be looked up.
    #[must_use]
    pub fn has_contains_key(&self) -> bool {
        self.contains_key.is_some()
    }

    /// Returns true if keys can be inserted.
    #[must_use]
    pub fn has_insert_key(&self) -> bool {
        self.insert_key.is_some()
    }

    /// Returns true if keys can be removed.
    #[must_use]
    pub fn has_remove_key(&self) -> bool {
        self.remove_key.is_some()
    }

    /// Returns true if mapped values can be read by key.
    #[must_use]
    pub fn has_mapped_at_key(&self) -> bool {
        self.mapped_at_key.is_some()
    }

    /// Returns true if mapped values can be written by key.
    #[must_use]
    pub fn has_set_mapped_at_key(&self) -> bool {
        self.set_mapped_at_key.is_some()
    }

    /// Returns true if mapped values can be read through iterators.
    #[must_use]
    pub fn has_mapped_at_iterator(&self) -> bool {
        self.mapped_at_position.is_some()
    }

    /// Returns true if mapped values can be written through iterators.
    #[must_use]
    pub fn has_set_mapped_at_iterator(&self) -> bool {
        self.iterator.is_some() && self.set_mapped_at_position.is_some()
    }

    /// Returns true if entries can be erased through iterators.
    #[must_use]
    pub fn has_erase_key_at_iterator(&self) -> bool {
        self.iterator.is_some() && self.erase_at_position.is_some()
    }

    // ========================================================================
    // Keyed operations
    // ========================================================================

    /// Number of entries; 0 if unsupported.
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

    /// Removes every entry.
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

    /// Returns true if `key` is present.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type
    /// and `key` to an initialized key.
    #[must_use]
    pub unsafe fn contains_key(&self, container: *const u8, key: *const u8) -> bool {
        match self.contains_key {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container, key) },
            None => false,
        }
    }

    /// Inserts a copy of `key`, with a default mapped value for maps.
    /// Existing entries are left as they are.
    ///
    /// # Safety
    ///
    /// See [`contains_key`](Self::contains_key).
    pub unsafe fn insert_key(&self, container: *mut u8, key: *const u8) -> bool {
        match self.insert_key {
            Some(f) => {
                // SAFETY: forwarded caller contract.
                unsafe { f(container, key) };
                true
            }
            None => false,
        }
    }

    /// Removes `key` if present.
    ///
    /// # Safety
    ///
    /// See [`contains_key`](Self::contains_key).
    pub unsafe fn remove_key(&self, container: *mut u8, key: *const u8) -> bool {
        match self.remove_key {
            Some(f) => {
                // SAFETY: forwarded caller contract.
                unsafe { f(container, key) };
                true
            }
            None => false,
        }
    }

    /// Copies the mapped value of `key` into `out`.
    ///
    /// Returns false for sets and missing keys.
    ///
    /// # Safety
    ///
    /// See [`contains_key`](Self::contains_key); `out` must hold an
    /// initialized mapped value.
    pub unsafe fn mapped_at_key(&self, container: *const u8, key: *const u8, out: *mut u8) -> bool {
        let Some(f) = self.mapped_at_key else {
            return false;
        };
        // SAFETY: forwarded caller contract.
        unsafe { copy_out(self.mapped_meta, f(container, key), out) }
    }

    /// Inserts or replaces the mapped value of `key`.
    ///
    /// # Safety
    ///
    /// See [`contains_key`](Self::contains_key); `value` must point to an
    /// initialized mapped value.
    pub unsafe fn set_mapped_at_key(&self, container: *mut u8, key: *const u8, value: *const u8) -> bool {
        match self.set_mapped_at_key {
            Some(f) => {
                // SAFETY: forwarded caller contract.
                unsafe { f(container, key, value) };
                true
            }
            None => false,
        }
    }

    /// Pointer to the key at an iteration position; null if out of range.
    pub(crate) unsafe fn key_ptr(&self, container: *const u8, pos: usize) -> *const u8 {
        match self.key_at_position {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container, pos) },
            None => std::ptr::null(),
        }
    }

    /// Pointer to the mapped value at an iteration position; null for sets
    /// or out of range.
    pub(crate) unsafe fn mapped_ptr(&self, container: *const u8, pos: usize) -> *const u8 {
        match self.mapped_at_position {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(container, pos) },
            None => std::ptr::null(),
        }
    }

    // ========================================================================
    // Iterators
    // ========================================================================

    /// Mutable iterator at the first entry.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container of the described type
    /// that outlives the iterator and is not written to while it is used.
    #[must_use]
    pub unsafe fn begin(&'static self, container: *mut u8) -> Option<AssociationIterator> {
        let fns = self.iterator.as_ref()?;
        // SAFETY: forwarded caller contract.
        AssociationIterator::from_raw(unsafe { fns.begin(container) }, fns)
    }

    /// Mutable iterator past the last entry.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin).
    #[must_use]
    pub unsafe fn end(&'static self, container: *mut u8) -> Option<AssociationIterator> {
        let fns = self.iterator.as_ref()?;
        // SAFETY: forwarded caller contract.
        AssociationIterator::from_raw(unsafe { fns.end(container) }, fns)
    }

    /// Const iterator at the first entry.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin).
    #[must_use]
    pub unsafe fn const_begin(&'static self, container: *const u8) -> Option<ConstAssociationIterator> {
        let fns = self.const_iterator.as_ref()?;
        // SAFETY: const iterators never write through the pointer.
        ConstAssociationIterator::from_raw(unsafe { fns.begin(container.cast_mut()) }, fns)
    }

    /// Const iterator past the last entry.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin).
    #[must_use]
    pub unsafe fn const_end(&'static self, container: *const u8) -> Option<ConstAssociationIterator> {
        let fns = self.const_iterator.as_ref()?;
        // SAFETY: const iterators never write through the pointer.
        ConstAssociationIterator::from_raw(unsafe { fns.end(container.cast_mut()) }, fns)
    }

    /// Mutable iterator at `key`, or the end iterator if `key` is missing.
    ///
    /// # Safety
    ///
    /// See [`begin`](Self::begin); `key` must point to an initialized key.
    #[must_use]
    pub unsafe fn create_iterator_at_key(
        &'static self,
        container: *mut u8,
        key: *const u8,
    ) -> Option<AssociationIterator> {
        // SAFETY: forwarded caller contract.
        match unsafe { self.position_of_key(container, key) } {
            Some(pos) => {
                // SAFETY: forwarded caller contract.
                let mut it = unsafe { self.begin(container) }?;
                it.advance(pos as isize);
                Some(it)
            }
            // SAFETY: forwarded caller contract.
            None => unsafe { self.end(container) },
        }
    }

    /// Const iterator at `key`, or the end iterator if `key` is missing.
    ///
    /// # Safety
    ///
    /// See [`create_iterator_at_key`](Self::create_iterator_at_key).
    #[must_use]
    pub unsafe fn create_const_iterator_at_key(
        &'static self,
        container: *const u8,
        key: *const u8,
    ) -> Option<ConstAssociationIterator> {
        // SAFETY: forwarded caller contract.
        match unsafe { self.position_of_key(container, key) } {
            Some(pos) => {
                // SAFETY: forwarded caller contract.
                let mut it = unsafe { self.const_begin(container) }?;
                it.advance(pos as isize);
                Some(it)
            }
            // SAFETY: forwarded caller contract.
            None => unsafe { self.const_end(container) },
        }
    }

    unsafe fn position_of_key(&self, container: *const u8, key: *const u8) -> Option<usize> {
        // SAFETY: forwarded caller contract.
        self.position_of.and_then(|f| unsafe { f(container, key) })
    }

    /// Releases a mutable iterator. Equivalent to dropping it.
    pub fn destroy_iterator(&self, iterator: AssociationIterator) {
        drop(iterator);
    }

    /// Releases a const iterator. Equivalent to dropping it.
    pub fn destroy_const_iterator(&self, iterator: ConstAssociationIterator) {
        drop(iterator);
    }

    /// Copies the key under a mutable iterator into `out`.
    ///
    /// # Safety
    ///
    /// The iterator's container must still be alive and unmodified since
    /// the iterator was created; `out` must hold an initialized key.
    pub unsafe fn key_at_iterator(&self, iterator: &AssociationIterator, out: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.key_at_cursor(iterator.cursor(), out) }
    }

    /// Copies the key under a const iterator into `out`.
    ///
    /// # Safety
    ///
    /// See [`key_at_iterator`](Self::key_at_iterator).
    pub unsafe fn key_at_const_iterator(&self, iterator: &ConstAssociationIterator, out: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.key_at_cursor(iterator.cursor(), out) }
    }

    /// Copies the mapped value under a mutable iterator into `out`.
    ///
    /// # Safety
    ///
    /// See [`key_at_iterator`](Self::key_at_iterator); `out` must hold an
    /// initialized mapped value.
    pub unsafe fn mapped_at_iterator(&self, iterator: &AssociationIterator, out: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.mapped_at_cursor(iterator.cursor(), out) }
    }

    /// Copies the mapped value under a const iterator into `out`.
    ///
    /// # Safety
    ///
    /// See [`mapped_at_iterator`](Self::mapped_at_iterator).
    pub unsafe fn mapped_at_const_iterator(&self, iterator: &ConstAssociationIterator, out: *mut u8) -> bool {
        // SAFETY: forwarded caller contract.
        unsafe { self.mapped_at_cursor(iterator.cursor(), out) }
    }

    unsafe fn key_at_cursor(&self, cursor: Cursor, out: *mut u8) -> bool {
        // SAFETY: the cursor's container is live per the caller's contract.
        unsafe { copy_out(self.key_meta, self.key_ptr(cursor.container, cursor.pos), out) }
    }

    unsafe fn mapped_at_cursor(&self, cursor: Cursor, out: *mut u8) -> bool {
        // SAFETY: the cursor's container is live per the caller's contract.
        unsafe { copy_out(self.mapped_meta, self.mapped_ptr(cursor.container, cursor.pos), out) }
    }

    /// Replaces the mapped value under the iterator with a copy of `value`.
    ///
    /// # Safety
    ///
    /// See [`key_at_iterator`](Self::key_at_iterator); `value` must point
    /// to an initialized mapped value.
    pub unsafe fn set_mapped_at_iterator(&self, iterator: &AssociationIterator, value: *const u8) -> bool {
        let Some(f) = self.set_mapped_at_position else {
            return false;
        };
        let cursor = iterator.cursor();
        // SAFETY: forwarded caller contract.
        unsafe { f(cursor.container, cursor.pos, value) }
    }

    /// Erases the entry under the iterator.
    ///
    /// # Safety
    ///
    /// See [`key_at_iterator`](Self::key_at_iterator).
    pub unsafe fn erase_key_at_iterator(&self, iterator: &AssociationIterator) -> bool {
        let Some(f) = self.erase_at_position else {
            return false;
        };
        let cursor = iterator.cursor();
        // SAFETY: forwarded caller contract.
        unsafe { f(cursor.container, cursor.pos) }
    }
}

impl fmt::Debug for AssociationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssociationDescriptor")
            .field("key", &self.key_meta)
            .field("mapped", &self.mapped_meta)
            .field("iterator", &self.iterator_capabilities())
            .finish_non_exhaustive()
    }
}

unsafe fn copy_out(meta: MetaType, src: *const u8, out: *mut u8) -> bool {
    if src.is_null() || out.is_null() {
        return false;
    }
    // SAFETY: src is a live value of meta, out holds an initialized one.
    unsafe { meta.assign(out, src) }
}

// ============================================================================
// Thunks
// ============================================================================

unsafe fn container<'a, C>(c: *const u8) -> &'a C {
    // SAFETY: c points to a live C for the duration of the call.
    unsafe { &*c.cast::<C>() }
}

unsafe fn container_mut<'a, C>(c: *mut u8) -> &'a mut C {
    // SAFETY: c points to a live C, exclusively borrowed for the call.
    unsafe { &mut *c.cast::<C>() }
}

unsafe fn key<'a, C: AssociativeContainer>(k: *const u8) -> &'a C::Key {
    // SAFETY: k points to a live key.
    unsafe { &*k.cast::<C::Key>() }
}

unsafe fn size_thunk<C: AssociativeContainer>(c: *const u8) -> usize {
    unsafe { container::<C>(c) }.entry_count()
}

unsafe fn clear_thunk<C: AssociativeContainer>(c: *mut u8) {
    unsafe { container_mut::<C>(c) }.remove_all_entries();
}

unsafe fn contains_thunk<C: AssociativeContainer>(c: *const u8, k: *const u8) -> bool {
    unsafe { container::<C>(c).contains(key::<C>(k)) }
}

unsafe fn insert_key_thunk<C: AssociativeContainer>(c: *mut u8, k: *const u8) {
    let k = unsafe { key::<C>(k) }.clone();
    unsafe { container_mut::<C>(c) }.insert_key(k);
}

unsafe fn remove_key_thunk<C: AssociativeContainer>(c: *mut u8, k: *const u8) {
    let k = unsafe { key::<C>(k) }.clone();
    unsafe { container_mut::<C>(c) }.remove_key(&k);
}

unsafe fn position_of_thunk<C: AssociativeContainer>(c: *const u8, k: *const u8) -> Option<usize> {
    unsafe { container::<C>(c).position_of(key::<C>(k)) }
}

unsafe fn mapped_at_key_thunk<C: AssociativeContainer>(c: *const u8, k: *const u8) -> *const u8 {
    unsafe { container::<C>(c).mapped(key::<C>(k)) }
        .map_or(std::ptr::null(), |m| (m as *const C::Mapped).cast())
}

unsafe fn set_mapped_at_key_thunk<C: AssociativeContainer>(c: *mut u8, k: *const u8, v: *const u8) {
    let k = unsafe { key::<C>(k) }.clone();
    // SAFETY: v points to a live mapped value.
    let v = unsafe { &*v.cast::<C::Mapped>() }.clone();
    unsafe { container_mut::<C>(c) }.set_mapped(k, v);
}

unsafe fn key_at_position_thunk<C: AssociativeContainer>(c: *const u8, pos: usize) -> *const u8 {
    unsafe { container::<C>(c) }
        .entry_at(pos)
        .map_or(std::ptr::null(), |(k, _)| (k as *const C::Key).cast())
}

unsafe fn mapped_at_position_thunk<C: AssociativeContainer>(c: *const u8, pos: usize) -> *const u8 {
    unsafe { container::<C>(c) }
        .entry_at(pos)
        .map_or(std::ptr::null(), |(_, m)| (m as *const C::Mapped).cast())
}

unsafe fn set_mapped_at_position_thunk<C: AssociativeContainer>(c: *mut u8, pos: usize, v: *const u8) -> bool {
    // SAFETY: v points to a live mapped value.
    let v = unsafe { &*v.cast::<C::Mapped>() }.clone();
    let target = unsafe { container_mut::<C>(c) };
    let Some(k) = target.entry_at(pos).map(|(k, _)| k.clone()) else {
        return false;
    };
    target.set_mapped(k, v);
    true
}

unsafe fn erase_at_position_thunk<C: AssociativeContainer>(c: *mut u8, pos: usize) -> bool {
    let target = unsafe { container_mut::<C>(c) };
    let Some(k) = target.entry_at(pos).map(|(k, _)| k.clone()) else {
        return false;
    };
    target.remove_key(&k);
    true
}

#[cfg(all(test, feature = "std-containers"))]
mod tests {
    use super::*;
    use crate::runtime::container::AssociationSupport;
    use std::collections::{BTreeMap, BTreeSet};

    fn ptr<T>(value: &T) -> *const u8 {
        (value as *const T).cast()
    }

    fn ptr_mut<T>(value: &mut T) -> *mut u8 {
        (value as *mut T).cast()
    }

    #[test]
    fn test_map_keyed_operations() {
        let assoc = BTreeMap::<String, i32>::association_descriptor();
        let mut map = BTreeMap::new();
        let c = ptr_mut(&mut map);
        let key = String::from("a");
        let mut out = 0i32;

        unsafe {
            assert!(!assoc.contains_key(c, ptr(&key)));
            assert!(assoc.set_mapped_at_key(c, ptr(&key), ptr(&5i32)));
            assert!(assoc.contains_key(c, ptr(&key)));
            assert!(assoc.mapped_at_key(c, ptr(&key), ptr_mut(&mut out)));
            assert_eq!(out, 5);
            assert!(assoc.insert_key(c, ptr(&String::from("b"))));
            assert_eq!(assoc.size(c), 2);
            assert!(assoc.remove_key(c, ptr(&key)));
        }
        assert_eq!(map.into_iter().collect::<Vec<_>>(), [("b".to_string(), 0)]);
    }

    #[test]
    fn test_iterator_at_key() {
        let assoc = BTreeMap::<i32, i32>::association_descriptor();
        let mut map: BTreeMap<i32, i32> = [(1, 10), (2, 20), (3, 30)].into();
        let c = ptr_mut(&mut map);

        unsafe {
            let it = assoc.create_iterator_at_key(c, ptr(&2i32)).unwrap();
            let mut key = 0i32;
            let mut mapped = 0i32;
            assert!(assoc.key_at_iterator(&it, ptr_mut(&mut key)));
            assert!(assoc.mapped_at_iterator(&it, ptr_mut(&mut mapped)));
            assert_eq!((key, mapped), (2, 20));
            assert!(assoc.set_mapped_at_iterator(&it, ptr(&25i32)));

            let missing = assoc.create_iterator_at_key(c, ptr(&9i32)).unwrap();
            assert!(missing == assoc.end(c).unwrap());

            assert!(assoc.erase_key_at_iterator(&it));
        }
        assert_eq!(map.into_iter().collect::<Vec<_>>(), [(1, 10), (3, 30)]);
    }

    #[test]
    fn test_set_has_no_mapped() {
        let assoc = BTreeSet::<i32>::association_descriptor();
        assert!(!assoc.mapped_meta_type().is_valid());
        assert!(!assoc.has_mapped_at_key());
        let mut set = BTreeSet::from([1, 2]);
        let mut out = 0i32;
        unsafe {
            let c = ptr_mut(&mut set);
            assert!(!assoc.mapped_at_key(c, ptr(&1i32), ptr_mut(&mut out)));
            assert!(assoc.contains_key(c, ptr(&2i32)));
        }
    }
}
