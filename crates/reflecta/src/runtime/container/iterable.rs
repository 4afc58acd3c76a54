//! Borrowing front-ends over type-erased containers.
//!
//! [`SequenceIterable`] and [`AssociationIterable`] pair a container
//! pointer with its descriptor for the duration of a mutable borrow and
//! trade raw pointers for [`MetaValue`]s. Every value read out is a copy.

use super::{AssociationDescriptor, Position, SequenceDescriptor};
use crate::runtime::meta_type::{MetaType, MetaTypeOf};
use crate::runtime::value::MetaValue;
use std::fmt;
use std::marker::PhantomData;

/// A sequence borrowed for type-erased access.
///
/// # Example
///
/// ```
/// use reflecta::runtime::{MetaValue, Position};
/// use reflecta::runtime::container::SequenceIterable;
///
/// let mut words = vec![String::from("a"), String::from("b")];
/// let mut seq = SequenceIterable::new(&mut words).unwrap();
/// assert_eq!(seq.len(), 2);
/// assert!(seq.push(&MetaValue::from("c"), Position::AtEnd));
/// assert!(!seq.push(&MetaValue::from(1i32), Position::AtEnd));
/// assert_eq!(words, ["a", "b", "c"]);
/// ```
pub struct SequenceIterable<'a> {
    container: *mut u8,
    descriptor: &'static SequenceDescriptor,
    _borrow: PhantomData<&'a mut ()>,
}

impl<'a> SequenceIterable<'a> {
    /// Borrows `container`; `None` if its type is not a sequence.
    #[must_use]
    pub fn new<C: MetaTypeOf>(container: &'a mut C) -> Option<Self> {
        let descriptor = C::meta_type().sequence()?;
        Some(SequenceIterable {
            container: (container as *mut C).cast(),
            descriptor,
            _borrow: PhantomData,
        })
    }

    /// Wraps a raw container.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container described by
    /// `descriptor`, exclusively borrowed for `'a`.
    #[must_use]
    pub unsafe fn from_raw(container: *mut u8, descriptor: &'static SequenceDescriptor) -> Self {
        SequenceIterable {
            container,
            descriptor,
            _borrow: PhantomData,
        }
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &'static SequenceDescriptor {
        self.descriptor
    }

    /// Element type.
    #[must_use]
    pub fn value_meta_type(&self) -> MetaType {
        self.descriptor.value_meta_type()
    }

    fn accepts(&self, value: &MetaValue) -> bool {
        value.is_valid() && value.meta_type() == self.value_meta_type()
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: the container is borrowed for 'a.
        unsafe { self.descriptor.size(self.container) }
    }

    /// Returns true if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the element at iteration position `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<MetaValue> {
        // SAFETY: the container is borrowed for 'a; the pointer is only used
        // to copy the element out.
        unsafe {
            let ptr = self.descriptor.element_ptr(self.container, index);
            if ptr.is_null() {
                return None;
            }
            MetaValue::from_raw(self.value_meta_type(), ptr)
        }
    }

    /// Copies of all elements in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = MetaValue> + '_ {
        (0..self.len()).filter_map(|index| self.at(index))
    }

    /// Replaces the element at `index`.
    ///
    /// Uses indexed access when available and a mutable iterator
    /// otherwise. False on a type mismatch or when unsupported.
    pub fn set(&mut self, index: usize, value: &MetaValue) -> bool {
        if !self.accepts(value) {
            return false;
        }
        // SAFETY: the container is borrowed mutably for 'a and value holds
        // an element.
        unsafe {
            if self.descriptor.has_set_value_at_index() {
                return self
                    .descriptor
                    .set_value_at_index(self.container, index, value.data());
            }
            if index >= self.len() {
                return false;
            }
            match self.descriptor.begin(self.container) {
                Some(mut it) => {
                    it.advance(index as isize);
                    self.descriptor.set_value_at_iterator(&it, value.data())
                }
                None => false,
            }
        }
    }

    /// Adds a copy of `value`; see [`SequenceDescriptor::add_value`].
    pub fn push(&mut self, value: &MetaValue, position: Position) -> bool {
        // SAFETY: the container is borrowed mutably for 'a and value holds
        // an element.
        self.accepts(value)
            && unsafe { self.descriptor.add_value(self.container, value.data(), position) }
    }

    /// Removes one element; see [`SequenceDescriptor::remove_value`].
    pub fn pop(&mut self, position: Position) -> bool {
        // SAFETY: the container is borrowed mutably for 'a.
        unsafe { self.descriptor.remove_value(self.container, position) }
    }

    /// Inserts a copy of `value` before iteration position `index`.
    pub fn insert(&mut self, index: usize, value: &MetaValue) -> bool {
        if !self.accepts(value) {
            return false;
        }
        // SAFETY: the container is borrowed mutably for 'a.
        unsafe {
            match self.descriptor.begin(self.container) {
                Some(mut it) => {
                    it.advance(index as isize);
                    self.descriptor.insert_value_at_iterator(&it, value.data())
                }
                None => false,
            }
        }
    }

    /// Erases the element at iteration position `index`.
    pub fn remove(&mut self, index: usize) -> bool {
        // SAFETY: the container is borrowed mutably for 'a.
        unsafe {
            match self.descriptor.begin(self.container) {
                Some(mut it) => {
                    it.advance(index as isize);
                    self.descriptor.erase_value_at_iterator(&it)
                }
                None => false,
            }
        }
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        // SAFETY: the container is borrowed mutably for 'a.
        unsafe { self.descriptor.clear(self.container) }
    }
}

impl fmt::Debug for SequenceIterable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An association borrowed for type-erased access.
///
/// # Example
///
/// ```
/// use reflecta::runtime::MetaValue;
/// use reflecta::runtime::container::AssociationIterable;
/// use std::collections::BTreeMap;
///
/// let mut ages = BTreeMap::from([(String::from("ada"), 36i32)]);
/// let mut assoc = AssociationIterable::new(&mut ages).unwrap();
/// assert!(assoc.contains(&MetaValue::from("ada")));
/// assert!(assoc.insert(&MetaValue::from("alan"), &MetaValue::from(41i32)));
/// assert_eq!(ages["alan"], 41);
/// ```
pub struct AssociationIterable<'a> {
    container: *mut u8,
    descriptor: &'static AssociationDescriptor,
    _borrow: PhantomData<&'a mut ()>,
}

impl<'a> AssociationIterable<'a> {
    /// Borrows `container`; `None` if its type is not an association.
    #[must_use]
    pub fn new<C: MetaTypeOf>(container: &'a mut C) -> Option<Self> {
        let descriptor = C::meta_type().association()?;
        Some(AssociationIterable {
            container: (container as *mut C).cast(),
            descriptor,
            _borrow: PhantomData,
        })
    }

    /// Wraps a raw container.
    ///
    /// # Safety
    ///
    /// `container` must point to a live container described by
    /// `descriptor`, exclusively borrowed for `'a`.
    #[must_use]
    pub unsafe fn from_raw(container: *mut u8, descriptor: &'static AssociationDescriptor) -> Self {
        AssociationIterable {
            container,
            descriptor,
            _borrow: PhantomData,
        }
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &'static AssociationDescriptor {
        self.descriptor
    }

    fn is_key(&self, key: &MetaValue) -> bool {
        key.is_valid() && key.meta_type() == self.descriptor.key_meta_type()
    }

    fn is_mapped(&self, value: &MetaValue) -> bool {
        value.is_valid() && value.meta_type() == self.descriptor.mapped_meta_type()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: the container is borrowed for 'a.
        unsafe { self.descriptor.size(self.container) }
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &MetaValue) -> bool {
        // SAFETY: the container is borrowed for 'a and key holds a key.
        self.is_key(key) && unsafe { self.descriptor.contains_key(self.container, key.data()) }
    }

    /// Copy of the mapped value of `key`; `None` for sets and missing keys.
    #[must_use]
    pub fn value(&self, key: &MetaValue) -> Option<MetaValue> {
        if !self.is_key(key) || !self.contains(key) {
            return None;
        }
        let mut out = MetaValue::default_of(self.descriptor.mapped_meta_type())?;
        // SAFETY: out holds an initialized mapped value.
        unsafe {
            self.descriptor
                .mapped_at_key(self.container, key.data(), out.data_mut())
        }
        .then_some(out)
    }

    /// Inserts or replaces the entry `key -> value`.
    pub fn insert(&mut self, key: &MetaValue, value: &MetaValue) -> bool {
        if !self.is_key(key) || !self.is_mapped(value) {
            return false;
        }
        // SAFETY: the container is borrowed mutably for 'a.
        unsafe {
            self.descriptor
                .set_mapped_at_key(self.container, key.data(), value.data())
        }
    }

    /// Inserts `key` (with a default mapped value for maps).
    pub fn insert_key(&mut self, key: &MetaValue) -> bool {
        // SAFETY: the container is borrowed mutably for 'a.
        self.is_key(key) && unsafe { self.descriptor.insert_key(self.container, key.data()) }
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: &MetaValue) -> bool {
        // SAFETY: the container is borrowed mutably for 'a.
        self.is_key(key) && unsafe { self.descriptor.remove_key(self.container, key.data()) }
    }

    /// Copy of the entry at iteration position `pos`.
    #[must_use]
    pub fn entry(&self, pos: usize) -> Option<(MetaValue, Option<MetaValue>)> {
        // SAFETY: the container is borrowed for 'a; pointers are only used
        // to copy values out.
        unsafe {
            let key_ptr = self.descriptor.key_ptr(self.container, pos);
            if key_ptr.is_null() {
                return None;
            }
            let key = MetaValue::from_raw(self.descriptor.key_meta_type(), key_ptr)?;
            let mapped_ptr = self.descriptor.mapped_ptr(self.container, pos);
            let mapped = if mapped_ptr.is_null() {
                None
            } else {
                MetaValue::from_raw(self.descriptor.mapped_meta_type(), mapped_ptr)
            };
            Some((key, mapped))
        }
    }

    /// Copies of all entries in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (MetaValue, Option<MetaValue>)> + '_ {
        (0..self.len()).filter_map(|pos| self.entry(pos))
    }

    /// Copies of all keys in iteration order.
    pub fn keys(&self) -> impl Iterator<Item = MetaValue> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        // SAFETY: the container is borrowed mutably for 'a.
        unsafe { self.descriptor.clear(self.container) }
    }
}

impl fmt::Debug for AssociationIterable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, mapped) in self.iter() {
            map.entry(&key, &mapped);
        }
        map.finish()
    }
}
