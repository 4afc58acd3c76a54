//! Capability traits for container descriptors.
//!
//! Implement [`Container`] (or [`AssociativeContainer`]) plus whichever
//! capability traits a container supports, then build its descriptor with
//! [`SequenceDescriptor::builder`](super::SequenceDescriptor::builder). The
//! builder methods are bounded on these traits.
//!
//! Positions are iteration-order indices. For unordered containers they
//! are stable only until the next write.

use super::IteratorCapabilities;
use crate::runtime::meta_type::MetaTypeOf;

/// A container of values.
pub trait Container: Send + 'static {
    /// Element type.
    type Item: MetaTypeOf + Clone;

    /// Iterator category of the container.
    const ITERATOR: IteratorCapabilities;

    /// Number of elements.
    fn item_count(&self) -> usize;

    /// Removes every element.
    fn remove_all(&mut self);

    /// Element at an iteration position.
    fn item_at(&self, pos: usize) -> Option<&Self::Item>;

    /// Elements in iteration order.
    fn items(&self) -> Box<dyn Iterator<Item = &Self::Item> + '_> {
        Box::new((0..self.item_count()).filter_map(move |pos| self.item_at(pos)))
    }
}

/// Elements can be modified in place.
pub trait MutableElements: Container {
    /// Mutable element at an iteration position.
    fn item_at_mut(&mut self, pos: usize) -> Option<&mut Self::Item>;
}

/// Positions are indices with constant-time access.
pub trait IndexedAccess: MutableElements {}

/// Append at the back.
pub trait PushBack: Container {
    /// Appends `value`.
    fn push_back_item(&mut self, value: Self::Item);
}

/// Prepend at the front.
pub trait PushFront: Container {
    /// Prepends `value`.
    fn push_front_item(&mut self, value: Self::Item);
}

/// Remove from the back.
pub trait PopBack: Container {
    /// Removes the last element; false if empty.
    fn pop_back_item(&mut self) -> bool;
}

/// Remove from the front.
pub trait PopFront: Container {
    /// Removes the first element; false if empty.
    fn pop_front_item(&mut self) -> bool;
}

/// Insert before an arbitrary position.
pub trait PositionalInsert: Container {
    /// Inserts `value` so that it ends up at `pos`.
    fn insert_item_at(&mut self, pos: usize, value: Self::Item);
}

/// Insert where the container decides.
pub trait UnorderedInsert: Container {
    /// Inserts `value`.
    fn insert_item(&mut self, value: Self::Item);
}

/// Erase by position.
pub trait Erase: Container {
    /// Removes the element at `pos`.
    fn erase_item_at(&mut self, pos: usize);

    /// Removes the elements in `first..last`.
    fn erase_item_range(&mut self, first: usize, last: usize) {
        for _ in first..last.min(self.item_count()) {
            self.erase_item_at(first);
        }
    }
}

/// A keyed container. Sets use `()` as the mapped type.
pub trait AssociativeContainer: Send + 'static {
    /// Key type.
    type Key: MetaTypeOf + Clone;
    /// Mapped type; `()` for sets.
    type Mapped: MetaTypeOf + Clone + Default;

    /// False for sets.
    const HAS_MAPPED: bool;

    /// Iterator category of the container.
    const ITERATOR: IteratorCapabilities;

    /// Number of entries.
    fn entry_count(&self) -> usize;

    /// Removes every entry.
    fn remove_all_entries(&mut self);

    /// Returns true if `key` is present.
    fn contains(&self, key: &Self::Key) -> bool;

    /// Inserts `key` with a default mapped value if it is absent.
    fn insert_key(&mut self, key: Self::Key);

    /// Removes `key` if present.
    fn remove_key(&mut self, key: &Self::Key);

    /// Mapped value of `key`.
    fn mapped(&self, key: &Self::Key) -> Option<&Self::Mapped>;

    /// Inserts or replaces the mapped value of `key`.
    fn set_mapped(&mut self, key: Self::Key, value: Self::Mapped);

    /// Entry at an iteration position.
    fn entry_at(&self, pos: usize) -> Option<(&Self::Key, &Self::Mapped)>;

    /// Iteration position of `key`.
    fn position_of(&self, key: &Self::Key) -> Option<usize>;

    /// Entries in iteration order.
    fn entries(&self) -> Box<dyn Iterator<Item = (&Self::Key, &Self::Mapped)> + '_> {
        Box::new((0..self.entry_count()).filter_map(move |pos| self.entry_at(pos)))
    }
}
