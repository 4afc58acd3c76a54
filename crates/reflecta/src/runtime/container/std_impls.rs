//! Capability traits and type descriptors for the std collections.
//!
//! `Vec` is always available. The other collections are behind the
//! `std-containers` feature.
//!
//! | Container    | Iterator      | Ends        | Indexed | Insert     | Association |
//! |--------------|---------------|-------------|---------|------------|-------------|
//! | `Vec`        | random access | back        | yes     | positional | no          |
//! | `VecDeque`   | random access | both        | yes     | positional | no          |
//! | `LinkedList` | bidirectional | both        | no      | positional | no          |
//! | `BTreeSet`   | bidirectional | none        | no      | unordered  | key-only    |
//! | `HashSet`    | forward       | none        | no      | unordered  | key-only    |
//! | `BTreeMap`   | bidirectional | n/a         | n/a     | n/a        | yes         |
//! | `HashMap`    | forward       | n/a         | n/a     | n/a        | yes         |

use super::ops::{
    AssociativeContainer, Container, Erase, IndexedAccess, MutableElements, PopBack,
    PositionalInsert, PushBack,
};
use super::{intern_sequence, IteratorCapabilities, SequenceDescriptor, SequenceSupport};
use crate::runtime::meta_type::{
    CompareFn, Comparison, DebugStreamFn, EqualsFn, MetaType, MetaTypeOf, TypeDescriptor,
};
use crate::runtime::detect::{clone_thunk, default_thunk};
use crate::runtime::registry;
use std::fmt;

// ============================================================================
// Element-wise operations shared by all containers
// ============================================================================

unsafe fn items_of<'a, C: Container>(ptr: *const u8) -> &'a C {
    // SAFETY: ptr points to a live C.
    unsafe { &*ptr.cast::<C>() }
}

fn raw<T>(value: &T) -> *const u8 {
    (value as *const T).cast()
}

unsafe fn sequence_equals<C: Container>(lhs: *const u8, rhs: *const u8) -> bool {
    let (a, b) = unsafe { (items_of::<C>(lhs), items_of::<C>(rhs)) };
    let meta = C::Item::meta_type();
    a.item_count() == b.item_count()
        // SAFETY: both items are live values of the element type.
        && a.items().zip(b.items()).all(|(x, y)| unsafe { meta.equals(raw(x), raw(y)) })
}

unsafe fn sequence_compare<C: Container>(lhs: *const u8, rhs: *const u8) -> Comparison {
    let (a, b) = unsafe { (items_of::<C>(lhs), items_of::<C>(rhs)) };
    let meta = C::Item::meta_type();
    for (x, y) in a.items().zip(b.items()) {
        // SAFETY: both items are live values of the element type.
        match unsafe { meta.compare(raw(x), raw(y)) } {
            Comparison::Equivalent => {}
            other => return other,
        }
    }
    Some(a.item_count().cmp(&b.item_count())).into()
}

unsafe fn sequence_debug<C: Container>(ptr: *const u8, out: &mut dyn fmt::Write) -> fmt::Result {
    let items = unsafe { items_of::<C>(ptr) };
    let meta = C::Item::meta_type();
    out.write_char('[')?;
    for (i, item) in items.items().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        // SAFETY: item is a live value of the element type.
        unsafe { debug_value(meta, raw(item), out)? };
    }
    out.write_char(']')
}

unsafe fn entries_of<'a, C: AssociativeContainer>(ptr: *const u8) -> &'a C {
    // SAFETY: ptr points to a live C.
    unsafe { &*ptr.cast::<C>() }
}

unsafe fn association_equals<C: AssociativeContainer>(lhs: *const u8, rhs: *const u8) -> bool {
    let (a, b) = unsafe { (entries_of::<C>(lhs), entries_of::<C>(rhs)) };
    let mapped = C::Mapped::meta_type();
    a.entry_count() == b.entry_count()
        && a.entries().all(|(key, value)| match b.mapped(key) {
            // SAFETY: both are live mapped values.
            Some(other) => !C::HAS_MAPPED || unsafe { mapped.equals(raw(value), raw(other)) },
            None => false,
        })
}

unsafe fn association_debug<C: AssociativeContainer>(
    ptr: *const u8,
    out: &mut dyn fmt::Write,
) -> fmt::Result {
    let entries = unsafe { entries_of::<C>(ptr) };
    let (key_meta, mapped_meta) = (C::Key::meta_type(), C::Mapped::meta_type());
    out.write_char('{')?;
    for (i, (key, value)) in entries.entries().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        // SAFETY: key and value are live values of their types.
        unsafe {
            debug_value(key_meta, raw(key), out)?;
            if C::HAS_MAPPED {
                out.write_str(": ")?;
                debug_value(mapped_meta, raw(value), out)?;
            }
        }
    }
    out.write_char('}')
}

unsafe fn debug_value(meta: MetaType, ptr: *const u8, out: &mut dyn fmt::Write) -> fmt::Result {
    // SAFETY: forwarded caller contract.
    if unsafe { meta.debug_stream(ptr, out) } {
        Ok(())
    } else {
        write!(out, "<{}>", meta.name())
    }
}

/// Descriptor of a sequence container, with comparison and formatting
/// derived from the element type.
fn sequence_type<C: Container + Default + Clone + SequenceSupport>(
    name: String,
) -> &'static TypeDescriptor {
    let item = C::Item::meta_type();
    TypeDescriptor::builder::<C>(&name)
        .default_ctr(Some(default_thunk::<C>))
        .copy_ctr(Some(clone_thunk::<C>))
        .equals(item.is_equality_comparable().then_some(sequence_equals::<C> as EqualsFn))
        .compare(item.is_ordered().then_some(sequence_compare::<C> as CompareFn))
        .debug_stream(item.has_debug_stream().then_some(sequence_debug::<C> as DebugStreamFn))
        .sequence(Some(C::sequence_descriptor()))
        .build()
}

// ============================================================================
// Vec
// ============================================================================

impl<T: MetaTypeOf + Clone> Container for Vec<T> {
    type Item = T;
    const ITERATOR: IteratorCapabilities = IteratorCapabilities::RANDOM_ACCESS;

    fn item_count(&self) -> usize {
        self.len()
    }

    fn remove_all(&mut self) {
        self.clear();
    }

    fn item_at(&self, pos: usize) -> Option<&T> {
        self.get(pos)
    }

    fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
        Box::new(self.iter())
    }
}

impl<T: MetaTypeOf + Clone> MutableElements for Vec<T> {
    fn item_at_mut(&mut self, pos: usize) -> Option<&mut T> {
        self.get_mut(pos)
    }
}

impl<T: MetaTypeOf + Clone> IndexedAccess for Vec<T> {}

impl<T: MetaTypeOf + Clone> PushBack for Vec<T> {
    fn push_back_item(&mut self, value: T) {
        self.push(value);
    }
}

impl<T: MetaTypeOf + Clone> PopBack for Vec<T> {
    fn pop_back_item(&mut self) -> bool {
        self.pop().is_some()
    }
}

impl<T: MetaTypeOf + Clone> PositionalInsert for Vec<T> {
    fn insert_item_at(&mut self, pos: usize, value: T) {
        self.insert(pos.min(self.len()), value);
    }
}

impl<T: MetaTypeOf + Clone> Erase for Vec<T> {
    fn erase_item_at(&mut self, pos: usize) {
        if pos < self.len() {
            self.remove(pos);
        }
    }

    fn erase_item_range(&mut self, first: usize, last: usize) {
        let last = last.min(self.len());
        if first < last {
            self.drain(first..last);
        }
    }
}

impl<T: MetaTypeOf + Clone> SequenceSupport for Vec<T> {
    fn sequence_descriptor() -> &'static SequenceDescriptor {
        intern_sequence::<Self>(|| {
            SequenceDescriptor::builder::<Self>()
                .push_back()
                .pop_back()
                .indexed()
                .positional_insert()
                .erase()
                .build()
        })
    }
}

impl<T: MetaTypeOf + Clone> MetaTypeOf for Vec<T> {
    fn descriptor() -> &'static TypeDescriptor {
        registry::intern_type::<Self>(|| sequence_type::<Self>(format!("Vec<{}>", T::meta_type().name())))
    }
}

#[cfg(feature = "std-containers")]
mod collections {
    use super::*;
    use crate::runtime::container::ops::{PopFront, PushFront, UnorderedInsert};
    use crate::runtime::container::{intern_association, AssociationDescriptor, AssociationSupport};
    use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
    use std::hash::Hash;

    fn association_type<C>(name: String, sequence: Option<&'static SequenceDescriptor>) -> &'static TypeDescriptor
    where
        C: AssociativeContainer + Default + Clone + AssociationSupport,
    {
        let comparable = C::Key::meta_type().is_equality_comparable()
            && (!C::HAS_MAPPED || C::Mapped::meta_type().is_equality_comparable());
        let printable = C::Key::meta_type().has_debug_stream()
            && (!C::HAS_MAPPED || C::Mapped::meta_type().has_debug_stream());
        TypeDescriptor::builder::<C>(&name)
            .default_ctr(Some(default_thunk::<C>))
            .copy_ctr(Some(clone_thunk::<C>))
            .equals(comparable.then_some(association_equals::<C> as EqualsFn))
            .debug_stream(printable.then_some(association_debug::<C> as DebugStreamFn))
            .sequence(sequence)
            .association(Some(C::association_descriptor()))
            .build()
    }

    // ========================================================================
    // VecDeque
    // ========================================================================

    impl<T: MetaTypeOf + Clone> Container for VecDeque<T> {
        type Item = T;
        const ITERATOR: IteratorCapabilities = IteratorCapabilities::RANDOM_ACCESS;

        fn item_count(&self) -> usize {
            self.len()
        }

        fn remove_all(&mut self) {
            self.clear();
        }

        fn item_at(&self, pos: usize) -> Option<&T> {
            self.get(pos)
        }

        fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
            Box::new(self.iter())
        }
    }

    impl<T: MetaTypeOf + Clone> MutableElements for VecDeque<T> {
        fn item_at_mut(&mut self, pos: usize) -> Option<&mut T> {
            self.get_mut(pos)
        }
    }

    impl<T: MetaTypeOf + Clone> IndexedAccess for VecDeque<T> {}

    impl<T: MetaTypeOf + Clone> PushBack for VecDeque<T> {
        fn push_back_item(&mut self, value: T) {
            self.push_back(value);
        }
    }

    impl<T: MetaTypeOf + Clone> PushFront for VecDeque<T> {
        fn push_front_item(&mut self, value: T) {
            self.push_front(value);
        }
    }

    impl<T: MetaTypeOf + Clone> PopBack for VecDeque<T> {
        fn pop_back_item(&mut self) -> bool {
            self.pop_back().is_some()
        }
    }

    impl<T: MetaTypeOf + Clone> PopFront for VecDeque<T> {
        fn pop_front_item(&mut self) -> bool {
            self.pop_front().is_some()
        }
    }

    impl<T: MetaTypeOf + Clone> PositionalInsert for VecDeque<T> {
        fn insert_item_at(&mut self, pos: usize, value: T) {
            self.insert(pos.min(self.len()), value);
        }
    }

    impl<T: MetaTypeOf + Clone> Erase for VecDeque<T> {
        fn erase_item_at(&mut self, pos: usize) {
            self.remove(pos);
        }

        fn erase_item_range(&mut self, first: usize, last: usize) {
            let last = last.min(self.len());
            if first < last {
                self.drain(first..last);
            }
        }
    }

    impl<T: MetaTypeOf + Clone> SequenceSupport for VecDeque<T> {
        fn sequence_descriptor() -> &'static SequenceDescriptor {
            intern_sequence::<Self>(|| {
                SequenceDescriptor::builder::<Self>()
                    .push_back()
                    .push_front()
                    .pop_back()
                    .pop_front()
                    .indexed()
                    .positional_insert()
                    .erase()
                    .build()
            })
        }
    }

    impl<T: MetaTypeOf + Clone> MetaTypeOf for VecDeque<T> {
        fn descriptor() -> &'static TypeDescriptor {
            registry::intern_type::<Self>(|| {
                sequence_type::<Self>(format!("VecDeque<{}>", T::meta_type().name()))
            })
        }
    }

    // ========================================================================
    // LinkedList
    // ========================================================================

    impl<T: MetaTypeOf + Clone> Container for LinkedList<T> {
        type Item = T;
        const ITERATOR: IteratorCapabilities = IteratorCapabilities::BIDIRECTIONAL;

        fn item_count(&self) -> usize {
            self.len()
        }

        fn remove_all(&mut self) {
            self.clear();
        }

        fn item_at(&self, pos: usize) -> Option<&T> {
            self.iter().nth(pos)
        }

        fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
            Box::new(self.iter())
        }
    }

    impl<T: MetaTypeOf + Clone> MutableElements for LinkedList<T> {
        fn item_at_mut(&mut self, pos: usize) -> Option<&mut T> {
            self.iter_mut().nth(pos)
        }
    }

    impl<T: MetaTypeOf + Clone> PushBack for LinkedList<T> {
        fn push_back_item(&mut self, value: T) {
            self.push_back(value);
        }
    }

    impl<T: MetaTypeOf + Clone> PushFront for LinkedList<T> {
        fn push_front_item(&mut self, value: T) {
            self.push_front(value);
        }
    }

    impl<T: MetaTypeOf + Clone> PopBack for LinkedList<T> {
        fn pop_back_item(&mut self) -> bool {
            self.pop_back().is_some()
        }
    }

    impl<T: MetaTypeOf + Clone> PopFront for LinkedList<T> {
        fn pop_front_item(&mut self) -> bool {
            self.pop_front().is_some()
        }
    }

    impl<T: MetaTypeOf + Clone> PositionalInsert for LinkedList<T> {
        fn insert_item_at(&mut self, pos: usize, value: T) {
            let mut tail = self.split_off(pos.min(self.len()));
            self.push_back(value);
            self.append(&mut tail);
        }
    }

    impl<T: MetaTypeOf + Clone> Erase for LinkedList<T> {
        fn erase_item_at(&mut self, pos: usize) {
            if pos < self.len() {
                let mut tail = self.split_off(pos);
                tail.pop_front();
                self.append(&mut tail);
            }
        }
    }

    impl<T: MetaTypeOf + Clone> SequenceSupport for LinkedList<T> {
        fn sequence_descriptor() -> &'static SequenceDescriptor {
            intern_sequence::<Self>(|| {
                SequenceDescriptor::builder::<Self>()
                    .push_back()
                    .push_front()
                    .pop_back()
                    .pop_front()
                    .mutable_elements()
                    .positional_insert()
                    .erase()
                    .build()
            })
        }
    }

    impl<T: MetaTypeOf + Clone> MetaTypeOf for LinkedList<T> {
        fn descriptor() -> &'static TypeDescriptor {
            registry::intern_type::<Self>(|| {
                sequence_type::<Self>(format!("LinkedList<{}>", T::meta_type().name()))
            })
        }
    }

    // ========================================================================
    // Sets: sequences with unordered insertion, and key-only associations
    // ========================================================================

    macro_rules! set_impls {
        ($set:ident, [$($bound:tt)+], $iterator:expr) => {
            impl<T: MetaTypeOf + Clone + $($bound)+> Container for $set<T> {
                type Item = T;
                const ITERATOR: IteratorCapabilities = $iterator;

                fn item_count(&self) -> usize {
                    self.len()
                }

                fn remove_all(&mut self) {
                    self.clear();
                }

                fn item_at(&self, pos: usize) -> Option<&T> {
                    self.iter().nth(pos)
                }

                fn items(&self) -> Box<dyn Iterator<Item = &T> + '_> {
                    Box::new(self.iter())
                }
            }

            impl<T: MetaTypeOf + Clone + $($bound)+> UnorderedInsert for $set<T> {
                fn insert_item(&mut self, value: T) {
                    self.insert(value);
                }
            }

            impl<T: MetaTypeOf + Clone + $($bound)+> Erase for $set<T> {
                fn erase_item_at(&mut self, pos: usize) {
                    if let Some(value) = self.iter().nth(pos).cloned() {
                        self.remove(&value);
                    }
                }
            }

            impl<T: MetaTypeOf + Clone + $($bound)+> AssociativeContainer for $set<T> {
                type Key = T;
                type Mapped = ();
                const HAS_MAPPED: bool = false;
                const ITERATOR: IteratorCapabilities = $iterator;

                fn entry_count(&self) -> usize {
                    self.len()
                }

                fn remove_all_entries(&mut self) {
                    self.clear();
                }

                fn contains(&self, key: &T) -> bool {
                    $set::contains(self, key)
                }

                fn insert_key(&mut self, key: T) {
                    self.insert(key);
                }

                fn remove_key(&mut self, key: &T) {
                    self.remove(key);
                }

                fn mapped(&self, key: &T) -> Option<&()> {
                    $set::contains(self, key).then_some(&())
                }

                fn set_mapped(&mut self, key: T, _value: ()) {
                    self.insert(key);
                }

                fn entry_at(&self, pos: usize) -> Option<(&T, &())> {
                    self.iter().nth(pos).map(|key| (key, &()))
                }

                fn position_of(&self, key: &T) -> Option<usize> {
                    self.iter().position(|k| k == key)
                }

                fn entries(&self) -> Box<dyn Iterator<Item = (&T, &())> + '_> {
                    Box::new(self.iter().map(|key| (key, &())))
                }
            }

            impl<T: MetaTypeOf + Clone + $($bound)+> SequenceSupport for $set<T> {
                fn sequence_descriptor() -> &'static SequenceDescriptor {
                    intern_sequence::<Self>(|| {
                        SequenceDescriptor::builder::<Self>()
                            .unordered_insert()
                            .erase()
                            .build()
                    })
                }
            }

            impl<T: MetaTypeOf + Clone + $($bound)+> AssociationSupport for $set<T> {
                fn association_descriptor() -> &'static AssociationDescriptor {
                    intern_association::<Self>(AssociationDescriptor::for_container::<Self>)
                }
            }

            impl<T: MetaTypeOf + Clone + $($bound)+> MetaTypeOf for $set<T> {
                fn descriptor() -> &'static TypeDescriptor {
                    registry::intern_type::<Self>(|| {
                        association_type::<Self>(
                            format!("{}<{}>", stringify!($set), T::meta_type().name()),
                            Some(<Self as SequenceSupport>::sequence_descriptor()),
                        )
                    })
                }
            }
        };
    }

    set_impls!(BTreeSet, [Ord], IteratorCapabilities::BIDIRECTIONAL);
    set_impls!(HashSet, [Eq + Hash], IteratorCapabilities::FORWARD);

    // ========================================================================
    // Maps
    // ========================================================================

    macro_rules! map_impls {
        ($map:ident, [$($bound:tt)+], $iterator:expr) => {
            impl<K, V> AssociativeContainer for $map<K, V>
            where
                K: MetaTypeOf + Clone + $($bound)+,
                V: MetaTypeOf + Clone + Default,
            {
                type Key = K;
                type Mapped = V;
                const HAS_MAPPED: bool = true;
                const ITERATOR: IteratorCapabilities = $iterator;

                fn entry_count(&self) -> usize {
                    self.len()
                }

                fn remove_all_entries(&mut self) {
                    self.clear();
                }

                fn contains(&self, key: &K) -> bool {
                    self.contains_key(key)
                }

                fn insert_key(&mut self, key: K) {
                    self.entry(key).or_default();
                }

                fn remove_key(&mut self, key: &K) {
                    self.remove(key);
                }

                fn mapped(&self, key: &K) -> Option<&V> {
                    self.get(key)
                }

                fn set_mapped(&mut self, key: K, value: V) {
                    self.insert(key, value);
                }

                fn entry_at(&self, pos: usize) -> Option<(&K, &V)> {
                    self.iter().nth(pos)
                }

                fn position_of(&self, key: &K) -> Option<usize> {
                    self.keys().position(|k| k == key)
                }

                fn entries(&self) -> Box<dyn Iterator<Item = (&K, &V)> + '_> {
                    Box::new(self.iter())
                }
            }

            impl<K, V> AssociationSupport for $map<K, V>
            where
                K: MetaTypeOf + Clone + $($bound)+,
                V: MetaTypeOf + Clone + Default,
            {
                fn association_descriptor() -> &'static AssociationDescriptor {
                    intern_association::<Self>(AssociationDescriptor::for_container::<Self>)
                }
            }

            impl<K, V> MetaTypeOf for $map<K, V>
            where
                K: MetaTypeOf + Clone + $($bound)+,
                V: MetaTypeOf + Clone + Default,
            {
                fn descriptor() -> &'static TypeDescriptor {
                    registry::intern_type::<Self>(|| {
                        association_type::<Self>(
                            format!(
                                "{}<{},{}>",
                                stringify!($map),
                                K::meta_type().name(),
                                V::meta_type().name()
                            ),
                            None,
                        )
                    })
                }
            }
        };
    }

    map_impls!(BTreeMap, [Ord], IteratorCapabilities::BIDIRECTIONAL);
    map_impls!(HashMap, [Eq + Hash], IteratorCapabilities::FORWARD);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::container::Position;
    use crate::runtime::meta_type::TypeFlags;

    #[test]
    fn test_vec_descriptor_names_and_flags() {
        let meta = MetaType::of::<Vec<Vec<i32>>>();
        assert_eq!(meta.name(), "Vec<Vec<i32>>");
        assert!(meta.flags().contains(TypeFlags::IS_SEQUENCE));
        assert!(!meta.flags().contains(TypeFlags::IS_ASSOCIATION));
        assert!(meta.sequence().is_some());
    }

    #[test]
    fn test_vec_equality_and_order_follow_elements() {
        let meta = MetaType::of::<Vec<i32>>();
        let (a, b, c) = (vec![1, 2], vec![1, 2], vec![1, 3]);
        unsafe {
            assert!(meta.equals(raw(&a), raw(&b)));
            assert!(!meta.equals(raw(&a), raw(&c)));
            assert_eq!(meta.compare(raw(&a), raw(&c)), Comparison::Less);
            assert_eq!(meta.compare(raw(&a), raw(&vec![1])), Comparison::Greater);
        }
    }

    #[test]
    fn test_vec_debug() {
        let meta = MetaType::of::<Vec<String>>();
        let v = vec!["a".to_string(), "b".to_string()];
        let mut out = String::new();
        assert!(unsafe { meta.debug_stream(raw(&v), &mut out) });
        assert_eq!(out, r#"["a", "b"]"#);
    }

    #[cfg(feature = "std-containers")]
    #[test]
    fn test_deque_is_sortable_vec_is_not() {
        use std::collections::VecDeque;
        assert!(VecDeque::<i32>::sequence_descriptor().is_sortable());
        assert!(!Vec::<i32>::sequence_descriptor().is_sortable());
    }

    #[cfg(feature = "std-containers")]
    #[test]
    fn test_hash_set_unordered_add() {
        use std::collections::HashSet;
        let seq = HashSet::<i32>::sequence_descriptor();
        assert!(seq.can_add_value());
        assert!(!seq.can_add_value_at_begin());
        assert!(!seq.can_add_value_at_end());

        let mut set = HashSet::new();
        let c = (&mut set as *mut HashSet<i32>).cast::<u8>();
        unsafe {
            assert!(seq.add_value(c, raw(&5i32), Position::Unspecified));
            assert!(!seq.add_value(c, raw(&6i32), Position::AtEnd));
        }
        assert!(set.contains(&5));
        assert_eq!(set.len(), 1);
    }

    #[cfg(feature = "std-containers")]
    #[test]
    fn test_map_type_descriptor() {
        use std::collections::BTreeMap;
        let meta = MetaType::of::<BTreeMap<String, i32>>();
        assert_eq!(meta.name(), "BTreeMap<String,i32>");
        assert!(meta.association().is_some());
        let map = BTreeMap::from([("k".to_string(), 1)]);
        let mut out = String::new();
        assert!(unsafe { meta.debug_stream(raw(&map), &mut out) });
        assert_eq!(out, r#"{"k": 1}"#);
    }

    #[cfg(feature = "std-containers")]
    #[test]
    fn test_linked_list_positional_insert() {
        use std::collections::LinkedList;
        let seq = LinkedList::<i32>::sequence_descriptor();
        assert!(!seq.has_value_at_index());
        let mut list = LinkedList::from([1, 3]);
        let c = (&mut list as *mut LinkedList<i32>).cast::<u8>();
        unsafe {
            let mut it = seq.begin(c).unwrap();
            it.advance(1);
            assert!(seq.insert_value_at_iterator(&it, raw(&2i32)));
            assert!(it.advance(-1));
        }
        assert_eq!(list.into_iter().collect::<Vec<_>>(), [1, 2, 3]);
    }
}
