//! Integration tests for container descriptors.

mod common;

use common::Point;
use reflecta::runtime::container::ops::{Container, PopBack, PushBack};
use reflecta::runtime::container::SequenceDescriptor;
use reflecta::runtime::{IteratorCapabilities, MetaType, MetaValue, Position};
use std::collections::{BTreeMap, HashSet, VecDeque};

fn ptr<T>(value: &T) -> *const u8 {
    (value as *const T).cast()
}

fn ptr_mut<T>(value: &mut T) -> *mut u8 {
    (value as *mut T).cast()
}

/// A container offering only `push_back` and `pop_back`.
#[derive(Debug, Default)]
struct Stack(Vec<i32>);

impl Container for Stack {
    type Item = i32;
    const ITERATOR: IteratorCapabilities = IteratorCapabilities::FORWARD;

    fn item_count(&self) -> usize {
        self.0.len()
    }

    fn remove_all(&mut self) {
        self.0.clear();
    }

    fn item_at(&self, pos: usize) -> Option<&i32> {
        self.0.get(pos)
    }
}

impl PushBack for Stack {
    fn push_back_item(&mut self, value: i32) {
        self.0.push(value);
    }
}

impl PopBack for Stack {
    fn pop_back_item(&mut self) -> bool {
        self.0.pop().is_some()
    }
}

fn stack_descriptor() -> &'static SequenceDescriptor {
    SequenceDescriptor::builder::<Stack>().push_back().pop_back().build()
}

// ============================================================================
// Sequences
// ============================================================================

#[test]
fn test_dynamic_array_scenario() {
    let seq = MetaType::of::<Vec<i32>>().sequence().unwrap();
    let mut numbers = vec![1i32, 2, 3];
    let c = ptr_mut(&mut numbers);
    let mut out = 0i32;

    unsafe {
        assert_eq!(seq.size(c), 3);
        assert!(seq.value_at_index(c, 1, ptr_mut(&mut out)));
        assert_eq!(out, 2);
        assert!(seq.add_value_at_end(c, ptr(&4i32)));
        assert_eq!(seq.size(c), 4);
        assert!(seq.value_at_index(c, 3, ptr_mut(&mut out)));
        assert_eq!(out, 4);
    }
}

#[test]
fn test_push_back_only_capabilities() {
    let seq = stack_descriptor();
    assert_eq!(seq.value_meta_type(), MetaType::of::<i32>());
    assert!(!seq.can_add_value_at_begin());
    assert!(seq.can_add_value_at_end());
    assert!(seq.can_remove_value_at_end());
    assert!(!seq.can_remove_value_at_begin());
    assert!(!seq.is_sortable());
    assert!(!seq.has_value_at_index());
    assert!(!seq.has_iterator());

    let mut unspecified = Stack(vec![1, 2]);
    let mut at_end = Stack(vec![1, 2]);
    unsafe {
        assert!(seq.add_value(ptr_mut(&mut unspecified), ptr(&3i32), Position::Unspecified));
        assert!(seq.add_value_at_end(ptr_mut(&mut at_end), ptr(&3i32)));
        assert!(!seq.add_value(ptr_mut(&mut at_end), ptr(&0i32), Position::AtBegin));
        assert!(!seq.remove_value(ptr_mut(&mut at_end), Position::AtBegin));
        assert!(seq.begin(ptr_mut(&mut at_end)).is_none());
    }
    assert_eq!(unspecified.0, at_end.0);
    assert_eq!(at_end.0, [1, 2, 3]);

    unsafe {
        assert!(seq.remove_value(ptr_mut(&mut unspecified), Position::Unspecified));
    }
    assert_eq!(unspecified.0, [1, 2]);
}

#[test]
fn test_double_ended_sequence() {
    let seq = MetaType::of::<VecDeque<Point>>().sequence().unwrap();
    assert!(seq.is_sortable());
    assert_eq!(seq.value_meta_type(), MetaType::of::<Point>());

    let mut points = VecDeque::from([Point { x: 1, y: 1 }]);
    let c = ptr_mut(&mut points);
    unsafe {
        assert!(seq.add_value(c, ptr(&Point { x: 0, y: 0 }), Position::AtBegin));
        assert!(seq.add_value(c, ptr(&Point { x: 2, y: 2 }), Position::Unspecified));
        assert!(seq.remove_value(c, Position::AtBegin));
    }
    assert_eq!(points, [Point { x: 1, y: 1 }, Point { x: 2, y: 2 }]);
}

#[test]
fn test_iterators_over_vec() {
    let seq = MetaType::of::<Vec<i32>>().sequence().unwrap();
    assert!(seq.iterator_capabilities().contains(IteratorCapabilities::RANDOM_ACCESS));

    let mut numbers = vec![10i32, 20, 30];
    let c = ptr_mut(&mut numbers);
    let mut out = 0i32;
    unsafe {
        let mut it = seq.begin(c).unwrap();
        let end = seq.end(c).unwrap();
        assert_eq!(end.diff(&it), 3);
        assert!(it.advance(1));
        assert!(seq.value_at_iterator(&it, ptr_mut(&mut out)));
        assert_eq!(out, 20);
        assert!(seq.set_value_at_iterator(&it, ptr(&25i32)));
        seq.destroy_iterator(it);
        drop(end);
    }
    assert_eq!(numbers, [10, 25, 30]);
}

#[test]
fn test_unordered_add() {
    let seq = MetaType::of::<HashSet<i32>>().sequence().unwrap();
    assert!(seq.can_add_value());
    assert!(!seq.can_add_value_at_end());

    let mut set = HashSet::from([1i32]);
    unsafe {
        assert!(seq.add_value(ptr_mut(&mut set), ptr(&2i32), Position::Unspecified));
        assert!(!seq.add_value(ptr_mut(&mut set), ptr(&3i32), Position::AtEnd));
    }
    assert_eq!(set, HashSet::from([1, 2]));
}

#[test]
fn test_sequence_through_meta_value() {
    let mut value = MetaValue::new(vec![String::from("a"), String::from("b")]);
    let mut seq = value.as_sequence().unwrap();
    assert_eq!(seq.len(), 2);
    assert!(seq.push(&MetaValue::from("c"), Position::AtEnd));
    assert!(!seq.push(&MetaValue::from(1i32), Position::AtEnd));
    let items: Vec<String> = seq
        .iter()
        .filter_map(|v| v.into_inner::<String>().ok())
        .collect();
    assert_eq!(items, ["a", "b", "c"]);
}

// ============================================================================
// Associations
// ============================================================================

#[test]
fn test_map_association() {
    let assoc = MetaType::of::<BTreeMap<String, i32>>().association().unwrap();
    assert_eq!(assoc.key_meta_type(), MetaType::of::<String>());
    assert_eq!(assoc.mapped_meta_type(), MetaType::of::<i32>());

    let mut map = BTreeMap::from([(String::from("one"), 1i32)]);
    let c = ptr_mut(&mut map);
    let two = String::from("two");
    let mut out = 0i32;
    unsafe {
        assert!(assoc.contains_key(c, ptr(&String::from("one"))));
        assert!(assoc.set_mapped_at_key(c, ptr(&two), ptr(&2i32)));
        assert!(assoc.mapped_at_key(c, ptr(&two), ptr_mut(&mut out)));
        assert_eq!(out, 2);
        assert_eq!(assoc.size(c), 2);
        assert!(assoc.remove_key(c, ptr(&two)));
    }
    assert_eq!(map.len(), 1);
}

#[test]
fn test_association_through_meta_value() {
    let mut value = MetaValue::new(BTreeMap::<i32, Point>::new());
    let mut assoc = value.as_association().unwrap();
    assert!(assoc.insert(&MetaValue::from(1i32), &MetaValue::new(Point { x: 1, y: 2 })));
    assert!(assoc.contains(&MetaValue::from(1i32)));
    let point = assoc.value(&MetaValue::from(1i32)).unwrap();
    assert_eq!(point.downcast_ref::<Point>(), Some(&Point { x: 1, y: 2 }));
    assert!(value.as_sequence().is_none());
}
