//! Integration tests for class reflection tables.

mod common;

use common::{Counter, Scripted, as_counter, chain, counter, counter_meta};
use reflecta::runtime::introspection::{class_by_name, class_hierarchy, subclasses};
use reflecta::runtime::{
    self, Access, ConnectionType, MetaType, MetaValue, MethodKind, ReturnSlot,
    normalized_signature,
};

// ============================================================================
// Offsets and lookup
// ============================================================================

#[test]
fn test_offset_monotonicity() {
    let (root, mid, leaf) = chain();

    assert_eq!(root.method_offset(), 0);
    assert_eq!(mid.method_offset(), root.method_count());
    assert_eq!(leaf.method_offset(), root.method_count() + mid.method_count());
    assert_eq!(leaf.total_method_count(), 6);

    let local = mid.index_of_method("midB(i32)") as usize - mid.method_offset();
    assert_eq!(
        leaf.index_of_method("midB(i32)"),
        (root.method_count() + local) as i32
    );
    assert_eq!(leaf.index_of_method("midB(int)"), 3);
}

#[test]
fn test_most_derived_declaration_wins() {
    let (root, _, leaf) = chain();
    assert_eq!(root.index_of_method("rootA()"), 0);
    assert_eq!(leaf.index_of_method("rootA()"), 5);
    assert_eq!(leaf.index_of_method("missing()"), -1);

    let method = leaf.method(5).unwrap();
    assert_eq!(method.enclosing_meta_object(), leaf);
    assert_eq!(method.relative_method_index(), 1);
    assert_eq!(method.method_index(), 5);
}

#[test]
fn test_property_and_class_info_chain() {
    let (root, mid, leaf) = chain();
    assert_eq!(leaf.property_offset(), 1);
    assert_eq!(leaf.index_of_property("depth"), 0);
    assert_eq!(leaf.index_of_property("label"), 1);
    assert_eq!(leaf.property(1).unwrap().meta_type(), MetaType::of::<String>());

    assert_eq!(root.class_info_value("level"), Some("root"));
    assert_eq!(leaf.class_info_value("level"), Some("mid"));
    assert_eq!(mid.total_class_info_count(), 2);
}

#[test]
fn test_class_registry() {
    let (root, mid, leaf) = chain();
    assert_eq!(class_by_name("fixtures::Leaf"), Some(leaf));
    assert_eq!(class_hierarchy(leaf), vec![leaf, mid, root]);
    assert_eq!(subclasses(root), vec![mid]);
    assert!(leaf.inherits(root));
    assert!(!root.inherits(leaf));
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_method_descriptors() {
    let meta = counter_meta();
    let signal = meta.method(counter::VALUE_CHANGED).unwrap();
    assert_eq!(signal.kind(), MethodKind::Signal);
    assert_eq!(signal.access(), Access::Public);
    assert_eq!(signal.parameter_names(), ["value"]);
    assert!(signal.returns_void());

    let f = meta.method(counter::F_I32).unwrap();
    assert_eq!(f.signature(), "f(i32)");
    assert_eq!(f.name(), "f");
    assert_eq!(f.parameter_type(0), MetaType::of::<i32>());
    assert_eq!(f.return_type_name(), "i32");

    assert_eq!(meta.index_of_signal("valueChanged(int)"), 0);
    assert_eq!(meta.index_of_slot("valueChanged(i32)"), -1);
    assert_eq!(meta.index_of_slot("setValue(i32)"), counter::SET_VALUE as i32);
    assert_eq!(normalized_signature(" f ( const i32 & ) "), "f(i32)");
}

#[test]
fn test_unresolved_parameter_type_matches_late() {
    let meta = counter_meta();
    let take = meta.method(counter::TAKE_HANDLE).unwrap();
    assert_eq!(take.parameter_type_name(0), "Handle");
    assert!(MetaType::of::<common::Handle>().id() > 0);
    assert_eq!(take.parameter_type(0), MetaType::of::<common::Handle>());
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_property_read_write_reset() {
    let object = Counter::new(5);
    let property = counter_meta().property_by_name("value").unwrap();
    assert!(property.is_readable());
    assert!(property.is_writable());
    assert!(property.is_resettable());
    assert_eq!(property.type_name(), "i32");

    let read = property.read(&*object).unwrap();
    assert_eq!(read.downcast_ref::<i32>(), Some(&5));

    assert!(property.write(&*object, &MetaValue::new(11i32)));
    assert_eq!(as_counter(&object).value(), 11);
    assert!(!property.write(&*object, &MetaValue::new(String::from("11"))));
    assert_eq!(as_counter(&object).value(), 11);

    assert!(property.reset(&*object));
    assert_eq!(as_counter(&object).value(), 0);
}

#[test]
fn test_property_read_into_slot() {
    let object = Counter::new(7);
    let property = counter_meta().property_by_name("value").unwrap();

    let mut value = 0i32;
    assert!(property.read_into(&*object, ReturnSlot::new(&mut value)));
    assert_eq!(value, 7);

    let mut text = String::from("untouched");
    assert!(!property.read_into(&*object, ReturnSlot::new(&mut text)));
    assert_eq!(text, "untouched");
}

#[test]
fn test_property_rejects_foreign_object() {
    let scripted = Scripted::new();
    let property = counter_meta().property_by_name("value").unwrap();

    assert!(property.read(&*scripted).is_none());
    let mut value = 0i32;
    assert!(!property.read_into(&*scripted, ReturnSlot::new(&mut value)));
    assert!(!property.write(&*scripted, &MetaValue::new(3i32)));
    assert!(!property.reset(&*scripted));

    let scripted = scripted.as_any().downcast_ref::<Scripted>().unwrap();
    assert!(scripted.calls.lock().is_empty());
}

#[test]
fn test_property_notify_signal() {
    let property = counter_meta().property_by_name("value").unwrap();
    assert!(property.has_notify_signal());
    let signal = property.notify_signal().unwrap();
    assert_eq!(signal.signature(), "valueChanged(i32)");

    let object = Counter::new(0);
    let observer = Counter::new(0);
    runtime::connect(&*object, "valueChanged", &observer, "record", ConnectionType::Direct)
        .unwrap();

    property.write(&*object, &MetaValue::new(4i32));
    property.write(&*object, &MetaValue::new(4i32));
    property.write(&*object, &MetaValue::new(9i32));
    assert_eq!(*as_counter(&observer).log.lock(), [4, 9]);
}

// ============================================================================
// Enumerators
// ============================================================================

#[test]
fn test_enum_conversions() {
    let meta = counter_meta();
    let mode = meta.enumerator(meta.index_of_enumerator("Mode") as usize).unwrap();
    assert!(mode.is_scoped());
    assert!(!mode.is_flag());
    assert_eq!(mode.key_count(), 2);
    assert_eq!(mode.key_to_value("Busy"), Some(1));
    assert_eq!(mode.key_to_value("fixtures::Counter::Mode::Busy"), Some(1));
    assert_eq!(mode.key_to_value("Sleeping"), None);
    assert_eq!(mode.value_to_key(0), Some("Idle"));
}

#[test]
fn test_flag_conversions() {
    let meta = counter_meta();
    assert_eq!(meta.index_of_enumerator("Option"), meta.index_of_enumerator("Options"));
    let options = meta.enumerator(meta.index_of_enumerator("Option") as usize).unwrap();
    assert!(options.is_flag());
    assert_eq!(options.keys_to_value("Fast|Quiet"), Some(5));
    assert_eq!(options.keys_to_value("Fast|Bogus"), None);
    assert_eq!(options.value_to_keys(3), "Fast|Safe");
}
