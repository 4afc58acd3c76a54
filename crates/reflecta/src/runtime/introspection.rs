//! Runtime introspection APIs.
//!
//! This module keeps the process-wide class registry and answers
//! questions about registered classes:
//!
//! - **Class enumeration** - List all registered classes, find by name
//! - **Hierarchy** - Ancestor chains, subclass lists, inheritance checks
//! - **Member enumeration** - Methods and properties across a chain
//! - **Object queries** - Class checks on live objects
//!
//! # Example
//!
//! ```rust
//! use reflecta::runtime::MetaObjectBuilder;
//! use reflecta::runtime::introspection::{class_by_name, class_hierarchy};
//!
//! let base = MetaObjectBuilder::new("introspection::Base").build().unwrap();
//! let derived = MetaObjectBuilder::new("introspection::Derived")
//!     .superclass(base)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(class_by_name("introspection::Derived"), Some(derived));
//! let names: Vec<_> = class_hierarchy(derived).iter().map(|c| c.class_name()).collect();
//! assert_eq!(names, ["introspection::Derived", "introspection::Base"]);
//! ```

use crate::error::{Error, Result};
use crate::runtime::meta_object::MetaObject;
use crate::runtime::method::MetaMethod;
use crate::runtime::object::Reflect;
use crate::runtime::property::MetaProperty;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use reflecta_log::trace;
use std::sync::OnceLock;

// ============================================================================
// Class Registry
// ============================================================================

fn class_registry() -> &'static RwLock<FxHashMap<String, &'static MetaObject>> {
    static CLASS_REGISTRY: OnceLock<RwLock<FxHashMap<String, &'static MetaObject>>> =
        OnceLock::new();
    CLASS_REGISTRY.get_or_init(|| RwLock::new(FxHashMap::default()))
}

/// Registers a class table under its class name.
///
/// Called by [`MetaObjectBuilder::build`](crate::runtime::MetaObjectBuilder::build).
///
/// # Errors
///
/// Returns [`Error::ClassAlreadyRegistered`] if another table already uses
/// the name.
pub fn register_class(class: &'static MetaObject) -> Result<()> {
    let mut registry = class_registry().write();
    match registry.get(class.class_name()) {
        Some(existing) if std::ptr::eq(*existing, class) => Ok(()),
        Some(_) => Err(Error::ClassAlreadyRegistered {
            name: class.class_name().to_string(),
        }),
        None => {
            registry.insert(class.class_name().to_string(), class);
            trace!("registered class `{}`", class.class_name());
            Ok(())
        }
    }
}

/// Looks up a class by name.
#[must_use]
pub fn class_by_name(name: &str) -> Option<&'static MetaObject> {
    class_registry().read().get(name).copied()
}

/// Enumerates all registered classes, sorted by name.
///
/// # Returns
///
/// A vector of class tables.
#[must_use]
pub fn all_classes() -> Vec<&'static MetaObject> {
    let mut classes: Vec<_> = class_registry().read().values().copied().collect();
    classes.sort_by(|a, b| a.class_name().cmp(b.class_name()));
    classes
}

// ============================================================================
// Hierarchy
// ============================================================================

/// Returns `class` followed by its ancestors up to the root.
#[must_use]
pub fn class_hierarchy(class: &'static MetaObject) -> Vec<&'static MetaObject> {
    class.chain().collect()
}

/// Returns true if `child` is `parent` or derives from it.
#[must_use]
pub fn inherits(child: &MetaObject, parent: &MetaObject) -> bool {
    child.inherits(parent)
}

/// Registered classes whose direct superclass is `parent`.
#[must_use]
pub fn subclasses(parent: &'static MetaObject) -> Vec<&'static MetaObject> {
    all_classes()
        .into_iter()
        .filter(|class| class.superclass().is_some_and(|s| std::ptr::eq(s, parent)))
        .collect()
}

// ============================================================================
// Members
// ============================================================================

/// All methods of the chain in global index order.
#[must_use]
pub fn all_methods(class: &'static MetaObject) -> Vec<MetaMethod> {
    (0..class.total_method_count())
        .filter_map(|index| class.method(index))
        .collect()
}

/// All properties of the chain in global index order.
#[must_use]
pub fn all_properties(class: &'static MetaObject) -> Vec<MetaProperty> {
    (0..class.total_property_count())
        .filter_map(|index| class.property(index))
        .collect()
}

/// The class in `class`'s chain that declares `signature`, most derived first.
///
/// # Example
///
/// ```rust
/// use reflecta::runtime::{MetaObjectBuilder, MethodSpec};
/// use reflecta::runtime::introspection::method_provider;
///
/// let base = MetaObjectBuilder::new("introspection::Provider")
///     .method(MethodSpec::method("ping()"))
///     .build()
///     .unwrap();
/// let derived = MetaObjectBuilder::new("introspection::Consumer")
///     .superclass(base)
///     .build()
///     .unwrap();
///
/// assert_eq!(method_provider(derived, "ping()"), Some(base));
/// assert_eq!(method_provider(derived, "pong()"), None);
/// ```
#[must_use]
pub fn method_provider(class: &'static MetaObject, signature: &str) -> Option<&'static MetaObject> {
    class
        .method_by_signature(signature)
        .map(|method| method.enclosing_meta_object())
}

// ============================================================================
// Objects
// ============================================================================

/// Returns true if `object`'s class is or derives from the class `name`.
#[must_use]
pub fn object_inherits(object: &dyn Reflect, name: &str) -> bool {
    class_by_name(name).is_some_and(|class| object.meta_object().inherits(class))
}

/// Returns true if `object` has a method with `signature`.
#[must_use]
pub fn object_responds_to(object: &dyn Reflect, signature: &str) -> bool {
    object.meta_object().index_of_method(signature) >= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builder::{MetaObjectBuilder, MethodSpec, PropertySpec};

    #[test]
    fn test_registry_lookup() {
        let class = MetaObjectBuilder::new("introspection::tests::A").build().unwrap();
        assert_eq!(class_by_name("introspection::tests::A"), Some(class));
        assert!(class_by_name("introspection::tests::Missing").is_none());
        assert!(all_classes().contains(&class));
        // Registering the same table again is harmless.
        assert!(register_class(class).is_ok());
    }

    #[test]
    fn test_subclasses_and_members() {
        let base = MetaObjectBuilder::new("introspection::tests::Base")
            .method(MethodSpec::method("a()"))
            .property(PropertySpec::of::<i32>("p"))
            .build()
            .unwrap();
        let left = MetaObjectBuilder::new("introspection::tests::Left")
            .superclass(base)
            .method(MethodSpec::method("b()"))
            .build()
            .unwrap();
        let right = MetaObjectBuilder::new("introspection::tests::Right")
            .superclass(base)
            .property(PropertySpec::of::<u8>("q"))
            .build()
            .unwrap();

        let subs = subclasses(base);
        assert_eq!(subs, vec![left, right]);
        assert!(inherits(left, base));
        assert!(!inherits(left, right));

        let methods: Vec<_> = all_methods(left).iter().map(|m| m.signature()).collect();
        assert_eq!(methods, ["a()", "b()"]);
        let properties: Vec<_> = all_properties(right).iter().map(|p| p.name()).collect();
        assert_eq!(properties, ["p", "q"]);
    }
}
