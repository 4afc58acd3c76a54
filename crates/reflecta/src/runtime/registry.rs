//! Global type registry.
//!
//! Maps Rust `TypeId`s to their descriptors (so every type has exactly one
//! descriptor), and registered ids and names back to descriptors. Entries
//! are only ever added.
//!
//! # Thread Safety
//!
//! One `parking_lot::RwLock` guards the maps. Descriptor construction runs
//! outside the lock because building a container descriptor builds its
//! element descriptors first. Id claims additionally go through a
//! compare-and-swap on the descriptor's id cell, so a descriptor's id never
//! changes once observed.

use crate::error::{Error, Result};
use crate::runtime::builtin;
use crate::runtime::meta_type::{MetaType, TypeDescriptor};
use crate::runtime::signature::normalized_type;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use reflecta_log::{debug, trace, warn};
use std::any::TypeId;
use std::sync::OnceLock;

struct Registry {
    by_type: FxHashMap<TypeId, &'static TypeDescriptor>,
    by_name: FxHashMap<Box<str>, &'static TypeDescriptor>,
    by_id: FxHashMap<i32, &'static TypeDescriptor>,
    next_user_id: i32,
}

impl Registry {
    fn new() -> Self {
        Registry {
            by_type: FxHashMap::default(),
            by_name: FxHashMap::default(),
            by_id: FxHashMap::default(),
            next_user_id: builtin::FIRST_USER_TYPE,
        }
    }

    fn insert_name(&mut self, name: &str, descriptor: &'static TypeDescriptor) {
        match self.by_name.get(name) {
            Some(existing) if std::ptr::eq(*existing, descriptor) => {}
            Some(existing) => warn!(
                "type name `{name}` already denotes another type (id {}); keeping the first",
                existing.cached_id()
            ),
            None => {
                self.by_name.insert(name.into(), descriptor);
            }
        }
    }
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::new()))
}

/// Returns the unique descriptor of `T`, building it with `build` on first use.
///
/// If two threads race, both may build, but only the first insertion is
/// kept and returned to everyone.
pub fn intern_type<T: 'static>(
    build: impl FnOnce() -> &'static TypeDescriptor,
) -> &'static TypeDescriptor {
    let key = TypeId::of::<T>();
    if let Some(&descriptor) = registry().read().by_type.get(&key) {
        return descriptor;
    }

    let built = build();
    let mut reg = registry().write();
    let descriptor = *reg.by_type.entry(key).or_insert(built);
    trace!("interned type descriptor `{}`", descriptor.name());
    descriptor
}

/// Claims an id for `descriptor` and records its name.
///
/// Builtin types receive their fixed ids, everything else the next free id
/// starting at [`builtin::FIRST_USER_TYPE`]. Void is never registered and
/// always answers 0.
pub(crate) fn register(descriptor: &'static TypeDescriptor) -> i32 {
    if descriptor.type_id() == TypeId::of::<()>() {
        return builtin::VOID;
    }

    let mut reg = registry().write();
    let current = descriptor.cached_id();
    if current != 0 {
        return current;
    }

    let fixed = builtin::id_for_type_id(descriptor.type_id());
    let candidate = fixed.unwrap_or(reg.next_user_id);
    let id = descriptor.claim_id(candidate);
    if id == candidate {
        if fixed.is_none() {
            reg.next_user_id += 1;
        }
        reg.by_id.insert(id, descriptor);
        reg.by_type.entry(descriptor.type_id()).or_insert(descriptor);
        reg.insert_name(descriptor.name(), descriptor);
        debug!("registered type `{}` with id {id}", descriptor.name());
    }
    id
}

pub(crate) fn lookup_name(name: &str) -> Option<&'static TypeDescriptor> {
    builtin::ensure_registered();
    let normalized = normalized_type(name);
    registry().read().by_name.get(normalized.as_str()).copied()
}

pub(crate) fn lookup_id(id: i32) -> Option<&'static TypeDescriptor> {
    builtin::ensure_registered();
    registry().read().by_id.get(&id).copied()
}

pub(crate) fn lookup_type_id(type_id: TypeId) -> Option<&'static TypeDescriptor> {
    registry().read().by_type.get(&type_id).copied()
}

/// Records an extra name for a descriptor without resolving builtins first.
pub(crate) fn insert_name(name: &str, descriptor: &'static TypeDescriptor) {
    registry().write().insert_name(name, descriptor);
}

/// Registers `alias` as another name for `meta`.
///
/// Registering the same alias for the same type twice is a no-op.
///
/// # Errors
///
/// - [`Error::InvalidType`] if `meta` is invalid.
/// - [`Error::AliasConflict`] if the alias already names another type.
///
/// # Example
///
/// ```
/// use reflecta::runtime::{MetaType, register_alias};
///
/// register_alias("Distance", MetaType::of::<f64>()).unwrap();
/// assert_eq!(MetaType::from_name("Distance"), MetaType::of::<f64>());
/// ```
pub fn register_alias(alias: &str, meta: MetaType) -> Result<()> {
    let Some(descriptor) = meta.descriptor() else {
        return Err(Error::InvalidType);
    };
    builtin::ensure_registered();
    descriptor.id();

    let alias = normalized_type(alias);
    let mut reg = registry().write();
    if let Some(existing) = reg.by_name.get(alias.as_str()) {
        if MetaType::from_descriptor(existing) == meta {
            return Ok(());
        }
        return Err(Error::AliasConflict {
            alias,
            existing: existing.name().to_string(),
        });
    }

    debug!("alias `{alias}` -> `{}`", descriptor.name());
    reg.by_name.insert(alias.into_boxed_str(), descriptor);
    Ok(())
}

/// Returns every registered type, ordered by id.
#[must_use]
pub fn registered_types() -> Vec<MetaType> {
    builtin::ensure_registered();
    let reg = registry().read();
    let mut types: Vec<_> = reg.by_id.values().copied().collect();
    types.sort_by_key(|d| d.cached_id());
    types.into_iter().map(MetaType::from_descriptor).collect()
}
