//! Class reflection tables.
//!
//! A [`MetaObject`] describes one class: its methods (including signals and
//! slots), constructors, properties, enumerators and class-info pairs,
//! chained to the table of its superclass. Tables are built once by
//! [`MetaObjectBuilder`](crate::runtime::MetaObjectBuilder), allocated in
//! the metadata arena and never mutated afterwards.
//!
//! # Indexing
//!
//! Members are addressed by chain-global indices. A class's own members
//! start at its *offset*, the sum of all per-level counts above it:
//!
//! ```text
//! offset(root)  = 0
//! offset(class) = offset(super) + count(super)
//! ```
//!
//! `method_count()` and friends report the per-level count,
//! `total_method_count()` the chain-wide one. Constructors are not
//! inherited and use per-class indices.
//!
//! # Dispatch
//!
//! Every table carries an optional [`StaticMetacallFn`] that executes
//! method calls and property accesses for the members the class itself
//! declares. Tables flagged [`MetaObjectFlags::DYNAMIC`] route through the
//! object's virtual [`Reflect::meta_call`] instead.

use crate::runtime::args::Argument;
use crate::runtime::enumerator::{MetaClassInfo, MetaEnum};
use crate::runtime::meta_type::MetaType;
use crate::runtime::method::{Access, MetaMethod, MethodFlags, MethodKind};
use crate::runtime::object::Reflect;
use crate::runtime::property::{MetaProperty, PropertyFlags};
use crate::runtime::signature::{normalized_signature, normalized_type, parse_signature};
use bitflags::bitflags;
use reflecta_mem::{StrRef, StringTable};
use std::fmt;
use std::sync::OnceLock;

bitflags! {
    /// Class-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MetaObjectFlags: u32 {
        /// Calls go through the object's virtual `meta_call`.
        const DYNAMIC = 1 << 0;
    }
}

/// Kind of request passed to a dispatch function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaCall {
    /// Invoke a method; argv holds the return slot and the arguments.
    InvokeMetaMethod,
    /// Read a property into argv[0].
    ReadProperty,
    /// Write the value at argv[0] to a property.
    WriteProperty,
    /// Reset a property to its default.
    ResetProperty,
    /// Run a constructor; argv[0] receives `Option<Arc<dyn Reflect>>`.
    CreateInstance,
}

/// Per-class dispatch function.
///
/// `index` is relative to the class's own members (or its constructors
/// for [`MetaCall::CreateInstance`]). Returns false if the call was not
/// handled.
pub type StaticMetacallFn =
    unsafe fn(object: Option<&dyn Reflect>, call: MetaCall, index: usize, argv: &mut [*mut u8]) -> bool;

/// A type reference recorded in a class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// Registered type id; 0 is void.
    Resolved(i32),
    /// Type name that had no registered descriptor when the table was built.
    Unresolved(StrRef),
}

/// Change-notification signal of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NotifyRef {
    None,
    /// Index among the declaring class's own methods.
    Local(usize),
    /// Signal name resolved on first use against the whole chain.
    Unresolved(StrRef),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ParamRecord {
    pub(crate) type_ref: TypeRef,
    pub(crate) name: StrRef,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MethodRecord {
    pub(crate) name: StrRef,
    pub(crate) signature: StrRef,
    pub(crate) tag: StrRef,
    pub(crate) params_start: u32,
    pub(crate) argc: u16,
    pub(crate) return_type: TypeRef,
    pub(crate) kind: MethodKind,
    pub(crate) access: Access,
    pub(crate) flags: MethodFlags,
    pub(crate) revision: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PropertyRecord {
    pub(crate) name: StrRef,
    pub(crate) type_ref: TypeRef,
    pub(crate) flags: PropertyFlags,
    pub(crate) notify: NotifyRef,
    pub(crate) revision: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EnumRecord {
    pub(crate) name: StrRef,
    pub(crate) enum_name: StrRef,
    pub(crate) is_flag: bool,
    pub(crate) is_scoped: bool,
    pub(crate) keys_start: u32,
    pub(crate) key_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EnumKeyRecord {
    pub(crate) key: StrRef,
    pub(crate) value: i64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ClassInfoRecord {
    pub(crate) name: StrRef,
    pub(crate) value: StrRef,
}

/// Immutable reflection table of one class.
pub struct MetaObject {
    pub(crate) class_name: StrRef,
    pub(crate) superclass: Option<&'static MetaObject>,
    pub(crate) strings: StringTable,
    pub(crate) revision: u32,
    pub(crate) flags: MetaObjectFlags,
    pub(crate) methods: Box<[MethodRecord]>,
    pub(crate) constructors: Box<[MethodRecord]>,
    pub(crate) params: Box<[ParamRecord]>,
    pub(crate) properties: Box<[PropertyRecord]>,
    pub(crate) enums: Box<[EnumRecord]>,
    pub(crate) enum_keys: Box<[EnumKeyRecord]>,
    pub(crate) class_infos: Box<[ClassInfoRecord]>,
    pub(crate) static_metacall: Option<StaticMetacallFn>,
    pub(crate) notify_cache: Box<[OnceLock<Option<usize>>]>,
}

/// Canonical spelling of a type name: the registered name if the type is
/// known, the normalized spelling otherwise.
pub(crate) fn canonical_type_name(name: &str) -> String {
    let meta = MetaType::from_name(name);
    if meta.is_valid() {
        meta.name().to_string()
    } else {
        normalized_type(name)
    }
}

/// Normalizes a signature and canonicalizes its parameter types, so
/// `f(int)` and `f(i32)` denote the same method.
pub(crate) fn canonical_signature(signature: &str) -> String {
    match parse_signature(signature) {
        Ok(parsed) => {
            let params: Vec<String> = parsed
                .params
                .iter()
                .map(|p| canonical_type_name(p))
                .collect();
            format!("{}({})", parsed.name, params.join(","))
        }
        Err(_) => normalized_signature(signature),
    }
}

/// Resolves a recorded type reference, late-binding unresolved names.
pub(crate) fn resolve_type_ref(strings: &StringTable, type_ref: TypeRef) -> MetaType {
    match type_ref {
        TypeRef::Resolved(0) => MetaType::of::<()>(),
        TypeRef::Resolved(id) => MetaType::from_id(id),
        TypeRef::Unresolved(name) => MetaType::from_name(strings.get(name)),
    }
}

/// Name of a recorded type reference.
pub(crate) fn type_ref_name(strings: &StringTable, type_ref: TypeRef) -> &str {
    match type_ref {
        TypeRef::Resolved(0) => "void",
        TypeRef::Resolved(id) => MetaType::from_id(id).name(),
        TypeRef::Unresolved(name) => strings.get(name),
    }
}

/// Returns true if a value of `actual` may bind to `formal`.
///
/// Resolved entries match on equal types; unresolved entries match on
/// equal names, or on equal types once the name has been registered.
pub(crate) fn type_ref_matches(strings: &StringTable, formal: TypeRef, actual: MetaType) -> bool {
    match formal {
        TypeRef::Resolved(_) => resolve_type_ref(strings, formal) == actual,
        TypeRef::Unresolved(name) => {
            let name = strings.get(name);
            name == actual.name() || {
                let late = MetaType::from_name(name);
                late.is_valid() && late == actual
            }
        }
    }
}

impl MetaObject {
    // ========================================================================
    // Class data
    // ========================================================================

    /// Class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.strings.get(self.class_name)
    }

    /// Superclass table, `None` at the root.
    #[must_use]
    pub fn superclass(&self) -> Option<&'static MetaObject> {
        self.superclass
    }

    /// Table revision.
    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// Class-level flags.
    #[must_use]
    pub fn flags(&self) -> MetaObjectFlags {
        self.flags
    }

    /// Returns true if calls route through the object's virtual `meta_call`.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(MetaObjectFlags::DYNAMIC)
    }

    /// Returns true if `self` is `other` or derives from it.
    #[must_use]
    pub fn inherits(&self, other: &MetaObject) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.superclass.map(|s| s as &MetaObject);
        }
        false
    }

    /// Iterates `self` and its ancestors, most derived first.
    pub(crate) fn chain(&'static self) -> impl Iterator<Item = &'static MetaObject> {
        std::iter::successors(Some(self), |class| class.superclass)
    }

    pub(crate) fn string(&self, r: StrRef) -> &str {
        self.strings.get(r)
    }

    // ========================================================================
    // Counts and offsets
    // ========================================================================

    /// Methods declared by this class itself.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Global index of this class's first method.
    #[must_use]
    pub fn method_offset(&self) -> usize {
        self.superclass
            .map_or(0, |s| s.method_offset() + s.method_count())
    }

    /// Methods of the whole chain.
    #[must_use]
    pub fn total_method_count(&self) -> usize {
        self.method_offset() + self.method_count()
    }

    /// Properties declared by this class itself.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Global index of this class's first property.
    #[must_use]
    pub fn property_offset(&self) -> usize {
        self.superclass
            .map_or(0, |s| s.property_offset() + s.property_count())
    }

    /// Properties of the whole chain.
    #[must_use]
    pub fn total_property_count(&self) -> usize {
        self.property_offset() + self.property_count()
    }

    /// Enumerators declared by this class itself.
    #[must_use]
    pub fn enumerator_count(&self) -> usize {
        self.enums.len()
    }

    /// Global index of this class's first enumerator.
    #[must_use]
    pub fn enumerator_offset(&self) -> usize {
        self.superclass
            .map_or(0, |s| s.enumerator_offset() + s.enumerator_count())
    }

    /// Enumerators of the whole chain.
    #[must_use]
    pub fn total_enumerator_count(&self) -> usize {
        self.enumerator_offset() + self.enumerator_count()
    }

    /// Class-info pairs declared by this class itself.
    #[must_use]
    pub fn class_info_count(&self) -> usize {
        self.class_infos.len()
    }

    /// Global index of this class's first class-info pair.
    #[must_use]
    pub fn class_info_offset(&self) -> usize {
        self.superclass
            .map_or(0, |s| s.class_info_offset() + s.class_info_count())
    }

    /// Class-info pairs of the whole chain.
    #[must_use]
    pub fn total_class_info_count(&self) -> usize {
        self.class_info_offset() + self.class_info_count()
    }

    /// Constructors of this class.
    #[must_use]
    pub fn constructor_count(&self) -> usize {
        self.constructors.len()
    }

    // ========================================================================
    // Index lookup
    // ========================================================================

    fn index_of_method_where(
        &'static self,
        signature: &str,
        accept: impl Fn(MethodKind) -> bool,
    ) -> i32 {
        let wanted = canonical_signature(signature);
        for class in self.chain() {
            for (local, record) in class.methods.iter().enumerate() {
                if accept(record.kind) && class.string(record.signature) == wanted {
                    return (class.method_offset() + local) as i32;
                }
            }
        }
        -1
    }

    /// Global index of the method with `signature`, searching the most
    /// derived class first; -1 if absent.
    #[must_use]
    pub fn index_of_method(&'static self, signature: &str) -> i32 {
        self.index_of_method_where(signature, |kind| kind != MethodKind::Constructor)
    }

    /// Like [`index_of_method`](Self::index_of_method), restricted to signals.
    #[must_use]
    pub fn index_of_signal(&'static self, signature: &str) -> i32 {
        self.index_of_method_where(signature, |kind| kind == MethodKind::Signal)
    }

    /// Like [`index_of_method`](Self::index_of_method), restricted to slots.
    #[must_use]
    pub fn index_of_slot(&'static self, signature: &str) -> i32 {
        self.index_of_method_where(signature, |kind| kind == MethodKind::Slot)
    }

    /// Index of the constructor with `signature`; -1 if absent.
    #[must_use]
    pub fn index_of_constructor(&self, signature: &str) -> i32 {
        let wanted = canonical_signature(signature);
        self.constructors
            .iter()
            .position(|record| self.string(record.signature) == wanted)
            .map_or(-1, |i| i as i32)
    }

    /// Global index of the property `name`; -1 if absent.
    #[must_use]
    pub fn index_of_property(&'static self, name: &str) -> i32 {
        for class in self.chain() {
            if let Some(local) = class
                .properties
                .iter()
                .position(|record| class.string(record.name) == name)
            {
                return (class.property_offset() + local) as i32;
            }
        }
        -1
    }

    /// Global index of the enumerator named `name` (or whose enum-class
    /// name is `name`); -1 if absent.
    #[must_use]
    pub fn index_of_enumerator(&'static self, name: &str) -> i32 {
        for class in self.chain() {
            if let Some(local) = class.enums.iter().position(|record| {
                class.string(record.name) == name
                    || (!record.enum_name.is_empty() && class.string(record.enum_name) == name)
            }) {
                return (class.enumerator_offset() + local) as i32;
            }
        }
        -1
    }

    /// Global index of the class-info pair `name`; -1 if absent.
    ///
    /// A derived class's pair shadows an ancestor's pair of the same name.
    #[must_use]
    pub fn index_of_class_info(&'static self, name: &str) -> i32 {
        for class in self.chain() {
            if let Some(local) = class
                .class_infos
                .iter()
                .rposition(|record| class.string(record.name) == name)
            {
                return (class.class_info_offset() + local) as i32;
            }
        }
        -1
    }

    /// Finds a signal by full signature or, failing that, by bare name.
    pub(crate) fn find_signal(&'static self, name_or_signature: &str) -> Option<usize> {
        let index = self.index_of_signal(name_or_signature);
        if index >= 0 {
            return Some(index as usize);
        }
        let bare = name_or_signature.trim();
        for class in self.chain() {
            for (local, record) in class.methods.iter().enumerate() {
                if record.kind == MethodKind::Signal && class.string(record.name) == bare {
                    return Some(class.method_offset() + local);
                }
            }
        }
        None
    }

    // ========================================================================
    // Member access
    // ========================================================================

    /// Resolves a global method index to its declaring class and local index.
    pub(crate) fn method_level(&'static self, index: usize) -> Option<(&'static MetaObject, usize)> {
        self.chain().find_map(|class| {
            let offset = class.method_offset();
            (index >= offset && index < offset + class.method_count())
                .then(|| (class, index - offset))
        })
    }

    fn property_level(&'static self, index: usize) -> Option<(&'static MetaObject, usize)> {
        self.chain().find_map(|class| {
            let offset = class.property_offset();
            (index >= offset && index < offset + class.property_count())
                .then(|| (class, index - offset))
        })
    }

    /// Method at global `index`.
    #[must_use]
    pub fn method(&'static self, index: usize) -> Option<MetaMethod> {
        self.method_level(index)
            .map(|(class, local)| MetaMethod::new(class, local, false))
    }

    /// Constructor at `index`.
    #[must_use]
    pub fn constructor(&'static self, index: usize) -> Option<MetaMethod> {
        (index < self.constructors.len()).then(|| MetaMethod::new(self, index, true))
    }

    /// Property at global `index`.
    #[must_use]
    pub fn property(&'static self, index: usize) -> Option<MetaProperty> {
        self.property_level(index)
            .map(|(class, local)| MetaProperty::new(class, local))
    }

    /// Enumerator at global `index`.
    #[must_use]
    pub fn enumerator(&'static self, index: usize) -> Option<MetaEnum> {
        self.chain().find_map(|class| {
            let offset = class.enumerator_offset();
            (index >= offset && index < offset + class.enumerator_count())
                .then(|| MetaEnum::new(class, index - offset))
        })
    }

    /// Class-info pair at global `index`.
    #[must_use]
    pub fn class_info(&'static self, index: usize) -> Option<MetaClassInfo> {
        self.chain().find_map(|class| {
            let offset = class.class_info_offset();
            (index >= offset && index < offset + class.class_info_count())
                .then(|| MetaClassInfo::new(class, index - offset))
        })
    }

    /// Convenience lookup of a method by signature.
    #[must_use]
    pub fn method_by_signature(&'static self, signature: &str) -> Option<MetaMethod> {
        usize::try_from(self.index_of_method(signature))
            .ok()
            .and_then(|index| self.method(index))
    }

    /// Convenience lookup of a property by name.
    #[must_use]
    pub fn property_by_name(&'static self, name: &str) -> Option<MetaProperty> {
        usize::try_from(self.index_of_property(name))
            .ok()
            .and_then(|index| self.property(index))
    }

    /// Value of the class-info pair `name`, searching the chain.
    #[must_use]
    pub fn class_info_value(&'static self, name: &str) -> Option<&'static str> {
        usize::try_from(self.index_of_class_info(name))
            .ok()
            .and_then(|index| self.class_info(index))
            .map(|info| info.value())
    }

    /// Constructs a new instance through the first constructor whose
    /// parameters accept `args`.
    ///
    /// # Errors
    ///
    /// The not-found family of [`InvokeError`](crate::InvokeError) when no
    /// constructor fits, or the construction failures of
    /// [`MetaMethod::new_instance`].
    pub fn new_instance(
        &'static self,
        args: &[Argument<'_>],
    ) -> Result<std::sync::Arc<dyn Reflect>, crate::InvokeError> {
        crate::runtime::invoke::construct(self, args)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Routes a call to the dispatch function of the declaring class, or to
    /// the object's virtual entry point for `DYNAMIC` tables.
    ///
    /// `index` is chain-global for method and property calls and a
    /// constructor index for [`MetaCall::CreateInstance`].
    ///
    /// # Safety
    ///
    /// `argv` must follow the invocation protocol for the addressed member.
    pub unsafe fn metacall(
        &'static self,
        object: Option<&dyn Reflect>,
        call: MetaCall,
        index: usize,
        argv: &mut [*mut u8],
    ) -> bool {
        if call != MetaCall::CreateInstance {
            if let Some(obj) = object {
                if obj.meta_object().is_dynamic() {
                    // SAFETY: forwarded caller contract.
                    return unsafe { obj.meta_call(call, index, argv) };
                }
            }
        }

        let target = match call {
            MetaCall::InvokeMetaMethod => self.method_level(index),
            MetaCall::ReadProperty | MetaCall::WriteProperty | MetaCall::ResetProperty => {
                self.property_level(index)
            }
            MetaCall::CreateInstance => Some((self, index)),
        };

        match target {
            Some((class, local)) => match class.static_metacall {
                // SAFETY: forwarded caller contract.
                Some(f) => unsafe { f(object, call, local, argv) },
                None => false,
            },
            None => false,
        }
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("class_name", &self.class_name())
            .field("superclass", &self.superclass.map(MetaObject::class_name))
            .field("revision", &self.revision)
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .field("enumerators", &self.enums.len())
            .finish_non_exhaustive()
    }
}

impl PartialEq for MetaObject {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for MetaObject {}
