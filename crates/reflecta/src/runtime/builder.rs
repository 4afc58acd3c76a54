//! Building class reflection tables.
//!
//! [`MetaObjectBuilder`] collects member specifications, validates them,
//! interns every name into one deduplicated string table and allocates the
//! frozen [`MetaObject`] in the metadata arena. The built table is
//! registered by class name (see [`introspection`](crate::runtime::introspection)).
//!
//! # Revisions
//!
//! | Revision | Adds |
//! |----------|------|
//! | 1 | methods, properties, enumerators, class info, constructors |
//! | 2 | method revisions and parameter names |
//! | 3 | notify signals declared by a superclass (resolved lazily) |
//!
//! Optional data a lower revision cannot carry is dropped silently, except
//! for unresolvable notify signals, which are an error below revision 3.
//!
//! # Example
//!
//! ```rust
//! use reflecta::runtime::{MetaObjectBuilder, MethodSpec, PropertySpec};
//!
//! let class = MetaObjectBuilder::new("builder::Doc")
//!     .class_info("Author", "reflecta")
//!     .method(MethodSpec::signal("valueChanged(i32)").parameter_names(["value"]))
//!     .method(MethodSpec::slot("setValue(i32)"))
//!     .method(MethodSpec::method("value()").returns::<i32>())
//!     .property(PropertySpec::of::<i32>("value").writable().notify("valueChanged"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(class.method_count(), 3);
//! assert_eq!(class.index_of_slot("setValue(int)"), 1);
//! ```

use crate::error::{Error, Result};
use crate::runtime::introspection;
use crate::runtime::meta_object::{
    ClassInfoRecord, EnumKeyRecord, EnumRecord, MetaObject, MetaObjectFlags, MethodRecord,
    NotifyRef, ParamRecord, PropertyRecord, StaticMetacallFn, TypeRef, canonical_type_name,
};
use crate::runtime::meta_type::{MetaType, MetaTypeOf};
use crate::runtime::method::{Access, MethodFlags, MethodKind};
use crate::runtime::property::PropertyFlags;
use crate::runtime::signature::parse_signature;
use crate::{CURRENT_REVISION, MAX_INVOKE_ARGS};
use fxhash::FxHashSet;
use reflecta_log::debug;
use reflecta_mem::{StringPool, global_arena};
use std::sync::OnceLock;

/// A type given either as a handle or by name.
#[derive(Debug, Clone)]
enum TypeSpec {
    Meta(MetaType),
    Name(String),
}

// ============================================================================
// Specs
// ============================================================================

/// Specification of a method, signal, slot or constructor.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    signature: String,
    kind: MethodKind,
    access: Access,
    return_type: Option<TypeSpec>,
    tag: String,
    flags: MethodFlags,
    revision: u32,
    parameter_names: Vec<String>,
}

impl MethodSpec {
    fn with_kind(signature: &str, kind: MethodKind) -> Self {
        MethodSpec {
            signature: signature.to_string(),
            kind,
            access: Access::Public,
            return_type: None,
            tag: String::new(),
            flags: MethodFlags::empty(),
            revision: 0,
            parameter_names: Vec::new(),
        }
    }

    /// A plain invokable method, e.g. `"resize(u32,u32)"`.
    #[must_use]
    pub fn method(signature: &str) -> Self {
        Self::with_kind(signature, MethodKind::Method)
    }

    /// A signal.
    #[must_use]
    pub fn signal(signature: &str) -> Self {
        Self::with_kind(signature, MethodKind::Signal)
    }

    /// A slot.
    #[must_use]
    pub fn slot(signature: &str) -> Self {
        Self::with_kind(signature, MethodKind::Slot)
    }

    /// A constructor; the signature's name is conventionally the class name.
    #[must_use]
    pub fn constructor(signature: &str) -> Self {
        Self::with_kind(signature, MethodKind::Constructor)
    }

    /// Declares the return type.
    #[must_use]
    pub fn returns<T: MetaTypeOf>(mut self) -> Self {
        self.return_type = Some(TypeSpec::Meta(T::meta_type()));
        self
    }

    /// Declares the return type by handle.
    #[must_use]
    pub fn returns_type(mut self, meta: MetaType) -> Self {
        self.return_type = Some(TypeSpec::Meta(meta));
        self
    }

    /// Declares the return type by name; it may be registered later.
    #[must_use]
    pub fn returns_name(mut self, name: &str) -> Self {
        self.return_type = Some(TypeSpec::Name(name.to_string()));
        self
    }

    #[must_use]
    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Sets the revision and marks the method `REVISIONED`.
    #[must_use]
    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self.flags |= MethodFlags::REVISIONED;
        self
    }

    /// Names the parameters in declaration order.
    #[must_use]
    pub fn parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameter_names = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Specification of a property.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    name: String,
    type_spec: TypeSpec,
    flags: PropertyFlags,
    notify: Option<String>,
    revision: u32,
}

impl PropertySpec {
    /// A readable property whose type is given by name.
    #[must_use]
    pub fn new(name: &str, type_name: &str) -> Self {
        PropertySpec {
            name: name.to_string(),
            type_spec: TypeSpec::Name(type_name.to_string()),
            flags: PropertyFlags::default(),
            notify: None,
            revision: 0,
        }
    }

    /// A readable property of type `T`.
    #[must_use]
    pub fn of<T: MetaTypeOf>(name: &str) -> Self {
        PropertySpec {
            type_spec: TypeSpec::Meta(T::meta_type()),
            ..Self::new(name, "")
        }
    }

    /// Replaces the flags.
    #[must_use]
    pub fn flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn writable(mut self) -> Self {
        self.flags |= PropertyFlags::WRITABLE;
        self
    }

    #[must_use]
    pub fn resettable(mut self) -> Self {
        self.flags |= PropertyFlags::RESETTABLE;
        self
    }

    #[must_use]
    pub fn constant(mut self) -> Self {
        self.flags |= PropertyFlags::CONSTANT;
        self
    }

    /// Names the change-notification signal, by signature or bare name.
    ///
    /// Signals of the class itself are bound at build time; others are
    /// resolved against the superclass chain on first use.
    #[must_use]
    pub fn notify(mut self, signal: &str) -> Self {
        self.notify = Some(signal.to_string());
        self
    }

    #[must_use]
    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }
}

/// Specification of an enumerator.
#[derive(Debug, Clone)]
pub struct EnumSpec {
    name: String,
    enum_name: String,
    is_flag: bool,
    is_scoped: bool,
    keys: Vec<(String, i64)>,
}

impl EnumSpec {
    #[must_use]
    pub fn new(name: &str) -> Self {
        EnumSpec {
            name: name.to_string(),
            enum_name: String::new(),
            is_flag: false,
            is_scoped: false,
            keys: Vec::new(),
        }
    }

    /// Name of the underlying enum when the enumerator is a flags alias.
    #[must_use]
    pub fn enum_name(mut self, name: &str) -> Self {
        self.enum_name = name.to_string();
        self
    }

    /// Values combine as bit flags.
    #[must_use]
    pub fn flag(mut self) -> Self {
        self.is_flag = true;
        self
    }

    /// Keys are scoped to the enum name.
    #[must_use]
    pub fn scoped(mut self) -> Self {
        self.is_scoped = true;
        self
    }

    #[must_use]
    pub fn key(mut self, key: &str, value: i64) -> Self {
        self.keys.push((key.to_string(), value));
        self
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder of a [`MetaObject`].
#[derive(Debug)]
pub struct MetaObjectBuilder {
    class_name: String,
    superclass: Option<&'static MetaObject>,
    revision: u32,
    flags: MetaObjectFlags,
    static_metacall: Option<StaticMetacallFn>,
    methods: Vec<MethodSpec>,
    constructors: Vec<MethodSpec>,
    properties: Vec<PropertySpec>,
    enums: Vec<EnumSpec>,
    class_infos: Vec<(String, String)>,
}

/// Records under construction, sharing one string pool.
struct Tables {
    pool: StringPool,
    params: Vec<ParamRecord>,
    seen: FxHashSet<String>,
}

impl MetaObjectBuilder {
    /// Starts a root class named `class_name` at the current revision.
    #[must_use]
    pub fn new(class_name: &str) -> Self {
        MetaObjectBuilder {
            class_name: class_name.to_string(),
            superclass: None,
            revision: CURRENT_REVISION,
            flags: MetaObjectFlags::empty(),
            static_metacall: None,
            methods: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            enums: Vec::new(),
            class_infos: Vec::new(),
        }
    }

    #[must_use]
    pub fn superclass(mut self, superclass: &'static MetaObject) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Sets the table revision (1..=[`CURRENT_REVISION`]).
    #[must_use]
    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Routes calls through the object's virtual `meta_call`.
    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.flags |= MetaObjectFlags::DYNAMIC;
        self
    }

    /// Sets the per-class dispatch function.
    #[must_use]
    pub fn static_metacall(mut self, f: StaticMetacallFn) -> Self {
        self.static_metacall = Some(f);
        self
    }

    /// Adds a method, signal or slot; constructors go to the constructor list.
    #[must_use]
    pub fn method(mut self, spec: MethodSpec) -> Self {
        if spec.kind == MethodKind::Constructor {
            self.constructors.push(spec);
        } else {
            self.methods.push(spec);
        }
        self
    }

    #[must_use]
    pub fn constructor(mut self, spec: MethodSpec) -> Self {
        self.constructors.push(MethodSpec {
            kind: MethodKind::Constructor,
            ..spec
        });
        self
    }

    #[must_use]
    pub fn property(mut self, spec: PropertySpec) -> Self {
        self.properties.push(spec);
        self
    }

    #[must_use]
    pub fn enumerator(mut self, spec: EnumSpec) -> Self {
        self.enums.push(spec);
        self
    }

    #[must_use]
    pub fn class_info(mut self, name: &str, value: &str) -> Self {
        self.class_infos.push((name.to_string(), value.to_string()));
        self
    }

    fn type_ref(pool: &mut StringPool, spec: &TypeSpec) -> Result<TypeRef> {
        let meta = match spec {
            TypeSpec::Meta(meta) => *meta,
            TypeSpec::Name(name) => MetaType::from_name(name),
        };
        if meta.is_void() {
            return Ok(TypeRef::Resolved(0));
        }
        if meta.is_valid() {
            return Ok(TypeRef::Resolved(meta.id()));
        }
        match spec {
            TypeSpec::Meta(_) => Err(Error::InvalidType),
            TypeSpec::Name(name) => Ok(TypeRef::Unresolved(
                pool.intern(&canonical_type_name(name))?,
            )),
        }
    }

    fn method_record(&self, tables: &mut Tables, spec: &MethodSpec) -> Result<MethodRecord> {
        let parsed = parse_signature(&spec.signature)?;
        if parsed.params.len() > MAX_INVOKE_ARGS {
            return Err(Error::TooManyParameters {
                signature: spec.signature.clone(),
                count: parsed.params.len(),
                max: MAX_INVOKE_ARGS,
            });
        }

        let params: Vec<String> = parsed.params.iter().map(|p| canonical_type_name(p)).collect();
        let signature = format!("{}({})", parsed.name, params.join(","));
        let key = format!("{:?}:{signature}", spec.kind == MethodKind::Constructor);
        if !tables.seen.insert(key) {
            return Err(Error::DuplicateMethod {
                class: self.class_name.clone(),
                signature,
            });
        }

        let carries_names = self.revision >= 2 && !spec.parameter_names.is_empty();
        if carries_names && spec.parameter_names.len() != params.len() {
            return Err(Error::ParameterNameCount {
                signature,
                expected: params.len(),
                got: spec.parameter_names.len(),
            });
        }

        let params_start = tables.params.len() as u32;
        for (i, param) in params.iter().enumerate() {
            let type_ref = Self::type_ref(&mut tables.pool, &TypeSpec::Name(param.clone()))?;
            let name = if carries_names {
                tables.pool.intern(&spec.parameter_names[i])?
            } else {
                Default::default()
            };
            tables.params.push(ParamRecord { type_ref, name });
        }

        let return_type = match &spec.return_type {
            Some(ty) => Self::type_ref(&mut tables.pool, ty)?,
            None => TypeRef::Resolved(0),
        };

        let (revision, mut flags) = (spec.revision, spec.flags);
        let revision = if self.revision >= 2 {
            revision
        } else {
            flags.remove(MethodFlags::REVISIONED);
            0
        };

        Ok(MethodRecord {
            name: tables.pool.intern(&parsed.name)?,
            signature: tables.pool.intern(&signature)?,
            tag: tables.pool.intern(&spec.tag)?,
            params_start,
            // Bounded by MAX_INVOKE_ARGS.
            argc: params.len() as u16,
            return_type,
            kind: spec.kind,
            access: spec.access,
            flags,
            revision,
        })
    }

    fn notify_ref(
        &self,
        pool: &mut StringPool,
        methods: &[MethodRecord],
        spec: &PropertySpec,
    ) -> Result<NotifyRef> {
        let Some(signal) = &spec.notify else {
            return Ok(NotifyRef::None);
        };

        let wanted = if signal.contains('(') {
            crate::runtime::meta_object::canonical_signature(signal)
        } else {
            signal.trim().to_string()
        };
        let local = methods.iter().position(|m| {
            m.kind == MethodKind::Signal
                && (pool.resolve(m.signature) == Some(wanted.as_str())
                    || pool.resolve(m.name) == Some(wanted.as_str()))
        });

        match local {
            Some(index) => Ok(NotifyRef::Local(index)),
            None if self.revision >= 3 => Ok(NotifyRef::Unresolved(pool.intern(&wanted)?)),
            None => Err(Error::NotifySignalNotFound {
                property: spec.name.clone(),
                signal: signal.clone(),
            }),
        }
    }

    /// Validates the specification and builds the table.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRevision`] for a revision outside 1..=3
    /// - [`Error::InvalidSignature`], [`Error::TooManyParameters`],
    ///   [`Error::DuplicateMethod`], [`Error::ParameterNameCount`] for bad methods
    /// - [`Error::DuplicateProperty`], [`Error::NotifySignalNotFound`] for bad properties
    /// - [`Error::ClassAlreadyRegistered`] if the class name is taken
    pub fn build(self) -> Result<&'static MetaObject> {
        if self.revision == 0 || self.revision > CURRENT_REVISION {
            return Err(Error::InvalidRevision {
                revision: self.revision,
                current: CURRENT_REVISION,
            });
        }
        if introspection::class_by_name(&self.class_name).is_some() {
            return Err(Error::ClassAlreadyRegistered {
                name: self.class_name.clone(),
            });
        }

        let mut tables = Tables {
            pool: StringPool::new(),
            params: Vec::new(),
            seen: FxHashSet::default(),
        };
        let class_name = tables.pool.intern(&self.class_name)?;

        let methods = self
            .methods
            .iter()
            .map(|spec| self.method_record(&mut tables, spec))
            .collect::<Result<Vec<_>>>()?;
        let constructors = self
            .constructors
            .iter()
            .map(|spec| self.method_record(&mut tables, spec))
            .collect::<Result<Vec<_>>>()?;

        let mut property_names = FxHashSet::default();
        let mut properties = Vec::with_capacity(self.properties.len());
        for spec in &self.properties {
            if !property_names.insert(spec.name.as_str()) {
                return Err(Error::DuplicateProperty {
                    class: self.class_name.clone(),
                    name: spec.name.clone(),
                });
            }
            let notify = self.notify_ref(&mut tables.pool, &methods, spec)?;
            properties.push(PropertyRecord {
                name: tables.pool.intern(&spec.name)?,
                type_ref: Self::type_ref(&mut tables.pool, &spec.type_spec)?,
                flags: spec.flags,
                notify,
                revision: if self.revision >= 2 { spec.revision } else { 0 },
            });
        }

        let mut enums = Vec::with_capacity(self.enums.len());
        let mut enum_keys = Vec::new();
        for spec in &self.enums {
            let keys_start = enum_keys.len() as u32;
            for (key, value) in &spec.keys {
                enum_keys.push(EnumKeyRecord {
                    key: tables.pool.intern(key)?,
                    value: *value,
                });
            }
            enums.push(EnumRecord {
                name: tables.pool.intern(&spec.name)?,
                enum_name: tables.pool.intern(&spec.enum_name)?,
                is_flag: spec.is_flag,
                is_scoped: spec.is_scoped,
                keys_start,
                key_count: spec.keys.len() as u32,
            });
        }

        let class_infos = self
            .class_infos
            .iter()
            .map(|(name, value)| {
                Ok(ClassInfoRecord {
                    name: tables.pool.intern(name)?,
                    value: tables.pool.intern(value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let notify_cache = properties.iter().map(|_| OnceLock::new()).collect();
        let meta_object = global_arena().alloc(MetaObject {
            class_name,
            superclass: self.superclass,
            strings: tables.pool.freeze(),
            revision: self.revision,
            flags: self.flags,
            methods: methods.into_boxed_slice(),
            constructors: constructors.into_boxed_slice(),
            params: tables.params.into_boxed_slice(),
            properties: properties.into_boxed_slice(),
            enums: enums.into_boxed_slice(),
            enum_keys: enum_keys.into_boxed_slice(),
            class_infos: class_infos.into_boxed_slice(),
            static_metacall: self.static_metacall,
            notify_cache,
        });

        introspection::register_class(meta_object)?;
        debug!(
            "built class `{}` (revision {}, {} methods, {} properties)",
            meta_object.class_name(),
            meta_object.revision(),
            meta_object.method_count(),
            meta_object.property_count()
        );
        Ok(meta_object)
    }
}
