//! Type descriptors and the `MetaType` handle.
//!
//! A [`TypeDescriptor`] is the run-time description of one Rust type: its
//! layout, lifecycle operations, comparison and streaming hooks, and links
//! to container descriptors. Descriptors are allocated once in the metadata
//! arena and never move or die, so a `&'static TypeDescriptor` is a stable
//! identity.
//!
//! [`MetaType`] is the copyable handle callers pass around. A handle may be
//! *invalid* (backed by no descriptor); every query on an invalid handle
//! answers zero, false or null instead of faulting.
//!
//! # Identity
//!
//! Two handles denote the same type iff they point at the same descriptor
//! or their registered ids are equal and non-zero. Ids are claimed lazily
//! on the first call to [`MetaType::id`].
//!
//! # Example
//!
//! ```
//! use reflecta::runtime::MetaType;
//!
//! let meta = MetaType::of::<i32>();
//! assert_eq!(meta.name(), "i32");
//! assert_eq!(meta.size_of(), 4);
//! assert_eq!(MetaType::from_name("i32"), meta);
//! ```

use crate::runtime::container::{AssociationDescriptor, SequenceDescriptor};
use crate::runtime::registry;
use crate::runtime::signature::normalized_type;
use bitflags::bitflags;
use reflecta_log::error;
use reflecta_mem::global_arena;
use std::any::TypeId;
use std::alloc::Layout;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

bitflags! {
    /// Layout and category flags of a type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u32 {
        /// Default construction needs a function; zero fill is not a valid value.
        const NEEDS_CONSTRUCTION = 1 << 0;
        /// Values own resources and must be destructed.
        const NEEDS_DESTRUCTION = 1 << 1;
        /// Values can be moved with a byte copy.
        const RELOCATABLE = 1 << 2;
        /// The type is a pointer.
        const IS_POINTER = 1 << 3;
        /// The type is a fieldless enumeration.
        const IS_ENUMERATION = 1 << 4;
        /// The type is const-qualified.
        const IS_CONST = 1 << 5;
        /// The type is an unsigned integer.
        const IS_UNSIGNED = 1 << 6;
        /// The type is a reflectable object.
        const IS_OBJECT = 1 << 7;
        /// A sequence descriptor is attached.
        const IS_SEQUENCE = 1 << 8;
        /// An association descriptor is attached.
        const IS_ASSOCIATION = 1 << 9;
    }
}

/// Three-way comparison result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Left operand orders first.
    Less,
    /// Operands are equivalent.
    Equivalent,
    /// Left operand orders last.
    Greater,
    /// Operands cannot be ordered, or the type has no ordering.
    Unordered,
}

impl From<Option<std::cmp::Ordering>> for Comparison {
    fn from(ordering: Option<std::cmp::Ordering>) -> Self {
        match ordering {
            Some(std::cmp::Ordering::Less) => Comparison::Less,
            Some(std::cmp::Ordering::Equal) => Comparison::Equivalent,
            Some(std::cmp::Ordering::Greater) => Comparison::Greater,
            None => Comparison::Unordered,
        }
    }
}

/// Writes a default value into uninitialized storage.
pub type DefaultCtrFn = unsafe fn(dst: *mut u8);
/// Copy-constructs `src` into uninitialized storage at `dst`.
pub type CopyCtrFn = unsafe fn(dst: *mut u8, src: *const u8);
/// Moves `src` into uninitialized storage at `dst`; `src` becomes uninitialized.
pub type MoveCtrFn = unsafe fn(dst: *mut u8, src: *mut u8);
/// Destructs a value in place.
pub type DtorFn = unsafe fn(ptr: *mut u8);
/// Equality of two values.
pub type EqualsFn = unsafe fn(lhs: *const u8, rhs: *const u8) -> bool;
/// Three-way comparison of two values.
pub type CompareFn = unsafe fn(lhs: *const u8, rhs: *const u8) -> Comparison;
/// Debug formatting of a value.
pub type DebugStreamFn = unsafe fn(ptr: *const u8, out: &mut dyn fmt::Write) -> fmt::Result;
/// Serializes a value.
pub type SaveFn = unsafe fn(ptr: *const u8, out: &mut dyn io::Write) -> io::Result<()>;
/// Deserializes into an initialized value.
pub type LoadFn = unsafe fn(ptr: *mut u8, input: &mut dyn io::Read) -> io::Result<()>;

/// Operation table of a type. `None` means trivial or unsupported,
/// depending on the type's flags.
#[derive(Clone, Copy, Default)]
pub struct TypeOps {
    /// Default constructor.
    pub default_ctr: Option<DefaultCtrFn>,
    /// Copy constructor.
    pub copy_ctr: Option<CopyCtrFn>,
    /// Move constructor.
    pub move_ctr: Option<MoveCtrFn>,
    /// Destructor.
    pub dtor: Option<DtorFn>,
    /// Equality.
    pub equals: Option<EqualsFn>,
    /// Ordering.
    pub compare: Option<CompareFn>,
    /// Debug formatting.
    pub debug_stream: Option<DebugStreamFn>,
    /// Serialization hook.
    pub save: Option<SaveFn>,
    /// Deserialization hook.
    pub load: Option<LoadFn>,
}

impl fmt::Debug for TypeOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeOps")
            .field("default_ctr", &self.default_ctr.is_some())
            .field("copy_ctr", &self.copy_ctr.is_some())
            .field("move_ctr", &self.move_ctr.is_some())
            .field("dtor", &self.dtor.is_some())
            .field("equals", &self.equals.is_some())
            .field("compare", &self.compare.is_some())
            .field("debug_stream", &self.debug_stream.is_some())
            .field("save", &self.save.is_some())
            .field("load", &self.load.is_some())
            .finish()
    }
}

/// Run-time description of one type. Process-wide and address-stable.
pub struct TypeDescriptor {
    name: &'static str,
    size: usize,
    alignment: usize,
    flags: TypeFlags,
    type_id: TypeId,
    id: AtomicI32,
    ops: TypeOps,
    sequence: Option<&'static SequenceDescriptor>,
    association: Option<&'static AssociationDescriptor>,
}

impl TypeDescriptor {
    /// Starts a descriptor for `T` named `name`.
    ///
    /// Size, alignment, `TypeId`, the destructor and the
    /// `NEEDS_DESTRUCTION` flag are filled in from `T`. Everything else
    /// starts unsupported.
    #[must_use]
    pub fn builder<T: Send + 'static>(name: &str) -> TypeDescriptorBuilder {
        let needs_drop = std::mem::needs_drop::<T>();
        let mut flags = TypeFlags::NEEDS_CONSTRUCTION | TypeFlags::RELOCATABLE;
        if needs_drop {
            flags |= TypeFlags::NEEDS_DESTRUCTION;
        }

        TypeDescriptorBuilder {
            name: normalized_type(name),
            size: std::mem::size_of::<T>(),
            alignment: std::mem::align_of::<T>(),
            flags,
            type_id: TypeId::of::<T>(),
            ops: TypeOps {
                dtor: needs_drop.then_some(drop_thunk::<T> as DtorFn),
                ..TypeOps::default()
            },
            sequence: None,
            association: None,
        }
    }

    /// Normalized type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment in bytes.
    #[must_use]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Type flags.
    #[must_use]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Rust type identity.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Operation table.
    #[must_use]
    pub fn ops(&self) -> &TypeOps {
        &self.ops
    }

    /// Attached sequence descriptor.
    #[must_use]
    pub fn sequence(&self) -> Option<&'static SequenceDescriptor> {
        self.sequence
    }

    /// Attached association descriptor.
    #[must_use]
    pub fn association(&self) -> Option<&'static AssociationDescriptor> {
        self.association
    }

    /// Returns the id, claiming one on first use. 0 for void.
    pub fn id(&'static self) -> i32 {
        match self.id.load(Ordering::Acquire) {
            0 => registry::register(self),
            id => id,
        }
    }

    /// Returns the cached id without registering.
    #[must_use]
    pub fn cached_id(&self) -> i32 {
        self.id.load(Ordering::Acquire)
    }

    /// Installs `id` if no id has been claimed yet; returns the id in effect.
    pub(crate) fn claim_id(&self, id: i32) -> i32 {
        match self
            .id
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => id,
            Err(existing) => existing,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("flags", &self.flags)
            .field("id", &self.cached_id())
            .field("ops", &self.ops)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TypeDescriptor`].
pub struct TypeDescriptorBuilder {
    name: String,
    size: usize,
    alignment: usize,
    flags: TypeFlags,
    type_id: TypeId,
    ops: TypeOps,
    sequence: Option<&'static SequenceDescriptor>,
    association: Option<&'static AssociationDescriptor>,
}

impl TypeDescriptorBuilder {
    /// Adds category flags.
    #[must_use]
    pub fn flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Declares that an all-zero bit pattern is a valid default value.
    ///
    /// # Safety
    ///
    /// Zero-filled storage must be a valid, initialized value of the type.
    #[must_use]
    pub unsafe fn trivially_constructible(mut self) -> Self {
        self.flags.remove(TypeFlags::NEEDS_CONSTRUCTION);
        self
    }

    /// Sets the default constructor.
    #[must_use]
    pub fn default_ctr(mut self, f: Option<DefaultCtrFn>) -> Self {
        self.ops.default_ctr = f;
        self
    }

    /// Sets the copy constructor.
    #[must_use]
    pub fn copy_ctr(mut self, f: Option<CopyCtrFn>) -> Self {
        self.ops.copy_ctr = f;
        self
    }

    /// Sets the move constructor.
    #[must_use]
    pub fn move_ctr(mut self, f: Option<MoveCtrFn>) -> Self {
        self.ops.move_ctr = f;
        self
    }

    /// Sets the equality operation.
    #[must_use]
    pub fn equals(mut self, f: Option<EqualsFn>) -> Self {
        self.ops.equals = f;
        self
    }

    /// Sets the ordering operation.
    #[must_use]
    pub fn compare(mut self, f: Option<CompareFn>) -> Self {
        self.ops.compare = f;
        self
    }

    /// Sets the debug formatter.
    #[must_use]
    pub fn debug_stream(mut self, f: Option<DebugStreamFn>) -> Self {
        self.ops.debug_stream = f;
        self
    }

    /// Sets the serialization hooks.
    #[must_use]
    pub fn stream_operators(mut self, save: Option<SaveFn>, load: Option<LoadFn>) -> Self {
        self.ops.save = save;
        self.ops.load = load;
        self
    }

    /// Attaches a sequence descriptor and sets `IS_SEQUENCE`.
    #[must_use]
    pub fn sequence(mut self, sequence: Option<&'static SequenceDescriptor>) -> Self {
        self.sequence = sequence;
        self.flags.set(TypeFlags::IS_SEQUENCE, sequence.is_some());
        self
    }

    /// Attaches an association descriptor and sets `IS_ASSOCIATION`.
    #[must_use]
    pub fn association(mut self, association: Option<&'static AssociationDescriptor>) -> Self {
        self.association = association;
        self.flags.set(TypeFlags::IS_ASSOCIATION, association.is_some());
        self
    }

    /// Moves the descriptor into the metadata arena.
    ///
    /// The descriptor is not registered yet; that happens on the first
    /// [`TypeDescriptor::id`] call.
    #[must_use]
    pub fn build(self) -> &'static TypeDescriptor {
        let arena = global_arena();
        arena.alloc(TypeDescriptor {
            name: arena.alloc_str(&self.name),
            size: self.size,
            alignment: self.alignment,
            flags: self.flags,
            type_id: self.type_id,
            id: AtomicI32::new(0),
            ops: self.ops,
            sequence: self.sequence,
            association: self.association,
        })
    }
}

unsafe fn drop_thunk<T>(ptr: *mut u8) {
    // SAFETY: the caller passes an initialized T.
    unsafe { std::ptr::drop_in_place(ptr.cast::<T>()) }
}

/// Types with a process-wide descriptor.
///
/// Implemented by [`declare_metatype!`](crate::declare_metatype) for
/// concrete types and generically for the std containers.
pub trait MetaTypeOf: Send + 'static {
    /// Returns the singleton descriptor of `Self`.
    fn descriptor() -> &'static TypeDescriptor;

    /// Returns the handle of `Self`.
    fn meta_type() -> MetaType {
        MetaType::from_descriptor(Self::descriptor())
    }
}

/// Copyable handle to a [`TypeDescriptor`], possibly invalid.
#[derive(Clone, Copy, Default)]
pub struct MetaType(Option<&'static TypeDescriptor>);

impl MetaType {
    /// The invalid handle.
    #[must_use]
    pub const fn invalid() -> Self {
        MetaType(None)
    }

    /// Handle for `T`.
    #[must_use]
    pub fn of<T: MetaTypeOf>() -> Self {
        MetaType(Some(T::descriptor()))
    }

    /// Wraps a descriptor.
    #[must_use]
    pub const fn from_descriptor(descriptor: &'static TypeDescriptor) -> Self {
        MetaType(Some(descriptor))
    }

    /// Looks a type up by name or alias. Invalid if unknown.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        MetaType(registry::lookup_name(name))
    }

    /// Looks a type up by id. Invalid if unknown.
    #[must_use]
    pub fn from_id(id: i32) -> Self {
        MetaType(registry::lookup_id(id))
    }

    /// Looks a type up by Rust `TypeId`. Invalid if no descriptor was made.
    #[must_use]
    pub fn from_type_id(type_id: TypeId) -> Self {
        MetaType(registry::lookup_type_id(type_id))
    }

    /// Returns true if the handle is backed by a descriptor.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0.is_some()
    }

    /// Backing descriptor.
    #[must_use]
    pub fn descriptor(self) -> Option<&'static TypeDescriptor> {
        self.0
    }

    /// Registered id; 0 for invalid handles and void.
    pub fn id(self) -> i32 {
        self.0.map_or(0, TypeDescriptor::id)
    }

    /// Normalized name; empty for invalid handles.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.0.map_or("", TypeDescriptor::name)
    }

    /// Size in bytes.
    #[must_use]
    pub fn size_of(self) -> usize {
        self.0.map_or(0, TypeDescriptor::size)
    }

    /// Alignment in bytes.
    #[must_use]
    pub fn align_of(self) -> usize {
        self.0.map_or(0, TypeDescriptor::alignment)
    }

    /// Type flags.
    #[must_use]
    pub fn flags(self) -> TypeFlags {
        self.0.map_or(TypeFlags::empty(), TypeDescriptor::flags)
    }

    /// Rust type identity.
    #[must_use]
    pub fn type_id(self) -> Option<TypeId> {
        self.0.map(TypeDescriptor::type_id)
    }

    /// Returns true if this handle describes `T`.
    #[must_use]
    pub fn is<T: 'static>(self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }

    /// Returns true for the void type.
    #[must_use]
    pub fn is_void(self) -> bool {
        self.is::<()>()
    }

    fn ops(self) -> Option<&'static TypeOps> {
        self.0.map(TypeDescriptor::ops)
    }

    /// Returns true if a value can be default-constructed.
    #[must_use]
    pub fn is_default_constructible(self) -> bool {
        self.0.is_some_and(|d| {
            d.ops.default_ctr.is_some() || !d.flags.contains(TypeFlags::NEEDS_CONSTRUCTION)
        })
    }

    /// Returns true if a value can be copy-constructed.
    #[must_use]
    pub fn is_copy_constructible(self) -> bool {
        self.0.is_some_and(|d| d.ops.copy_ctr.is_some() || is_trivially_copyable(d.flags))
    }

    /// Returns true if a value can be destructed.
    #[must_use]
    pub fn is_destructible(self) -> bool {
        self.0.is_some_and(|d| {
            d.ops.dtor.is_some() || !d.flags.contains(TypeFlags::NEEDS_DESTRUCTION)
        })
    }

    /// Returns true if [`equals`](Self::equals) gives a meaningful answer.
    #[must_use]
    pub fn is_equality_comparable(self) -> bool {
        self.ops().is_some_and(|o| o.equals.is_some() || o.compare.is_some())
    }

    /// Returns true if [`compare`](Self::compare) gives a meaningful answer.
    #[must_use]
    pub fn is_ordered(self) -> bool {
        self.ops().is_some_and(|o| o.compare.is_some())
    }

    /// Returns true if the type has a debug formatter.
    #[must_use]
    pub fn has_debug_stream(self) -> bool {
        self.ops().is_some_and(|o| o.debug_stream.is_some())
    }

    /// Returns true if both serialization hooks are present.
    #[must_use]
    pub fn has_stream_operators(self) -> bool {
        self.ops().is_some_and(|o| o.save.is_some() && o.load.is_some())
    }

    /// Sequence descriptor, if the type is a sequence.
    #[must_use]
    pub fn sequence(self) -> Option<&'static SequenceDescriptor> {
        self.0.and_then(TypeDescriptor::sequence)
    }

    /// Association descriptor, if the type is an association.
    #[must_use]
    pub fn association(self) -> Option<&'static AssociationDescriptor> {
        self.0.and_then(TypeDescriptor::association)
    }

    fn layout(self) -> Option<Layout> {
        let d = self.0?;
        Layout::from_size_align(d.size, d.alignment).ok()
    }

    /// Allocates and constructs a value on the heap.
    ///
    /// Default-constructs when `copy` is `None`, copy-constructs otherwise.
    /// Returns null for invalid handles or when construction is not
    /// possible.
    ///
    /// # Safety
    ///
    /// `copy`, if given, must point to an initialized value of this type.
    /// The result must be released with [`destroy`](Self::destroy).
    pub unsafe fn create(self, copy: Option<*const u8>) -> *mut u8 {
        let Some(layout) = self.layout() else {
            return std::ptr::null_mut();
        };

        let ptr = if layout.size() == 0 {
            // Dangling but well aligned, as for any zero-sized allocation.
            layout.align() as *mut u8
        } else {
            // SAFETY: the layout is non-zero sized.
            let raw = unsafe { std::alloc::alloc(layout) };
            if raw.is_null() {
                std::alloc::handle_alloc_error(layout);
            }
            raw
        };

        // SAFETY: ptr is fresh storage for this type; copy is valid per the
        // caller's contract.
        if unsafe { self.construct(ptr, copy) } {
            ptr
        } else {
            if layout.size() != 0 {
                // SAFETY: allocated above with the same layout.
                unsafe { std::alloc::dealloc(ptr, layout) };
            }
            std::ptr::null_mut()
        }
    }

    /// Destructs and frees a value made by [`create`](Self::create).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `create` on the same type and not be used after.
    pub unsafe fn destroy(self, ptr: *mut u8) {
        let Some(layout) = self.layout() else {
            return;
        };
        if ptr.is_null() {
            return;
        }

        // SAFETY: ptr holds an initialized value per the caller's contract.
        unsafe {
            self.destruct(ptr);
            if layout.size() != 0 {
                std::alloc::dealloc(ptr, layout);
            }
        }
    }

    /// Constructs a value in place.
    ///
    /// Falls back to zero fill (default) or a byte copy (copy) when the
    /// flags declare the operation trivial. Returns false if nothing was
    /// constructed.
    ///
    /// # Safety
    ///
    /// `dst` must be valid, aligned, uninitialized storage for this type;
    /// `copy`, if given, must point to an initialized value of this type.
    pub unsafe fn construct(self, dst: *mut u8, copy: Option<*const u8>) -> bool {
        let Some(d) = self.0 else {
            return false;
        };
        if dst.is_null() {
            return false;
        }

        match copy {
            None => match d.ops.default_ctr {
                // SAFETY: forwarded caller contract.
                Some(ctr) => unsafe { ctr(dst) },
                None if !d.flags.contains(TypeFlags::NEEDS_CONSTRUCTION) => {
                    // SAFETY: dst is valid for size bytes; zero is a valid value.
                    unsafe { std::ptr::write_bytes(dst, 0, d.size) }
                }
                None => {
                    contract_violation(d, "default construction");
                    return false;
                }
            },
            Some(src) => match d.ops.copy_ctr {
                // SAFETY: forwarded caller contract.
                Some(ctr) => unsafe { ctr(dst, src) },
                None if is_trivially_copyable(d.flags) => {
                    // SAFETY: src and dst are distinct valid regions of size bytes.
                    unsafe { std::ptr::copy_nonoverlapping(src, dst, d.size) }
                }
                None => {
                    contract_violation(d, "copy construction");
                    return false;
                }
            },
        }
        true
    }

    /// Moves a value from `src` into `dst`, leaving `src` uninitialized.
    ///
    /// # Safety
    ///
    /// `dst` must be uninitialized storage for this type and `src` an
    /// initialized value that the caller will not drop afterwards.
    pub unsafe fn move_construct(self, dst: *mut u8, src: *mut u8) -> bool {
        let Some(d) = self.0 else {
            return false;
        };
        match d.ops.move_ctr {
            // SAFETY: forwarded caller contract.
            Some(ctr) => unsafe { ctr(dst, src) },
            None if d.flags.contains(TypeFlags::RELOCATABLE) => {
                // SAFETY: relocatable values move with a byte copy.
                unsafe { std::ptr::copy_nonoverlapping(src, dst, d.size) }
            }
            None => {
                contract_violation(d, "move construction");
                return false;
            }
        }
        true
    }

    /// Destructs a value in place without freeing its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must hold an initialized value of this type, which is
    /// uninitialized afterwards.
    pub unsafe fn destruct(self, ptr: *mut u8) {
        let Some(d) = self.0 else {
            return;
        };
        match d.ops.dtor {
            // SAFETY: forwarded caller contract.
            Some(dtor) => unsafe { dtor(ptr) },
            None if !d.flags.contains(TypeFlags::NEEDS_DESTRUCTION) => {}
            None => contract_violation(d, "destruction"),
        }
    }

    /// Replaces the value at `dst` with a copy of `src`.
    ///
    /// # Safety
    ///
    /// Both pointers must hold initialized values of this type.
    pub unsafe fn assign(self, dst: *mut u8, src: *const u8) -> bool {
        if std::ptr::eq(dst, src) {
            return self.is_valid();
        }
        if !self.is_copy_constructible() {
            return false;
        }
        // SAFETY: dst holds a value that is replaced by a fresh copy.
        unsafe {
            self.destruct(dst);
            self.construct(dst, Some(src))
        }
    }

    /// Compares two values for equality.
    ///
    /// Uses the ordering when no equality operation exists. False for types
    /// without either.
    ///
    /// # Safety
    ///
    /// Both pointers must hold initialized values of this type.
    pub unsafe fn equals(self, lhs: *const u8, rhs: *const u8) -> bool {
        let Some(ops) = self.ops() else {
            return false;
        };
        match (ops.equals, ops.compare) {
            // SAFETY: forwarded caller contract.
            (Some(eq), _) => unsafe { eq(lhs, rhs) },
            (None, Some(cmp)) => unsafe { cmp(lhs, rhs) == Comparison::Equivalent },
            (None, None) => false,
        }
    }

    /// Three-way comparison; `Unordered` for types without an ordering.
    ///
    /// # Safety
    ///
    /// Both pointers must hold initialized values of this type.
    pub unsafe fn compare(self, lhs: *const u8, rhs: *const u8) -> Comparison {
        match self.ops().and_then(|o| o.compare) {
            // SAFETY: forwarded caller contract.
            Some(cmp) => unsafe { cmp(lhs, rhs) },
            None => Comparison::Unordered,
        }
    }

    /// Writes the debug representation of a value to `out`.
    ///
    /// Returns false if the type has no formatter or formatting failed.
    ///
    /// # Safety
    ///
    /// `ptr` must hold an initialized value of this type.
    pub unsafe fn debug_stream(self, ptr: *const u8, out: &mut dyn fmt::Write) -> bool {
        match self.ops().and_then(|o| o.debug_stream) {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(ptr, out) }.is_ok(),
            None => false,
        }
    }

    /// Serializes a value through the save hook.
    ///
    /// # Safety
    ///
    /// `ptr` must hold an initialized value of this type.
    pub unsafe fn save(self, ptr: *const u8, out: &mut dyn io::Write) -> bool {
        match self.ops().and_then(|o| o.save) {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(ptr, out) }.is_ok(),
            None => false,
        }
    }

    /// Deserializes into a value through the load hook.
    ///
    /// # Safety
    ///
    /// `ptr` must hold an initialized value of this type.
    pub unsafe fn load(self, ptr: *mut u8, input: &mut dyn io::Read) -> bool {
        match self.ops().and_then(|o| o.load) {
            // SAFETY: forwarded caller contract.
            Some(f) => unsafe { f(ptr, input) }.is_ok(),
            None => false,
        }
    }
}

fn is_trivially_copyable(flags: TypeFlags) -> bool {
    !flags.intersects(TypeFlags::NEEDS_CONSTRUCTION | TypeFlags::NEEDS_DESTRUCTION)
}

fn contract_violation(descriptor: &TypeDescriptor, operation: &str) {
    error!(
        "{operation} requested for `{}`, which declares it non-trivial but provides no implementation",
        descriptor.name
    );
    debug_assert!(
        false,
        "{operation} is not available for `{}`",
        descriptor.name
    );
}

impl PartialEq for MetaType {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Some(a), Some(b)) => {
                if std::ptr::eq(a, b) {
                    return true;
                }
                let id = a.id();
                id != 0 && id == b.id()
            }
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for MetaType {}

impl Hash for MetaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(d) => write!(f, "MetaType({}, {})", d.name, d.cached_id()),
            None => f.write_str("MetaType(invalid)"),
        }
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builtin;

    #[derive(Debug, Clone, Default, PartialEq, PartialOrd)]
    struct Sample {
        a: i32,
        b: String,
    }

    crate::declare_metatype!(Sample);

    #[test]
    fn test_invalid_handle_answers_zero() {
        let meta = MetaType::invalid();
        assert!(!meta.is_valid());
        assert_eq!(meta.id(), 0);
        assert_eq!(meta.name(), "");
        assert_eq!(meta.size_of(), 0);
        assert!(!meta.is_equality_comparable());
        unsafe {
            assert!(meta.create(None).is_null());
            assert!(!meta.equals(std::ptr::null(), std::ptr::null()));
            assert_eq!(
                meta.compare(std::ptr::null(), std::ptr::null()),
                Comparison::Unordered
            );
            meta.destroy(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_layout_and_flags() {
        let meta = MetaType::of::<Sample>();
        assert_eq!(meta.size_of(), std::mem::size_of::<Sample>());
        assert_eq!(meta.align_of(), std::mem::align_of::<Sample>());
        assert!(meta.flags().contains(TypeFlags::NEEDS_DESTRUCTION));
        assert!(meta.flags().contains(TypeFlags::RELOCATABLE));
        assert!(MetaType::of::<u16>().flags().contains(TypeFlags::IS_UNSIGNED));
        assert!(!MetaType::of::<u16>().flags().contains(TypeFlags::NEEDS_DESTRUCTION));
    }

    #[test]
    fn test_create_copy_and_compare() {
        let meta = MetaType::of::<Sample>();
        let original = Sample {
            a: 7,
            b: "seven".into(),
        };

        unsafe {
            let default = meta.create(None);
            let copy = meta.create(Some((&original as *const Sample).cast()));

            assert_eq!(*default.cast::<Sample>(), Sample::default());
            assert!(meta.equals(copy, (&original as *const Sample).cast()));
            assert!(!meta.equals(default, copy));
            assert_eq!(meta.compare(default, copy), Comparison::Less);

            meta.destroy(default);
            meta.destroy(copy);
        }
    }

    #[test]
    fn test_debug_stream() {
        let meta = MetaType::of::<i32>();
        let value = 42i32;
        let mut out = String::new();
        assert!(unsafe { meta.debug_stream((&value as *const i32).cast(), &mut out) });
        assert_eq!(out, "42");
    }

    #[test]
    fn test_unordered_float_comparison() {
        let meta = MetaType::of::<f64>();
        let (a, b) = (f64::NAN, 1.0f64);
        let cmp = unsafe { meta.compare((&a as *const f64).cast(), (&b as *const f64).cast()) };
        assert_eq!(cmp, Comparison::Unordered);
    }

    #[test]
    fn test_trivial_fallbacks() {
        #[derive(Debug)]
        struct Raw {
            x: u32,
            y: u32,
        }

        // SAFETY: Raw is plain integers, so zero is a valid value.
        let descriptor = unsafe {
            TypeDescriptor::builder::<Raw>("RawForFallback").trivially_constructible()
        }
        .build();
        let meta = MetaType::from_descriptor(descriptor);

        assert!(meta.is_default_constructible());
        assert!(meta.is_copy_constructible());
        assert!(!meta.is_equality_comparable());

        unsafe {
            let zeroed = meta.create(None);
            assert_eq!((*zeroed.cast::<Raw>()).x, 0);

            let source = Raw { x: 3, y: 4 };
            let copy = meta.create(Some((&source as *const Raw).cast()));
            assert_eq!((*copy.cast::<Raw>()).y, 4);

            meta.destroy(zeroed);
            meta.destroy(copy);
        }
    }

    #[test]
    fn test_void_has_id_zero() {
        let void = MetaType::of::<()>();
        assert!(void.is_valid());
        assert!(void.is_void());
        assert_eq!(void.id(), builtin::VOID);
        assert_eq!(void.name(), "void");
    }

    #[test]
    fn test_identity_by_address_or_id() {
        let a = MetaType::of::<Sample>();
        let b = MetaType::from_id(a.id());
        assert_eq!(a, b);
        assert_ne!(a, MetaType::of::<i32>());
        assert_ne!(a, MetaType::invalid());
        assert_eq!(MetaType::invalid(), MetaType::invalid());
    }
}
