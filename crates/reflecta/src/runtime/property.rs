//! Property handles.
//!
//! A [`MetaProperty`] reads, writes and resets one property of an object
//! through its class's dispatch function, exchanging values as
//! [`MetaValue`]s.
//!
//! Access is refused for objects whose class does not inherit the class
//! declaring the property.

use crate::runtime::meta_object::{
    MetaCall, MetaObject, NotifyRef, PropertyRecord, resolve_type_ref, type_ref_matches,
    type_ref_name,
};
use crate::runtime::args::ReturnSlot;
use crate::runtime::meta_type::MetaType;
use crate::runtime::method::MetaMethod;
use crate::runtime::object::Reflect;
use crate::runtime::value::MetaValue;
use bitflags::bitflags;
use reflecta_log::{trace, warn};
use std::fmt;

bitflags! {
    /// Property attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u32 {
        /// Can be read.
        const READABLE = 1 << 0;
        /// Can be written.
        const WRITABLE = 1 << 1;
        /// Can be reset to a default.
        const RESETTABLE = 1 << 2;
        /// Backed by a bindable storage.
        const BINDABLE = 1 << 3;
        /// Never changes after construction.
        const CONSTANT = 1 << 4;
        /// Cannot be overridden in a subclass.
        const FINAL = 1 << 5;
        /// Shown in designers.
        const DESIGNABLE = 1 << 6;
        /// Persisted with the object state.
        const STORED = 1 << 7;
        /// The property users edit most.
        const USER = 1 << 8;
        /// Must be set on creation.
        const REQUIRED = 1 << 9;
    }
}

impl Default for PropertyFlags {
    fn default() -> Self {
        PropertyFlags::READABLE | PropertyFlags::DESIGNABLE | PropertyFlags::STORED
    }
}

/// Handle to a property of a class table.
///
/// [`read`](Self::read) needs a default-constructible property type to
/// allocate its result. For other types, read into caller-owned storage with
/// [`read_into`](Self::read_into).
#[derive(Clone, Copy)]
pub struct MetaProperty {
    class: &'static MetaObject,
    local: usize,
}

impl MetaProperty {
    pub(crate) fn new(class: &'static MetaObject, local: usize) -> Self {
        MetaProperty { class, local }
    }

    fn record(&self) -> &'static PropertyRecord {
        &self.class.properties[self.local]
    }

    /// Class declaring the property.
    #[must_use]
    pub fn enclosing_meta_object(&self) -> &'static MetaObject {
        self.class
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.class.string(self.record().name)
    }

    /// Type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        type_ref_name(&self.class.strings, self.record().type_ref)
    }

    /// Type; invalid while the type name is unregistered.
    #[must_use]
    pub fn meta_type(&self) -> MetaType {
        resolve_type_ref(&self.class.strings, self.record().type_ref)
    }

    /// Attributes.
    #[must_use]
    pub fn flags(&self) -> PropertyFlags {
        self.record().flags
    }

    /// Revision number.
    #[must_use]
    pub fn revision(&self) -> u32 {
        self.record().revision
    }

    /// Chain-global index.
    #[must_use]
    pub fn property_index(&self) -> usize {
        self.class.property_offset() + self.local
    }

    /// Index among the declaring class's own properties.
    #[must_use]
    pub fn relative_property_index(&self) -> usize {
        self.local
    }

    /// Returns true if the property can be read.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.flags().contains(PropertyFlags::READABLE)
    }

    /// Returns true if the property can be written.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.flags().contains(PropertyFlags::WRITABLE)
    }

    /// Returns true if the property can be reset.
    #[must_use]
    pub fn is_resettable(&self) -> bool {
        self.flags().contains(PropertyFlags::RESETTABLE)
    }

    /// Returns true if the value never changes.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.flags().contains(PropertyFlags::CONSTANT)
    }

    /// Returns true if subclasses cannot override the property.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags().contains(PropertyFlags::FINAL)
    }

    /// Returns true if a change-notification signal was declared.
    #[must_use]
    pub fn has_notify_signal(&self) -> bool {
        self.record().notify != NotifyRef::None
    }

    /// Chain-global index of the notify signal.
    ///
    /// Unresolved names are looked up once on first use and cached.
    #[must_use]
    pub fn notify_signal_index(&self) -> Option<usize> {
        match self.record().notify {
            NotifyRef::None => None,
            NotifyRef::Local(local) => Some(self.class.method_offset() + local),
            NotifyRef::Unresolved(name) => *self.class.notify_cache[self.local].get_or_init(|| {
                let name = self.class.string(name);
                let found = self.class.find_signal(name);
                if found.is_none() {
                    warn!(
                        "notify signal `{name}` of property `{}::{}` not found",
                        self.class.class_name(),
                        self.name()
                    );
                }
                found
            }),
        }
    }

    /// The notify signal.
    #[must_use]
    pub fn notify_signal(&self) -> Option<MetaMethod> {
        self.notify_signal_index()
            .and_then(|index| self.class.method(index))
    }

    fn accepts(&self, object: &dyn Reflect) -> bool {
        let class = object.meta_object();
        if class.inherits(self.class) {
            return true;
        }
        warn!(
            "property `{}::{}` does not belong to `{}`",
            self.class.class_name(),
            self.name(),
            class.class_name()
        );
        false
    }

    /// Reads the property of `object`.
    ///
    /// Returns `None` if the property is not readable, `object` is not an
    /// instance of the declaring class, its type cannot be
    /// default-constructed, or the dispatch function rejected the read.
    #[must_use]
    pub fn read(&self, object: &dyn Reflect) -> Option<MetaValue> {
        if !self.is_readable() || !self.accepts(object) {
            return None;
        }
        let mut value = MetaValue::default_of(self.meta_type())?;
        let mut argv = [value.data_mut()];
        // SAFETY: argv[0] points to an initialized value of the property type.
        let ok = unsafe {
            self.class
                .metacall(Some(object), MetaCall::ReadProperty, self.property_index(), &mut argv)
        };
        trace!("read {}::{} -> {ok}", self.class.class_name(), self.name());
        ok.then_some(value)
    }

    /// Reads the property of `object` into `slot`.
    ///
    /// The slot must have the property type. Returns false under the same
    /// conditions as [`read`](Self::read), except that the type need not be
    /// default-constructible.
    pub fn read_into(&self, object: &dyn Reflect, slot: ReturnSlot<'_>) -> bool {
        if !self.is_readable() || !self.accepts(object) {
            return false;
        }
        if !type_ref_matches(&self.class.strings, self.record().type_ref, slot.meta_type()) {
            warn!(
                "cannot read property `{}::{}` of type `{}` into `{}`",
                self.class.class_name(),
                self.name(),
                self.type_name(),
                slot.meta_type().name()
            );
            return false;
        }
        let mut argv = [slot.data()];
        // SAFETY: the slot holds an initialized value of the property type.
        let ok = unsafe {
            self.class
                .metacall(Some(object), MetaCall::ReadProperty, self.property_index(), &mut argv)
        };
        trace!("read {}::{} into slot -> {ok}", self.class.class_name(), self.name());
        ok
    }

    /// Writes `value` to the property of `object`.
    ///
    /// Returns false if the property is not writable, `object` is not an
    /// instance of the declaring class, `value` has another type, or the
    /// dispatch function rejected the write.
    pub fn write(&self, object: &dyn Reflect, value: &MetaValue) -> bool {
        if !self.is_writable() || !self.accepts(object) {
            return false;
        }
        if !type_ref_matches(&self.class.strings, self.record().type_ref, value.meta_type()) {
            warn!(
                "cannot write `{}` to property `{}::{}` of type `{}`",
                value.meta_type().name(),
                self.class.class_name(),
                self.name(),
                self.type_name()
            );
            return false;
        }
        let mut argv = [value.data().cast_mut()];
        // SAFETY: argv[0] points to an initialized value of the property
        // type, which the callee only reads.
        unsafe {
            self.class
                .metacall(Some(object), MetaCall::WriteProperty, self.property_index(), &mut argv)
        }
    }

    /// Resets the property of `object`.
    pub fn reset(&self, object: &dyn Reflect) -> bool {
        if !self.is_resettable() || !self.accepts(object) {
            return false;
        }
        // SAFETY: a reset carries no arguments.
        unsafe {
            self.class
                .metacall(Some(object), MetaCall::ResetProperty, self.property_index(), &mut [])
        }
    }
}

impl PartialEq for MetaProperty {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.class, other.class) && self.local == other.local
    }
}

impl Eq for MetaProperty {}

impl fmt::Debug for MetaProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaProperty")
            .field("class", &self.class.class_name())
            .field("name", &self.name())
            .field("type", &self.type_name())
            .field("flags", &self.flags())
            .finish()
    }
}
