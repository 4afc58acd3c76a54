//! Method handles.
//!
//! A [`MetaMethod`] is a copyable reference to one method record of a
//! class table: a plain method, a signal, a slot or a constructor.

use crate::error::InvokeError;
use crate::runtime::args::{Argument, ReturnSlot};
use crate::runtime::invoke::{self, ConnectionType};
use crate::runtime::meta_object::{
    MetaObject, MethodRecord, TypeRef, resolve_type_ref, type_ref_matches, type_ref_name,
};
use crate::runtime::meta_type::MetaType;
use crate::runtime::object::Reflect;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

/// Access level of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    /// Private.
    Private,
    /// Protected.
    Protected,
    /// Public.
    #[default]
    Public,
}

/// Role of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodKind {
    /// Plain invokable method.
    #[default]
    Method,
    /// Signal; emitted by the object, delivered to connected receivers.
    Signal,
    /// Slot; a method that may receive signals.
    Slot,
    /// Constructor.
    Constructor,
}

bitflags! {
    /// Method attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u32 {
        /// The method does not modify the object.
        const CONST = 1 << 0;
        /// The method carries a revision number.
        const REVISIONED = 1 << 1;
        /// Overload synthesized from default arguments of another method.
        const CLONED = 1 << 2;
        /// Exposed to scripting front-ends.
        const SCRIPTABLE = 1 << 3;
    }
}

/// Handle to a method or constructor of a class table.
#[derive(Clone, Copy)]
pub struct MetaMethod {
    class: &'static MetaObject,
    local: usize,
    constructor: bool,
}

impl MetaMethod {
    pub(crate) fn new(class: &'static MetaObject, local: usize, constructor: bool) -> Self {
        MetaMethod {
            class,
            local,
            constructor,
        }
    }

    pub(crate) fn record(&self) -> &'static MethodRecord {
        if self.constructor {
            &self.class.constructors[self.local]
        } else {
            &self.class.methods[self.local]
        }
    }

    fn param_type_ref(&self, index: usize) -> Option<TypeRef> {
        let record = self.record();
        (index < usize::from(record.argc))
            .then(|| self.class.params[record.params_start as usize + index].type_ref)
    }

    /// Class declaring the method.
    #[must_use]
    pub fn enclosing_meta_object(&self) -> &'static MetaObject {
        self.class
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.class.string(self.record().name)
    }

    /// Normalized signature, e.g. `setValue(i32)`.
    #[must_use]
    pub fn signature(&self) -> &'static str {
        self.class.string(self.record().signature)
    }

    /// Free-form tag.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.class.string(self.record().tag)
    }

    /// Role of the method.
    #[must_use]
    pub fn kind(&self) -> MethodKind {
        self.record().kind
    }

    /// Access level.
    #[must_use]
    pub fn access(&self) -> Access {
        self.record().access
    }

    /// Attributes.
    #[must_use]
    pub fn flags(&self) -> MethodFlags {
        self.record().flags
    }

    /// Revision number; 0 when not revisioned or the table predates revision 2.
    #[must_use]
    pub fn revision(&self) -> u32 {
        self.record().revision
    }

    /// Chain-global index; constructor index for constructors.
    #[must_use]
    pub fn method_index(&self) -> usize {
        if self.constructor {
            self.local
        } else {
            self.class.method_offset() + self.local
        }
    }

    /// Index among the declaring class's own methods.
    #[must_use]
    pub fn relative_method_index(&self) -> usize {
        self.local
    }

    /// Number of parameters.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        usize::from(self.record().argc)
    }

    /// Type of parameter `index` (0-based); invalid if out of range or the
    /// type is still unregistered.
    #[must_use]
    pub fn parameter_type(&self, index: usize) -> MetaType {
        self.param_type_ref(index)
            .map_or(MetaType::invalid(), |t| resolve_type_ref(&self.class.strings, t))
    }

    /// Type name of parameter `index` (0-based); empty if out of range.
    #[must_use]
    pub fn parameter_type_name(&self, index: usize) -> &'static str {
        self.param_type_ref(index)
            .map_or("", |t| type_ref_name(&self.class.strings, t))
    }

    /// Parameter names; empty strings where none were recorded.
    #[must_use]
    pub fn parameter_names(&self) -> Vec<&'static str> {
        let record = self.record();
        let start = record.params_start as usize;
        self.class.params[start..start + usize::from(record.argc)]
            .iter()
            .map(|p| self.class.string(p.name))
            .collect()
    }

    /// Return type; void for methods without one.
    #[must_use]
    pub fn return_type(&self) -> MetaType {
        resolve_type_ref(&self.class.strings, self.record().return_type)
    }

    /// Return type name; `void` for methods without one.
    #[must_use]
    pub fn return_type_name(&self) -> &'static str {
        type_ref_name(&self.class.strings, self.record().return_type)
    }

    /// Returns true if the method returns nothing.
    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.record().return_type == TypeRef::Resolved(0)
    }

    pub(crate) fn parameter_matches(&self, index: usize, actual: MetaType) -> bool {
        self.param_type_ref(index)
            .is_some_and(|t| type_ref_matches(&self.class.strings, t, actual))
    }

    pub(crate) fn return_matches(&self, actual: MetaType) -> bool {
        type_ref_matches(&self.class.strings, self.record().return_type, actual)
    }

    /// Checks `args` against the parameter list.
    ///
    /// # Errors
    ///
    /// [`InvokeError::ArgumentCountMismatch`] or
    /// [`InvokeError::FormalParameterMismatch`] naming the first bad slot.
    pub fn check_arguments(&self, args: &[Argument<'_>]) -> Result<(), InvokeError> {
        if args.len() != self.parameter_count() {
            return Err(InvokeError::ArgumentCountMismatch {
                signature: self.signature().to_string(),
                expected: self.parameter_count(),
                got: args.len(),
            });
        }
        for (i, arg) in args.iter().enumerate() {
            if !self.parameter_matches(i, arg.meta_type()) {
                return Err(InvokeError::FormalParameterMismatch {
                    signature: self.signature().to_string(),
                    index: i + 1,
                    expected: self.parameter_type_name(i).to_string(),
                    got: arg.meta_type().name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Invokes the method on `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - Object to call; must be an instance of the declaring class
    /// * `connection` - Dispatch mode
    /// * `ret` - Optional destination for the return value
    /// * `args` - Arguments, matched against the declared parameters
    ///
    /// # Errors
    ///
    /// Any [`InvokeError`]; the call is never attempted when resolution,
    /// binding or the dead-lock guard fails.
    ///
    /// # Example
    ///
    /// See [`invoke_method`](crate::runtime::invoke_method) for invocation
    /// by name.
    pub fn invoke(
        &self,
        target: &Arc<dyn Reflect>,
        connection: ConnectionType,
        ret: Option<ReturnSlot<'_>>,
        args: &[Argument<'_>],
    ) -> Result<(), InvokeError> {
        invoke::invoke_bound(*self, target, connection, ret, args)
    }

    /// Runs a constructor.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::InvalidMethod`] if this is not a constructor.
    /// - The not-found family if `args` do not fit.
    /// - [`InvokeError::ConstructionFailed`] if no instance was produced.
    pub fn new_instance(&self, args: &[Argument<'_>]) -> Result<Arc<dyn Reflect>, InvokeError> {
        let mut out = None;
        self.invoke_constructor(None, Some(&mut out), args)?;
        out.ok_or_else(|| InvokeError::ConstructionFailed {
            signature: self.signature().to_string(),
        })
    }

    /// Runs a constructor with explicit target and destination, reporting
    /// misuse.
    ///
    /// # Errors
    ///
    /// - [`InvokeError::ConstructorOnInstance`] if `target` is given.
    /// - [`InvokeError::NoConstructorDestination`] if `out` is `None`.
    /// - [`InvokeError::ConstructionFailed`] if the dispatch function
    ///   rejected it or produced no instance.
    pub fn invoke_constructor(
        &self,
        target: Option<&dyn Reflect>,
        out: Option<&mut Option<Arc<dyn Reflect>>>,
        args: &[Argument<'_>],
    ) -> Result<(), InvokeError> {
        invoke::construct_bound(*self, target, out, args)
    }
}

impl PartialEq for MetaMethod {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.class, other.class)
            && self.local == other.local
            && self.constructor == other.constructor
    }
}

impl Eq for MetaMethod {}

impl fmt::Debug for MetaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMethod")
            .field("class", &self.class.class_name())
            .field("signature", &self.signature())
            .field("kind", &self.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builder::{MetaObjectBuilder, MethodSpec};

    fn table() -> &'static MetaObject {
        static TABLE: std::sync::OnceLock<&'static MetaObject> = std::sync::OnceLock::new();
        TABLE.get_or_init(|| {
            MetaObjectBuilder::new("method::Table")
                .method(
                    MethodSpec::method("resize(u32, u32)")
                        .returns::<bool>()
                        .parameter_names(["width", "height"])
                        .tag("geometry")
                        .revision(2),
                )
                .method(MethodSpec::signal("resized()").access(Access::Protected))
                .method(MethodSpec::method("attach(LaterType)"))
                .build()
                .unwrap()
        })
    }

    #[test]
    fn test_method_metadata() {
        let m = table().method_by_signature("resize(u32,u32)").unwrap();
        assert_eq!(m.name(), "resize");
        assert_eq!(m.tag(), "geometry");
        assert_eq!(m.parameter_count(), 2);
        assert_eq!(m.parameter_names(), ["width", "height"]);
        assert_eq!(m.parameter_type(1), MetaType::of::<u32>());
        assert_eq!(m.return_type(), MetaType::of::<bool>());
        assert_eq!(m.revision(), 2);
        assert!(m.flags().contains(MethodFlags::REVISIONED));
        assert!(!m.returns_void());
    }

    #[test]
    fn test_signal_metadata() {
        let s = table().method(1).unwrap();
        assert_eq!(s.kind(), MethodKind::Signal);
        assert_eq!(s.access(), Access::Protected);
        assert!(s.returns_void());
        assert_eq!(s.return_type_name(), "void");
        assert!(s.parameter_names().is_empty());
    }

    #[test]
    fn test_unresolved_parameter_keeps_name() {
        let m = table().method(2).unwrap();
        assert_eq!(m.parameter_type_name(0), "LaterType");
        assert!(!m.parameter_type(0).is_valid());
        assert_eq!(m.parameter_type_name(5), "");
    }

    #[test]
    fn test_check_arguments() {
        let m = table().method(0).unwrap();
        let (w, h, bad) = (1u32, 2u32, 3i64);
        assert!(m.check_arguments(&[Argument::new(&w), Argument::new(&h)]).is_ok());

        let err = m.check_arguments(&[Argument::new(&w)]).unwrap_err();
        assert!(matches!(err, InvokeError::ArgumentCountMismatch { expected: 2, got: 1, .. }));

        let err = m
            .check_arguments(&[Argument::new(&w), Argument::new(&bad)])
            .unwrap_err();
        assert!(matches!(err, InvokeError::FormalParameterMismatch { index: 2, .. }));
    }
}
