//! Type-tagged argument passing.
//!
//! Callers hand arguments to dynamic invocation as [`Argument`]s (a
//! borrowed pointer plus its type) and receive return values through a
//! [`ReturnSlot`]. Dispatch functions see the same data as a raw `argv`
//! array and use the `arg`/`set_return` helpers to read and write it.
//!
//! # Layout of `argv`
//!
//! - `argv[0]`: return slot. Points to an *initialized* value of the
//!   return type which the callee replaces, or is null when the caller
//!   discards the result. For `CreateInstance` it points to an
//!   `Option<Arc<dyn Reflect>>`.
//! - `argv[1..]`: one pointer per declared parameter, in order.

use crate::runtime::meta_type::{MetaType, MetaTypeOf};
use crate::runtime::object::Reflect;
use crate::runtime::value::MetaValue;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A borrowed, type-tagged argument.
#[derive(Clone, Copy)]
pub struct Argument<'a> {
    meta: MetaType,
    data: *const u8,
    _marker: PhantomData<&'a ()>,
}

impl<'a> Argument<'a> {
    /// Borrows `value` as an argument.
    #[must_use]
    pub fn new<T: MetaTypeOf>(value: &'a T) -> Self {
        Argument {
            meta: T::meta_type(),
            data: (value as *const T).cast(),
            _marker: PhantomData,
        }
    }

    /// Borrows the content of `value`.
    #[must_use]
    pub fn from_value(value: &'a MetaValue) -> Self {
        Argument {
            meta: value.meta_type(),
            data: value.data(),
            _marker: PhantomData,
        }
    }

    /// Builds an argument from a raw pointer.
    ///
    /// # Safety
    ///
    /// `data` must point to an initialized value of type `meta` that
    /// outlives `'a`.
    #[must_use]
    pub unsafe fn from_raw(meta: MetaType, data: *const u8) -> Self {
        Argument {
            meta,
            data,
            _marker: PhantomData,
        }
    }

    /// Argument type.
    #[must_use]
    pub fn meta_type(&self) -> MetaType {
        self.meta
    }

    /// Pointer to the argument value.
    #[must_use]
    pub fn data(&self) -> *const u8 {
        self.data
    }

    /// Deep-copies the argument into an owned value.
    ///
    /// Returns `None` if the type cannot be copied.
    #[must_use]
    pub fn to_value(&self) -> Option<MetaValue> {
        // SAFETY: `data` points to a live value of `meta` for 'a.
        unsafe { MetaValue::from_raw(self.meta, self.data) }
    }
}

impl fmt::Debug for Argument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        // SAFETY: `data` points to a live value of `meta`.
        if unsafe { self.meta.debug_stream(self.data, &mut text) } {
            write!(f, "{}({text})", self.meta.name())
        } else {
            write!(f, "{}(..)", self.meta.name())
        }
    }
}

/// Destination for a return value.
///
/// The slot must hold an initialized value; a successful call replaces it.
pub struct ReturnSlot<'a> {
    meta: MetaType,
    data: *mut u8,
    _marker: PhantomData<&'a mut ()>,
}

impl<'a> ReturnSlot<'a> {
    /// Borrows `value` as the return destination.
    #[must_use]
    pub fn new<T: MetaTypeOf>(value: &'a mut T) -> Self {
        ReturnSlot {
            meta: T::meta_type(),
            data: (value as *mut T).cast(),
            _marker: PhantomData,
        }
    }

    /// Uses the content of `value` as the return destination.
    #[must_use]
    pub fn from_value(value: &'a mut MetaValue) -> Self {
        ReturnSlot {
            meta: value.meta_type(),
            data: value.data_mut(),
            _marker: PhantomData,
        }
    }

    /// Destination type.
    #[must_use]
    pub fn meta_type(&self) -> MetaType {
        self.meta
    }

    /// Pointer to the destination.
    #[must_use]
    pub fn data(&self) -> *mut u8 {
        self.data
    }
}

impl fmt::Debug for ReturnSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnSlot")
            .field("type", &self.meta.name())
            .finish()
    }
}

// ============================================================================
// Dispatch-side helpers
// ============================================================================

/// Borrows parameter `index` (1-based) of `argv` as a `T`.
///
/// # Safety
///
/// `argv[index]` must point to an initialized `T` that outlives `'a`.
#[must_use]
pub unsafe fn arg<'a, T>(argv: &[*mut u8], index: usize) -> &'a T {
    // SAFETY: forwarded caller contract.
    unsafe { &*argv[index].cast::<T>() }
}

/// Writes `value` into the return slot of `argv`, if the caller asked for one.
///
/// # Safety
///
/// `argv[0]` must be null or point to an initialized `T`.
pub unsafe fn set_return<T>(argv: &[*mut u8], value: T) {
    if let Some(&slot) = argv.first() {
        if !slot.is_null() {
            // SAFETY: forwarded caller contract; the old value is dropped.
            unsafe { *slot.cast::<T>() = value };
        }
    }
}

/// Stores a newly constructed instance for a `CreateInstance` call.
///
/// # Safety
///
/// `argv[0]` must be null or point to an `Option<Arc<dyn Reflect>>`.
pub unsafe fn set_instance(argv: &[*mut u8], instance: Arc<dyn Reflect>) {
    // SAFETY: forwarded caller contract.
    unsafe { set_return::<Option<Arc<dyn Reflect>>>(argv, Some(instance)) }
}
