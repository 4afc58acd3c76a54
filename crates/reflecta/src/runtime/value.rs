//! Owned, type-erased values.
//!
//! A [`MetaValue`] owns one heap value together with its [`MetaType`]. It
//! is the currency of queued invocations (arguments are deep-copied into
//! `MetaValue`s before crossing threads), property access, and the typed
//! container front-ends.
//!
//! # Example
//!
//! ```
//! use reflecta::runtime::{MetaType, MetaValue};
//!
//! let value = MetaValue::new(String::from("hello"));
//! assert_eq!(value.meta_type(), MetaType::of::<String>());
//! assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
//!
//! let copy = value.try_clone().unwrap();
//! assert_eq!(copy, value);
//! ```

use crate::runtime::container::{AssociationIterable, SequenceIterable};
use crate::runtime::meta_type::{Comparison, MetaType, MetaTypeOf};
use reflecta_log::warn;
use std::cmp::Ordering;
use std::fmt;
use std::ptr::NonNull;

/// An owned value of any registered type.
///
/// The empty value (`MetaValue::default()`) has an invalid type and no
/// storage.
pub struct MetaValue {
    meta: MetaType,
    data: Option<NonNull<u8>>,
}

// SAFETY: every descriptor is created for a `Send` type (see
// `TypeDescriptor::builder` and `MetaTypeOf`), and a MetaValue exclusively
// owns its storage.
unsafe impl Send for MetaValue {}

impl MetaValue {
    /// Moves `value` into a new `MetaValue`.
    #[must_use]
    pub fn new<T: MetaTypeOf>(value: T) -> Self {
        let meta = MetaType::of::<T>();
        let boxed = Box::new(value);
        MetaValue {
            meta,
            data: Some(NonNull::from(Box::leak(boxed)).cast()),
        }
    }

    /// Default-constructs a value of `meta`.
    ///
    /// Returns `None` for invalid handles and types that cannot be
    /// default-constructed.
    #[must_use]
    pub fn default_of(meta: MetaType) -> Option<Self> {
        if !meta.is_default_constructible() {
            return None;
        }
        // SAFETY: no copy source; the result is owned by the new MetaValue.
        let ptr = unsafe { meta.create(None) };
        NonNull::new(ptr).map(|data| MetaValue {
            meta,
            data: Some(data),
        })
    }

    /// Copies the value at `src` into a new `MetaValue`.
    ///
    /// Returns `None` if the type cannot be copied.
    ///
    /// # Safety
    ///
    /// `src` must point to an initialized value of type `meta`.
    #[must_use]
    pub unsafe fn from_raw(meta: MetaType, src: *const u8) -> Option<Self> {
        if !meta.is_copy_constructible() || src.is_null() {
            return None;
        }
        // SAFETY: forwarded caller contract.
        let ptr = unsafe { meta.create(Some(src)) };
        NonNull::new(ptr).map(|data| MetaValue {
            meta,
            data: Some(data),
        })
    }

    /// Type of the held value; invalid for the empty value.
    #[must_use]
    pub fn meta_type(&self) -> MetaType {
        self.meta
    }

    /// Returns true if a value is held.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    /// Pointer to the held value; null for the empty value.
    #[must_use]
    pub fn data(&self) -> *const u8 {
        self.data.map_or(std::ptr::null(), |p| p.as_ptr().cast_const())
    }

    /// Mutable pointer to the held value; null for the empty value.
    #[must_use]
    pub fn data_mut(&mut self) -> *mut u8 {
        self.data.map_or(std::ptr::null_mut(), NonNull::as_ptr)
    }

    /// Returns true if the held value is a `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.data.is_some() && self.meta.is::<T>()
    }

    /// Borrows the held value as `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: the type id matches, so data points to a live T.
        self.data.map(|p| unsafe { &*p.as_ptr().cast::<T>() })
    }

    /// Mutably borrows the held value as `T`.
    #[must_use]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.is::<T>() {
            return None;
        }
        // SAFETY: the type id matches and self is borrowed mutably.
        self.data.map(|p| unsafe { &mut *p.as_ptr().cast::<T>() })
    }

    /// Takes the held value out as `T`, or gives `self` back.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value is not a `T`.
    pub fn into_inner<T: 'static>(mut self) -> Result<T, Self> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.data.take() {
            // SAFETY: the storage was allocated for a T (by Box::new or by
            // `create` with T's layout), and ownership moves into the Box.
            Some(p) => Ok(*unsafe { Box::from_raw(p.as_ptr().cast::<T>()) }),
            None => Err(self),
        }
    }

    /// Copies the value through its type's copy constructor.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        match self.data {
            // SAFETY: data holds a value of self.meta.
            Some(p) => unsafe { Self::from_raw(self.meta, p.as_ptr()) },
            None => Some(MetaValue::default()),
        }
    }

    /// Three-way comparison; `Unordered` across types or without an ordering.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Comparison {
        match (self.data, other.data) {
            (Some(a), Some(b)) if self.meta == other.meta => {
                // SAFETY: both hold values of the same type.
                unsafe { self.meta.compare(a.as_ptr(), b.as_ptr()) }
            }
            _ => Comparison::Unordered,
        }
    }

    /// Typed view of a sequence value.
    #[must_use]
    pub fn as_sequence(&mut self) -> Option<SequenceIterable<'_>> {
        let descriptor = self.meta.sequence()?;
        let data = self.data?;
        // SAFETY: data holds a container of the type the descriptor describes,
        // and the view borrows self mutably.
        Some(unsafe { SequenceIterable::from_raw(data.as_ptr(), descriptor) })
    }

    /// Typed view of an association value.
    #[must_use]
    pub fn as_association(&mut self) -> Option<AssociationIterable<'_>> {
        let descriptor = self.meta.association()?;
        let data = self.data?;
        // SAFETY: as in `as_sequence`.
        Some(unsafe { AssociationIterable::from_raw(data.as_ptr(), descriptor) })
    }
}

impl Default for MetaValue {
    fn default() -> Self {
        MetaValue {
            meta: MetaType::invalid(),
            data: None,
        }
    }
}

impl Drop for MetaValue {
    fn drop(&mut self) {
        if let Some(p) = self.data.take() {
            // SAFETY: the storage was made for self.meta (Box::new uses the
            // same Layout as `create`) and is not used again.
            unsafe { self.meta.destroy(p.as_ptr()) };
        }
    }
}

impl Clone for MetaValue {
    /// Copies the held value. A type without a copy constructor clones to
    /// the empty value and logs a warning; use [`MetaValue::try_clone`] to
    /// detect that case.
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|| {
            warn!("MetaValue of type `{}` cannot be copied", self.meta.name());
            MetaValue::default()
        })
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.data, other.data) {
            (None, None) => true,
            (Some(a), Some(b)) if self.meta == other.meta => {
                // SAFETY: both hold values of the same type.
                unsafe { self.meta.equals(a.as_ptr(), b.as_ptr()) }
            }
            _ => false,
        }
    }
}

impl PartialOrd for MetaValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            Comparison::Less => Some(Ordering::Less),
            Comparison::Equivalent => Some(Ordering::Equal),
            Comparison::Greater => Some(Ordering::Greater),
            Comparison::Unordered => None,
        }
    }
}

impl fmt::Debug for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(p) = self.data else {
            return f.write_str("MetaValue(<empty>)");
        };
        let mut body = String::new();
        // SAFETY: p holds a value of self.meta.
        if unsafe { self.meta.debug_stream(p.as_ptr(), &mut body) } {
            write!(f, "MetaValue({}: {body})", self.meta.name())
        } else {
            write!(f, "MetaValue({})", self.meta.name())
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for MetaValue {
                fn from(value: $ty) -> Self {
                    MetaValue::new(value)
                }
            }
        )*
    };
}

impl_from!(bool, char, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64, String);

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::new(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    static LIVE: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, PartialEq)]
    struct Tracked(u32);

    impl Tracked {
        fn new(v: u32) -> Self {
            LIVE.fetch_add(1, AtomicOrdering::SeqCst);
            Tracked(v)
        }
    }

    impl Clone for Tracked {
        fn clone(&self) -> Self {
            Tracked::new(self.0)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            LIVE.fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }

    crate::declare_metatype!(Tracked);

    struct NoCopy;
    crate::declare_metatype!(NoCopy);

    #[test]
    fn test_new_and_downcast() {
        let mut value = MetaValue::new(5i32);
        assert!(value.is::<i32>());
        assert!(!value.is::<u32>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&5));
        *value.downcast_mut::<i32>().unwrap() = 6;
        assert_eq!(value.into_inner::<i32>().ok(), Some(6));
    }

    #[test]
    fn test_into_inner_wrong_type_returns_self() {
        let value = MetaValue::from("x");
        let back = value.into_inner::<i32>().unwrap_err();
        assert!(back.is::<String>());
    }

    #[test]
    fn test_clone_and_drop_balance() {
        let before = LIVE.load(AtomicOrdering::SeqCst);
        {
            let a = MetaValue::new(Tracked::new(1));
            let b = a.try_clone().unwrap();
            assert_eq!(a, b);
            assert_eq!(LIVE.load(AtomicOrdering::SeqCst), before + 2);
        }
        assert_eq!(LIVE.load(AtomicOrdering::SeqCst), before);
    }

    #[test]
    fn test_default_of() {
        let value = MetaValue::default_of(MetaType::of::<String>()).unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::len), Some(0));
        assert!(MetaValue::default_of(MetaType::of::<NoCopy>()).is_none());
        assert!(MetaValue::default_of(MetaType::invalid()).is_none());
    }

    #[test]
    fn test_uncopyable_clone_is_empty() {
        let value = MetaValue::new(NoCopy);
        assert!(value.try_clone().is_none());
        assert!(!value.clone().is_valid());
    }

    #[test]
    fn test_ordering_and_debug() {
        let a = MetaValue::new(1.5f64);
        let b = MetaValue::new(2.5f64);
        assert!(a < b);
        assert_eq!(a.partial_cmp(&MetaValue::new(1i32)), None);
        assert_eq!(format!("{a:?}"), "MetaValue(f64: 1.5)");
        assert_eq!(format!("{:?}", MetaValue::default()), "MetaValue(<empty>)");
    }
}
