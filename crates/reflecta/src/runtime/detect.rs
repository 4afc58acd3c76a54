//! Compile-time capability detection for type descriptors.
//!
//! Rust has no specialization on stable, so the detectors use *autoref
//! specialization*: every capability is a pair of traits with the same
//! method name. The "present" trait is implemented for `&Detect<T>` under
//! the capability bound, the "absent" trait for `Detect<T>` unconditionally.
//! Calling the method on `&&Detect<T>` picks the first impl that applies, so
//! `(&&detect).copy_ctr()` yields `Some(thunk)` for `T: Clone` and `None`
//! otherwise.
//!
//! The trick only resolves for concrete types, which is why it lives behind
//! [`declare_metatype!`](crate::declare_metatype). Generic containers build
//! their descriptors from their element descriptors instead.

use crate::runtime::container::{
    AssociationDescriptor, AssociationSupport, SequenceDescriptor, SequenceSupport,
};
use crate::runtime::meta_type::{
    Comparison, CompareFn, CopyCtrFn, DebugStreamFn, DefaultCtrFn, EqualsFn,
};
use std::fmt;
use std::marker::PhantomData;

/// Zero-sized capability detector for `T`.
#[doc(hidden)]
pub struct Detect<T: ?Sized>(PhantomData<fn() -> *const T>);

impl<T: ?Sized> Detect<T> {
    /// Creates the detector.
    #[must_use]
    pub const fn new() -> Self {
        Detect(PhantomData)
    }
}

impl<T: ?Sized> Default for Detect<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Thunks
// ============================================================================

pub(crate) unsafe fn default_thunk<T: Default>(dst: *mut u8) {
    // SAFETY: dst is uninitialized storage for T.
    unsafe { dst.cast::<T>().write(T::default()) }
}

pub(crate) unsafe fn clone_thunk<T: Clone>(dst: *mut u8, src: *const u8) {
    // SAFETY: src holds a T, dst is uninitialized storage for T.
    unsafe { dst.cast::<T>().write((*src.cast::<T>()).clone()) }
}

unsafe fn bitwise_copy_thunk<T: Copy>(dst: *mut u8, src: *const u8) {
    // SAFETY: T is Copy, so a bitwise copy is a valid duplicate.
    unsafe { dst.cast::<T>().write(*src.cast::<T>()) }
}

pub(crate) unsafe fn eq_thunk<T: PartialEq>(lhs: *const u8, rhs: *const u8) -> bool {
    // SAFETY: both point to initialized T.
    unsafe { *lhs.cast::<T>() == *rhs.cast::<T>() }
}

pub(crate) unsafe fn cmp_thunk<T: PartialOrd>(lhs: *const u8, rhs: *const u8) -> Comparison {
    // SAFETY: both point to initialized T.
    unsafe { (*lhs.cast::<T>()).partial_cmp(&*rhs.cast::<T>()) }.into()
}

pub(crate) unsafe fn debug_thunk<T: fmt::Debug>(
    ptr: *const u8,
    out: &mut dyn fmt::Write,
) -> fmt::Result {
    // SAFETY: ptr points to an initialized T.
    write!(out, "{:?}", unsafe { &*ptr.cast::<T>() })
}

// ============================================================================
// Detectors
// ============================================================================

macro_rules! capability {
    (
        $(#[$doc:meta])*
        $present:ident / $absent:ident : $bound:path => fn $method:ident() -> $ret:ty { $value:expr }
    ) => {
        $(#[$doc])*
        #[doc(hidden)]
        pub trait $present {
            fn $method(&self) -> $ret;
        }

        impl<T: $bound> $present for &Detect<T> {
            #[inline]
            fn $method(&self) -> $ret {
                $value
            }
        }

        #[doc(hidden)]
        pub trait $absent {
            #[inline]
            fn $method(&self) -> $ret {
                None
            }
        }

        impl<T> $absent for Detect<T> {}
    };
}

capability! {
    /// `Default` -> default constructor.
    DetectDefault / NoDefault: Default => fn default_ctr() -> Option<DefaultCtrFn> {
        Some(default_thunk::<T> as DefaultCtrFn)
    }
}

capability! {
    /// `Clone` -> copy constructor.
    DetectClone / NoClone: Clone => fn copy_ctr() -> Option<CopyCtrFn> {
        Some(clone_thunk::<T> as CopyCtrFn)
    }
}

capability! {
    /// `Copy` -> bitwise copy constructor.
    DetectCopy / NoCopy: Copy => fn trivial_copy() -> Option<CopyCtrFn> {
        Some(bitwise_copy_thunk::<T> as CopyCtrFn)
    }
}

capability! {
    /// `PartialEq` -> equality.
    DetectEq / NoEq: PartialEq => fn equals() -> Option<EqualsFn> {
        Some(eq_thunk::<T> as EqualsFn)
    }
}

capability! {
    /// `PartialOrd` -> ordering.
    DetectOrd / NoOrd: PartialOrd => fn compare() -> Option<CompareFn> {
        Some(cmp_thunk::<T> as CompareFn)
    }
}

capability! {
    /// `Debug` -> debug formatter.
    DetectDebug / NoDebug: fmt::Debug => fn debug_stream() -> Option<DebugStreamFn> {
        Some(debug_thunk::<T> as DebugStreamFn)
    }
}

capability! {
    /// Sequence container support.
    DetectSequence / NoSequence: SequenceSupport => fn sequence() -> Option<&'static SequenceDescriptor> {
        Some(T::sequence_descriptor())
    }
}

capability! {
    /// Association container support.
    DetectAssociation / NoAssociation: AssociationSupport => fn association() -> Option<&'static AssociationDescriptor> {
        Some(T::association_descriptor())
    }
}

/// Builds a [`TypeDescriptorBuilder`](crate::runtime::TypeDescriptorBuilder)
/// for a concrete type.
#[doc(hidden)]
#[macro_export]
macro_rules! __detect_descriptor {
    ($ty:ty, $name:expr) => {{
        #[allow(unused_imports)]
        use $crate::runtime::detect::{
            NoAssociation as _, NoClone as _, NoCopy as _, NoDebug as _, NoDefault as _,
            NoEq as _, NoOrd as _, NoSequence as _, DetectAssociation as _, DetectClone as _,
            DetectCopy as _, DetectDebug as _, DetectDefault as _, DetectEq as _, DetectOrd as _,
            DetectSequence as _,
        };
        let detect = $crate::runtime::detect::Detect::<$ty>::new();
        $crate::runtime::TypeDescriptor::builder::<$ty>($name)
            .default_ctr((&&detect).default_ctr())
            .copy_ctr((&&detect).trivial_copy().or((&&detect).copy_ctr()))
            .equals((&&detect).equals())
            .compare((&&detect).compare())
            .debug_stream((&&detect).debug_stream())
            .sequence((&&detect).sequence())
            .association((&&detect).association())
    }};
}

/// Declares the process-wide type descriptor of a concrete type.
///
/// Checks the type for `Default`, `Clone`, `Copy`, `PartialEq`,
/// `PartialOrd`, `Debug` and container support, and implements
/// [`MetaTypeOf`](crate::runtime::MetaTypeOf).
///
/// # Example
///
/// ```
/// use reflecta::declare_metatype;
/// use reflecta::runtime::MetaType;
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// declare_metatype!(Point);
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Mode {
///     Fast,
///     Slow,
/// }
///
/// declare_metatype!(Mode as "render::Mode", enum);
///
/// let meta = MetaType::of::<Point>();
/// assert_eq!(meta.name(), "Point");
/// assert!(meta.is_equality_comparable());
/// assert!(!meta.is_ordered());
/// assert_eq!(MetaType::of::<Mode>().name(), "render::Mode");
/// ```
#[macro_export]
macro_rules! declare_metatype {
    (@impl $ty:ty, $name:expr, $flags:expr) => {
        impl $crate::runtime::MetaTypeOf for $ty {
            fn descriptor() -> &'static $crate::runtime::TypeDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<&'static $crate::runtime::TypeDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    $crate::runtime::registry::intern_type::<$ty>(|| {
                        $crate::__detect_descriptor!($ty, $name).flags($flags).build()
                    })
                })
            }
        }
    };
    ($ty:ty as $name:literal, enum) => {
        $crate::declare_metatype!(@impl $ty, $name, $crate::runtime::TypeFlags::IS_ENUMERATION);
    };
    ($ty:ty as $name:literal) => {
        $crate::declare_metatype!(@impl $ty, $name, $crate::runtime::TypeFlags::empty());
    };
    ($ty:ty, enum) => {
        $crate::declare_metatype!(@impl $ty, stringify!($ty), $crate::runtime::TypeFlags::IS_ENUMERATION);
    };
    ($ty:ty) => {
        $crate::declare_metatype!(@impl $ty, stringify!($ty), $crate::runtime::TypeFlags::empty());
    };
}
