//! Type-erased container iterators.
//!
//! Every iterator is a heap cursor (container pointer plus iteration
//! position) driven through an [`IteratorFns`] table. The table groups the
//! creator with its companions (destroy, copy, compare, advance, diff), so
//! a descriptor that can create an iterator can always release, copy,
//! compare, move and measure it.

use super::IteratorCapabilities;
use super::ops::{AssociativeContainer, Container};
use std::fmt;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    pub(crate) container: *mut u8,
    pub(crate) pos: usize,
}

fn boxed(cursor: Cursor) -> *mut u8 {
    Box::into_raw(Box::new(cursor)).cast()
}

/// Operation table of one iterator family.
#[derive(Clone, Copy)]
pub struct IteratorFns {
    capabilities: IteratorCapabilities,
    begin: unsafe fn(*mut u8) -> *mut u8,
    end: unsafe fn(*mut u8) -> *mut u8,
    destroy: unsafe fn(*mut u8),
    copy: unsafe fn(*const u8) -> *mut u8,
    compare: unsafe fn(*const u8, *const u8) -> bool,
    advance: unsafe fn(*mut u8, isize),
    diff: unsafe fn(*const u8, *const u8) -> isize,
}

impl IteratorFns {
    fn with_end(capabilities: IteratorCapabilities, end: unsafe fn(*mut u8) -> *mut u8) -> Self {
        IteratorFns {
            capabilities,
            begin: begin_thunk,
            end,
            destroy: destroy_thunk,
            copy: copy_thunk,
            compare: compare_thunk,
            advance: advance_thunk,
            diff: diff_thunk,
        }
    }

    pub(crate) fn for_sequence<C: Container>() -> Self {
        Self::with_end(C::ITERATOR, sequence_end_thunk::<C>)
    }

    pub(crate) fn for_association<C: AssociativeContainer>() -> Self {
        Self::with_end(C::ITERATOR, association_end_thunk::<C>)
    }

    /// Iterator category.
    #[must_use]
    pub fn capabilities(&self) -> IteratorCapabilities {
        self.capabilities
    }

    pub(crate) unsafe fn begin(&'static self, container: *mut u8) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { (self.begin)(container) }
    }

    pub(crate) unsafe fn end(&'static self, container: *mut u8) -> *mut u8 {
        // SAFETY: forwarded caller contract.
        unsafe { (self.end)(container) }
    }
}

impl fmt::Debug for IteratorFns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IteratorFns")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

unsafe fn begin_thunk(container: *mut u8) -> *mut u8 {
    boxed(Cursor { container, pos: 0 })
}

unsafe fn sequence_end_thunk<C: Container>(container: *mut u8) -> *mut u8 {
    // SAFETY: container points to a C.
    let pos = unsafe { (*container.cast::<C>()).item_count() };
    boxed(Cursor { container, pos })
}

unsafe fn association_end_thunk<C: AssociativeContainer>(container: *mut u8) -> *mut u8 {
    // SAFETY: container points to a C.
    let pos = unsafe { (*container.cast::<C>()).entry_count() };
    boxed(Cursor { container, pos })
}

unsafe fn destroy_thunk(it: *mut u8) {
    // SAFETY: it came from `boxed`.
    drop(unsafe { Box::from_raw(it.cast::<Cursor>()) });
}

unsafe fn copy_thunk(it: *const u8) -> *mut u8 {
    // SAFETY: it points to a live Cursor.
    boxed(unsafe { *it.cast::<Cursor>() })
}

unsafe fn compare_thunk(a: *const u8, b: *const u8) -> bool {
    // SAFETY: both point to live Cursors.
    let (a, b) = unsafe { (&*a.cast::<Cursor>(), &*b.cast::<Cursor>()) };
    a.container == b.container && a.pos == b.pos
}

unsafe fn advance_thunk(it: *mut u8, step: isize) {
    // SAFETY: it points to a live Cursor.
    let cursor = unsafe { &mut *it.cast::<Cursor>() };
    cursor.pos = cursor.pos.saturating_add_signed(step);
}

unsafe fn diff_thunk(a: *const u8, b: *const u8) -> isize {
    // SAFETY: both point to live Cursors.
    let (a, b) = unsafe { (&*a.cast::<Cursor>(), &*b.cast::<Cursor>()) };
    a.pos as isize - b.pos as isize
}

macro_rules! iterator_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name {
            raw: NonNull<u8>,
            fns: &'static IteratorFns,
        }

        impl $name {
            pub(crate) fn from_raw(raw: *mut u8, fns: &'static IteratorFns) -> Option<Self> {
                NonNull::new(raw).map(|raw| $name { raw, fns })
            }

            pub(crate) fn cursor(&self) -> Cursor {
                // SAFETY: every IteratorFns creates Cursor values.
                unsafe { *self.raw.as_ptr().cast::<Cursor>() }
            }

            /// Iterator category.
            #[must_use]
            pub fn capabilities(&self) -> IteratorCapabilities {
                self.fns.capabilities
            }

            /// Moves the iterator by `step` positions.
            ///
            /// Moving backwards needs a bidirectional iterator; otherwise
            /// nothing happens and false is returned.
            pub fn advance(&mut self, step: isize) -> bool {
                if step < 0 && !self.fns.capabilities.contains(IteratorCapabilities::BIDIRECTIONAL) {
                    return false;
                }
                // SAFETY: raw is a live cursor of this family.
                unsafe { (self.fns.advance)(self.raw.as_ptr(), step) };
                true
            }

            /// Number of positions from `other` to `self`.
            #[must_use]
            pub fn diff(&self, other: &Self) -> isize {
                // SAFETY: both are live cursors of this family.
                unsafe { (self.fns.diff)(self.raw.as_ptr(), other.raw.as_ptr()) }
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                // SAFETY: raw is a live cursor; copy returns a fresh one.
                let raw = unsafe { (self.fns.copy)(self.raw.as_ptr()) };
                $name {
                    // Box allocations are never null.
                    raw: NonNull::new(raw).unwrap_or(self.raw),
                    fns: self.fns,
                }
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                // SAFETY: both are live cursors of this family.
                unsafe { (self.fns.compare)(self.raw.as_ptr(), other.raw.as_ptr()) }
            }
        }

        impl Eq for $name {}

        impl Drop for $name {
            fn drop(&mut self) {
                // SAFETY: raw is owned by this handle and released once.
                unsafe { (self.fns.destroy)(self.raw.as_ptr()) };
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("pos", &self.cursor().pos)
                    .finish()
            }
        }
    };
}

iterator_handle! {
    /// Mutable iterator over a sequence.
    SequenceIterator
}

iterator_handle! {
    /// Const iterator over a sequence.
    ConstSequenceIterator
}

iterator_handle! {
    /// Mutable iterator over an association.
    AssociationIterator
}

iterator_handle! {
    /// Const iterator over an association.
    ConstAssociationIterator
}
