//! Container descriptors.
//!
//! A container descriptor lets generic code iterate, read, insert and
//! remove elements of a container it only knows as a pointer plus a
//! descriptor. There are two kinds:
//!
//! - [`SequenceDescriptor`]: ordered values (`Vec`, `VecDeque`,
//!   `LinkedList`) and value sets iterated in some order (`BTreeSet`,
//!   `HashSet`).
//! - [`AssociationDescriptor`]: keyed containers (`BTreeMap`, `HashMap`)
//!   and sets seen as key-only associations.
//!
//! # Capabilities
//!
//! Descriptors are built per concrete container from the capability traits
//! in [`ops`] (`PushBack`, `PopFront`, `IndexedAccess`, ...). The typed
//! builders only offer a capability when the container implements its
//! trait, so an unsupported operation is a `None` slot in the table, never
//! a runtime branch. Capability checks (`can_*`, `has_*`) is a flag test or an
//! `Option` check. Calling an unsupported operation is a silent no-op that
//! returns `0`, `false` or `None`.
//!
//! # Iterators
//!
//! `begin`/`end` hand out caller-owned iterators released on drop (or
//! explicitly through `destroy_iterator`). Mutable and const iterators are
//! distinct types. Every outstanding iterator is invalid after any write to
//! its container.
//!
//! # Example
//!
//! ```
//! use reflecta::runtime::{MetaType, Position};
//!
//! let mut numbers = vec![1i32, 2, 3];
//! let seq = MetaType::of::<Vec<i32>>().sequence().unwrap();
//! let c = (&mut numbers as *mut Vec<i32>).cast::<u8>();
//!
//! unsafe {
//!     assert_eq!(seq.size(c), 3);
//!     let four = 4i32;
//!     assert!(seq.add_value(c, (&four as *const i32).cast(), Position::Unspecified));
//! }
//! assert_eq!(numbers, [1, 2, 3, 4]);
//! ```

mod association;
mod iterable;
mod iterator;
pub mod ops;
mod sequence;
mod std_impls;

pub use association::AssociationDescriptor;
pub use iterable::{AssociationIterable, SequenceIterable};
pub use iterator::{
    AssociationIterator, ConstAssociationIterator, ConstSequenceIterator, IteratorFns,
    SequenceIterator,
};
pub use sequence::{SequenceDescriptor, SequenceDescriptorBuilder};

use bitflags::bitflags;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::TypeId;

/// Side of a container an add or remove applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Position {
    /// Front of the container.
    AtBegin,
    /// Back of the container.
    AtEnd,
    /// Wherever the container prefers.
    #[default]
    Unspecified,
}

bitflags! {
    /// Iterator category. Each category includes the weaker ones.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IteratorCapabilities: u8 {
        /// Single pass reading.
        const INPUT = 0b0001;
        /// Multi pass, forward only.
        const FORWARD = 0b0011;
        /// Forward and backward.
        const BIDIRECTIONAL = 0b0111;
        /// Constant-time jumps and distances.
        const RANDOM_ACCESS = 0b1111;
    }
}

bitflags! {
    /// Add and remove capabilities of a sequence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AddRemoveCapabilities: u8 {
        /// Values can be added at the front.
        const CAN_ADD_AT_BEGIN = 1 << 0;
        /// Values can be removed from the front.
        const CAN_REMOVE_AT_BEGIN = 1 << 1;
        /// Values can be added at the back.
        const CAN_ADD_AT_END = 1 << 2;
        /// Values can be removed from the back.
        const CAN_REMOVE_AT_END = 1 << 3;
        /// Values can be added at an unspecified location.
        const CAN_ADD = 1 << 4;
    }
}

/// Containers that carry a sequence descriptor.
pub trait SequenceSupport {
    /// Returns the singleton sequence descriptor.
    fn sequence_descriptor() -> &'static SequenceDescriptor;
}

/// Containers that carry an association descriptor.
pub trait AssociationSupport {
    /// Returns the singleton association descriptor.
    fn association_descriptor() -> &'static AssociationDescriptor;
}

type Cache<D> = RwLock<FxHashMap<TypeId, &'static D>>;

fn intern<C: 'static, D: Sync + 'static>(
    cache: &'static Cache<D>,
    build: impl FnOnce() -> &'static D,
) -> &'static D {
    let key = TypeId::of::<C>();
    if let Some(&descriptor) = cache.read().get(&key) {
        return descriptor;
    }
    let built = build();
    *cache.write().entry(key).or_insert(built)
}

/// Returns the unique sequence descriptor of `C`, building it on first use.
pub fn intern_sequence<C: 'static>(
    build: impl FnOnce() -> &'static SequenceDescriptor,
) -> &'static SequenceDescriptor {
    static CACHE: std::sync::OnceLock<Cache<SequenceDescriptor>> = std::sync::OnceLock::new();
    intern::<C, _>(CACHE.get_or_init(Default::default), build)
}

/// Returns the unique association descriptor of `C`, building it on first use.
pub fn intern_association<C: 'static>(
    build: impl FnOnce() -> &'static AssociationDescriptor,
) -> &'static AssociationDescriptor {
    static CACHE: std::sync::OnceLock<Cache<AssociationDescriptor>> = std::sync::OnceLock::new();
    intern::<C, _>(CACHE.get_or_init(Default::default), build)
}
