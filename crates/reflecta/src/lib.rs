//! Reflecta: runtime reflection and type erasure for Rust
//!
//! Reflecta lets a program introspect and manipulate values, object classes
//! and containers whose concrete types are not known at the call site. It
//! provides:
//!
//! - **Type Descriptors** with lifecycle, comparison and streaming hooks
//! - **Class Reflection Tables** with methods, properties, enumerators,
//!   class-info pairs and constructors chained to their superclass
//! - **Dynamic Invocation** by name, directly or through per-thread event
//!   loops, with blocking calls and a dead-lock guard
//! - **Container Descriptors** for iterating and editing opaque sequences
//!   and associations
//!
//! # Architecture
//!
//! All reflection data is built once, allocated in the metadata arena of
//! `reflecta-mem` and never mutated afterwards, so lookups need no locks.
//! The only synchronized state is the type/class registries and the
//! connection table.
//!
//! # Example
//!
//! ```rust
//! use reflecta::declare_metatype;
//! use reflecta::runtime::{MetaType, MetaValue};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! declare_metatype!(Point);
//!
//! let meta = MetaType::of::<Point>();
//! let a = MetaValue::new(Point { x: 1, y: 2 });
//! let b = a.try_clone().unwrap();
//! assert!(meta.is_equality_comparable());
//! assert_eq!(a, b);
//! ```

pub mod error;
pub mod runtime;

// Re-export commonly used types
pub use error::{Error, InvokeError, Result};
pub use runtime::{
    Argument, ConnectionType, MetaMethod, MetaObject, MetaObjectBuilder, MetaProperty, MetaType,
    MetaTypeOf, MetaValue, ObjectBase, Reflect, ReturnSlot,
};

/// Highest class-table revision this crate builds and reads.
///
/// Revision 2 adds method revisions and parameter names, revision 3 adds
/// unresolved notify-signal names.
pub const CURRENT_REVISION: u32 = 3;

/// Maximum number of parameters a reflected method may declare.
pub const MAX_INVOKE_ARGS: usize = 16;
