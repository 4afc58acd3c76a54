//! Reflecta runtime module.
//!
//! This module provides the reflection substrate:
//!
//! - Type descriptors and the process-wide type registry
//! - Container descriptors for opaque sequences and associations
//! - Class reflection tables with methods, properties, enumerators and
//!   class-info pairs
//! - Dynamic invocation (direct, queued and blocking) through event loops
//! - Signal/slot connections
//!
//! # Architecture
//!
//! - [`meta_type`]: `TypeDescriptor` and the `MetaType` handle
//! - [`registry`]: id and name lookup, aliases
//! - [`container`]: sequence and association descriptors, iterators
//! - [`meta_object`]: class tables and the per-class dispatch entry point
//! - [`builder`]: building class tables
//! - [`method`], [`property`], [`enumerator`]: member handles
//! - [`invoke`]: overload resolution and dispatch
//! - [`invocation`]: packaged calls and the blocking-call semaphore
//! - [`event_loop`]: per-thread FIFO event loops
//! - [`connection`]: signal/slot connections
//! - [`introspection`]: class registry and hierarchy queries
//!
//! # Example
//!
//! ```rust
//! use reflecta::runtime::{MetaType, MetaValue};
//!
//! let meta = MetaType::from_name("String");
//! let value = MetaValue::default_of(meta).unwrap();
//! assert_eq!(value.downcast_ref::<String>().map(String::len), Some(0));
//! ```

pub mod args;
pub mod builder;
pub mod builtin;
pub mod connection;
pub mod container;
#[doc(hidden)]
pub mod detect;
pub mod enumerator;
pub mod event_loop;
pub mod introspection;
pub mod invocation;
pub mod invoke;
pub mod meta_object;
pub mod meta_type;
pub mod method;
pub mod object;
pub mod property;
pub mod registry;
pub mod signature;
pub mod value;

pub use args::{Argument, ReturnSlot};
pub use builder::{EnumSpec, MetaObjectBuilder, MethodSpec, PropertySpec};
pub use connection::{ConnectionId, activate, connect, disconnect, emit, receivers};
pub use container::{
    AssociationDescriptor, AssociationIterable, IteratorCapabilities, Position,
    SequenceDescriptor, SequenceIterable,
};
pub use enumerator::{MetaClassInfo, MetaEnum};
pub use event_loop::{EventLoop, EventLoopHandle, current_loop};
pub use invocation::{Invocation, Semaphore};
pub use invoke::{ConnectionType, invoke_method};
pub use meta_object::{MetaCall, MetaObject, MetaObjectFlags, StaticMetacallFn};
pub use meta_type::{
    Comparison, MetaType, MetaTypeOf, TypeDescriptor, TypeDescriptorBuilder, TypeFlags, TypeOps,
};
pub use method::{Access, MetaMethod, MethodFlags, MethodKind};
pub use object::{ObjectBase, ObjectId, Reflect};
pub use property::{MetaProperty, PropertyFlags};
pub use registry::{intern_type, register_alias, registered_types};
pub use signature::{ParsedSignature, normalized_signature, normalized_type, parse_signature};
pub use value::MetaValue;
