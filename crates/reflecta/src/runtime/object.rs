//! Reflectable objects.
//!
//! An object takes part in dynamic invocation by implementing [`Reflect`]:
//! it names its class table and embeds an [`ObjectBase`] carrying its
//! identity and thread affinity.
//!
//! Objects are shared as `Arc<dyn Reflect>` and mutate through interior
//! mutability, since a direct call may arrive from any thread and a queued
//! call holds only a `Weak` reference to its target.
//!
//! # Thread Affinity
//!
//! An object belongs to the thread that created it and to that thread's
//! current [`EventLoop`](crate::runtime::EventLoop), if any. Queued calls
//! are posted to that loop; [`ObjectBase::move_to_loop`] re-homes the
//! object to another loop and its thread.
//!
//! # Example
//!
//! ```rust
//! use std::any::Any;
//! use reflecta::runtime::{MetaObject, MetaObjectBuilder, ObjectBase, Reflect};
//!
//! struct Plain {
//!     base: ObjectBase,
//! }
//!
//! fn plain_meta() -> &'static MetaObject {
//!     static META: std::sync::OnceLock<&'static MetaObject> = std::sync::OnceLock::new();
//!     META.get_or_init(|| MetaObjectBuilder::new("object::Plain").build().unwrap())
//! }
//!
//! impl Reflect for Plain {
//!     fn meta_object(&self) -> &'static MetaObject {
//!         plain_meta()
//!     }
//!     fn object_base(&self) -> &ObjectBase {
//!         &self.base
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let plain = Plain { base: ObjectBase::new() };
//! assert_eq!(plain.meta_object().class_name(), "object::Plain");
//! ```

use crate::runtime::connection;
use crate::runtime::event_loop::{self, EventLoopHandle};
use crate::runtime::meta_object::{MetaCall, MetaObject};
use parking_lot::RwLock;
use reflecta_log::trace;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// Process-unique object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ObjectId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
struct Affinity {
    thread: ThreadId,
    event_loop: Option<EventLoopHandle>,
}

/// Identity and thread affinity shared by every reflectable object.
///
/// Dropping the base removes every connection in which the object is the
/// sender or the receiver.
pub struct ObjectBase {
    id: ObjectId,
    affinity: RwLock<Affinity>,
}

impl ObjectBase {
    /// Creates a base owned by the current thread and its current event loop.
    #[must_use]
    pub fn new() -> Self {
        ObjectBase {
            id: ObjectId::next(),
            affinity: RwLock::new(Affinity {
                thread: thread::current().id(),
                event_loop: event_loop::current_loop(),
            }),
        }
    }

    /// Object identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Thread the object lives in.
    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.affinity.read().thread
    }

    /// Event loop receiving the object's queued calls.
    #[must_use]
    pub fn event_loop(&self) -> Option<EventLoopHandle> {
        self.affinity.read().event_loop.clone()
    }

    /// Returns true if the calling thread is the object's thread.
    #[must_use]
    pub fn is_current_thread(&self) -> bool {
        self.thread() == thread::current().id()
    }

    /// Re-homes the object to `handle`'s loop and thread.
    pub fn move_to_loop(&self, handle: &EventLoopHandle) {
        let mut affinity = self.affinity.write();
        affinity.thread = handle.thread();
        affinity.event_loop = Some(handle.clone());
        trace!("object {} moved to event loop {}", self.id, handle.id());
    }
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        connection::disconnect_object(self.id);
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let affinity = self.affinity.read();
        f.debug_struct("ObjectBase")
            .field("id", &self.id)
            .field("thread", &affinity.thread)
            .field("event_loop", &affinity.event_loop.as_ref().map(EventLoopHandle::id))
            .finish()
    }
}

/// A reflectable object.
pub trait Reflect: Any + Send + Sync {
    /// The object's most derived class table.
    fn meta_object(&self) -> &'static MetaObject;

    /// The embedded identity and affinity.
    fn object_base(&self) -> &ObjectBase;

    /// Upcast for downcasting in dispatch functions.
    fn as_any(&self) -> &dyn Any;

    /// Virtual dispatch entry point, used instead of the per-class static
    /// function when the class table is flagged `DYNAMIC`.
    ///
    /// `index` is chain-global for method and property calls. The default
    /// implementation rejects every call.
    ///
    /// # Safety
    ///
    /// `argv` follows the invocation protocol: slot 0 holds the return
    /// value (or null), slots 1.. point to initialized arguments of the
    /// declared parameter types.
    unsafe fn meta_call(&self, call: MetaCall, index: usize, argv: &mut [*mut u8]) -> bool {
        let _ = (call, index, argv);
        false
    }
}

impl fmt::Debug for dyn Reflect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.meta_object().class_name(),
            self.object_base().id()
        )
    }
}
