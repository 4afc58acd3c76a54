// Common test utilities for integration tests
//
// This module provides shared fixtures: reflectable classes with their
// dispatch functions, an instrumented value type and event loop threads.

#![allow(dead_code)]

use parking_lot::Mutex;
use reflecta::declare_metatype;
use reflecta::runtime::args::{arg, set_instance, set_return};
use reflecta::runtime::{
    self, Argument, EnumSpec, EventLoop, EventLoopHandle, MetaCall, MetaObject,
    MetaObjectBuilder, MethodSpec, ObjectBase, PropertySpec, Reflect,
};
use std::any::Any;
use std::sync::atomic::{AtomicI32, AtomicIsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

// ============================================================================
// Value types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

declare_metatype!(Point);

/// Live instances of [`Tracked`].
pub static TRACKED_LIVE: AtomicIsize = AtomicIsize::new(0);

/// Serializes tests that read [`TRACKED_LIVE`].
pub static TRACKED_LOCK: Mutex<()> = Mutex::new(());

/// Counts its live instances in [`TRACKED_LIVE`].
#[derive(Debug, PartialEq)]
pub struct Tracked {
    pub payload: Vec<u32>,
}

impl Default for Tracked {
    fn default() -> Self {
        TRACKED_LIVE.fetch_add(1, Ordering::SeqCst);
        Tracked { payload: vec![1, 2, 3] }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        TRACKED_LIVE.fetch_add(1, Ordering::SeqCst);
        Tracked {
            payload: self.payload.clone(),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        TRACKED_LIVE.fetch_sub(1, Ordering::SeqCst);
    }
}

declare_metatype!(Tracked);

/// Has no `Clone`, so it cannot be queued.
#[derive(Debug, Default)]
pub struct Handle(pub u32);

declare_metatype!(Handle);

// ============================================================================
// Counter
// ============================================================================

/// Method indices of `fixtures::Counter`, local to the class.
pub mod counter {
    pub const VALUE_CHANGED: usize = 0;
    pub const F_I32: usize = 1;
    pub const F_STRING: usize = 2;
    pub const VALUE: usize = 3;
    pub const SET_VALUE: usize = 4;
    pub const RECORD: usize = 5;
    pub const TAKE_HANDLE: usize = 6;
    pub const THREAD_CHECK: usize = 7;
}

pub struct Counter {
    base: ObjectBase,
    value: AtomicI32,
    pub log: Mutex<Vec<i32>>,
    pub threads: Mutex<Vec<ThreadId>>,
}

impl Counter {
    pub fn new(value: i32) -> Arc<dyn Reflect> {
        Arc::new(Counter {
            base: ObjectBase::new(),
            value: AtomicI32::new(value),
            log: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
        })
    }

    pub fn value(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }

    fn set_value(&self, value: i32) {
        if self.value.swap(value, Ordering::SeqCst) != value {
            let signal = self.meta_object().method_offset() + counter::VALUE_CHANGED;
            runtime::activate(self, signal, &[Argument::new(&value)]);
        }
    }
}

/// Downcasts a fixture object to [`Counter`].
pub fn as_counter(object: &Arc<dyn Reflect>) -> &Counter {
    object.as_any().downcast_ref::<Counter>().unwrap()
}

unsafe fn counter_metacall(
    object: Option<&dyn Reflect>,
    call: MetaCall,
    index: usize,
    argv: &mut [*mut u8],
) -> bool {
    if call == MetaCall::CreateInstance {
        return match index {
            0 => {
                let start = unsafe { *arg::<i32>(argv, 1) };
                unsafe { set_instance(argv, Counter::new(start)) };
                true
            }
            // Counter(String) rejects non-numeric text.
            1 => match unsafe { arg::<String>(argv, 1) }.parse::<i32>() {
                Ok(start) => {
                    unsafe { set_instance(argv, Counter::new(start)) };
                    true
                }
                Err(_) => false,
            },
            _ => false,
        };
    }

    let Some(this) = object.and_then(|o| o.as_any().downcast_ref::<Counter>()) else {
        return false;
    };

    match call {
        MetaCall::InvokeMetaMethod => match index {
            counter::VALUE_CHANGED => {
                let value = unsafe { *arg::<i32>(argv, 1) };
                let signal = this.meta_object().method_offset() + counter::VALUE_CHANGED;
                runtime::activate(this, signal, &[Argument::new(&value)]);
            }
            counter::F_I32 => {
                let n = unsafe { *arg::<i32>(argv, 1) };
                unsafe { set_return(argv, n * 2) };
            }
            counter::F_STRING => {
                let s = unsafe { arg::<String>(argv, 1) };
                unsafe { set_return(argv, s.len() as i32) };
            }
            counter::VALUE => unsafe { set_return(argv, this.value()) },
            counter::SET_VALUE => this.set_value(unsafe { *arg::<i32>(argv, 1) }),
            counter::RECORD => this.log.lock().push(unsafe { *arg::<i32>(argv, 1) }),
            counter::TAKE_HANDLE => {}
            counter::THREAD_CHECK => this.threads.lock().push(thread::current().id()),
            _ => return false,
        },
        MetaCall::ReadProperty => unsafe { set_return(argv, this.value()) },
        MetaCall::WriteProperty => this.set_value(unsafe { *arg::<i32>(argv, 0) }),
        MetaCall::ResetProperty => this.set_value(0),
        MetaCall::CreateInstance => return false,
    }
    true
}

pub fn counter_meta() -> &'static MetaObject {
    static META: OnceLock<&'static MetaObject> = OnceLock::new();
    META.get_or_init(|| {
        MetaObjectBuilder::new("fixtures::Counter")
            .method(MethodSpec::signal("valueChanged(i32)").parameter_names(["value"]))
            .method(MethodSpec::method("f(int)").returns::<i32>())
            .method(MethodSpec::method("f(String)").returns::<i32>())
            .method(MethodSpec::method("value()").returns::<i32>())
            .method(MethodSpec::slot("setValue(i32)"))
            .method(MethodSpec::slot("record(i32)"))
            .method(MethodSpec::slot("takeHandle(Handle)"))
            .method(MethodSpec::slot("threadCheck()"))
            .constructor(MethodSpec::constructor("Counter(i32)"))
            .constructor(MethodSpec::constructor("Counter(String)"))
            .property(
                PropertySpec::of::<i32>("value")
                    .writable()
                    .resettable()
                    .notify("valueChanged"),
            )
            .enumerator(
                EnumSpec::new("Mode")
                    .scoped()
                    .key("Idle", 0)
                    .key("Busy", 1),
            )
            .enumerator(
                EnumSpec::new("Options")
                    .enum_name("Option")
                    .flag()
                    .key("Fast", 1)
                    .key("Safe", 2)
                    .key("Quiet", 4),
            )
            .class_info("author", "fixtures")
            .static_metacall(counter_metacall)
            .build()
            .unwrap()
    })
}

impl Reflect for Counter {
    fn meta_object(&self) -> &'static MetaObject {
        counter_meta()
    }

    fn object_base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Three-level chain
// ============================================================================

/// `fixtures::Root` <- `fixtures::Mid` <- `fixtures::Leaf`, two methods each.
pub fn chain() -> (&'static MetaObject, &'static MetaObject, &'static MetaObject) {
    static CHAIN: OnceLock<(&'static MetaObject, &'static MetaObject, &'static MetaObject)> =
        OnceLock::new();
    *CHAIN.get_or_init(|| {
        let root = MetaObjectBuilder::new("fixtures::Root")
            .method(MethodSpec::method("rootA()"))
            .method(MethodSpec::method("rootB()"))
            .property(PropertySpec::of::<i32>("depth"))
            .class_info("level", "root")
            .build()
            .unwrap();
        let mid = MetaObjectBuilder::new("fixtures::Mid")
            .superclass(root)
            .method(MethodSpec::method("midA()"))
            .method(MethodSpec::method("midB(i32)"))
            .class_info("level", "mid")
            .build()
            .unwrap();
        let leaf = MetaObjectBuilder::new("fixtures::Leaf")
            .superclass(mid)
            .method(MethodSpec::method("leafA()"))
            .method(MethodSpec::method("rootA()"))
            .property(PropertySpec::of::<String>("label"))
            .build()
            .unwrap();
        (root, mid, leaf)
    })
}

// ============================================================================
// Dynamic object
// ============================================================================

/// An object dispatching through its own `meta_call`.
pub struct Scripted {
    base: ObjectBase,
    pub calls: Mutex<Vec<(MetaCall, usize)>>,
}

impl Scripted {
    pub fn new() -> Arc<dyn Reflect> {
        Arc::new(Scripted {
            base: ObjectBase::new(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

pub fn scripted_meta() -> &'static MetaObject {
    static META: OnceLock<&'static MetaObject> = OnceLock::new();
    META.get_or_init(|| {
        MetaObjectBuilder::new("fixtures::Scripted")
            .dynamic()
            .method(MethodSpec::method("echo(i32)").returns::<i32>())
            .method(MethodSpec::method("shout(String)").returns::<String>())
            .build()
            .unwrap()
    })
}

impl Reflect for Scripted {
    fn meta_object(&self) -> &'static MetaObject {
        scripted_meta()
    }

    fn object_base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    unsafe fn meta_call(&self, call: MetaCall, index: usize, argv: &mut [*mut u8]) -> bool {
        self.calls.lock().push((call, index));
        match index {
            0 => unsafe { set_return(argv, *arg::<i32>(argv, 1)) },
            1 => unsafe { set_return(argv, arg::<String>(argv, 1).to_uppercase()) },
            _ => return false,
        }
        true
    }
}

// ============================================================================
// Event loop threads
// ============================================================================

/// Runs an event loop on a new thread until its handle is told to quit.
pub fn spawn_loop() -> (EventLoopHandle, JoinHandle<()>) {
    let (tx, rx) = crossbeam::channel::bounded(1);
    let worker = thread::spawn(move || {
        let event_loop = EventLoop::new();
        tx.send(event_loop.handle()).unwrap();
        event_loop.run();
    });
    (rx.recv().unwrap(), worker)
}
