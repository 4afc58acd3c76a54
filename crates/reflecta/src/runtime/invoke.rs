//! Dynamic method invocation.
//!
//! Invocation runs through four stages:
//!
//! 1. **Resolve**: walk the class chain from the most derived class and
//!    pick the first method whose name, arity and parameter types accept
//!    the arguments. A parameter accepts an argument of the same
//!    registered type, or, for a type still unregistered when the table
//!    was built, of the same normalized name.
//! 2. **Bind**: the chosen method's chain-global index addresses the
//!    dispatch function of its declaring class.
//! 3. **Dispatch**: according to the [`ConnectionType`].
//! 4. **Report**: every failure is returned as an [`InvokeError`] and
//!    logged; nothing unwinds.
//!
//! When no method fits, the error of the closest miss is reported:
//! a parameter mismatch beats an arity mismatch beats an unknown name.
//!
//! # Example
//!
//! ```rust
//! use std::any::Any;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use reflecta::runtime::args::{arg, set_return};
//! use reflecta::runtime::{
//!     Argument, ConnectionType, MetaCall, MetaObject, MetaObjectBuilder, MethodSpec,
//!     ObjectBase, Reflect, ReturnSlot, invoke_method,
//! };
//!
//! struct Adder {
//!     base: ObjectBase,
//!     total: AtomicI32,
//! }
//!
//! unsafe fn adder_metacall(
//!     object: Option<&dyn Reflect>,
//!     call: MetaCall,
//!     index: usize,
//!     argv: &mut [*mut u8],
//! ) -> bool {
//!     let Some(this) = object.and_then(|o| o.as_any().downcast_ref::<Adder>()) else {
//!         return false;
//!     };
//!     match (call, index) {
//!         (MetaCall::InvokeMetaMethod, 0) => {
//!             let n = unsafe { *arg::<i32>(argv, 1) };
//!             let total = this.total.fetch_add(n, Ordering::SeqCst) + n;
//!             unsafe { set_return(argv, total) };
//!             true
//!         }
//!         _ => false,
//!     }
//! }
//!
//! fn adder_meta() -> &'static MetaObject {
//!     static META: std::sync::OnceLock<&'static MetaObject> = std::sync::OnceLock::new();
//!     META.get_or_init(|| {
//!         MetaObjectBuilder::new("invoke::Adder")
//!             .method(MethodSpec::method("add(i32)").returns::<i32>())
//!             .static_metacall(adder_metacall)
//!             .build()
//!             .unwrap()
//!     })
//! }
//!
//! impl Reflect for Adder {
//!     fn meta_object(&self) -> &'static MetaObject { adder_meta() }
//!     fn object_base(&self) -> &ObjectBase { &self.base }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! let adder: Arc<dyn Reflect> = Arc::new(Adder { base: ObjectBase::new(), total: AtomicI32::new(0) });
//! let mut total = 0i32;
//! invoke_method(&adder, "add", ConnectionType::Direct, Some(ReturnSlot::new(&mut total)), &[Argument::new(&5i32)])
//!     .unwrap();
//! assert_eq!(total, 5);
//! ```

use crate::MAX_INVOKE_ARGS;
use crate::error::InvokeError;
use crate::runtime::args::{Argument, ReturnSlot};
use crate::runtime::invocation::{Completion, Invocation, QueuedCall};
use crate::runtime::meta_object::{MetaCall, MetaObject};
use crate::runtime::method::{MetaMethod, MethodKind};
use crate::runtime::object::Reflect;
use reflecta_log::{error, trace, warn};
use std::sync::Arc;

/// How a call reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionType {
    /// Direct if the target lives in the calling thread, Queued otherwise.
    #[default]
    Auto,
    /// Synchronous call on the calling thread.
    Direct,
    /// Posted to the target's event loop; the caller does not wait.
    Queued,
    /// Posted to the target's event loop; the caller blocks until it ran.
    BlockingQueued,
}

fn report(err: InvokeError) -> InvokeError {
    match &err {
        InvokeError::DeadLockDetected { .. } => error!("invoke: {err}"),
        _ => warn!("invoke: {err}"),
    }
    err
}

fn keep_closest(best: Option<InvokeError>, candidate: InvokeError) -> Option<InvokeError> {
    match best {
        Some(best) if best.specificity() >= candidate.specificity() => Some(best),
        _ => Some(candidate),
    }
}

/// Invokes the method `name` on `target`.
///
/// `name` is either a bare method name, resolved against the arguments'
/// types, or a full signature such as `"setValue(i32)"`.
///
/// # Arguments
///
/// * `target` - Object to call
/// * `name` - Method name or signature
/// * `connection` - Dispatch mode
/// * `ret` - Optional destination for the return value; must hold an
///   initialized value of the return type
/// * `args` - Arguments in declaration order
///
/// # Errors
///
/// Any [`InvokeError`]; see the module documentation for resolution rules.
pub fn invoke_method(
    target: &Arc<dyn Reflect>,
    name: &str,
    connection: ConnectionType,
    ret: Option<ReturnSlot<'_>>,
    args: &[Argument<'_>],
) -> Result<(), InvokeError> {
    let class = target.meta_object();

    if name.contains('(') {
        return match class.method_by_signature(name) {
            Some(method) => invoke_bound(method, target, connection, ret, args),
            None => Err(report(InvokeError::MethodNotFound {
                class: class.class_name().to_string(),
                name: name.to_string(),
            })),
        };
    }

    let mut closest = None;
    for level in class.chain() {
        for local in 0..level.method_count() {
            let method = MetaMethod::new(level, local, false);
            if method.name() != name {
                continue;
            }
            match method.check_arguments(args) {
                Ok(()) => return invoke_bound(method, target, connection, ret, args),
                Err(err) => closest = keep_closest(closest, err),
            }
        }
    }

    Err(report(closest.unwrap_or_else(|| InvokeError::MethodNotFound {
        class: class.class_name().to_string(),
        name: name.to_string(),
    })))
}

pub(crate) fn check_return(method: MetaMethod, slot: &ReturnSlot<'_>) -> Result<(), InvokeError> {
    if method.returns_void() || !method.return_matches(slot.meta_type()) {
        return Err(InvokeError::ReturnTypeMismatch {
            signature: method.signature().to_string(),
            expected: method.return_type_name().to_string(),
            got: slot.meta_type().name().to_string(),
        });
    }
    Ok(())
}

fn resolve_connection(connection: ConnectionType, target: &dyn Reflect) -> ConnectionType {
    match connection {
        ConnectionType::Auto if target.object_base().is_current_thread() => ConnectionType::Direct,
        ConnectionType::Auto => ConnectionType::Queued,
        other => other,
    }
}

/// Invokes an already resolved method.
pub(crate) fn invoke_bound(
    method: MetaMethod,
    target: &Arc<dyn Reflect>,
    connection: ConnectionType,
    ret: Option<ReturnSlot<'_>>,
    args: &[Argument<'_>],
) -> Result<(), InvokeError> {
    let signature = || method.signature().to_string();

    if method.kind() == MethodKind::Constructor {
        return Err(report(InvokeError::ConstructorOnInstance {
            signature: signature(),
        }));
    }
    if !target.meta_object().inherits(method.enclosing_meta_object()) {
        return Err(report(InvokeError::InvalidMethod));
    }
    method.check_arguments(args).map_err(report)?;
    if let Some(slot) = &ret {
        check_return(method, slot).map_err(report)?;
    }

    let connection = resolve_connection(connection, &**target);
    trace!("invoke `{}` on {:?} via {connection:?}", method.signature(), &**target);

    match connection {
        ConnectionType::Direct | ConnectionType::Auto => {
            let ret = ret.map_or(std::ptr::null_mut(), |slot| slot.data());
            call_direct(method, &**target, ret, args.iter().map(Argument::data)).map_err(report)
        }
        ConnectionType::Queued => {
            if let Some(slot) = &ret {
                return Err(report(InvokeError::CouldNotQueueParameter {
                    signature: signature(),
                    index: 0,
                    type_name: slot.meta_type().name().to_string(),
                }));
            }
            let invocation = Invocation::new(method, args).map_err(report)?;
            post(target, QueuedCall::new(target, invocation)).map_err(report)
        }
        ConnectionType::BlockingQueued => {
            if target.object_base().is_current_thread() {
                return Err(report(InvokeError::DeadLockDetected {
                    signature: signature(),
                }));
            }
            let invocation = Invocation::new(method, args).map_err(report)?;
            let completion = Completion::new();
            let ret = ret.map_or(std::ptr::null_mut(), |slot| slot.data());
            let call = QueuedCall::new(target, invocation).blocking(ret, completion.clone());
            post(target, call).map_err(report)?;
            completion.wait(method.signature()).map_err(report)
        }
    }
}

fn post(target: &Arc<dyn Reflect>, call: QueuedCall) -> Result<(), InvokeError> {
    let signature = call.signature().to_string();
    let Some(handle) = target.object_base().event_loop() else {
        return Err(InvokeError::NoEventLoop { signature });
    };
    handle
        .post(Box::new(call))
        .map_err(|_dropped| InvokeError::NoEventLoop { signature })
}

/// Runs `method` on the calling thread.
///
/// `args` yields one pointer per declared parameter.
pub(crate) fn call_direct(
    method: MetaMethod,
    target: &dyn Reflect,
    ret: *mut u8,
    args: impl Iterator<Item = *const u8>,
) -> Result<(), InvokeError> {
    let class = method.enclosing_meta_object();
    if class.static_metacall.is_none() && !target.meta_object().is_dynamic() {
        return Err(InvokeError::InvalidMethod);
    }

    let mut argv = [std::ptr::null_mut::<u8>(); MAX_INVOKE_ARGS + 1];
    argv[0] = ret;
    for (slot, arg) in argv[1..].iter_mut().zip(args) {
        *slot = arg.cast_mut();
    }
    let argc = method.parameter_count() + 1;

    // SAFETY: argv holds the return slot and one pointer per parameter,
    // each checked against the declared types by the caller.
    let ok = unsafe {
        class.metacall(
            Some(target),
            MetaCall::InvokeMetaMethod,
            method.method_index(),
            &mut argv[..argc],
        )
    };
    if ok {
        Ok(())
    } else {
        Err(InvokeError::CallFailed {
            signature: method.signature().to_string(),
        })
    }
}

// ============================================================================
// Constructors
// ============================================================================

/// Constructs an instance of `class` through the first fitting constructor.
pub(crate) fn construct(
    class: &'static MetaObject,
    args: &[Argument<'_>],
) -> Result<Arc<dyn Reflect>, InvokeError> {
    let mut closest = None;
    for index in 0..class.constructor_count() {
        let Some(ctor) = class.constructor(index) else {
            continue;
        };
        match ctor.check_arguments(args) {
            Ok(()) => return ctor.new_instance(args),
            Err(err) => closest = keep_closest(closest, err),
        }
    }
    Err(report(closest.unwrap_or_else(|| InvokeError::MethodNotFound {
        class: class.class_name().to_string(),
        name: class.class_name().to_string(),
    })))
}

/// Runs a resolved constructor.
pub(crate) fn construct_bound(
    ctor: MetaMethod,
    target: Option<&dyn Reflect>,
    out: Option<&mut Option<Arc<dyn Reflect>>>,
    args: &[Argument<'_>],
) -> Result<(), InvokeError> {
    let signature = || ctor.signature().to_string();
    let class = ctor.enclosing_meta_object();

    if ctor.kind() != MethodKind::Constructor || class.static_metacall.is_none() {
        return Err(report(InvokeError::InvalidMethod));
    }
    if target.is_some() {
        return Err(report(InvokeError::ConstructorOnInstance {
            signature: signature(),
        }));
    }
    let Some(out) = out else {
        return Err(report(InvokeError::NoConstructorDestination {
            signature: signature(),
        }));
    };
    ctor.check_arguments(args).map_err(report)?;

    let mut argv = [std::ptr::null_mut::<u8>(); MAX_INVOKE_ARGS + 1];
    argv[0] = (&raw mut *out).cast();
    for (slot, arg) in argv[1..].iter_mut().zip(args) {
        *slot = arg.data().cast_mut();
    }
    let argc = ctor.parameter_count() + 1;

    // SAFETY: argv[0] points to the caller's Option<Arc<dyn Reflect>>,
    // the parameters were type-checked above.
    let ok = unsafe {
        class.metacall(
            None,
            MetaCall::CreateInstance,
            ctor.method_index(),
            &mut argv[..argc],
        )
    };
    if !ok || out.is_none() {
        return Err(report(InvokeError::ConstructionFailed {
            signature: signature(),
        }));
    }
    trace!("constructed `{}`", class.class_name());
    Ok(())
}
