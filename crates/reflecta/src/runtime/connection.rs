//! Signal/slot connections.
//!
//! A connection links a signal of a sender object to a method of a
//! receiver object. Emitting the signal invokes every connected method,
//! in connection order, through the connection's [`ConnectionType`].
//!
//! Receivers are held weakly; a destroyed receiver is skipped. Dropping an
//! object's [`ObjectBase`](crate::runtime::ObjectBase) removes all its
//! connections, as sender and as receiver.
//!
//! A receiving method may declare fewer parameters than the signal; it
//! receives the leading arguments. Its parameter types must equal the
//! signal's at the same positions.

use crate::error::{Error, Result};
use crate::runtime::args::Argument;
use crate::runtime::invoke::{self, ConnectionType};
use crate::runtime::method::{MetaMethod, MethodKind};
use crate::runtime::object::{ObjectId, Reflect};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use reflecta_log::{debug, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Identity of a connection, used to disconnect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct Connection {
    id: ConnectionId,
    signal: usize,
    receiver: Weak<dyn Reflect>,
    receiver_id: ObjectId,
    method: MetaMethod,
    kind: ConnectionType,
}

type ConnectionMap = FxHashMap<ObjectId, Vec<Arc<Connection>>>;

fn connections() -> &'static RwLock<ConnectionMap> {
    static CONNECTIONS: OnceLock<RwLock<ConnectionMap>> = OnceLock::new();
    CONNECTIONS.get_or_init(|| RwLock::new(FxHashMap::default()))
}

fn compatible(signal: MetaMethod, method: MetaMethod) -> bool {
    method.parameter_count() <= signal.parameter_count()
        && (0..method.parameter_count())
            .all(|i| method.parameter_type_name(i) == signal.parameter_type_name(i))
}

fn find_receiver_method(receiver: &dyn Reflect, signal: MetaMethod, name: &str) -> Result<MetaMethod> {
    let class = receiver.meta_object();
    let not_found = || Error::MemberNotFound {
        class: class.class_name().to_string(),
        member: name.to_string(),
    };

    let method = if name.contains('(') {
        class.method_by_signature(name).ok_or_else(not_found)?
    } else {
        let mut first = None;
        for level in class.chain() {
            for local in 0..level.method_count() {
                let candidate = MetaMethod::new(level, local, false);
                if candidate.name() != name {
                    continue;
                }
                if compatible(signal, candidate) {
                    return Ok(candidate);
                }
                first.get_or_insert(candidate);
            }
        }
        first.ok_or_else(not_found)?
    };

    if method.kind() == MethodKind::Constructor || !compatible(signal, method) {
        return Err(Error::IncompatibleConnection {
            signal: signal.signature().to_string(),
            method: method.signature().to_string(),
        });
    }
    Ok(method)
}

/// Connects `signal` of `sender` to `method` of `receiver`.
///
/// Both names may be bare names or full signatures. A bare method name
/// picks the first overload able to take the signal's arguments.
///
/// # Errors
///
/// - [`Error::MemberNotFound`] if the signal or method does not exist.
/// - [`Error::IncompatibleConnection`] if the method cannot take the
///   signal's arguments.
pub fn connect(
    sender: &dyn Reflect,
    signal: &str,
    receiver: &Arc<dyn Reflect>,
    method: &str,
    kind: ConnectionType,
) -> Result<ConnectionId> {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    let sender_class = sender.meta_object();
    let signal_index = sender_class
        .find_signal(signal)
        .ok_or_else(|| Error::MemberNotFound {
            class: sender_class.class_name().to_string(),
            member: signal.to_string(),
        })?;
    let signal_method = sender_class
        .method(signal_index)
        .ok_or(Error::InvalidType)?;
    let method = find_receiver_method(&**receiver, signal_method, method)?;

    let id = ConnectionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
    let connection = Arc::new(Connection {
        id,
        signal: signal_index,
        receiver: Arc::downgrade(receiver),
        receiver_id: receiver.object_base().id(),
        method,
        kind,
    });
    connections()
        .write()
        .entry(sender.object_base().id())
        .or_default()
        .push(connection);

    debug!(
        "connected {}::{} -> {}::{} ({kind:?})",
        sender_class.class_name(),
        signal_method.signature(),
        receiver.meta_object().class_name(),
        method.signature()
    );
    Ok(id)
}

/// Removes a connection. Returns false if it was already gone.
pub fn disconnect(id: ConnectionId) -> bool {
    let mut map = connections().write();
    for list in map.values_mut() {
        if let Some(pos) = list.iter().position(|c| c.id == id) {
            list.remove(pos);
            return true;
        }
    }
    false
}

/// Removes every connection in which `object` takes part.
pub(crate) fn disconnect_object(object: ObjectId) {
    let removed = {
        let mut map = connections().write();
        let removed = map.remove(&object);
        for list in map.values_mut() {
            list.retain(|c| c.receiver_id != object);
        }
        map.retain(|_, list| !list.is_empty());
        removed
    };
    if let Some(list) = removed {
        trace!("object {object} dropped {} outgoing connections", list.len());
    }
}

/// Number of connections attached to `signal` of `sender`.
#[must_use]
pub fn receivers(sender: &dyn Reflect, signal: &str) -> usize {
    let Some(index) = sender.meta_object().find_signal(signal) else {
        return 0;
    };
    connections()
        .read()
        .get(&sender.object_base().id())
        .map_or(0, |list| list.iter().filter(|c| c.signal == index).count())
}

/// Delivers the signal at global index `signal` of `sender` with `args`.
///
/// # Returns
///
/// The number of receivers the call was successfully dispatched to.
/// Failed deliveries are logged.
pub fn activate(sender: &dyn Reflect, signal: usize, args: &[Argument<'_>]) -> usize {
    let Some(signal_method) = sender.meta_object().method(signal) else {
        warn!("activate: no signal {signal} in `{}`", sender.meta_object().class_name());
        return 0;
    };
    if let Err(err) = signal_method.check_arguments(args) {
        warn!("activate: {err}");
        return 0;
    }

    let snapshot: Vec<Arc<Connection>> = connections()
        .read()
        .get(&sender.object_base().id())
        .map(|list| list.iter().filter(|c| c.signal == signal).cloned().collect())
        .unwrap_or_default();

    let mut delivered = 0;
    for connection in snapshot {
        let Some(receiver) = connection.receiver.upgrade() else {
            continue;
        };
        let slot_args = &args[..connection.method.parameter_count()];
        let result = invoke::invoke_bound(
            connection.method,
            &receiver,
            connection.kind,
            None,
            slot_args,
        );
        if result.is_ok() {
            delivered += 1;
        }
    }
    trace!(
        "signal `{}` delivered to {delivered} receivers",
        signal_method.signature()
    );
    delivered
}

/// Emits the signal named `signal` (bare name or signature) of `sender`.
///
/// # Returns
///
/// The number of receivers reached; 0 if the signal does not exist.
pub fn emit(sender: &dyn Reflect, signal: &str, args: &[Argument<'_>]) -> usize {
    let class = sender.meta_object();
    match class.find_signal(signal) {
        Some(index) => activate(sender, index, args),
        None => {
            warn!("emit: no signal `{signal}` in `{}`", class.class_name());
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::args;
    use crate::runtime::builder::{MetaObjectBuilder, MethodSpec};
    use crate::runtime::meta_object::{MetaCall, MetaObject};
    use crate::runtime::object::ObjectBase;
    use parking_lot::Mutex;
    use std::any::Any;

    struct Emitter {
        base: ObjectBase,
    }

    fn emitter_meta() -> &'static MetaObject {
        static META: OnceLock<&'static MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::new("connection::tests::Emitter")
                .method(MethodSpec::signal("changed(i32)"))
                .method(MethodSpec::signal("renamed(String,i32)"))
                .build()
                .unwrap()
        })
    }

    impl Reflect for Emitter {
        fn meta_object(&self) -> &'static MetaObject {
            emitter_meta()
        }
        fn object_base(&self) -> &ObjectBase {
            &self.base
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Sink {
        base: ObjectBase,
        seen: Mutex<Vec<i32>>,
    }

    unsafe fn sink_metacall(
        object: Option<&dyn Reflect>,
        call: MetaCall,
        index: usize,
        argv: &mut [*mut u8],
    ) -> bool {
        let Some(sink) = object.and_then(|o| o.as_any().downcast_ref::<Sink>()) else {
            return false;
        };
        if call != MetaCall::InvokeMetaMethod {
            return false;
        }
        match index {
            // record(i32)
            0 => sink.seen.lock().push(unsafe { *args::arg::<i32>(argv, 1) }),
            // ping()
            1 => sink.seen.lock().push(-1),
            // text(String)
            2 => sink.seen.lock().push(unsafe { args::arg::<String>(argv, 1) }.len() as i32),
            _ => return false,
        }
        true
    }

    fn sink_meta() -> &'static MetaObject {
        static META: OnceLock<&'static MetaObject> = OnceLock::new();
        META.get_or_init(|| {
            MetaObjectBuilder::new("connection::tests::Sink")
                .method(MethodSpec::slot("record(i32)"))
                .method(MethodSpec::slot("ping()"))
                .method(MethodSpec::slot("text(String)"))
                .static_metacall(sink_metacall)
                .build()
                .unwrap()
        })
    }

    impl Reflect for Sink {
        fn meta_object(&self) -> &'static MetaObject {
            sink_meta()
        }
        fn object_base(&self) -> &ObjectBase {
            &self.base
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn sink() -> Arc<dyn Reflect> {
        Arc::new(Sink {
            base: ObjectBase::new(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(sink: &Arc<dyn Reflect>) -> Vec<i32> {
        sink.as_any().downcast_ref::<Sink>().unwrap().seen.lock().clone()
    }

    #[test]
    fn test_emit_reaches_receivers_in_order() {
        let emitter = Emitter { base: ObjectBase::new() };
        let receiver = sink();
        connect(&emitter, "changed", &receiver, "record", ConnectionType::Direct).unwrap();
        connect(&emitter, "changed(i32)", &receiver, "ping()", ConnectionType::Direct).unwrap();
        assert_eq!(receivers(&emitter, "changed"), 2);

        let value = 7i32;
        assert_eq!(emit(&emitter, "changed", &[Argument::new(&value)]), 2);
        assert_eq!(seen(&receiver), [7, -1]);
    }

    #[test]
    fn test_incompatible_connection_is_rejected() {
        let emitter = Emitter { base: ObjectBase::new() };
        let receiver = sink();
        let err = connect(&emitter, "changed", &receiver, "text", ConnectionType::Auto).unwrap_err();
        assert!(matches!(err, Error::IncompatibleConnection { .. }));

        let err = connect(&emitter, "missing", &receiver, "record", ConnectionType::Auto).unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { .. }));

        // Leading argument of renamed(String,i32) fits text(String).
        assert!(connect(&emitter, "renamed", &receiver, "text", ConnectionType::Auto).is_ok());
    }

    #[test]
    fn test_disconnect_and_receiver_drop() {
        let emitter = Emitter { base: ObjectBase::new() };
        let receiver = sink();
        let id = connect(&emitter, "changed", &receiver, "record", ConnectionType::Direct).unwrap();
        assert!(disconnect(id));
        assert!(!disconnect(id));
        assert_eq!(receivers(&emitter, "changed"), 0);

        connect(&emitter, "changed", &receiver, "record", ConnectionType::Direct).unwrap();
        drop(receiver);
        assert_eq!(receivers(&emitter, "changed"), 0);
        let value = 1i32;
        assert_eq!(emit(&emitter, "changed", &[Argument::new(&value)]), 0);
    }

    #[test]
    fn test_emit_checks_signal_arguments() {
        let emitter = Emitter { base: ObjectBase::new() };
        let receiver = sink();
        connect(&emitter, "changed", &receiver, "record", ConnectionType::Direct).unwrap();
        let wrong = String::from("x");
        assert_eq!(emit(&emitter, "changed", &[Argument::new(&wrong)]), 0);
        assert!(seen(&receiver).is_empty());
    }
}
