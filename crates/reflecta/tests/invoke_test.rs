//! Integration tests for the invocation protocol.
//!
//! Run with: `cargo test --test invoke_test`

mod common;

use common::{Counter, Handle, Scripted, as_counter, counter, counter_meta, spawn_loop};
use reflecta::runtime::{
    Argument, ConnectionType, EventLoop, Invocation, MetaCall, ReturnSlot, invoke_method,
};
use reflecta::InvokeError;
use reflecta_log::{CaptureSink, Level, with_thread_sink};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_overload_selected_by_argument_type() {
    let object = Counter::new(0);

    let mut out = 0i32;
    invoke_method(
        &object,
        "f",
        ConnectionType::Direct,
        Some(ReturnSlot::new(&mut out)),
        &[Argument::new(&21i32)],
    )
    .unwrap();
    assert_eq!(out, 42);

    let text = String::from("hello");
    invoke_method(
        &object,
        "f",
        ConnectionType::Direct,
        Some(ReturnSlot::new(&mut out)),
        &[Argument::new(&text)],
    )
    .unwrap();
    assert_eq!(out, 5);
}

#[test]
fn test_binding_to_wrong_overload_fails() {
    let object = Counter::new(0);
    let f_string = counter_meta().method(counter::F_STRING).unwrap();

    let err = f_string
        .invoke(&object, ConnectionType::Direct, None, &[Argument::new(&1i32)])
        .unwrap_err();
    assert!(matches!(err, InvokeError::FormalParameterMismatch { index: 1, .. }));
    assert!(err.is_not_found());

    let err = invoke_method(
        &object,
        "f(String)",
        ConnectionType::Direct,
        None,
        &[Argument::new(&1i32)],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::FormalParameterMismatch { .. }));
}

#[test]
fn test_closest_resolution_error_is_reported() {
    let object = Counter::new(0);

    let err = invoke_method(&object, "nope", ConnectionType::Direct, None, &[]).unwrap_err();
    assert!(matches!(err, InvokeError::MethodNotFound { .. }));

    let err = invoke_method(&object, "f", ConnectionType::Direct, None, &[]).unwrap_err();
    assert!(matches!(err, InvokeError::ArgumentCountMismatch { expected: 1, got: 0, .. }));

    let err = invoke_method(&object, "f", ConnectionType::Direct, None, &[Argument::new(&1.5f64)])
        .unwrap_err();
    assert!(matches!(err, InvokeError::FormalParameterMismatch { .. }));
}

#[test]
fn test_return_slot_must_match() {
    let object = Counter::new(3);

    let mut wrong = String::new();
    let err = invoke_method(
        &object,
        "value",
        ConnectionType::Direct,
        Some(ReturnSlot::new(&mut wrong)),
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::ReturnTypeMismatch { .. }));

    let mut out = 0i32;
    let err = invoke_method(
        &object,
        "record",
        ConnectionType::Direct,
        Some(ReturnSlot::new(&mut out)),
        &[Argument::new(&1i32)],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::ReturnTypeMismatch { .. }));
    assert!(as_counter(&object).log.lock().is_empty());
}

#[test]
fn test_failures_are_logged() {
    let object = Counter::new(0);
    let sink = Arc::new(CaptureSink::new());
    with_thread_sink(sink.clone(), || {
        let _ = invoke_method(&object, "f", ConnectionType::Direct, None, &[]);
    });
    let records = sink.records();
    assert!(
        records
            .iter()
            .any(|r| r.level == Level::Warn && r.message.contains("f(i32)"))
    );
}

// ============================================================================
// Cross-thread dispatch
// ============================================================================

#[test]
fn test_blocking_call_on_own_thread_is_deadlock() {
    let _event_loop = EventLoop::new();
    let object = Counter::new(0);

    let err = invoke_method(
        &object,
        "record",
        ConnectionType::BlockingQueued,
        None,
        &[Argument::new(&1i32)],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::DeadLockDetected { .. }));
    assert!(!err.is_not_found());
    assert!(as_counter(&object).log.lock().is_empty());
}

#[test]
fn test_queued_calls_are_fifo() {
    let event_loop = EventLoop::new();
    let object = Counter::new(0);

    for i in 1..=5 {
        invoke_method(
            &object,
            "record",
            ConnectionType::Queued,
            None,
            &[Argument::new(&i)],
        )
        .unwrap();
    }
    assert!(as_counter(&object).log.lock().is_empty());
    assert_eq!(event_loop.process_pending(), 5);
    assert_eq!(*as_counter(&object).log.lock(), [1, 2, 3, 4, 5]);
}

#[test]
fn test_queued_call_rejects_return_slot_and_uncopyable_args() {
    let _event_loop = EventLoop::new();
    let object = Counter::new(0);

    let mut out = 0i32;
    let err = invoke_method(
        &object,
        "value",
        ConnectionType::Queued,
        Some(ReturnSlot::new(&mut out)),
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::CouldNotQueueParameter { index: 0, .. }));

    let handle = Handle(1);
    let err = invoke_method(
        &object,
        "takeHandle",
        ConnectionType::Queued,
        None,
        &[Argument::new(&handle)],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::CouldNotQueueParameter { index: 1, .. }));

    let method = counter_meta().method(counter::TAKE_HANDLE).unwrap();
    assert!(Invocation::new(method, &[Argument::new(&handle)]).is_err());
}

#[test]
fn test_queued_call_without_event_loop() {
    let object = thread::spawn(|| Counter::new(0)).join().unwrap();
    let err = invoke_method(
        &object,
        "record",
        ConnectionType::Queued,
        None,
        &[Argument::new(&1i32)],
    )
    .unwrap_err();
    assert!(matches!(err, InvokeError::NoEventLoop { .. }));
}

#[test]
fn test_blocking_call_to_worker_loop() {
    let (handle, worker) = spawn_loop();
    let object = Counter::new(8);
    object.object_base().move_to_loop(&handle);

    // Auto resolves to Queued from a foreign thread.
    invoke_method(&object, "record", ConnectionType::Auto, None, &[Argument::new(&7i32)])
        .unwrap();

    let mut out = 0i32;
    invoke_method(
        &object,
        "value",
        ConnectionType::BlockingQueued,
        Some(ReturnSlot::new(&mut out)),
        &[],
    )
    .unwrap();
    assert_eq!(out, 8);

    invoke_method(&object, "threadCheck", ConnectionType::BlockingQueued, None, &[]).unwrap();
    assert_eq!(*as_counter(&object).log.lock(), [7]);
    assert_eq!(*as_counter(&object).threads.lock(), [handle.thread()]);

    handle.quit();
    worker.join().unwrap();
}

#[test]
fn test_destroyed_target_drops_queued_call() {
    let event_loop = EventLoop::new();
    let object = Counter::new(0);
    let weak = Arc::downgrade(&object);

    invoke_method(&object, "record", ConnectionType::Queued, None, &[Argument::new(&1i32)])
        .unwrap();
    drop(object);
    assert!(weak.upgrade().is_none());
    assert_eq!(event_loop.process_pending(), 1);
}

#[test]
fn test_blocked_caller_released_when_loop_dies() {
    let event_loop = EventLoop::new();
    let object = Counter::new(0);

    let caller = {
        let object = object.clone();
        thread::spawn(move || {
            invoke_method(
                &object,
                "record",
                ConnectionType::BlockingQueued,
                None,
                &[Argument::new(&1i32)],
            )
        })
    };

    while event_loop.pending() == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    drop(event_loop);

    let err = caller.join().unwrap().unwrap_err();
    assert!(matches!(err, InvokeError::TargetDestroyed { .. }));
    assert!(as_counter(&object).log.lock().is_empty());
}

// ============================================================================
// Constructors
// ============================================================================

#[test]
fn test_constructors() {
    let meta = counter_meta();
    assert_eq!(meta.constructor_count(), 2);
    assert_eq!(meta.index_of_constructor("Counter(int)"), 0);

    let made = meta.new_instance(&[Argument::new(&3i32)]).unwrap();
    assert_eq!(as_counter(&made).value(), 3);

    let text = String::from("12");
    let made = meta.new_instance(&[Argument::new(&text)]).unwrap();
    assert_eq!(as_counter(&made).value(), 12);

    let bad = String::from("twelve");
    let err = meta.new_instance(&[Argument::new(&bad)]).unwrap_err();
    assert!(matches!(err, InvokeError::ConstructionFailed { .. }));
    assert!(err.is_construction_failure());
}

#[test]
fn test_constructor_misuse() {
    let meta = counter_meta();
    let ctor = meta.constructor(0).unwrap();
    let existing = Counter::new(0);
    let args = [Argument::new(&1i32)];

    let mut out = None;
    let err = ctor
        .invoke_constructor(Some(&*existing), Some(&mut out), &args)
        .unwrap_err();
    assert!(matches!(err, InvokeError::ConstructorOnInstance { .. }));

    let err = ctor.invoke_constructor(None, None, &args).unwrap_err();
    assert!(matches!(err, InvokeError::NoConstructorDestination { .. }));

    let err = ctor
        .invoke(&existing, ConnectionType::Direct, None, &args)
        .unwrap_err();
    assert!(matches!(err, InvokeError::ConstructorOnInstance { .. }));
    assert!(out.is_none());
}

// ============================================================================
// Dynamic dispatch
// ============================================================================

#[test]
fn test_dynamic_object_dispatches_through_meta_call() {
    let object = Scripted::new();

    let mut echoed = 0i32;
    invoke_method(
        &object,
        "echo",
        ConnectionType::Direct,
        Some(ReturnSlot::new(&mut echoed)),
        &[Argument::new(&9i32)],
    )
    .unwrap();
    assert_eq!(echoed, 9);

    let mut shouted = String::new();
    let word = String::from("hey");
    invoke_method(
        &object,
        "shout(String)",
        ConnectionType::Direct,
        Some(ReturnSlot::new(&mut shouted)),
        &[Argument::new(&word)],
    )
    .unwrap();
    assert_eq!(shouted, "HEY");

    let scripted = object.as_any().downcast_ref::<common::Scripted>().unwrap();
    assert_eq!(
        *scripted.calls.lock(),
        [(MetaCall::InvokeMetaMethod, 0), (MetaCall::InvokeMetaMethod, 1)]
    );
}
