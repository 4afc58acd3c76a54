//! Dynamic invocation benchmarks
//!
//! Measures the cost of each layer of a call by name:
//! - signature lookup in the class table
//! - direct invocation through a bound method
//! - overload resolution in `invoke_method`
//! - queued delivery through an event loop
//! - signal emission to connected slots
//!
//! Run with: `cargo bench --bench invoke`

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use reflecta::runtime::args::{arg, set_return};
use reflecta::runtime::{
    Argument, ConnectionType, EventLoop, MetaCall, MetaObject, MetaObjectBuilder, MethodSpec,
    ObjectBase, Reflect, ReturnSlot, connect, emit, invoke_method,
};
use std::any::Any;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

struct Accumulator {
    base: ObjectBase,
    total: AtomicI64,
}

unsafe fn accumulator_metacall(
    object: Option<&dyn Reflect>,
    call: MetaCall,
    index: usize,
    argv: &mut [*mut u8],
) -> bool {
    let Some(this) = object.and_then(|o| o.as_any().downcast_ref::<Accumulator>()) else {
        return false;
    };
    if call != MetaCall::InvokeMetaMethod {
        return false;
    }
    match index {
        // changed(i64)
        0 => {}
        1 => {
            let n = unsafe { *arg::<i64>(argv, 1) };
            this.total.fetch_add(n, Ordering::Relaxed);
        }
        2 => unsafe { set_return(argv, this.total.load(Ordering::Relaxed)) },
        3 => {
            let text = unsafe { arg::<String>(argv, 1) };
            this.total.fetch_add(text.len() as i64, Ordering::Relaxed);
        }
        _ => return false,
    }
    true
}

fn accumulator_meta() -> &'static MetaObject {
    static META: OnceLock<&'static MetaObject> = OnceLock::new();
    META.get_or_init(|| {
        MetaObjectBuilder::new("bench::Accumulator")
            .method(MethodSpec::signal("changed(i64)"))
            .method(MethodSpec::slot("add(i64)"))
            .method(MethodSpec::method("total()").returns::<i64>())
            .method(MethodSpec::slot("add(String)"))
            .static_metacall(accumulator_metacall)
            .build()
            .unwrap()
    })
}

impl Reflect for Accumulator {
    fn meta_object(&self) -> &'static MetaObject {
        accumulator_meta()
    }

    fn object_base(&self) -> &ObjectBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn accumulator() -> Arc<dyn Reflect> {
    Arc::new(Accumulator {
        base: ObjectBase::new(),
        total: AtomicI64::new(0),
    })
}

fn bench_lookup(c: &mut Criterion) {
    let meta = accumulator_meta();
    let mut group = c.benchmark_group("lookup");
    group.bench_function("index_of_method", |b| {
        b.iter(|| meta.index_of_method(black_box("add(i64)")))
    });
    group.bench_function("index_of_method_unnormalized", |b| {
        b.iter(|| meta.index_of_method(black_box("add( const i64 & )")))
    });
    group.finish();
}

fn bench_direct(c: &mut Criterion) {
    let object = accumulator();
    let add = accumulator_meta().method(1).unwrap();
    let total = accumulator_meta().method(2).unwrap();

    let mut group = c.benchmark_group("direct");
    group.bench_function("bound_method", |b| {
        b.iter(|| {
            add.invoke(&object, ConnectionType::Direct, None, &[Argument::new(&1i64)])
                .unwrap()
        })
    });
    group.bench_function("bound_method_with_return", |b| {
        let mut out = 0i64;
        b.iter(|| {
            total
                .invoke(&object, ConnectionType::Direct, Some(ReturnSlot::new(&mut out)), &[])
                .unwrap();
            black_box(out)
        })
    });
    group.bench_function("by_name_overloaded", |b| {
        b.iter(|| {
            invoke_method(
                &object,
                black_box("add"),
                ConnectionType::Direct,
                None,
                &[Argument::new(&1i64)],
            )
            .unwrap()
        })
    });
    group.finish();
}

fn bench_queued(c: &mut Criterion) {
    let event_loop = EventLoop::new();
    let object = accumulator();
    let add = accumulator_meta().method(1).unwrap();

    c.bench_function("queued_100", |b| {
        b.iter(|| {
            for _ in 0..100 {
                add.invoke(&object, ConnectionType::Queued, None, &[Argument::new(&1i64)])
                    .unwrap();
            }
            black_box(event_loop.process_pending())
        })
    });
}

fn bench_emit(c: &mut Criterion) {
    let sender = accumulator();
    let receivers: Vec<_> = (0..8).map(|_| accumulator()).collect();
    for receiver in &receivers {
        connect(&*sender, "changed(i64)", receiver, "add(i64)", ConnectionType::Direct).unwrap();
    }

    c.bench_function("emit_to_8_slots", |b| {
        b.iter(|| emit(&*sender, "changed", &[Argument::new(black_box(&1i64))]))
    });
}

criterion_group!(benches, bench_lookup, bench_direct, bench_queued, bench_emit);
criterion_main!(benches);
