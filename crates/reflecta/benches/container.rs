//! Container descriptor benchmarks
//!
//! Compares type-erased sequence and association access with the native
//! operations they wrap.
//!
//! Run with: `cargo bench --bench container`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use reflecta::runtime::{MetaType, MetaValue, Position};
use std::collections::BTreeMap;

fn bench_sequence_index(c: &mut Criterion) {
    let seq = MetaType::of::<Vec<i64>>()
        .sequence()
        .expect("Vec<i64> has a sequence descriptor");
    let mut group = c.benchmark_group("sequence_index");

    for len in [16usize, 1024] {
        let numbers: Vec<i64> = (0..len as i64).collect();
        let container = (&numbers as *const Vec<i64>).cast::<u8>();
        group.bench_with_input(BenchmarkId::new("descriptor", len), &len, |b, &len| {
            let mut out = 0i64;
            b.iter(|| unsafe {
                seq.value_at_index(container, black_box(len / 2), (&mut out as *mut i64).cast());
                black_box(out)
            })
        });
        group.bench_with_input(BenchmarkId::new("native", len), &len, |b, &len| {
            b.iter(|| black_box(numbers[black_box(len / 2)]))
        });
    }

    group.finish();
}

fn bench_sequence_push(c: &mut Criterion) {
    let seq = MetaType::of::<Vec<i64>>()
        .sequence()
        .expect("Vec<i64> has a sequence descriptor");
    let value = 42i64;

    c.bench_function("sequence_push_1000", |b| {
        b.iter(|| {
            let mut numbers: Vec<i64> = Vec::with_capacity(1000);
            let container = (&mut numbers as *mut Vec<i64>).cast::<u8>();
            for _ in 0..1000 {
                unsafe {
                    seq.add_value(container, (&value as *const i64).cast(), Position::Unspecified);
                }
            }
            black_box(numbers)
        })
    });
}

fn bench_iterable(c: &mut Criterion) {
    let mut value = MetaValue::new((0..256i32).collect::<Vec<_>>());

    c.bench_function("iterable_sum_256", |b| {
        b.iter(|| {
            let seq = value.as_sequence().expect("Vec<i32> is iterable");
            let sum: i32 = seq.iter().filter_map(|v| v.downcast_ref::<i32>().copied()).sum();
            black_box(sum)
        })
    });
}

fn bench_association_lookup(c: &mut Criterion) {
    let assoc = MetaType::of::<BTreeMap<i64, i64>>()
        .association()
        .expect("BTreeMap<i64, i64> has an association descriptor");
    let map: BTreeMap<i64, i64> = (0..1024).map(|i| (i, i * 2)).collect();
    let container = (&map as *const BTreeMap<i64, i64>).cast::<u8>();
    let key = 511i64;

    c.bench_function("association_mapped_at_key", |b| {
        let mut out = 0i64;
        b.iter(|| unsafe {
            assoc.mapped_at_key(
                container,
                (black_box(&key) as *const i64).cast(),
                (&mut out as *mut i64).cast(),
            );
            black_box(out)
        })
    });
}

criterion_group!(
    benches,
    bench_sequence_index,
    bench_sequence_push,
    bench_iterable,
    bench_association_lookup
);
criterion_main!(benches);
