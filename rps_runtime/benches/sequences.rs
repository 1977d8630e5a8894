//! Immutable Sequence and Attribute Benchmarks
//!
//! # Benchmark Categories
//!
//! 1. **Set Membership**: binary search over sets of growing cardinality
//! 2. **Sequence Hashing**: first (computing) and cached hash reads
//! 3. **Attribute Access**: single reads, batched writes, magic getters

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rps_runtime::{MagicGetterFn, ObjectRef, ObjectZone, SetZone, TreeZone, TupleZone, Value};
use std::sync::Arc;

// =============================================================================
// Benchmark Helpers
// =============================================================================

fn make_objects(n: usize) -> Vec<ObjectRef> {
    (0..n).map(|_| ObjectZone::make()).collect()
}

// =============================================================================
// Set Membership Benchmarks
// =============================================================================

fn bench_set_membership(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_membership");

    for count in [4usize, 16, 256, 4096] {
        let objects = make_objects(count);
        let set = SetZone::make(objects.iter().cloned());
        let outsider = ObjectZone::make();
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("hit", count), &count, |b, _| {
            let needle = &objects[count / 2];
            b.iter(|| black_box(set.contains(black_box(needle))))
        });
        group.bench_with_input(BenchmarkId::new("miss", count), &count, |b, _| {
            b.iter(|| black_box(set.contains(black_box(&outsider))))
        });
    }

    group.finish();
}

// =============================================================================
// Hashing Benchmarks
// =============================================================================

fn bench_sequence_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_hashing");
    let objects = make_objects(64);

    group.bench_function("tuple_fresh", |b| {
        b.iter(|| black_box(TupleZone::make(objects.iter().cloned()).hash()))
    });

    group.bench_function("tuple_cached", |b| {
        let tuple = TupleZone::make(objects.iter().cloned());
        tuple.hash();
        b.iter(|| black_box(tuple.hash()))
    });

    group.bench_function("closure_fresh", |b| {
        let sons: Vec<Value> = (0..16).map(Value::from_int).collect();
        b.iter(|| black_box(TreeZone::make_closure(&objects[0], sons.iter().cloned()).hash()))
    });

    group.bench_function("string_fresh", |b| {
        b.iter(|| black_box(Value::string("the quick brown fox").valhash()))
    });

    group.finish();
}

// =============================================================================
// Attribute Benchmarks
// =============================================================================

fn bench_attribute_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("attribute_access");
    let ob = ObjectZone::make();
    let keys = make_objects(4);
    for (i, key) in keys.iter().enumerate() {
        ob.put_attr(key, Value::from_int(i as i64)).unwrap();
    }

    group.bench_function("get_attr1", |b| b.iter(|| black_box(ob.get_attr1(&keys[2]).unwrap())));

    group.bench_function("put_attr4", |b| {
        b.iter(|| {
            ob.put_attr4(
                &keys[0],
                Value::from_int(1),
                &keys[1],
                Value::from_int(2),
                &keys[2],
                Value::from_int(3),
                &keys[3],
                Value::from_int(4),
            )
            .unwrap()
        })
    });

    group.bench_function("magic_getter", |b| {
        let magic = ObjectZone::make();
        let getter: MagicGetterFn = Arc::new(|owner: &ObjectZone, _key: &ObjectRef| Ok(Value::from_int(owner.obhash() as i64)));
        magic.put_magic_getter(Some(getter));
        b.iter(|| black_box(ob.get_attr1(&magic).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_set_membership, bench_sequence_hashing, bench_attribute_access);
criterion_main!(benches);
