//! Liveness of collections.
//!
//! Every test takes `GC_LOCK`: a collection sweeps anything another test
//! allocates while marking is in progress.

use parking_lot::Mutex;
use proptest::prelude::*;
use rps_gc::{FrameRegistry, GarbageCollector, GcConfig, RootSet, frame_registry, garbage_collector};
use rps_runtime::zone::Zone;
use rps_runtime::{
    CallFrame, ObjectRef, ObjectZone, RuntimeError, Tracer, TreeZone, TupleZone, Value, predefined,
    root_objects, symbol_table,
};
use std::sync::Arc;

static GC_LOCK: Mutex<()> = Mutex::new(());

fn collect() -> rps_gc::GcOutcome {
    garbage_collector().collect(&[]).unwrap()
}

fn is_live(ob: &ObjectRef) -> bool {
    !ob.is_reclaimed() && ObjectZone::find(ob.oid()).is_some_and(|found| found.ptr_eq(ob))
}

// =============================================================================
// Roots
// =============================================================================

#[test]
fn test_rooted_object_survives_and_unrooted_is_reclaimed() {
    let _lock = GC_LOCK.lock();
    let o = ObjectZone::make();
    let child = ObjectZone::make();
    o.put_attr(&child, Value::from_int(1)).unwrap();
    root_objects().add_root_object(&o);

    let o2 = ObjectZone::make();
    let oid2 = o2.oid();
    o2.put_attr(&child, Value::from_object(&o)).unwrap();

    let outcome = collect();
    assert!(outcome.nb_deletes >= 1);
    assert!(outcome.nb_roots >= predefined().all().len());

    assert!(is_live(&o));
    assert!(is_live(&child));
    assert!(ObjectZone::find(oid2).is_none());
    assert!(o2.is_reclaimed());
    assert_eq!(o2.header().rank(), 0);
    assert_eq!(o2.nb_attributes(), 0);

    root_objects().remove_root_object(&o);
}

#[test]
fn test_predefined_objects_survive() {
    let _lock = GC_LOCK.lock();
    collect();
    collect();
    for ob in predefined().all() {
        assert!(is_live(ob), "{} was swept", ob.oid());
    }
    assert!(predefined().class_class().is_class());
}

#[test]
fn test_unreachable_cycle_is_reclaimed() {
    let _lock = GC_LOCK.lock();
    let a = ObjectZone::make();
    let b = ObjectZone::make();
    a.put_attr(&b, Value::from_object(&b)).unwrap();
    b.put_attr(&a, Value::from_object(&a)).unwrap();
    collect();
    assert!(!is_live(&a));
    assert!(!is_live(&b));
}

#[test]
fn test_values_reached_through_immutables() {
    let _lock = GC_LOCK.lock();
    let holder = ObjectZone::make();
    let inside = ObjectZone::make();
    let key = ObjectZone::make();
    let tuple = Value::from(TupleZone::make([inside.clone()]));
    let text = Value::string("kept");
    let loose = Value::string("dropped");
    holder.put_attr(&key, tuple).unwrap();
    holder.append_comp1(text.clone());
    root_objects().add_root_object(&holder);

    collect();
    assert!(is_live(&inside));
    assert!(!text.as_zone().unwrap().header().is_reclaimed());
    assert!(loose.as_zone().unwrap().header().is_reclaimed());
    assert_eq!(loose.as_zone().unwrap().rank(), 0);

    root_objects().remove_root_object(&holder);
}

// =============================================================================
// Symbols
// =============================================================================

#[test]
fn test_weak_symbol_is_forgotten() {
    let _lock = GC_LOCK.lock();
    let weak = ObjectZone::make();
    let strong = ObjectZone::make();
    assert!(symbol_table().register_weak_name("gc_liveness_weak", &weak).unwrap());
    assert!(symbol_table().register_strong_name("gc_liveness_strong", &strong).unwrap());

    collect();
    assert!(symbol_table().find_named_object("gc_liveness_weak").is_none());
    assert!(!is_live(&weak));
    let found = symbol_table().find_named_object("gc_liveness_strong").unwrap();
    assert!(found.ptr_eq(&strong));
    assert!(is_live(&strong));

    symbol_table().forget_name("gc_liveness_strong");
    collect();
    assert!(symbol_table().find_named_object("gc_liveness_strong").is_none());
}

// =============================================================================
// Extra roots
// =============================================================================

#[test]
fn test_extra_providers_keep_objects() {
    let _lock = GC_LOCK.lock();
    let by_closure = ObjectZone::make();
    let by_set = ObjectZone::make();
    let pinned = RootSet::new();
    pinned.add(Value::from_object(&by_set));
    let keep = Value::from_object(&by_closure);
    let provider = |t: &mut dyn Tracer| t.trace_value(&keep);

    let outcome = garbage_collector().collect(&[&provider, &pinned]).unwrap();
    assert!(is_live(&by_closure));
    assert!(is_live(&by_set));
    assert!(outcome.nb_roots >= 2);

    pinned.clear();
    collect();
    assert!(!is_live(&by_set));
}

#[test]
fn test_published_frames_are_roots() {
    let _lock = GC_LOCK.lock();
    let local = ObjectZone::make();
    let outer = CallFrame::root();
    outer.push_local(Value::from_object(&local));
    let inner = CallFrame::new(None, None, Some(Arc::clone(&outer)));

    let ob = {
        let guard = frame_registry().register_frame(Arc::clone(&inner));
        collect();
        assert!(is_live(&local));

        // Created between collections, so only the updated frame reaches them.
        let ob = ObjectZone::make();
        let connective = ObjectZone::make();
        let closure = TreeZone::make_closure(&connective, [Value::from_object(&ob)]);
        guard.update(CallFrame::new(None, Some(closure), Some(Arc::clone(&inner))));
        collect();
        assert!(is_live(&local));
        assert!(is_live(&ob));
        assert!(is_live(&connective));
        ob
    };
    collect();
    assert!(!is_live(&local));
    assert!(!is_live(&ob));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_too_deep_nesting_sweeps_nothing() {
    let _lock = GC_LOCK.lock();
    let class = ObjectZone::make();
    let mut deep = Value::from_int(0);
    for _ in 0..150 {
        deep = Value::from(TreeZone::make_instance(&class, [deep]));
    }
    let holder = ObjectZone::make();
    holder.put_attr(&class, deep).unwrap();
    root_objects().add_root_object(&holder);
    let bystander = ObjectZone::make();

    let err = garbage_collector().collect(&[]).unwrap_err();
    assert!(matches!(err, RuntimeError::DepthExceeded { limit: 100, .. }));
    assert!(is_live(&bystander));
    assert!(!garbage_collector().is_running());

    root_objects().remove_root_object(&holder);
    collect();
    assert!(!is_live(&bystander));
    assert!(!is_live(&holder));
}

#[test]
fn test_local_collector_records_stats() {
    let _lock = GC_LOCK.lock();
    let gc = GarbageCollector::new(GcConfig {
        verify_registry: true,
        ..Default::default()
    });
    let _ = ObjectZone::make();
    let first = gc.collect(&[]).unwrap();
    assert!(first.nb_deletes >= 1);
    assert!(first.nb_scans >= first.nb_marks);
    assert_eq!(first.live_zones, first.nb_scans - first.nb_deletes);
    gc.collect(&[]).unwrap();
    assert_eq!(gc.stats().nb_collections(), 2);
    assert!(!gc.should_collect());
}

#[test]
fn test_frame_registry_is_independent() {
    let _lock = GC_LOCK.lock();
    let private = FrameRegistry::new();
    let local = ObjectZone::make();
    let frame = CallFrame::root();
    frame.push_local(Value::from_object(&local));
    let _guard = private.register_frame(frame);
    // Only the process-wide registry is consulted.
    collect();
    assert!(!is_live(&local));
}

// =============================================================================
// Random graphs
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_exactly_the_reachable_objects_survive(
        nb in 2usize..12,
        edges in prop::collection::vec((0usize..12, 0usize..12), 0..24),
        roots in prop::collection::vec(0usize..12, 0..3),
    ) {
        let _lock = GC_LOCK.lock();
        let objects: Vec<ObjectRef> = (0..nb).map(|_| ObjectZone::make()).collect();
        let edges: Vec<(usize, usize)> =
            edges.into_iter().filter(|&(a, b)| a < nb && b < nb).collect();
        let roots: Vec<usize> = roots.into_iter().filter(|&r| r < nb).collect();
        for &(a, b) in &edges {
            objects[a].put_attr(&objects[b], Value::from_int(1)).unwrap();
        }
        for &r in &roots {
            root_objects().add_root_object(&objects[r]);
        }

        let mut reachable = vec![false; nb];
        let mut stack = roots.clone();
        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut reachable[i], true) {
                continue;
            }
            stack.extend(edges.iter().filter(|&&(a, _)| a == i).map(|&(_, b)| b));
        }

        collect();
        for (i, ob) in objects.iter().enumerate() {
            prop_assert_eq!(is_live(ob), reachable[i], "object {}", i);
        }
        for &r in &roots {
            root_objects().remove_root_object(&objects[r]);
        }
    }
}
