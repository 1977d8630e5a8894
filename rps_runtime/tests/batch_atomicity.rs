//! Concurrent readers never observe a partially applied batch.
//!
//! Writers keep every attribute of a batch equal to the same generation
//! number; readers check that a two-key read and a snapshot always agree.

use rps_runtime::{ObjectRef, ObjectZone, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const ROUNDS: i64 = 2_000;

#[test]
fn test_put_attr4_is_atomic_for_readers() {
    let ob = ObjectZone::make();
    let keys: Arc<Vec<ObjectRef>> = Arc::new((0..4).map(|_| ObjectZone::make()).collect());
    let gen0 = Value::from_int(0);
    ob.put_attr4(
        &keys[0],
        gen0.clone(),
        &keys[1],
        gen0.clone(),
        &keys[2],
        gen0.clone(),
        &keys[3],
        gen0,
    )
    .unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let ob = ob.clone();
            let keys = Arc::clone(&keys);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0usize;
                while !done.load(Ordering::Acquire) || checks == 0 {
                    let pair = ob.get_attr2(&keys[0], &keys[3]).unwrap();
                    assert_eq!(pair.main, pair.extra);
                    let snapshot = ob.attributes_snapshot();
                    assert_eq!(snapshot.len(), 4);
                    assert!(snapshot.iter().all(|(_, v)| *v == snapshot[0].1));
                    checks += 1;
                }
                checks
            })
        })
        .collect();

    for generation in 1..=ROUNDS {
        let v = Value::from_int(generation);
        ob.put_attr4(&keys[0], v.clone(), &keys[1], v.clone(), &keys[2], v.clone(), &keys[3], v)
            .unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    assert_eq!(ob.get_attr1(&keys[2]).unwrap(), Value::from_int(ROUNDS));
}

#[test]
fn test_exchange_attr2_is_atomic_for_readers() {
    let ob = ObjectZone::make();
    let a = ObjectZone::make();
    let b = ObjectZone::make();
    ob.put_attr2(&a, Value::from_int(0), &b, Value::from_int(0)).unwrap();

    let reader = {
        let (ob, a, b) = (ob.clone(), a.clone(), b.clone());
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                let pair = ob.get_attr2(&a, &b).unwrap();
                assert_eq!(pair.main, pair.extra);
            }
        })
    };
    for generation in 1..=ROUNDS {
        let [old_a, old_b] = ob
            .exchange_attr2(&a, Value::from_int(generation), &b, Value::from_int(generation))
            .unwrap();
        assert_eq!(old_a, old_b);
    }
    reader.join().unwrap();
}
