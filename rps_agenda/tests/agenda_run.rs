//! Running tasklets on worker threads.
//!
//! No collection runs in this binary: every agenda here has an unreachable
//! GC threshold.

use parking_lot::Mutex;
use rps_agenda::{Agenda, AgendaConfig, Priority, TaskletPayload, WorkerState, make_tasklet};
use rps_runtime::{
    ApplyingFn, CallFrame, ObjectRef, ObjectZone, RuntimeError, TreeZone, TwoValues, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn config(nb_workers: usize) -> AgendaConfig {
    AgendaConfig {
        nb_workers,
        gc_threshold_words: u64::MAX,
        ..AgendaConfig::testing()
    }
}

fn closure_of(applying: ApplyingFn) -> Arc<TreeZone> {
    let connective = ObjectZone::make();
    connective.put_applying_function(Some(applying));
    TreeZone::make_closure(&connective, [])
}

fn logging_tasklet(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> ObjectRef {
    let log = Arc::clone(log);
    let applying: ApplyingFn = Arc::new(move |_frame: &Arc<CallFrame>, _closure: &Arc<TreeZone>, _args: &[Value]| {
        log.lock().push(tag);
        Ok(TwoValues::default())
    });
    make_tasklet(&closure_of(applying)).unwrap()
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn shutdown(agenda: &Agenda) {
    agenda.stop();
    agenda.join();
    for ix in 0..agenda.config().nb_workers {
        assert_eq!(agenda.worker_state(ix), Some(WorkerState::None));
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_high_priority_runs_before_earlier_low() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let agenda = Agenda::new(config(1)).unwrap();
    agenda.add_tasklet(Priority::Low, &logging_tasklet(&log, "A"));
    agenda.add_tasklet(Priority::High, &logging_tasklet(&log, "B"));
    agenda.add_tasklet(Priority::Low, &logging_tasklet(&log, "C"));

    agenda.start().unwrap();
    wait_until("three tasklets", || log.lock().len() == 3);
    shutdown(&agenda);
    assert_eq!(*log.lock(), vec!["B", "A", "C"]);
    assert_eq!(agenda.stats().nb_run(), 3);
}

#[test]
fn test_tasklet_receives_itself() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let applying: ApplyingFn = Arc::new(move |frame: &Arc<CallFrame>, _closure: &Arc<TreeZone>, args: &[Value]| {
        *sink.lock() = Some((args[0].as_object()?, frame.depth()));
        Ok(TwoValues::default())
    });
    let tasklet = make_tasklet(&closure_of(applying)).unwrap();
    let agenda = Agenda::new(config(1)).unwrap();
    agenda.add_tasklet(Priority::Normal, &tasklet);
    agenda.start().unwrap();
    wait_until("the tasklet", || seen.lock().is_some());
    shutdown(&agenda);

    let (received, depth) = seen.lock().take().unwrap();
    assert_eq!(received, tasklet);
    assert_eq!(depth, 2);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_failures_are_counted_and_workers_continue() {
    let panicking: ApplyingFn = Arc::new(|_: &Arc<CallFrame>, _: &Arc<TreeZone>, _: &[Value]| panic!("tasklet panic"));
    let failing: ApplyingFn = Arc::new(|_: &Arc<CallFrame>, _: &Arc<TreeZone>, _: &[Value]| {
        Err(RuntimeError::InvalidArgument("tasklet failure".into()))
    });
    let log = Arc::new(Mutex::new(Vec::new()));
    let agenda = Agenda::new(config(1)).unwrap();
    agenda.add_tasklet(Priority::Normal, &make_tasklet(&closure_of(panicking)).unwrap());
    agenda.add_tasklet(Priority::Normal, &make_tasklet(&closure_of(failing)).unwrap());
    agenda.add_tasklet(Priority::Normal, &ObjectZone::make());
    agenda.add_tasklet(Priority::Normal, &logging_tasklet(&log, "after"));

    agenda.start().unwrap();
    wait_until("the last tasklet", || !log.lock().is_empty());
    shutdown(&agenda);
    assert_eq!(agenda.stats().nb_failed(), 3);
    assert_eq!(agenda.stats().nb_run(), 1);
}

#[test]
fn test_obsolete_tasklet_is_skipped() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let stale = logging_tasklet(&log, "stale");
    stale
        .with_payload_mut::<TaskletPayload, _>(|task| task.put_obsolescence(Some(0.0)))
        .unwrap();
    let agenda = Agenda::new(config(1)).unwrap();
    agenda.add_tasklet(Priority::High, &stale);
    agenda.add_tasklet(Priority::Low, &logging_tasklet(&log, "fresh"));

    agenda.start().unwrap();
    wait_until("the fresh tasklet", || !log.lock().is_empty());
    shutdown(&agenda);
    assert_eq!(*log.lock(), vec!["fresh"]);
    assert_eq!(agenda.stats().nb_skipped(), 1);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_many_workers_drain_the_queues() {
    let count = Arc::new(AtomicUsize::new(0));
    let agenda = Agenda::new(config(4)).unwrap();
    for i in 0..100 {
        let count = Arc::clone(&count);
        let applying: ApplyingFn = Arc::new(move |_: &Arc<CallFrame>, _: &Arc<TreeZone>, _: &[Value]| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(TwoValues::default())
        });
        let prio = Priority::ALL[i % Priority::COUNT];
        agenda.add_tasklet(prio, &make_tasklet(&closure_of(applying)).unwrap());
    }
    agenda.start().unwrap();
    wait_until("a hundred tasklets", || count.load(Ordering::SeqCst) == 100);
    assert_eq!(agenda.nb_pending(), 0);
    shutdown(&agenda);
    assert_eq!(agenda.stats().nb_run(), 100);
}

#[test]
fn test_start_twice_is_refused() {
    let agenda = Agenda::new(config(1)).unwrap();
    agenda.start().unwrap();
    let err = agenda.start().unwrap_err();
    assert!(err.is_protocol_violation());
    shutdown(&agenda);
    assert!(!agenda.is_running());
}

#[test]
fn test_run_delay_stops_the_mechanism() {
    let agenda = Agenda::new(AgendaConfig {
        run_delay: Some(Duration::from_millis(100)),
        ..config(2)
    })
    .unwrap();
    let started = Instant::now();
    agenda.run_agenda_mechanism().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(!agenda.is_running());
    for ix in 0..2 {
        assert_eq!(agenda.worker_state(ix), Some(WorkerState::None));
    }
}
