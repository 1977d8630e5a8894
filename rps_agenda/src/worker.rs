//! Worker threads.
//!
//! Each worker runs a small state machine, published in the agenda's
//! state array and in the state of its call frame:
//!
//! ```text
//!   None ──start──▶ Idle ◀──────────────┐
//!                    │ tasklet fetched  │ tasklet done
//!                    ▼                  │
//!                   Run ────────────────┘
//!                    │ gc requested (between tasklets)
//!                    ▼
//!                    GC ──round complete──▶ EndGC ──▶ Idle
//! ```
//!
//! The round completes once every live worker is in `GC`; the last one to
//! arrive runs the collection.

use crate::agenda::Agenda;
use crate::stats::AgendaStats;
use crate::tasklet::TaskletPayload;
use parking_lot::MutexGuard;
use rps_gc::frame_registry;
use rps_runtime::{CallFrame, ObjectRef, Value, predefined};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Scheduling state of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WorkerState {
    /// Not started, or exited.
    None = 0,
    /// Waiting for a tasklet.
    Idle = 1,
    /// Running a tasklet.
    Run = 2,
    /// Parked at the GC safe point.
    Gc = 3,
    /// Collection over, about to go idle.
    EndGc = 4,
}

impl WorkerState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => WorkerState::Idle,
            2 => WorkerState::Run,
            3 => WorkerState::Gc,
            4 => WorkerState::EndGc,
            _ => WorkerState::None,
        }
    }
}

/// Body of worker thread `ix`.
pub(crate) fn run_worker(agenda: &Arc<Agenda>, ix: usize) {
    let frame = CallFrame::new(Some(predefined().agenda_object().clone()), None, None);
    frame.set_local(0, Value::from_int(ix as i64));
    let _published = frame_registry().register_frame(Arc::clone(&frame));
    log::debug!("agenda worker #{ix} started");

    while agenda.is_running() {
        if agenda.gc_requested() {
            enter(agenda, &frame, ix, WorkerState::Gc);
            garbage_collect_rendezvous(agenda, ix);
            enter(agenda, &frame, ix, WorkerState::EndGc);
            enter(agenda, &frame, ix, WorkerState::Idle);
            continue;
        }
        if agenda.deadline_passed() {
            log::info!("agenda run delay expired");
            agenda.stop();
            break;
        }
        let Some(tasklet) = agenda.wait_tasklet(ix) else {
            continue;
        };
        enter(agenda, &frame, ix, WorkerState::Run);
        run_tasklet(agenda, &frame, &tasklet);
        enter(agenda, &frame, ix, WorkerState::Idle);
        if agenda.allocation_exceeded() {
            agenda.request_garbage_collection();
        }
    }

    enter(agenda, &frame, ix, WorkerState::None);
    let _shared = agenda.shared.lock();
    agenda.changed.notify_all();
    log::debug!("agenda worker #{ix} stopped");
}

fn enter(agenda: &Agenda, frame: &CallFrame, ix: usize, state: WorkerState) {
    agenda.set_worker_state(ix, state);
    frame.set_state(state as i32);
}

/// Park until the current GC round is over, collecting if this worker is
/// the last live one to arrive.
fn garbage_collect_rendezvous(agenda: &Agenda, ix: usize) {
    let mut shared = agenda.shared.lock();
    let epoch = shared.gc_epoch;
    shared.gc_arrived += 1;
    agenda.changed.notify_all();
    while shared.gc_epoch == epoch {
        if !shared.gc_leading && shared.gc_arrived >= agenda.nb_live_workers() {
            shared.gc_leading = true;
            MutexGuard::unlocked(&mut shared, || agenda.collect_now(ix));
            agenda.finish_gc_round(&mut shared);
            break;
        }
        agenda.changed.wait_for(&mut shared, agenda.config.idle_wait);
    }
}

/// Apply the tasklet's closure to the tasklet, holding both in the
/// worker frame while it runs.
fn run_tasklet(agenda: &Agenda, frame: &Arc<CallFrame>, tasklet: &ObjectRef) {
    let todo = tasklet.with_payload::<TaskletPayload, _>(|task| (task.closure().cloned(), task.is_obsolete()));
    let closure = match todo {
        Err(err) => {
            log::warn!("agenda dropped {}: {err}", tasklet.oid());
            AgendaStats::bump(&agenda.stats.tasklets_failed);
            return;
        }
        Ok((_, true)) => {
            log::warn!("agenda skipped obsolete tasklet {}", tasklet.oid());
            AgendaStats::bump(&agenda.stats.tasklets_skipped);
            return;
        }
        Ok((None, false)) => {
            log::warn!("agenda skipped tasklet {} without closure", tasklet.oid());
            AgendaStats::bump(&agenda.stats.tasklets_skipped);
            return;
        }
        Ok((Some(closure), false)) => closure,
    };

    frame.set_local(1, Value::from_object(tasklet));
    frame.set_local(2, Value::from(Arc::clone(&closure)));
    let outcome = catch_unwind(AssertUnwindSafe(|| closure.apply1(frame, Value::from_object(tasklet))));
    frame.set_local(1, Value::Empty);
    frame.set_local(2, Value::Empty);

    match outcome {
        Ok(Ok(_)) => AgendaStats::bump(&agenda.stats.tasklets_run),
        Ok(Err(err)) => {
            log::warn!("tasklet {} failed: {err}", tasklet.oid());
            AgendaStats::bump(&agenda.stats.tasklets_failed);
        }
        Err(panic) => {
            log::warn!("tasklet {} panicked: {}", tasklet.oid(), panic_message(&*panic));
            AgendaStats::bump(&agenda.stats.tasklets_failed);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes_round_trip() {
        for state in [
            WorkerState::None,
            WorkerState::Idle,
            WorkerState::Run,
            WorkerState::Gc,
            WorkerState::EndGc,
        ] {
            assert_eq!(WorkerState::from_u8(state as u8), state);
        }
        assert_eq!(WorkerState::from_u8(200), WorkerState::None);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(3);
        assert_eq!(panic_message(&*boxed), "non-string panic");
    }
}
