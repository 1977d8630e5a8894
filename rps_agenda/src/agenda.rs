//! The agenda: prioritized FIFO queues of tasklets and the worker pool
//! draining them.
//!
//! ```text
//!   add_tasklet(High, t) ──▶ ┌──────────────┐
//!                            │ high   [t]   │   fetch: highest non-empty
//!   add_tasklet(Low, u)  ──▶ │ normal []    │   queue first, FIFO within
//!                            │ low    [u]   │   a queue
//!                            │ idle   []    │
//!                            └──────┬───────┘
//!                                   │ condvar
//!            ┌──────────────┬───────┴──────┐
//!            ▼              ▼              ▼
//!        worker #0      worker #1      worker #2
//!        Idle/Run       Idle/Run       Idle/Run
//!            │   gc requested: all reach GC state, the last to   │
//!            └── arrive collects, everyone goes EndGC then Idle ─┘
//! ```
//!
//! There is no starvation guard: a steady supply of high priority work
//! delays lower priorities indefinitely.

use crate::config::{AgendaConfig, ConfigError};
use crate::priority::Priority;
use crate::stats::AgendaStats;
use crate::worker::{self, WorkerState};
use parking_lot::{Condvar, Mutex, MutexGuard};
use rps_gc::{RootProvider, garbage_collector};
use rps_runtime::persist::object_json;
use rps_runtime::{
    DumpVisitor, ObjectRef, Payload, RuntimeError, RuntimeResult, Tracer, ZoneType, predefined,
    zone_registry,
};
use serde_json::{Map, Value as Json};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Instant;

/// State protected by the agenda mutex.
pub(crate) struct Shared {
    fifos: [VecDeque<ObjectRef>; Priority::COUNT],
    /// Workers that reached the GC safe point in the current round.
    pub(crate) gc_arrived: usize,
    /// A worker is collecting.
    pub(crate) gc_leading: bool,
    /// Completed GC rounds.
    pub(crate) gc_epoch: u64,
}

impl Shared {
    fn pop(&mut self) -> Option<ObjectRef> {
        self.fifos.iter_mut().rev().find_map(VecDeque::pop_front)
    }
}

/// A scheduler of tasklets over a fixed pool of worker threads.
pub struct Agenda {
    pub(crate) config: AgendaConfig,
    pub(crate) shared: Mutex<Shared>,
    pub(crate) changed: Condvar,
    running: AtomicBool,
    gc_requested: AtomicBool,
    states: Box<[AtomicU8]>,
    deadline: Mutex<Option<Instant>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) stats: AgendaStats,
}

impl Agenda {
    /// Create a stopped agenda after validating `config`.
    pub fn new(config: AgendaConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AgendaConfig) -> Arc<Self> {
        let states = (0..config.nb_workers)
            .map(|_| AtomicU8::new(WorkerState::None as u8))
            .collect();
        Arc::new(Self {
            config,
            shared: Mutex::new(Shared {
                fifos: Default::default(),
                gc_arrived: 0,
                gc_leading: false,
                gc_epoch: 0,
            }),
            changed: Condvar::new(),
            running: AtomicBool::new(false),
            gc_requested: AtomicBool::new(false),
            states,
            deadline: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
            stats: AgendaStats::new(),
        })
    }

    /// The configuration.
    #[inline]
    pub fn config(&self) -> &AgendaConfig {
        &self.config
    }

    /// Activity counters.
    #[inline]
    pub fn stats(&self) -> &AgendaStats {
        &self.stats
    }

    // =========================================================================
    // Queues
    // =========================================================================

    /// Queue `tasklet` at the back of the `prio` queue and wake the workers.
    pub fn add_tasklet(&self, prio: Priority, tasklet: &ObjectRef) {
        self.shared.lock().fifos[prio.index()].push_back(tasklet.clone());
        log::trace!("queued tasklet {} at {prio}", tasklet.oid());
        self.changed.notify_all();
    }

    /// Remove and return the front tasklet of the highest non-empty queue.
    pub fn fetch_tasklet_to_run(&self) -> Option<ObjectRef> {
        self.shared.lock().pop()
    }

    /// Number of queued tasklets, all priorities together.
    pub fn nb_pending(&self) -> usize {
        self.shared.lock().fifos.iter().map(VecDeque::len).sum()
    }

    /// Number of tasklets queued at `prio`.
    pub fn nb_pending_at(&self, prio: Priority) -> usize {
        self.shared.lock().fifos[prio.index()].len()
    }

    /// Wait at most one idle period for a tasklet.
    pub(crate) fn wait_tasklet(&self, ix: usize) -> Option<ObjectRef> {
        let mut shared = self.shared.lock();
        if let Some(tasklet) = shared.pop() {
            return Some(tasklet);
        }
        if !self.is_running() || self.gc_requested() {
            return None;
        }
        self.set_worker_state(ix, WorkerState::Idle);
        self.changed.wait_for(&mut shared, self.config.idle_wait);
        shared.pop()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the worker threads.
    ///
    /// # Errors
    ///
    /// A protocol violation when the agenda is already running or a worker
    /// thread cannot be spawned.
    pub fn start(self: &Arc<Self>) -> RuntimeResult<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RuntimeError::protocol("start agenda", None, "agenda is already running"));
        }
        if let Err(err) = garbage_collector().configure(self.config.collector_config()) {
            log::warn!("agenda keeps the current collector configuration: {err}");
        }
        *self.deadline.lock() = self.config.run_delay.map(|delay| Instant::now() + delay);
        // Every worker counts for the GC rendezvous before its thread runs.
        for ix in 0..self.config.nb_workers {
            self.set_worker_state(ix, WorkerState::Idle);
        }
        let mut threads = self.threads.lock();
        for ix in 0..self.config.nb_workers {
            let agenda = Arc::clone(self);
            let spawned = std::thread::Builder::new()
                .name(format!("rps-agw#{ix}"))
                .spawn(move || worker::run_worker(&agenda, ix));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    self.release_workers_from(ix);
                    drop(threads);
                    self.stop();
                    return Err(RuntimeError::protocol(
                        "start agenda",
                        None,
                        format!("cannot spawn worker #{ix}: {err}"),
                    ));
                }
            }
        }
        log::debug!("agenda started with {} workers", self.config.nb_workers);
        Ok(())
    }

    /// Ask every worker to exit after its current tasklet.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _shared = self.shared.lock();
        self.changed.notify_all();
    }

    /// Wait for every worker thread to exit.
    pub fn join(&self) {
        let threads = std::mem::take(&mut *self.threads.lock());
        for handle in threads {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                log::warn!("agenda worker {name:?} panicked");
            }
        }
        log::debug!("agenda joined");
    }

    /// Start the workers and block until the agenda is stopped, either by
    /// [`stop`](Self::stop) or when the run delay expires.
    pub fn run_agenda_mechanism(self: &Arc<Self>) -> RuntimeResult<()> {
        self.start()?;
        {
            let mut shared = self.shared.lock();
            while self.is_running() {
                self.changed.wait_for(&mut shared, self.config.idle_wait);
            }
        }
        self.join();
        self.stats.log_summary();
        garbage_collector()
            .stats()
            .log_summary(zone_registry().allocated_words());
        Ok(())
    }

    /// Whether workers are dispatching tasklets.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the run delay has expired.
    pub(crate) fn deadline_passed(&self) -> bool {
        self.deadline.lock().is_some_and(|deadline| Instant::now() >= deadline)
    }

    // =========================================================================
    // Worker States
    // =========================================================================

    /// State of worker `ix`, `None` when out of range.
    pub fn worker_state(&self, ix: usize) -> Option<WorkerState> {
        self.states
            .get(ix)
            .map(|state| WorkerState::from_u8(state.load(Ordering::Acquire)))
    }

    pub(crate) fn set_worker_state(&self, ix: usize, state: WorkerState) {
        if let Some(slot) = self.states.get(ix) {
            slot.store(state as u8, Ordering::Release);
        }
    }

    /// Drop workers `first..` from the rendezvous count after a failed spawn.
    fn release_workers_from(&self, first: usize) {
        for ix in first..self.states.len() {
            self.set_worker_state(ix, WorkerState::None);
        }
    }

    /// Workers whose thread has not exited.
    pub(crate) fn nb_live_workers(&self) -> usize {
        self.states
            .iter()
            .filter(|state| state.load(Ordering::Acquire) != WorkerState::None as u8)
            .count()
    }

    // =========================================================================
    // Garbage Collection
    // =========================================================================

    /// Ask the workers to rendezvous for a collection after their current
    /// tasklets.
    pub fn request_garbage_collection(&self) {
        self.gc_requested.store(true, Ordering::Release);
        let _shared = self.shared.lock();
        self.changed.notify_all();
    }

    /// Whether a collection is pending.
    #[inline]
    pub fn gc_requested(&self) -> bool {
        self.gc_requested.load(Ordering::Acquire)
    }

    /// Whether allocation since the last collection passed the collector's
    /// threshold, which `start` set from `gc_threshold_words`.
    pub(crate) fn allocation_exceeded(&self) -> bool {
        garbage_collector().should_collect()
    }

    /// Collect with every worker parked. Called by the last worker to
    /// reach the safe point, without the agenda lock.
    pub(crate) fn collect_now(&self, ix: usize) {
        log::debug!("agenda worker #{ix} collecting");
        match garbage_collector().collect(&[self as &dyn RootProvider]) {
            Ok(outcome) => {
                AgendaStats::bump(&self.stats.collections);
                log::debug!("agenda collection reclaimed {} zones", outcome.nb_deletes);
            }
            Err(err) => log::error!("agenda collection failed: {err}"),
        }
    }

    pub(crate) fn finish_gc_round(&self, shared: &mut MutexGuard<'_, Shared>) {
        shared.gc_arrived = 0;
        shared.gc_leading = false;
        shared.gc_epoch += 1;
        self.gc_requested.store(false, Ordering::Release);
        self.changed.notify_all();
    }

    // =========================================================================
    // Marking and Dumping
    // =========================================================================

    /// Mark every queued tasklet. Returns how many.
    pub fn gc_mark_queues(&self, tracer: &mut dyn Tracer) -> usize {
        let queued: Vec<ObjectRef> = {
            let shared = self.shared.lock();
            shared.fifos.iter().flatten().cloned().collect()
        };
        for tasklet in &queued {
            tracer.trace_object(tasklet);
        }
        queued.len()
    }

    /// Report every queued tasklet to a dumper.
    pub fn dump_scan_agenda(&self, visitor: &mut dyn DumpVisitor) {
        let queued: Vec<ObjectRef> = {
            let shared = self.shared.lock();
            shared.fifos.iter().flatten().cloned().collect()
        };
        for tasklet in &queued {
            visitor.scan_object(tasklet);
        }
    }

    /// Write the non-empty queues, keyed by priority name.
    pub fn dump_json_agenda(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        let shared = self.shared.lock();
        for prio in Priority::ALL {
            let fifo = &shared.fifos[prio.index()];
            if fifo.is_empty() {
                continue;
            }
            let seq = fifo
                .iter()
                .filter(|ob| visitor.is_dumpable(ob))
                .map(|ob| object_json(ob, visitor))
                .collect();
            map.insert(prio.name().into(), Json::Array(seq));
        }
    }
}

impl RootProvider for Agenda {
    fn trace_roots(&self, tracer: &mut dyn Tracer) {
        self.gc_mark_queues(tracer);
    }
}

impl fmt::Debug for Agenda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agenda")
            .field("running", &self.is_running())
            .field("nb_workers", &self.config.nb_workers)
            .field("nb_pending", &self.nb_pending())
            .finish()
    }
}

// =============================================================================
// Agenda Payload
// =============================================================================

/// Payload of the agenda object, exposing the queues to marking and dumps.
#[derive(Debug)]
pub struct AgendaPayload {
    agenda: Arc<Agenda>,
}

impl AgendaPayload {
    /// Wrap an agenda.
    pub fn new(agenda: Arc<Agenda>) -> Self {
        Self { agenda }
    }

    /// The wrapped agenda.
    pub fn agenda(&self) -> &Arc<Agenda> {
        &self.agenda
    }
}

impl Payload for AgendaPayload {
    fn payload_type(&self) -> ZoneType {
        ZoneType::PaylAgenda
    }

    fn is_erasable(&self) -> bool {
        false
    }

    fn gc_mark(&self, tracer: &mut dyn Tracer) {
        self.agenda.gc_mark_queues(tracer);
    }

    fn dump_scan(&self, visitor: &mut dyn DumpVisitor) {
        self.agenda.dump_scan_agenda(visitor);
    }

    fn dump_json_content(&self, visitor: &dyn DumpVisitor, map: &mut Map<String, Json>) {
        self.agenda.dump_json_agenda(visitor, map);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The process-wide agenda, with default configuration.
///
/// Its [`AgendaPayload`] is installed on the predefined agenda object.
pub fn agenda() -> &'static Arc<Agenda> {
    static AGENDA: OnceLock<Arc<Agenda>> = OnceLock::new();
    AGENDA.get_or_init(|| {
        let agenda = Agenda::build(AgendaConfig::default());
        let payload = AgendaPayload::new(Arc::clone(&agenda));
        if let Err(err) = predefined().agenda_object().put_payload(Box::new(payload)) {
            log::warn!("agenda payload not installed: {err}");
        }
        agenda
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_runtime::ObjectZone;
    use rps_runtime::trace::CollectingTracer;

    struct AllDumpable;

    impl DumpVisitor for AllDumpable {
        fn scan_object(&mut self, _ob: &ObjectRef) {}
    }

    fn stopped_agenda() -> Arc<Agenda> {
        Agenda::new(AgendaConfig::testing()).unwrap()
    }

    // =========================================================================
    // Queues
    // =========================================================================

    #[test]
    fn test_priority_then_fifo() {
        let agenda = stopped_agenda();
        let a = ObjectZone::make();
        let b = ObjectZone::make();
        let c = ObjectZone::make();
        agenda.add_tasklet(Priority::Low, &a);
        agenda.add_tasklet(Priority::High, &b);
        agenda.add_tasklet(Priority::Low, &c);
        assert_eq!(agenda.nb_pending(), 3);
        assert_eq!(agenda.nb_pending_at(Priority::Low), 2);

        let order: Vec<ObjectRef> = std::iter::from_fn(|| agenda.fetch_tasklet_to_run()).collect();
        assert_eq!(order, vec![b, a, c]);
        assert_eq!(agenda.nb_pending(), 0);
    }

    #[test]
    fn test_idle_priority_runs_last() {
        let agenda = stopped_agenda();
        let idle = ObjectZone::make();
        let normal = ObjectZone::make();
        agenda.add_tasklet(Priority::Idle, &idle);
        agenda.add_tasklet(Priority::Normal, &normal);
        assert_eq!(agenda.fetch_tasklet_to_run(), Some(normal));
        assert_eq!(agenda.fetch_tasklet_to_run(), Some(idle));
        assert_eq!(agenda.fetch_tasklet_to_run(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AgendaConfig {
            nb_workers: 0,
            ..AgendaConfig::testing()
        };
        assert_eq!(Agenda::new(config).unwrap_err(), ConfigError::TooFewWorkers);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[test]
    fn test_worker_states_before_start() {
        let agenda = stopped_agenda();
        assert_eq!(agenda.worker_state(0), Some(WorkerState::None));
        assert_eq!(agenda.worker_state(2), None);
        assert!(!agenda.is_running());
        assert_eq!(agenda.nb_live_workers(), 0);
    }

    #[test]
    fn test_unspawned_workers_leave_rendezvous() {
        let agenda = Agenda::new(AgendaConfig {
            nb_workers: 4,
            ..AgendaConfig::testing()
        })
        .unwrap();
        for ix in 0..4 {
            agenda.set_worker_state(ix, WorkerState::Idle);
        }
        agenda.release_workers_from(1);
        assert_eq!(agenda.worker_state(0), Some(WorkerState::Idle));
        for ix in 1..4 {
            assert_eq!(agenda.worker_state(ix), Some(WorkerState::None));
        }
        assert_eq!(agenda.nb_live_workers(), 1);
    }

    #[test]
    fn test_stop_without_start() {
        let agenda = stopped_agenda();
        agenda.stop();
        agenda.join();
        assert!(!agenda.is_running());
    }

    // =========================================================================
    // Marking and Dumping
    // =========================================================================

    #[test]
    fn test_queues_are_marked() {
        let agenda = stopped_agenda();
        let a = ObjectZone::make();
        let b = ObjectZone::make();
        agenda.add_tasklet(Priority::Normal, &a);
        agenda.add_tasklet(Priority::Idle, &b);
        let mut tracer = CollectingTracer::default();
        assert_eq!(agenda.gc_mark_queues(&mut tracer), 2);
        assert!(tracer.objects.contains(&a));
        assert!(tracer.objects.contains(&b));
    }

    #[test]
    fn test_json_lists_non_empty_queues() {
        let agenda = stopped_agenda();
        let a = ObjectZone::make();
        agenda.add_tasklet(Priority::High, &a);
        let payload = AgendaPayload::new(Arc::clone(&agenda));
        assert!(!payload.is_erasable());
        let mut map = Map::new();
        payload.dump_json_content(&AllDumpable, &mut map);
        assert_eq!(map.len(), 1);
        assert_eq!(map["high_priority"], serde_json::json!([a.oid().to_string()]));
    }

    #[test]
    fn test_global_agenda_payload() {
        let installed = agenda();
        let same = predefined()
            .agenda_object()
            .with_payload::<AgendaPayload, _>(|payload| Arc::ptr_eq(payload.agenda(), installed))
            .unwrap();
        assert!(same);
        assert!(!installed.is_running());
    }
}
