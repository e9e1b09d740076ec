use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bevy::log::{debug, error, trace, warn};
use bevy::prelude::Resource;
use bevy::utils::HashSet;

use crate::config::SchedulerConfig;
use crate::directive::{interpret, Directive, Pump, Verdict};
use crate::error::SchedulerError;
use crate::factory::{RoutineArg, RoutineTable};
use crate::function_routine::{FunctionRoutine, Scope};
use crate::handle::{RoutineHandle, RoutineOutput};
use crate::id_alloc::{RoutineId, RoutineIds};
use crate::manager::ManagerId;
use crate::Routine;

use self::context::RoutineContext;
use self::record::Record;

pub use self::record::Lifecycle;

pub mod context;
mod record;

/// Owns every registered routine and drives them from two pumps: [`frame_tick`] once per
/// rendered frame and [`fixed_tick`] once per fixed-timestep tick. Each pump only visits the
/// records whose latched directive it owns, in registration order.
///
/// [`frame_tick`]: Scheduler::frame_tick
/// [`fixed_tick`]: Scheduler::fixed_tick
#[derive(Resource)]
pub struct Scheduler {
    records: Vec<Record>,
    live: HashSet<RoutineId>,
    routines: RoutineTable,
    ids: RoutineIds,
    config: SchedulerConfig,
    frames_since_fixed: u32,
    fixed_since_frame: u32,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Scheduler {
            records: Vec::with_capacity(config.initial_capacity),
            live: HashSet::default(),
            routines: RoutineTable::default(),
            ids: RoutineIds::new(),
            config,
            frames_since_fixed: 0,
            fixed_since_frame: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// The table of named routine factories used by [`start`](Scheduler::start).
    pub fn routines(&self) -> &RoutineTable {
        &self.routines
    }

    pub fn routines_mut(&mut self) -> &mut RoutineTable {
        &mut self.routines
    }

    /// Register a routine under a logical name. It is first resumed by the next frame pump.
    pub fn register<R: Routine>(
        &mut self,
        owner: Option<ManagerId>,
        name: impl Into<Arc<str>>,
        routine: R,
    ) -> RoutineHandle {
        self.push(owner, name.into(), Box::pin(routine))
    }

    /// Register an async routine. It receives a [`Scope`] to suspend with.
    pub fn start_async<C, F>(
        &mut self,
        owner: Option<ManagerId>,
        name: impl Into<Arc<str>>,
        closure: C,
    ) -> RoutineHandle
    where
        C: FnOnce(Scope) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        self.register(owner, name, FunctionRoutine::new(closure))
    }

    /// Register an async routine, returning a receiver for the value it completes with.
    pub fn start_async_with_output<C, F, T>(
        &mut self,
        owner: Option<ManagerId>,
        name: impl Into<Arc<str>>,
        closure: C,
    ) -> (RoutineHandle, RoutineOutput<T>)
    where
        C: FnOnce(Scope) -> F,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (routine, output) = FunctionRoutine::with_output(closure);
        (self.register(owner, name, routine), output)
    }

    /// Build the routine registered in the factory table under `name` and register it under
    /// that same name.
    pub fn start(
        &mut self,
        owner: Option<ManagerId>,
        name: &str,
        arg: Option<RoutineArg>,
    ) -> Result<RoutineHandle, SchedulerError> {
        match self.routines.build(name, arg) {
            Ok(routine) => Ok(self.push(owner, name.into(), routine)),
            Err(err) => {
                warn!(?owner, "cannot start routine: {err}");
                Err(err)
            }
        }
    }

    /// Shorthand for [`start`](Scheduler::start) with a single typed argument.
    pub fn start_with<A: Any + Send>(
        &mut self,
        owner: Option<ManagerId>,
        name: &str,
        arg: A,
    ) -> Result<RoutineHandle, SchedulerError> {
        self.start(owner, name, Some(Box::new(arg)))
    }

    /// Remove every routine registered under `name`, whoever registered it. Returns how many
    /// were removed.
    pub fn cancel(&mut self, owner: Option<ManagerId>, name: &str) -> usize {
        let removed = retire_named(&mut self.records, &mut self.live, name);
        self.records.retain(|r| !r.is_retired());
        if removed > 0 {
            debug!(?owner, routine = name, removed, "cancelled");
        }
        removed
    }

    /// Remove every routine. Meant for application teardown.
    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            debug!(count = self.records.len(), "clearing all routines");
        }
        self.records.clear();
        self.live.clear();
    }

    /// Run the frame pump. Should be called once per frame, after the other per-frame work.
    pub fn frame_tick(&mut self, delta: Duration) {
        self.frames_since_fixed = self.frames_since_fixed.saturating_add(1);
        self.fixed_since_frame = 0;
        self.detect_stalls(Pump::Fixed, self.frames_since_fixed);
        self.pump(Pump::Frame, delta);
    }

    /// Run the fixed pump. Should be called once per fixed-timestep tick, before the other
    /// fixed-tick work.
    pub fn fixed_tick(&mut self, fixed_delta: Duration) {
        self.fixed_since_frame = self.fixed_since_frame.saturating_add(1);
        self.frames_since_fixed = 0;
        self.detect_stalls(Pump::Frame, self.fixed_since_frame);
        self.pump(Pump::Fixed, fixed_delta);
    }

    /// Run the frame pump until no routine is left, or `max_frames` frames went by. Returns the
    /// number of frames run.
    pub fn tick_until_empty(&mut self, delta: Duration, max_frames: usize) -> usize {
        let mut frames = 0;
        while !self.is_empty() && frames < max_frames {
            self.frame_tick(delta);
            frames += 1;
        }
        frames
    }

    /// Number of registered routines, draining ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if at least one routine is registered under `name`.
    pub fn is_running(&self, name: &str) -> bool {
        self.records.iter().any(|r| &*r.name == name)
    }

    /// Number of routines registered under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.records.iter().filter(|r| &*r.name == name).count()
    }

    /// Returns true once the routine behind `handle` is gone for good.
    pub fn is_retired(&self, handle: &RoutineHandle) -> bool {
        !self.live.contains(&handle.id())
    }

    /// The directive the routine is currently suspended on.
    pub fn directive(&self, handle: &RoutineHandle) -> Option<Directive> {
        self.find(handle.id()).map(|r| r.directive)
    }

    pub fn lifecycle(&self, handle: &RoutineHandle) -> Option<Lifecycle> {
        self.find(handle.id()).map(|r| r.lifecycle)
    }

    /// Routines reported as stuck on a pump that stopped ticking.
    pub fn stalled(&self) -> Vec<RoutineHandle> {
        self.records
            .iter()
            .filter(|r| r.stalled)
            .map(Record::handle)
            .collect()
    }

    fn find(&self, id: RoutineId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    fn push(
        &mut self,
        owner: Option<ManagerId>,
        name: Arc<str>,
        routine: Pin<Box<dyn Routine>>,
    ) -> RoutineHandle {
        let record = Record::new(self.ids.allocate(), name, owner, routine);
        trace!(routine = %record.name, id = %record.id, ?owner, "registered");
        let handle = record.handle();
        self.live.insert(record.id);
        self.records.push(record);
        handle
    }

    /// Report records owned by `silent` once the other pump ticked `ticks` times in a row
    /// without it. They are kept as they are.
    fn detect_stalls(&mut self, silent: Pump, ticks: u32) {
        if ticks <= self.config.stall_threshold {
            return;
        }
        for record in self.records.iter_mut() {
            if record.stalled || record.directive.pump() != silent {
                continue;
            }
            record.stalled = true;
            warn!(
                routine = %record.name,
                id = %record.id,
                owner = ?record.owner,
                "stalled: waiting on the {:?} pump which has not ticked for {} {:?} ticks",
                silent,
                ticks,
                silent.other(),
            );
        }
    }

    /// One pass over the registry. Only the records present when the pass starts are visited,
    /// the ones registered meanwhile are appended at the end.
    fn pump(&mut self, pump: Pump, delta: Duration) {
        let mut spawned = Vec::new();
        let mut stopped = Vec::new();

        let end = self.records.len();
        for index in 0..end {
            let record = &mut self.records[index];
            if record.is_retired() || record.directive.pump() != pump {
                continue;
            }
            record.stalled = false;

            let draining = record.lifecycle == Lifecycle::Draining;
            match interpret(record.directive, draining, &mut record.timer, delta, &self.live) {
                Verdict::Hold => continue,
                Verdict::Retire => {
                    trace!(routine = %record.name, id = %record.id, "retired");
                    record.lifecycle = Lifecycle::Retired;
                    self.live.remove(&record.id);
                    continue;
                }
                Verdict::Resume => {}
            }

            let spawned_before = spawned.len();
            let mut cx = RoutineContext::new(
                record.id,
                &record.name,
                record.owner,
                pump,
                delta,
                &self.ids,
                &self.routines,
                &mut spawned,
                &mut stopped,
            );
            let routine = record.routine.get();
            match catch_unwind(AssertUnwindSafe(|| routine.as_mut().resume(&mut cx))) {
                Ok(step) => record.latch(step),
                Err(payload) => {
                    error!(
                        routine = %record.name,
                        id = %record.id,
                        owner = ?record.owner,
                        "routine panicked and was retired: {}",
                        panic_message(payload.as_ref()),
                    );
                    record.lifecycle = Lifecycle::Retired;
                    self.live.remove(&record.id);
                }
            }

            for child in &spawned[spawned_before..] {
                trace!(routine = %child.name, id = %child.id, "registered during pass");
                self.live.insert(child.id);
            }
            for name in stopped.drain(..) {
                let removed = retire_named(&mut self.records, &mut self.live, &name)
                    + retire_named(&mut spawned, &mut self.live, &name);
                if removed > 0 {
                    debug!(routine = %name, removed, "cancelled during pass");
                }
            }
        }

        self.records.retain(|r| !r.is_retired());
        spawned.retain(|r| !r.is_retired());
        self.records.append(&mut spawned);
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Retire every record named `name`. Returns how many were retired.
fn retire_named(records: &mut [Record], live: &mut HashSet<RoutineId>, name: &str) -> usize {
    let mut removed = 0;
    for record in records.iter_mut() {
        if !record.is_retired() && &*record.name == name {
            record.lifecycle = Lifecycle::Retired;
            live.remove(&record.id);
            removed += 1;
        }
    }
    removed
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
