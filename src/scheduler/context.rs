use std::sync::Arc;
use std::time::Duration;

use crate::directive::Pump;
use crate::error::SchedulerError;
use crate::factory::{RoutineArg, RoutineTable};
use crate::handle::RoutineHandle;
use crate::id_alloc::{RoutineId, RoutineIds};
use crate::manager::ManagerId;
use crate::Routine;

use super::record::Record;

/// Everything a [`Routine`] can reach while it is resumed. Routines started from here join the
/// registry once the current pass is over; routines stopped from here are removed as soon as the
/// current step returns.
pub struct RoutineContext<'a> {
    id: RoutineId,
    name: &'a Arc<str>,
    owner: Option<ManagerId>,
    pump: Pump,
    delta: Duration,
    ids: &'a RoutineIds,
    routines: &'a RoutineTable,
    pub(super) spawned: &'a mut Vec<Record>,
    pub(super) stopped: &'a mut Vec<String>,
}

impl<'a> RoutineContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: RoutineId,
        name: &'a Arc<str>,
        owner: Option<ManagerId>,
        pump: Pump,
        delta: Duration,
        ids: &'a RoutineIds,
        routines: &'a RoutineTable,
        spawned: &'a mut Vec<Record>,
        stopped: &'a mut Vec<String>,
    ) -> Self {
        Self {
            id,
            name,
            owner,
            pump,
            delta,
            ids,
            routines,
            spawned,
            stopped,
        }
    }

    /// Id of the routine being resumed.
    pub fn id(&self) -> RoutineId {
        self.id
    }

    /// Logical name of the routine being resumed.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn owner(&self) -> Option<ManagerId> {
        self.owner
    }

    /// The pump resuming the routine.
    pub fn pump(&self) -> Pump {
        self.pump
    }

    /// Frame time for the frame pump, fixed timestep for the fixed pump.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub(crate) fn ids(&self) -> &RoutineIds {
        self.ids
    }

    /// Register `routine` under `name`, on behalf of the current routine's owner. It is first
    /// resumed on the next pass.
    pub fn start<R: Routine>(&mut self, name: impl Into<Arc<str>>, routine: R) -> RoutineHandle {
        let id = self.ids.allocate();
        self.adopt(id, name.into(), Box::pin(routine))
    }

    /// Resolve a routine factory by name and register what it builds.
    pub fn start_by_name(
        &mut self,
        name: &str,
        arg: Option<RoutineArg>,
    ) -> Result<RoutineHandle, SchedulerError> {
        let routine = self.routines.build(name, arg)?;
        let id = self.ids.allocate();
        Ok(self.adopt(id, name.into(), routine))
    }

    /// Stop every routine registered under `name`, the current one included.
    pub fn stop(&mut self, name: &str) {
        self.stopped.push(name.to_owned());
    }

    /// Register a routine whose id was already reserved.
    pub(crate) fn adopt(
        &mut self,
        id: RoutineId,
        name: Arc<str>,
        routine: std::pin::Pin<Box<dyn Routine>>,
    ) -> RoutineHandle {
        let record = Record::new(id, name, self.owner, routine);
        let handle = record.handle();
        self.spawned.push(record);
        handle
    }
}
