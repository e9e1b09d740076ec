use std::pin::Pin;
use std::sync::Arc;

use bevy::log::trace;
use bevy::time::Timer;
use bevy::utils::synccell::SyncCell;

use crate::directive::Directive;
use crate::handle::RoutineHandle;
use crate::id_alloc::RoutineId;
use crate::manager::ManagerId;
use crate::{HeapRoutine, Routine, Step};

/// Where a record is in its life. Records move forward only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Registered, resumed according to its directive.
    Scheduled,
    /// The routine finished. The next visit of its pump retires it without resuming.
    Draining,
    /// Never resumed again, dropped at the end of the pass.
    Retired,
}

/// A registered routine and its scheduling state.
pub(crate) struct Record {
    pub(crate) id: RoutineId,
    pub(crate) name: Arc<str>,
    pub(crate) owner: Option<ManagerId>,
    pub(crate) routine: HeapRoutine,
    pub(crate) directive: Directive,
    pub(crate) timer: Option<Timer>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) stalled: bool,
}

impl Record {
    pub(crate) fn new(
        id: RoutineId,
        name: Arc<str>,
        owner: Option<ManagerId>,
        routine: Pin<Box<dyn Routine>>,
    ) -> Self {
        Self {
            id,
            name,
            owner,
            routine: SyncCell::new(routine),
            directive: Directive::None,
            timer: None,
            lifecycle: Lifecycle::Scheduled,
            stalled: false,
        }
    }

    pub(crate) fn handle(&self) -> RoutineHandle {
        RoutineHandle::new(self.id, Arc::clone(&self.name))
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.lifecycle == Lifecycle::Retired
    }

    /// Latch what the last resume produced. On completion the last directive stays latched so
    /// the record drains on the pump that owns it.
    pub(crate) fn latch(&mut self, step: Step) {
        match step {
            Step::Yield(yielded) => {
                self.directive = Directive::classify(yielded);
                self.timer = None;
            }
            Step::Done => {
                trace!(routine = %self.name, id = %self.id, "finished, draining");
                self.lifecycle = Lifecycle::Draining;
                self.timer = None;
            }
        }
    }
}
