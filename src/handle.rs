use std::fmt;
use std::sync::Arc;

use crate::directive::Yielded;
use crate::id_alloc::RoutineId;

/// Value referring to a registered routine. It does not keep the routine alive: it is used to
/// query the [`Scheduler`](crate::scheduler::Scheduler) or to wait for the routine to retire.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RoutineHandle {
    id: RoutineId,
    name: Arc<str>,
}

impl RoutineHandle {
    pub(crate) fn new(id: RoutineId, name: Arc<str>) -> Self {
        Self { id, name }
    }

    pub fn id(&self) -> RoutineId {
        self.id
    }

    /// The logical name the routine was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value to yield in order to resume once this routine has retired.
    pub fn yielded(&self) -> Yielded {
        Yielded::Routine(self.clone())
    }
}

impl fmt::Debug for RoutineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.name, self.id)
    }
}

/// Receives the value returned by an async routine once it completes.
pub struct RoutineOutput<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> RoutineOutput<T> {
    pub(crate) fn new(receiver: oneshot::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Take the value if the routine has completed. Returns `None` before that, and after the
    /// value was taken once.
    pub fn try_take(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}
