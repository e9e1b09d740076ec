use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::directive::{Pump, Yielded};
use crate::handle::{RoutineHandle, RoutineOutput};
use crate::id_alloc::RoutineId;
use crate::Routine;

use super::wait::{NextTick, Wait};
use super::{FunctionRoutine, Request, SharedParam};

const ERR_OUTSIDE: &str = "A routine was started from a scope which was never resumed.";

/// The only parameter of an async routine. It is used to suspend back to the scheduler and to
/// start or stop other routines.
pub struct Scope {
    resume_param: SharedParam,
}

impl Scope {
    pub(crate) fn new(resume_param: SharedParam) -> Self {
        Self { resume_param }
    }

    /// Id of the routine owning this scope, known once it was first resumed.
    pub fn id(&self) -> Option<RoutineId> {
        self.resume_param.lock().id()
    }

    /// The pump which resumed the routine last.
    pub fn pump(&self) -> Option<Pump> {
        self.resume_param.lock().pump()
    }

    /// Delta time of the pump which resumed the routine last.
    pub fn delta(&self) -> Duration {
        self.resume_param.lock().delta()
    }

    /// Returns a future that resolve the next time the routine is resumed, on whichever pump
    /// owns it. It returns the delta time of that pump.
    pub fn next_tick(&mut self) -> NextTick<'_> {
        NextTick::new(self)
    }

    /// Returns a future that resolve once `seconds` of frame time have elapsed. The countdown
    /// starts on the frame after the one suspending.
    pub fn seconds(&mut self, seconds: f32) -> Wait<'_> {
        Wait::new(self, Yielded::Seconds(seconds))
    }

    /// Same as [`seconds`](Scope::seconds), taking a [`Duration`].
    pub fn duration(&mut self, duration: Duration) -> Wait<'_> {
        Wait::new(self, Yielded::Seconds(duration.as_secs_f32()))
    }

    pub fn end_of_frame(&mut self) -> Wait<'_> {
        Wait::new(self, Yielded::EndOfFrame)
    }

    /// Returns a future that resolve on the next fixed-timestep tick.
    pub fn fixed_tick(&mut self) -> Wait<'_> {
        Wait::new(self, Yielded::FixedTick)
    }

    /// Returns a future that resolve once the routine behind `handle` has retired.
    pub fn wait_on(&mut self, handle: &RoutineHandle) -> Wait<'_> {
        Wait::new(self, handle.yielded())
    }

    /// Suspend with an arbitrary value. The scheduler does not understand it and resumes the
    /// routine on the next frame.
    pub fn yield_value<T: Any + Send>(&mut self, value: T) -> Wait<'_> {
        Wait::new(self, Yielded::other(value))
    }

    /// Start `routine` under `name` once the current step is over.
    ///
    /// Note: panics if the scope was never resumed, see [`try_start`](Scope::try_start).
    pub fn start<R: Routine>(&mut self, name: impl Into<Arc<str>>, routine: R) -> RoutineHandle {
        self.try_start(name, routine).expect(ERR_OUTSIDE)
    }

    /// Start `routine` under `name` once the current step is over. Returns `None` if the scope
    /// was never resumed.
    pub fn try_start<R: Routine>(
        &mut self,
        name: impl Into<Arc<str>>,
        routine: R,
    ) -> Option<RoutineHandle> {
        let mut param = self.resume_param.lock();
        let id = param.allocate_id()?;
        let name = name.into();
        param.request(Request::Start {
            id,
            name: Arc::clone(&name),
            routine: Box::pin(routine),
        });
        Some(RoutineHandle::new(id, name))
    }

    /// Start an async routine under `name` once the current step is over.
    pub fn start_async<C, F>(&mut self, name: impl Into<Arc<str>>, closure: C) -> RoutineHandle
    where
        C: FnOnce(Scope) -> F,
        F: Future<Output = ()> + Send + 'static,
    {
        self.start(name, FunctionRoutine::new(closure))
    }

    /// Start an async routine under `name`, returning a receiver for its result.
    pub fn start_async_with_output<C, F, T>(
        &mut self,
        name: impl Into<Arc<str>>,
        closure: C,
    ) -> (RoutineHandle, RoutineOutput<T>)
    where
        C: FnOnce(Scope) -> F,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (routine, output) = FunctionRoutine::with_output(closure);
        (self.start(name, routine), output)
    }

    /// Stop every routine registered under `name` once the current step is over, this one
    /// included.
    pub fn stop(&mut self, name: &str) {
        self.resume_param
            .lock()
            .request(Request::Stop(name.to_owned()));
    }

    /// Yield with the following value
    pub(crate) fn yield_(&mut self, yielded: Yielded) {
        self.resume_param.lock().yield_(yielded);
    }
}
