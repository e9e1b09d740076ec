use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use pin_project::pin_project;

use crate::directive::{Pump, Yielded};
use crate::handle::RoutineOutput;
use crate::id_alloc::{RoutineId, RoutineIds};
use crate::scheduler::context::RoutineContext;
use crate::{Routine, Step};

pub use self::scope::Scope;

pub mod scope;
pub mod wait;

pub mod prelude {
    #[doc(hidden)]
    pub use super::scope::Scope;

    #[doc(hidden)]
    pub use super::FunctionRoutine;
}

/// A [`Routine`] driven by a [`Future`]. Each resume polls the future once; the future suspends
/// by awaiting one of the [`Scope`] waits, which hands a [`Yielded`] value back through the
/// shared [`ResumeParam`].
#[pin_project]
pub struct FunctionRoutine<F, T>
where
    F: Future<Output = T>,
{
    #[pin]
    future: F,
    resume_param: SharedParam,
    result_sender: Option<oneshot::Sender<T>>,
}

const ERR_WRONGAWAIT: &str = "A routine yielded without notifying the scheduler
the reason. That is most likely because it awaits a
future which is not part of this library.";

impl<F, T> FunctionRoutine<F, T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    /// Build the routine out of an async closure. The closure runs right away, but the body of
    /// the future only on the first resume.
    pub fn new<C>(closure: C) -> Self
    where
        C: FnOnce(Scope) -> F,
    {
        let resume_param = SharedParam::default();
        let future = closure(Scope::new(resume_param.clone()));
        Self {
            future,
            resume_param,
            result_sender: None,
        }
    }

    /// Same as [`new`](FunctionRoutine::new), with a receiver for the value the future
    /// completes with.
    pub fn with_output<C>(closure: C) -> (Self, RoutineOutput<T>)
    where
        C: FnOnce(Scope) -> F,
    {
        let (sender, receiver) = oneshot::channel();
        let mut routine = Self::new(closure);
        routine.result_sender = Some(sender);
        (routine, RoutineOutput::new(receiver))
    }
}

impl<F, T> Routine for FunctionRoutine<F, T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    fn resume(self: Pin<&mut Self>, cx: &mut RoutineContext<'_>) -> Step {
        let waker = waker::create();
        // Dummy context
        let mut task_cx = Context::from_waker(&waker);

        let this = self.project();

        this.resume_param.lock().enter(cx);
        let res = this.future.poll(&mut task_cx);
        let (yielded, requests) = this.resume_param.lock().leave();

        for request in requests {
            match request {
                Request::Start { id, name, routine } => {
                    cx.adopt(id, name, routine);
                }
                Request::Stop(name) => cx.stop(&name),
            }
        }

        match res {
            Poll::Ready(t) => {
                if let Some(sender) = this.result_sender.take() {
                    // The receiver may be gone, nobody is interested in the value then.
                    let _ = sender.send(t);
                }
                Step::Done
            }
            Poll::Pending => match yielded {
                Some(yielded) => Step::Yield(yielded),
                None => panic!("{}", ERR_WRONGAWAIT),
            },
        }
    }
}

mod waker {
    use std::task::{RawWaker, RawWakerVTable, Waker};

    pub fn create() -> Waker {
        // Safety: The waker points to a vtable with functions that do nothing. Doing
        // nothing is memory-safe.
        unsafe { Waker::from_raw(RAW_WAKER) }
    }

    const RAW_WAKER: RawWaker = RawWaker::new(std::ptr::null(), &VTABLE);
    const VTABLE: RawWakerVTable = RawWakerVTable::new(clone, do_nothing, do_nothing, do_nothing);

    unsafe fn clone(_: *const ()) -> RawWaker {
        RAW_WAKER
    }
    unsafe fn do_nothing(_: *const ()) {}
}

/// Something the future asked for while polled, applied by the scheduler once the poll is over.
pub(crate) enum Request {
    Start {
        id: RoutineId,
        name: Arc<str>,
        routine: Pin<Box<dyn Routine>>,
    },
    Stop(String),
}

/// The values shared between a [`FunctionRoutine`] and its [`Scope`]. Resume arguments are set
/// before each poll, the yielded value and requests are taken back right after.
#[derive(Default)]
pub(crate) struct ResumeParam {
    id: Option<RoutineId>,
    ids: Option<RoutineIds>,
    pump: Option<Pump>,
    delta: Duration,
    yielded: Option<Yielded>,
    requests: Vec<Request>,
}

impl ResumeParam {
    fn enter(&mut self, cx: &RoutineContext<'_>) {
        self.id = Some(cx.id());
        self.ids = Some(cx.ids().clone());
        self.pump = Some(cx.pump());
        self.delta = cx.delta();
        self.yielded = None;
    }

    fn leave(&mut self) -> (Option<Yielded>, Vec<Request>) {
        (self.yielded.take(), std::mem::take(&mut self.requests))
    }

    pub(crate) fn id(&self) -> Option<RoutineId> {
        self.id
    }

    pub(crate) fn pump(&self) -> Option<Pump> {
        self.pump
    }

    pub(crate) fn delta(&self) -> Duration {
        self.delta
    }

    pub(crate) fn yield_(&mut self, yielded: Yielded) {
        self.yielded = Some(yielded);
    }

    /// Reserve an id for a routine started from inside the poll.
    pub(crate) fn allocate_id(&self) -> Option<RoutineId> {
        self.ids.as_ref().map(RoutineIds::allocate)
    }

    pub(crate) fn request(&mut self, request: Request) {
        self.requests.push(request);
    }
}

#[derive(Clone, Default)]
pub(crate) struct SharedParam(Arc<Mutex<ResumeParam>>);

impl SharedParam {
    /// Only one side touches the param at a time, a poisoned lock still holds valid data.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ResumeParam> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
