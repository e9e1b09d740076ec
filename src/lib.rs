use std::pin::Pin;

use bevy::utils::synccell::SyncCell;

use self::directive::Yielded;
use self::scheduler::context::RoutineContext;

pub mod config;
pub mod directive;
pub mod error;
pub mod factory;
pub mod function_routine;
pub mod handle;
pub mod id_alloc;
pub mod manager;
pub mod plugin;
pub mod routine;
pub mod scheduler;

pub mod prelude {
    #[doc(hidden)]
    pub use crate::function_routine::prelude::*;

    #[doc(hidden)]
    pub use crate::directive::{Directive, Pump, Yielded};

    #[doc(hidden)]
    pub use crate::handle::{RoutineHandle, RoutineOutput};

    #[doc(hidden)]
    pub use crate::manager::{Manager, ManagerContext, ManagerEvent, ManagerId, Managers};

    #[doc(hidden)]
    pub use crate::plugin::*;

    #[doc(hidden)]
    pub use crate::routine::{from_fn, sequence, Sequence};

    #[doc(hidden)]
    pub use crate::scheduler::{context::RoutineContext, Lifecycle, Scheduler};

    #[doc(hidden)]
    pub use crate::{config::SchedulerConfig, error::SchedulerError, Routine, Step};
}

/// A routine is a form of state machine. It gets resumed by the [`Scheduler`] and tells it, by
/// what it yields, on which condition it should be resumed again.
///
/// [`Scheduler`]: crate::scheduler::Scheduler
pub trait Routine: Send + 'static {
    /// Resume execution of this routine and returns what it produced. Starting or stopping other
    /// routines goes through `cx`.
    fn resume(self: Pin<&mut Self>, cx: &mut RoutineContext<'_>) -> Step;
}

/// The result of resuming a [`Routine`].
#[derive(Debug)]
pub enum Step {
    /// The routine suspended, handing back a value the scheduler interprets.
    Yield(Yielded),
    /// The routine has no further steps. It must not be resumed again.
    Done,
}

/// A heap allocated [`Routine`].
/// It is pinned since async routines are implemented using [`Future`](std::future::Future).
/// [`SyncCell`] is used to make them [`Sync`] while being only [`Send`].
pub(crate) type HeapRoutine = SyncCell<Pin<Box<dyn Routine>>>;

#[cfg(test)]
mod test {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use super::prelude::*;

    const FRAME: Duration = Duration::from_millis(100);

    #[test]
    fn async_routine_waits_on_tick() {
        let mut scheduler = Scheduler::new();

        let a = Arc::new(Mutex::new(0));
        let b = Arc::clone(&a);
        scheduler.start_async(None, "counter", |mut s: Scope| async move {
            *b.lock().unwrap() += 1;
            s.next_tick().await;
            *b.lock().unwrap() += 1;
            s.next_tick().await;
            *b.lock().unwrap() += 1;
        });

        scheduler.frame_tick(FRAME);
        assert_eq!(*a.lock().unwrap(), 1);
        scheduler.frame_tick(FRAME);
        assert_eq!(*a.lock().unwrap(), 2);
        scheduler.frame_tick(FRAME);
        assert_eq!(*a.lock().unwrap(), 3);
        scheduler.frame_tick(FRAME);
        assert_eq!(*a.lock().unwrap(), 3);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn next_tick_returns_the_pump_delta() {
        let mut scheduler = Scheduler::new();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        scheduler.start_async(None, "delta", |mut s: Scope| async move {
            let dt = s.next_tick().await;
            out.lock().unwrap().push(dt);
            s.fixed_tick().await;
            let dt = s.next_tick().await;
            out.lock().unwrap().push(dt);
        });

        scheduler.frame_tick(FRAME);
        scheduler.frame_tick(Duration::from_millis(16));
        scheduler.fixed_tick(Duration::from_millis(20));
        scheduler.frame_tick(Duration::from_millis(33));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Duration::from_millis(16), Duration::from_millis(33)]
        );
    }

    #[test]
    fn async_seconds_resumes_after_the_wait() {
        let mut scheduler = Scheduler::new();

        let a = Arc::new(Mutex::new(false));
        let b = Arc::clone(&a);
        scheduler.start_async(None, "fade", |mut s: Scope| async move {
            s.seconds(0.25).await;
            *b.lock().unwrap() = true;
        });

        // Yield, latch, then 100ms, 200ms, 300ms elapsed.
        for _ in 0..4 {
            scheduler.frame_tick(FRAME);
            assert!(!*a.lock().unwrap());
        }
        scheduler.frame_tick(FRAME);
        assert!(*a.lock().unwrap());
    }

    #[test]
    fn await_external_future_retires_the_routine() {
        async fn external_future() {
            std::future::pending::<()>().await;
        }
        let mut scheduler = Scheduler::new();
        let handle = scheduler.start_async(None, "external", |_: Scope| async move {
            external_future().await;
        });

        scheduler.frame_tick(FRAME);
        assert!(scheduler.is_retired(&handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn waiting_on_child_routine() {
        let mut scheduler = Scheduler::new();

        let log = Arc::new(Mutex::new(Vec::new()));
        let parent_log = Arc::clone(&log);
        let child_log = Arc::clone(&log);

        scheduler.start_async(None, "parent", |mut s: Scope| async move {
            let child = s.start_async("child", |mut s: Scope| async move {
                for _ in 0..2 {
                    s.next_tick().await;
                    child_log.lock().unwrap().push("child");
                }
            });
            s.wait_on(&child).await;
            parent_log.lock().unwrap().push("parent");
        });

        scheduler.tick_until_empty(FRAME, 16);
        assert_eq!(*log.lock().unwrap(), vec!["child", "child", "parent"]);
    }

    #[test]
    fn async_output_is_delivered() {
        let mut scheduler = Scheduler::new();

        let (handle, output) =
            scheduler.start_async_with_output(None, "answer", |mut s: Scope| async move {
                s.end_of_frame().await;
                42
            });

        scheduler.frame_tick(FRAME);
        assert_eq!(output.try_take(), None);
        scheduler.frame_tick(FRAME);
        assert_eq!(output.try_take(), Some(42));

        scheduler.frame_tick(FRAME);
        assert!(scheduler.is_retired(&handle));
    }

    #[test]
    fn scope_stop_cancels_siblings() {
        let mut scheduler = Scheduler::new();

        let a = Arc::new(Mutex::new(0));
        let b = Arc::clone(&a);
        scheduler.start_async(None, "looper", |mut s: Scope| async move {
            loop {
                s.next_tick().await;
                *b.lock().unwrap() += 1;
            }
        });
        scheduler.start_async(None, "stopper", |mut s: Scope| async move {
            s.seconds(0.0).await;
            s.stop("looper");
        });

        scheduler.tick_until_empty(FRAME, 16);
        assert!(scheduler.is_empty());
        assert_eq!(*a.lock().unwrap(), 2);
    }
}
