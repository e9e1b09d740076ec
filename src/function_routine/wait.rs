use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use crate::directive::Yielded;

use super::scope::Scope;

#[derive(PartialEq, Eq, Clone, Copy)]
enum WaitState {
    Halted,
    Running,
}

#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct NextTick<'a> {
    scope: &'a mut Scope,
    state: WaitState,
}

impl<'a> NextTick<'a> {
    pub(crate) fn new(scope: &'a mut Scope) -> Self {
        NextTick {
            scope,
            state: WaitState::Running,
        }
    }
}

impl Future for NextTick<'_> {
    type Output = Duration;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Self::Output> {
        match self.state {
            // We assume the scheduler will only poll it once a new tick has begun
            WaitState::Halted => {
                self.state = WaitState::Running;
                Poll::Ready(self.scope.delta())
            }
            WaitState::Running => {
                self.state = WaitState::Halted;
                self.scope.yield_(Yielded::Null);
                Poll::Pending
            }
        }
    }
}

/// Suspends the routine once with the given [`Yielded`] value, then resolves the next time the
/// routine is resumed.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait<'a> {
    scope: &'a mut Scope,
    yielded: Option<Yielded>,
    state: WaitState,
}

impl<'a> Wait<'a> {
    pub(crate) fn new(scope: &'a mut Scope, yielded: Yielded) -> Self {
        Wait {
            scope,
            yielded: Some(yielded),
            state: WaitState::Running,
        }
    }
}

impl Future for Wait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context) -> Poll<Self::Output> {
        match self.state {
            // We assume the scheduler will only poll it once the wait is over
            WaitState::Halted => {
                self.state = WaitState::Running;
                Poll::Ready(())
            }
            WaitState::Running => {
                self.state = WaitState::Halted;
                let yielded = self.yielded.take().unwrap_or(Yielded::Null);
                self.scope.yield_(yielded);
                Poll::Pending
            }
        }
    }
}
