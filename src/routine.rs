use std::pin::Pin;

use pin_project::pin_project;

use crate::directive::Yielded;
use crate::scheduler::context::RoutineContext;
use crate::{Routine, Step};

impl<F> Routine for F
where
    F: FnMut(&mut RoutineContext<'_>) -> Step + Send + Unpin + 'static,
{
    fn resume(mut self: Pin<&mut Self>, cx: &mut RoutineContext<'_>) -> Step {
        (*self)(cx)
    }
}

/// A routine yielding each value of an iterator in turn, then finishing.
#[pin_project]
pub struct Sequence<I> {
    iter: I,
}

/// Build a [`Sequence`] out of anything iterating over [`Yielded`] values.
pub fn sequence<I>(values: I) -> Sequence<I::IntoIter>
where
    I: IntoIterator<Item = Yielded>,
    I::IntoIter: Send + 'static,
{
    Sequence {
        iter: values.into_iter(),
    }
}

impl<I> Routine for Sequence<I>
where
    I: Iterator<Item = Yielded> + Send + 'static,
{
    fn resume(self: Pin<&mut Self>, _cx: &mut RoutineContext<'_>) -> Step {
        match self.project().iter.next() {
            Some(value) => Step::Yield(value),
            None => Step::Done,
        }
    }
}

/// Turn a closure into a routine. Each resume calls it once.
pub fn from_fn<F>(f: F) -> F
where
    F: FnMut(&mut RoutineContext<'_>) -> Step + Send + Unpin + 'static,
{
    f
}
