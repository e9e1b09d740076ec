use std::any::{type_name, Any};
use std::pin::Pin;
use std::sync::Arc;

use bevy::utils::HashMap;

use crate::error::SchedulerError;
use crate::Routine;

/// The single argument a routine factory may take.
pub type RoutineArg = Box<dyn Any + Send>;

type Factory =
    Box<dyn Fn(Option<RoutineArg>) -> Result<Pin<Box<dyn Routine>>, &'static str> + Send + Sync>;

/// Maps the declared name of a routine to the factory building it, so routines can be started
/// by name.
#[derive(Default)]
pub struct RoutineTable {
    factories: HashMap<Arc<str>, Factory>,
}

impl RoutineTable {
    /// Declare a routine taking no argument. Replaces any factory with the same name.
    pub fn register<R, F>(&mut self, name: impl Into<Arc<str>>, factory: F) -> &mut Self
    where
        R: Routine,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.factories.insert(
            name.into(),
            Box::new(move |arg: Option<RoutineArg>| match arg {
                None => Ok(Box::pin(factory()) as Pin<Box<dyn Routine>>),
                Some(_) => Err("no argument"),
            }),
        );
        self
    }

    /// Declare a routine taking one argument of type `A`. Replaces any factory with the same
    /// name.
    pub fn register_with<A, R, F>(&mut self, name: impl Into<Arc<str>>, factory: F) -> &mut Self
    where
        A: Any + Send,
        R: Routine,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.factories.insert(
            name.into(),
            Box::new(move |arg: Option<RoutineArg>| match arg.map(|a| a.downcast::<A>()) {
                Some(Ok(a)) => Ok(Box::pin(factory(*a)) as Pin<Box<dyn Routine>>),
                _ => Err(type_name::<A>()),
            }),
        );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the routine declared under `name`.
    pub fn build(
        &self,
        name: &str,
        arg: Option<RoutineArg>,
    ) -> Result<Pin<Box<dyn Routine>>, SchedulerError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownRoutine {
                name: name.to_owned(),
            })?;
        factory(arg).map_err(|expected| SchedulerError::InvalidArgument {
            name: name.to_owned(),
            expected,
        })
    }
}
