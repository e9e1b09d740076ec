use thiserror::Error;

/// Errors surfaced to callers starting routines by name. The scheduler itself is never affected:
/// the registration is simply skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("no routine factory registered under `{name}`")]
    UnknownRoutine { name: String },
    #[error("routine `{name}` expects {expected}")]
    InvalidArgument { name: String, expected: &'static str },
}
