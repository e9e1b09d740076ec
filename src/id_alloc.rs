use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A unique identifier of a routine. Identifiers are never reused, so a retired id stays
/// retired forever.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RoutineId(u64);

impl RoutineId {
    /// Creates an id from its raw value.
    ///
    /// # Note
    ///
    /// This is meant for tests and diagnostics. Ids handed to the scheduler should come from
    /// [`RoutineIds::allocate`], an id made up here may collide with a live routine.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for RoutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates [`RoutineId`]s. Cloning it shares the cursor, which lets an async routine reserve
/// the id of a child it starts before the scheduler sees the child.
#[derive(Clone, Default)]
pub struct RoutineIds {
    cursor: Arc<AtomicU64>,
}

impl RoutineIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id.
    pub fn allocate(&self) -> RoutineId {
        RoutineId(self.cursor.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_cursor() {
        let ids = RoutineIds::new();
        let other = ids.clone();

        let a = ids.allocate();
        let b = other.allocate();
        let c = ids.allocate();

        assert_ne!(a, b);
        assert!(a < b && b < c);
    }
}
