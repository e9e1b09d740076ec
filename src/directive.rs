use std::any::{type_name, Any};
use std::fmt;
use std::time::Duration;

use bevy::log::debug;
use bevy::time::{Timer, TimerMode};
use bevy::utils::HashSet;

use crate::handle::RoutineHandle;
use crate::id_alloc::RoutineId;

/// The value a [`Routine`](crate::Routine) hands back to the scheduler when it suspends.
pub enum Yielded {
    /// Resume on the next frame.
    Null,
    /// Resume once that many seconds of frame time have elapsed.
    Seconds(f32),
    /// Resume at the end of the next frame.
    EndOfFrame,
    /// Resume on the next fixed-timestep tick.
    FixedTick,
    /// Resume once the given routine has retired.
    Routine(RoutineHandle),
    /// Anything else. The scheduler does not understand it and resumes on the next frame.
    Other {
        type_name: &'static str,
        value: Box<dyn Any + Send>,
    },
}

impl Yielded {
    /// Wrap an arbitrary value, remembering its type name for diagnostics.
    pub fn other<T: Any + Send>(value: T) -> Self {
        Yielded::Other {
            type_name: type_name::<T>(),
            value: Box::new(value),
        }
    }
}

impl fmt::Debug for Yielded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yielded::Null => f.write_str("Null"),
            Yielded::Seconds(s) => f.debug_tuple("Seconds").field(s).finish(),
            Yielded::EndOfFrame => f.write_str("EndOfFrame"),
            Yielded::FixedTick => f.write_str("FixedTick"),
            Yielded::Routine(h) => f.debug_tuple("Routine").field(h).finish(),
            Yielded::Other { type_name, .. } => {
                f.debug_struct("Other").field("type_name", type_name).finish()
            }
        }
    }
}

/// Which clock drives a pass over the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pump {
    /// Once per rendered frame, after the other per-frame work.
    Frame,
    /// Once per fixed-timestep tick, before the other fixed-tick work.
    Fixed,
}

impl Pump {
    pub fn other(self) -> Pump {
        match self {
            Pump::Frame => Pump::Fixed,
            Pump::Fixed => Pump::Frame,
        }
    }
}

/// The suspend state latched from the last value a routine yielded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Directive {
    None,
    Seconds(f32),
    EndOfFrame,
    FixedTick,
    WaitOn(RoutineId),
}

impl Directive {
    /// Classify a yielded value. Values the scheduler does not understand become
    /// [`Directive::None`].
    pub fn classify(yielded: Yielded) -> Self {
        match yielded {
            Yielded::Null => Directive::None,
            Yielded::Seconds(s) if s.is_nan() || s < 0.0 => Directive::Seconds(0.0),
            Yielded::Seconds(s) => Directive::Seconds(s),
            Yielded::EndOfFrame => Directive::EndOfFrame,
            Yielded::FixedTick => Directive::FixedTick,
            Yielded::Routine(handle) => Directive::WaitOn(handle.id()),
            Yielded::Other { type_name, .. } => {
                debug!("unknown directive `{type_name}`, resuming on the next frame");
                Directive::None
            }
        }
    }

    /// The pump that owns records latched on this directive.
    pub fn pump(&self) -> Pump {
        match self {
            Directive::FixedTick => Pump::Fixed,
            _ => Pump::Frame,
        }
    }
}

/// What the pump should do with a record on this visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Resume the routine and latch what it yields.
    Resume,
    /// Leave it alone until the next visit.
    Hold,
    /// The grace pass after completion: remove it without resuming.
    Retire,
}

/// Apply the resume rule of `directive` for one visit by its owning pump.
///
/// `timer` is the wait state of a [`Directive::Seconds`]: `None` until the first visit measures
/// it. That first visit never resumes, the countdown starts on the next one.
pub(crate) fn interpret(
    directive: Directive,
    draining: bool,
    timer: &mut Option<Timer>,
    delta: Duration,
    live: &HashSet<RoutineId>,
) -> Verdict {
    if draining {
        return Verdict::Retire;
    }

    match directive {
        Directive::None | Directive::EndOfFrame | Directive::FixedTick => Verdict::Resume,
        Directive::Seconds(s) => match timer {
            None => {
                *timer = Some(Timer::new(wait_duration(s), TimerMode::Once));
                Verdict::Hold
            }
            Some(t) => {
                if t.tick(delta).finished() {
                    Verdict::Resume
                } else {
                    Verdict::Hold
                }
            }
        },
        Directive::WaitOn(id) => {
            if live.contains(&id) {
                Verdict::Hold
            } else {
                Verdict::Resume
            }
        }
    }
}

fn wait_duration(seconds: f32) -> Duration {
    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn unknown_values_resume_every_frame() {
        let d = Directive::classify(Yielded::other("fade out"));
        assert_eq!(d, Directive::None);
        assert_eq!(d.pump(), Pump::Frame);
    }

    #[test]
    fn only_fixed_tick_belongs_to_the_fixed_pump() {
        assert_eq!(Directive::FixedTick.pump(), Pump::Fixed);
        assert_eq!(Directive::EndOfFrame.pump(), Pump::Frame);
        assert_eq!(Directive::Seconds(1.0).pump(), Pump::Frame);
        assert_eq!(Directive::WaitOn(RoutineId::from_raw(3)).pump(), Pump::Frame);
    }

    #[test]
    fn negative_and_nan_waits_are_clamped() {
        assert_eq!(
            Directive::classify(Yielded::Seconds(-2.0)),
            Directive::Seconds(0.0)
        );
        assert_eq!(
            Directive::classify(Yielded::Seconds(f32::NAN)),
            Directive::Seconds(0.0)
        );
    }

    #[test]
    fn seconds_latch_then_count_down() {
        let live = HashSet::default();
        let mut timer = None;
        let d = Directive::Seconds(2.0);

        assert_eq!(interpret(d, false, &mut timer, SECOND, &live), Verdict::Hold);
        assert!(timer.is_some());
        assert_eq!(interpret(d, false, &mut timer, SECOND, &live), Verdict::Hold);
        assert_eq!(
            interpret(d, false, &mut timer, SECOND, &live),
            Verdict::Resume
        );
    }

    #[test]
    fn uneven_deltas_resume_once_the_sum_reaches_the_wait() {
        let live = HashSet::default();
        let mut timer = None;
        let d = Directive::Seconds(1.0);

        assert_eq!(interpret(d, false, &mut timer, SECOND, &live), Verdict::Hold);
        for ms in [300, 300, 300] {
            let delta = Duration::from_millis(ms);
            assert_eq!(interpret(d, false, &mut timer, delta, &live), Verdict::Hold);
        }
        let delta = Duration::from_millis(100);
        assert_eq!(
            interpret(d, false, &mut timer, delta, &live),
            Verdict::Resume
        );
    }

    #[test]
    fn wait_on_holds_while_target_is_live() {
        let target = RoutineId::from_raw(7);
        let mut live = HashSet::default();
        live.insert(target);

        let d = Directive::WaitOn(target);
        assert_eq!(interpret(d, false, &mut None, SECOND, &live), Verdict::Hold);
        live.remove(&target);
        assert_eq!(
            interpret(d, false, &mut None, SECOND, &live),
            Verdict::Resume
        );
    }

    #[test]
    fn draining_records_retire_without_resuming() {
        let live = HashSet::default();
        assert_eq!(
            interpret(Directive::None, true, &mut None, SECOND, &live),
            Verdict::Retire
        );
    }
}
