use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bevy::log::debug;
use bevy::prelude::{Event, Resource};

use crate::scheduler::Scheduler;

/// Identifies a [`Manager`] added to [`Managers`]. Routines keep it for diagnostics only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(u32);

impl fmt::Debug for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manager#{}", self.0)
    }
}

/// Application lifecycle events forwarded to every manager.
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerEvent {
    Pause(bool),
    Focus(bool),
    Quit,
}

/// What a manager hook can reach: the scheduler it starts its routines on, and the tick delta.
pub struct ManagerContext<'a> {
    pub id: ManagerId,
    pub scheduler: &'a mut Scheduler,
    pub delta: Duration,
}

/// A non-component object with a per-frame lifecycle. All hooks default to doing nothing.
pub trait Manager: Send + Sync + 'static {
    /// Called once, before the first `update`.
    fn start(&mut self, _cx: &mut ManagerContext<'_>) {}

    fn update(&mut self, _cx: &mut ManagerContext<'_>) {}

    fn fixed_update(&mut self, _cx: &mut ManagerContext<'_>) {}

    /// Called after every `update` of the frame.
    fn late_update(&mut self, _cx: &mut ManagerContext<'_>) {}

    fn on_event(&mut self, _event: ManagerEvent, _cx: &mut ManagerContext<'_>) {}
}

struct Entry {
    id: ManagerId,
    name: Arc<str>,
    started: bool,
    manager: Box<dyn Manager>,
}

/// Every loaded manager, in the order they were added.
#[derive(Resource, Default)]
pub struct Managers {
    entries: Vec<Entry>,
    next_id: u32,
}

impl Managers {
    pub fn add<M: Manager>(&mut self, name: impl Into<Arc<str>>, manager: M) -> ManagerId {
        let id = ManagerId(self.next_id);
        self.next_id += 1;
        let name = name.into();
        debug!(manager = %name, ?id, "manager added");
        self.entries.push(Entry {
            id,
            name,
            started: false,
            manager: Box::new(manager),
        });
        id
    }

    /// Drop a manager. Routines it registered keep running.
    pub fn remove(&mut self, id: ManagerId) -> bool {
        let len = self.entries.len();
        self.entries.retain(|e| e.id != id);
        len != self.entries.len()
    }

    pub fn name(&self, id: ManagerId) -> Option<&str> {
        self.entries.iter().find(|e| e.id == id).map(|e| &*e.name)
    }

    /// Names of the loaded managers, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| &*e.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start the managers added since the last call, then update all of them.
    pub fn update(&mut self, scheduler: &mut Scheduler, delta: Duration) {
        for entry in self.entries.iter_mut() {
            let mut cx = ManagerContext {
                id: entry.id,
                scheduler: &mut *scheduler,
                delta,
            };
            if !entry.started {
                entry.started = true;
                entry.manager.start(&mut cx);
            }
            entry.manager.update(&mut cx);
        }
    }

    pub fn fixed_update(&mut self, scheduler: &mut Scheduler, delta: Duration) {
        self.for_each_started(scheduler, delta, |m, cx| m.fixed_update(cx));
    }

    pub fn late_update(&mut self, scheduler: &mut Scheduler, delta: Duration) {
        self.for_each_started(scheduler, delta, |m, cx| m.late_update(cx));
    }

    pub fn broadcast(&mut self, event: ManagerEvent, scheduler: &mut Scheduler) {
        debug!(?event, "forwarding to {} managers", self.entries.len());
        self.for_each_started(scheduler, Duration::ZERO, |m, cx| m.on_event(event, cx));
    }

    fn for_each_started(
        &mut self,
        scheduler: &mut Scheduler,
        delta: Duration,
        mut f: impl FnMut(&mut dyn Manager, &mut ManagerContext<'_>),
    ) {
        for entry in self.entries.iter_mut().filter(|e| e.started) {
            let mut cx = ManagerContext {
                id: entry.id,
                scheduler: &mut *scheduler,
                delta,
            };
            f(entry.manager.as_mut(), &mut cx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::directive::Yielded;
    use crate::routine::sequence;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Manager for Recorder {
        fn start(&mut self, cx: &mut ManagerContext<'_>) {
            self.calls.lock().unwrap().push("start");
            cx.scheduler
                .register(Some(cx.id), "Blink", sequence([Yielded::EndOfFrame]));
        }

        fn update(&mut self, _cx: &mut ManagerContext<'_>) {
            self.calls.lock().unwrap().push("update");
        }

        fn fixed_update(&mut self, _cx: &mut ManagerContext<'_>) {
            self.calls.lock().unwrap().push("fixed_update");
        }

        fn on_event(&mut self, event: ManagerEvent, _cx: &mut ManagerContext<'_>) {
            if event == ManagerEvent::Quit {
                self.calls.lock().unwrap().push("quit");
            }
        }
    }

    #[test]
    fn start_runs_once_before_the_first_update() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut managers = Managers::default();
        let mut scheduler = Scheduler::new();
        let id = managers.add(
            "Sound",
            Recorder {
                calls: Arc::clone(&calls),
            },
        );

        managers.fixed_update(&mut scheduler, Duration::ZERO);
        managers.update(&mut scheduler, Duration::ZERO);
        managers.update(&mut scheduler, Duration::ZERO);
        managers.fixed_update(&mut scheduler, Duration::ZERO);
        managers.broadcast(ManagerEvent::Quit, &mut scheduler);

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["start", "update", "update", "fixed_update", "quit"]
        );
        assert!(scheduler.is_running("Blink"));
        assert_eq!(managers.name(id), Some("Sound"));
    }

    #[test]
    fn removed_managers_are_no_longer_called() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut managers = Managers::default();
        let mut scheduler = Scheduler::new();
        let id = managers.add(
            "Score",
            Recorder {
                calls: Arc::clone(&calls),
            },
        );

        assert!(managers.remove(id));
        assert!(!managers.remove(id));
        managers.update(&mut scheduler, Duration::ZERO);

        assert!(calls.lock().unwrap().is_empty());
        assert!(managers.is_empty());
    }
}
