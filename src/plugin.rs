use bevy::app::AppExit;
use bevy::prelude::*;
use bevy::time::fixed_timestep::FixedTime;

use crate::config::SchedulerConfig;
use crate::manager::{ManagerEvent, Managers};
use crate::scheduler::Scheduler;

/// Installs the [`Scheduler`] and the [`Managers`] and drives them: the fixed pump runs first
/// in [`FixedUpdate`], the frame pump runs in [`Last`].
#[derive(Default)]
pub struct WranglerPlugin {
    pub config: SchedulerConfig,
}

/// Order game systems against the pumps with these.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum WranglerSet {
    FixedPump,
    FramePump,
}

impl Plugin for WranglerPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(Scheduler::with_config(self.config.clone()))
            .init_resource::<Managers>()
            .add_event::<ManagerEvent>()
            .add_event::<AppExit>()
            .add_systems(
                FixedUpdate,
                (
                    run_fixed_pump.in_set(WranglerSet::FixedPump),
                    fixed_update_managers,
                )
                    .chain(),
            )
            .add_systems(Update, update_managers)
            .add_systems(PostUpdate, late_update_managers)
            .add_systems(
                Last,
                (
                    run_frame_pump.in_set(WranglerSet::FramePump),
                    forward_manager_events,
                )
                    .chain(),
            );
    }
}

fn run_fixed_pump(mut scheduler: ResMut<Scheduler>, fixed_time: Res<FixedTime>) {
    scheduler.fixed_tick(fixed_time.period);
}

fn fixed_update_managers(
    mut managers: ResMut<Managers>,
    mut scheduler: ResMut<Scheduler>,
    fixed_time: Res<FixedTime>,
) {
    managers.fixed_update(&mut scheduler, fixed_time.period);
}

fn update_managers(
    mut managers: ResMut<Managers>,
    mut scheduler: ResMut<Scheduler>,
    time: Res<Time>,
) {
    managers.update(&mut scheduler, time.delta());
}

fn late_update_managers(
    mut managers: ResMut<Managers>,
    mut scheduler: ResMut<Scheduler>,
    time: Res<Time>,
) {
    managers.late_update(&mut scheduler, time.delta());
}

fn run_frame_pump(mut scheduler: ResMut<Scheduler>, time: Res<Time>) {
    scheduler.frame_tick(time.delta());
}

fn forward_manager_events(
    mut events: EventReader<ManagerEvent>,
    mut exits: EventReader<AppExit>,
    mut managers: ResMut<Managers>,
    mut scheduler: ResMut<Scheduler>,
) {
    for event in events.iter() {
        managers.broadcast(*event, &mut scheduler);
    }

    if exits.iter().count() > 0 {
        managers.broadcast(ManagerEvent::Quit, &mut scheduler);
        scheduler.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use std::time::Duration;

    use crate::directive::Yielded;
    use crate::manager::{Manager, ManagerContext};
    use crate::routine::from_fn;
    use crate::Step;

    use super::*;

    struct Physics {
        resumes: Arc<AtomicUsize>,
        events: Arc<Mutex<Vec<ManagerEvent>>>,
        fixed_updates: Arc<AtomicUsize>,
    }

    impl Manager for Physics {
        fn start(&mut self, cx: &mut ManagerContext<'_>) {
            let resumes = Arc::clone(&self.resumes);
            cx.scheduler
                .register(
                    Some(cx.id),
                    "Settle",
                    from_fn(move |_| match resumes.fetch_add(1, Ordering::SeqCst) {
                        0 => Step::Yield(Yielded::FixedTick),
                        _ => Step::Done,
                    }),
                );
        }

        fn fixed_update(&mut self, _cx: &mut ManagerContext<'_>) {
            self.fixed_updates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_event(&mut self, event: ManagerEvent, _cx: &mut ManagerContext<'_>) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn app() -> (App, Physics) {
        let physics = Physics {
            resumes: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(Mutex::new(Vec::new())),
            fixed_updates: Arc::new(AtomicUsize::new(0)),
        };
        let probe = Physics {
            resumes: Arc::clone(&physics.resumes),
            events: Arc::clone(&physics.events),
            fixed_updates: Arc::clone(&physics.fixed_updates),
        };

        let mut app = App::new();
        app.add_plugins(WranglerPlugin::default())
            .insert_resource(Time::default())
            .insert_resource(FixedTime::new(Duration::from_millis(20)));
        app.world.resource_mut::<Managers>().add("Physics", physics);
        (app, probe)
    }

    #[test]
    fn pumps_follow_the_app_schedules() {
        let (mut app, probe) = app();

        app.update();
        assert_eq!(probe.resumes.load(Ordering::SeqCst), 1);

        // Waiting on the fixed tick, frames do not resume it.
        app.update();
        assert_eq!(probe.resumes.load(Ordering::SeqCst), 1);

        app.world.run_schedule(FixedUpdate);
        assert_eq!(probe.resumes.load(Ordering::SeqCst), 2);
        assert_eq!(probe.fixed_updates.load(Ordering::SeqCst), 1);
        assert_eq!(app.world.resource::<Scheduler>().len(), 1);

        app.world.run_schedule(FixedUpdate);
        assert!(app.world.resource::<Scheduler>().is_empty());
        assert_eq!(probe.resumes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn events_and_exit_are_forwarded() {
        let (mut app, probe) = app();

        app.update();
        app.world.send_event(ManagerEvent::Focus(false));
        app.world.send_event(AppExit);
        app.update();

        assert_eq!(
            *probe.events.lock().unwrap(),
            vec![ManagerEvent::Focus(false), ManagerEvent::Quit]
        );
        assert!(app.world.resource::<Scheduler>().is_empty());
    }
}
