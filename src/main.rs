use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::log::{info, LogPlugin};
use bevy::prelude::*;
use wrangler::prelude::*;

fn main() {
    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
                1.0 / 60.0,
            ))),
            LogPlugin::default(),
            WranglerPlugin::default(),
        ))
        .add_systems(Startup, load_managers)
        .add_systems(Update, quit_after_a_while)
        .run();
}

fn load_managers(mut managers: ResMut<Managers>, mut scheduler: ResMut<Scheduler>) {
    let score = Arc::new(AtomicU32::new(0));
    let points = Arc::clone(&score);
    scheduler
        .routines_mut()
        .register_with("AddScore", move |amount: u32| {
            let points = Arc::clone(&points);
            FunctionRoutine::new(move |mut s: Scope| async move {
                for _ in 0..amount {
                    s.seconds(0.1).await;
                    points.fetch_add(1, Ordering::Relaxed);
                }
            })
        });

    managers.add("Score", ScoreManager { score });
    managers.add(
        "Music",
        MusicManager {
            volume: Arc::new(Mutex::new(1.0)),
        },
    );
}

struct ScoreManager {
    score: Arc<AtomicU32>,
}

impl Manager for ScoreManager {
    fn start(&mut self, cx: &mut ManagerContext<'_>) {
        if let Err(err) = cx.scheduler.start_with(Some(cx.id), "AddScore", 10u32) {
            warn!("{err}");
        }
    }

    fn on_event(&mut self, event: ManagerEvent, _cx: &mut ManagerContext<'_>) {
        if event == ManagerEvent::Quit {
            info!("final score: {}", self.score.load(Ordering::Relaxed));
        }
    }
}

struct MusicManager {
    volume: Arc<Mutex<f32>>,
}

impl Manager for MusicManager {
    fn start(&mut self, cx: &mut ManagerContext<'_>) {
        let volume = Arc::clone(&self.volume);
        cx.scheduler
            .start_async(Some(cx.id), "FadeOut", |mut s: Scope| async move {
                s.seconds(1.0).await;
                let mut elapsed = 0.0;
                while elapsed < 1.0 {
                    elapsed += s.next_tick().await.as_secs_f32();
                    let mut volume = volume.lock().unwrap_or_else(|e| e.into_inner());
                    *volume = (1.0 - elapsed).max(0.0);
                }
                info!("music faded out");
            });
    }

    fn late_update(&mut self, cx: &mut ManagerContext<'_>) {
        if cx.scheduler.is_running("FadeOut") {
            let volume = *self.volume.lock().unwrap_or_else(|e| e.into_inner());
            debug!("volume {volume:.2}");
        }
    }
}

fn quit_after_a_while(time: Res<Time>, mut exit: EventWriter<AppExit>) {
    if time.elapsed_seconds() > 3.0 {
        exit.send(AppExit);
    }
}
