//! Timer annotations: start/stop/reset and tick-driven timer events.

use crate::actions::TimerControl;
use crate::event::{Event, TimerEvent};
use crate::event_manager::EventManager;
use crate::model::{AnnotationKind, ModelError, PropValue, SceneModel, PROP_DURATION_MS, PROP_ELAPSED_MS};
use crate::navigation::SceneObserver;
use crossbeam_channel::{bounded, select, tick, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const TIMEOUT_PROPS: [&str; 3] = ["timeout1_ms", "timeout2_ms", "timeout3_ms"];

#[derive(Debug, Error)]
pub enum TimerError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{0} is not a timer annotation")]
    NotATimer(String),
    #[error("timer {0} has no positive duration_ms")]
    NoDuration(String),
}

#[derive(Debug)]
struct TimerState {
    duration: Duration,
    timeouts: [Option<Duration>; 3],
    fired: [bool; 3],
    /// Accumulated while stopped.
    elapsed: Duration,
    running_since: Option<Instant>,
}

impl TimerState {
    fn total(&self, now: Instant) -> Duration {
        self.elapsed + self.running_since.map_or(Duration::ZERO, |s| now.saturating_duration_since(s))
    }
}

type TimerKey = (String, String);

pub struct TimerService {
    model: Arc<dyn SceneModel>,
    events: Arc<EventManager>,
    timers: Mutex<HashMap<TimerKey, TimerState>>,
}

impl TimerService {
    pub fn new(model: Arc<dyn SceneModel>, events: Arc<EventManager>) -> Self {
        Self {
            model,
            events,
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_running(&self, scene: &str, target: &str) -> bool {
        self.lock()
            .get(&(scene.to_string(), target.to_string()))
            .is_some_and(|t| t.running_since.is_some())
    }

    /// Spawn the ticker thread.
    pub fn spawn_ticker(self: &Arc<Self>, interval: Duration) -> TimerTicker {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let service = Arc::clone(self);
        let thread = thread::Builder::new()
            .name("timer-ticker".into())
            .spawn(move || {
                info!("Timer ticker started");
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> msg => match msg {
                            Ok(now) => service.tick_at(now),
                            Err(_) => break,
                        },
                        recv(stop_rx) -> _ => break,
                    }
                }
                info!("Timer ticker exiting");
            });

        match thread {
            Ok(thread) => TimerTicker { stop_tx, thread: Some(thread) },
            Err(e) => {
                warn!(error = %e, "Failed to spawn timer ticker");
                TimerTicker { stop_tx, thread: None }
            }
        }
    }

    /// Advance every running timer to `now` and fire what is due.
    pub fn tick_at(&self, now: Instant) {
        let mut due = Vec::new();
        let mut progress = Vec::new();
        {
            let mut timers = self.lock();
            for ((scene, target), timer) in timers.iter_mut() {
                if timer.running_since.is_none() {
                    continue;
                }
                let total = timer.total(now);
                let total_ms = total.as_millis() as u64;
                let event = || TimerEvent::new(scene.as_str(), target.as_str(), total_ms);

                due.push(Event::TimerTick(event()));
                for (i, timeout) in timer.timeouts.iter().enumerate() {
                    if timer.fired[i] || !timeout.is_some_and(|t| total >= t) {
                        continue;
                    }
                    timer.fired[i] = true;
                    due.push(match i {
                        0 => Event::TimerTimeout1(event()),
                        1 => Event::TimerTimeout2(event()),
                        _ => Event::TimerTimeout3(event()),
                    });
                }
                if total >= timer.duration {
                    timer.elapsed = timer.duration;
                    timer.running_since = None;
                    due.push(Event::TimerFinished(event()));
                    debug!(scene = %scene, target = %target, "Timer finished");
                }
                progress.push((scene.clone(), target.clone(), total.min(timer.duration)));
            }
        }

        for (scene, target, elapsed) in progress {
            self.write_elapsed(&scene, &target, elapsed);
        }
        for event in due {
            self.events.fire(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TimerKey, TimerState>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, scene: &str, target: &str) -> Result<TimerState, TimerError> {
        let annotation = self.model.annotation(scene, target)?;
        if annotation.kind != AnnotationKind::Timer {
            return Err(TimerError::NotATimer(target.to_string()));
        }
        let ms = |name: &str| {
            annotation
                .number_property(name)
                .filter(|v| *v > 0.0)
                .map(|v| Duration::from_millis(v as u64))
        };
        let duration = ms(PROP_DURATION_MS).ok_or_else(|| TimerError::NoDuration(target.to_string()))?;
        Ok(TimerState {
            duration,
            timeouts: TIMEOUT_PROPS.map(ms),
            fired: [false; 3],
            elapsed: Duration::ZERO,
            running_since: None,
        })
    }

    fn write_elapsed(&self, scene: &str, target: &str, elapsed: Duration) {
        let value = PropValue::Number(elapsed.as_millis() as f64);
        if let Err(e) = self.model.set_property(scene, target, PROP_ELAPSED_MS, value) {
            warn!(scene, target, error = %e, "Failed to write timer progress");
        }
    }
}

impl TimerControl for TimerService {
    fn start(&self, scene: &str, target: &str) -> Result<(), TimerError> {
        let key = (scene.to_string(), target.to_string());
        let mut timers = self.lock();
        if !timers.contains_key(&key) {
            let state = self.load(scene, target)?;
            timers.insert(key.clone(), state);
        }
        if let Some(timer) = timers.get_mut(&key) {
            if timer.running_since.is_none() && timer.elapsed < timer.duration {
                timer.running_since = Some(Instant::now());
                info!(scene, target, "Timer started");
            }
        }
        Ok(())
    }

    fn stop(&self, scene: &str, target: &str) -> Result<(), TimerError> {
        let now = Instant::now();
        let elapsed = {
            let mut timers = self.lock();
            let Some(timer) = timers.get_mut(&(scene.to_string(), target.to_string())) else {
                debug!(scene, target, "Stop on idle timer");
                return Ok(());
            };
            timer.elapsed = timer.total(now).min(timer.duration);
            timer.running_since = None;
            timer.elapsed
        };
        self.write_elapsed(scene, target, elapsed);
        info!(scene, target, "Timer stopped");
        Ok(())
    }

    fn reset(&self, scene: &str, target: &str) -> Result<(), TimerError> {
        {
            let mut timers = self.lock();
            if let Some(timer) = timers.get_mut(&(scene.to_string(), target.to_string())) {
                timer.elapsed = Duration::ZERO;
                timer.fired = [false; 3];
                if timer.running_since.is_some() {
                    timer.running_since = Some(Instant::now());
                }
            }
        }
        self.write_elapsed(scene, target, Duration::ZERO);
        info!(scene, target, "Timer reset");
        Ok(())
    }
}

impl SceneObserver for TimerService {
    /// Timers belong to their scene session; leaving the scene drops them.
    fn scene_activated(&self, scene: &str) {
        self.lock().retain(|(owner, _), _| owner == scene);
    }
}

/// Handle to the ticker thread.
pub struct TimerTicker {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl TimerTicker {
    pub fn shutdown(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
