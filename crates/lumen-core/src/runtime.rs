//! The runtime context: one per loaded project.
//!
//! Construction wires every component to a fresh [`EventManager`] and binds
//! the project's rules; [`Runtime::shutdown`] stops the worker threads and
//! drops every listener so the listener/engine reference cycles are broken.

use crate::actions::{ActionsEngine, SceneNavigator, TimerControl};
use crate::checkbox::CheckboxGroupTracker;
use crate::config::RuntimeConfig;
use crate::event::{Event, EventKind, TargetEvent};
use crate::event_manager::EventManager;
use crate::handoff::HandoffCell;
use crate::mailbox::{mailbox, MailboxWriter};
use crate::model::{ModelResult, SceneModel, PROP_CHECKED};
use crate::navigation::{NavigationError, SceneObserver, SceneSwitcher};
use crate::presence::ObjectPresenceTracker;
use crate::rules::RulesEngine;
use crate::selection::{MarkerMessage, SelectionDetector};
use crate::timers::{TimerService, TimerTicker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{info, warn};

struct DetectorHandle {
    markers: MailboxWriter<MarkerMessage>,
    thread: JoinHandle<()>,
}

pub struct Runtime {
    config: RuntimeConfig,
    model: Arc<dyn SceneModel>,
    events: Arc<EventManager>,
    switcher: Arc<SceneSwitcher>,
    actions: Arc<ActionsEngine>,
    rules: Arc<RulesEngine>,
    checkboxes: Arc<CheckboxGroupTracker>,
    presence: Arc<ObjectPresenceTracker>,
    timers: Arc<TimerService>,
    hand_on_top: Arc<HandoffCell<String>>,
    stop: Arc<AtomicBool>,
    detector: Mutex<Option<DetectorHandle>>,
    ticker: Mutex<Option<TimerTicker>>,
}

impl Runtime {
    pub fn new(model: Arc<dyn SceneModel>, config: RuntimeConfig) -> Self {
        let events = Arc::new(EventManager::new());
        let hand_on_top = Arc::new(HandoffCell::new());

        let checkboxes = Arc::new(CheckboxGroupTracker::new(model.clone(), events.clone()));
        let presence = Arc::new(ObjectPresenceTracker::new(
            model.clone(),
            events.clone(),
            hand_on_top.clone(),
            &config.presence,
        ));
        let timers = Arc::new(TimerService::new(model.clone(), events.clone()));

        let observers: Vec<Arc<dyn SceneObserver>> = vec![
            checkboxes.clone() as Arc<dyn SceneObserver>,
            presence.clone() as Arc<dyn SceneObserver>,
            timers.clone() as Arc<dyn SceneObserver>,
        ];
        let switcher = Arc::new(SceneSwitcher::new(model.clone(), events.clone(), observers));

        let navigator: Arc<dyn SceneNavigator> = switcher.clone();
        let timer_control: Arc<dyn TimerControl> = timers.clone();
        let actions = Arc::new(ActionsEngine::new(
            model.clone(),
            navigator,
            timer_control,
            config.actions.composite_cancellation,
        ));
        let rules = Arc::new(RulesEngine::new(model.clone(), actions.clone(), &config.rules));
        rules.bind();

        let handoff = hand_on_top.clone();
        events.register(
            EventKind::HandOnTop,
            Arc::new(move |event: &Event| {
                if let Event::HandOnTop(e) = event {
                    handoff.put(e.target.clone());
                }
            }),
        );
        checkboxes.register(&events);
        rules.register(&events);

        let ticker = timers.spawn_ticker(config.timers.tick_interval());
        info!("Runtime started");

        Self {
            config,
            model,
            events,
            switcher,
            actions,
            rules,
            checkboxes,
            presence,
            timers,
            hand_on_top,
            stop: Arc::new(AtomicBool::new(false)),
            detector: Mutex::new(None),
            ticker: Mutex::new(Some(ticker)),
        }
    }

    /// Start the selection detector on a fresh marker mailbox and return the
    /// writer end for the marker tracker. Replaces any previous feed.
    pub fn attach_marker_feed(&self) -> std::io::Result<MailboxWriter<MarkerMessage>> {
        self.detach_marker_feed();
        let (writer, reader) = mailbox();
        let detector = SelectionDetector::new(self.model.clone(), self.events.clone(), &self.config);
        let thread = detector.spawn(reader, self.stop.clone())?;
        *self.detector.lock().unwrap_or_else(PoisonError::into_inner) = Some(DetectorHandle {
            markers: writer.clone(),
            thread,
        });
        Ok(writer)
    }

    fn detach_marker_feed(&self) {
        let handle = self.detector.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            handle.markers.publish(MarkerMessage::Shutdown);
            if handle.thread.join().is_err() {
                warn!("Selection detector thread panicked");
            }
        }
    }

    pub fn show_scene(&self, scene: &str) -> Result<(), NavigationError> {
        self.switcher.show(scene)
    }

    /// Set a checkbox and announce the change, as the UI does when a box is
    /// clicked rather than selected with the marker.
    pub fn set_checkbox(&self, scene: &str, name: &str, checked: bool) -> ModelResult<()> {
        if self.model.bool_property(scene, name, PROP_CHECKED)? == checked {
            return Ok(());
        }
        self.model.set_bool_property(scene, name, PROP_CHECKED, checked)?;
        let event = TargetEvent::new(scene, name);
        self.events.fire(if checked {
            Event::CheckboxChecked(event)
        } else {
            Event::CheckboxUnchecked(event)
        });
        Ok(())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn SceneModel> {
        &self.model
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn switcher(&self) -> &Arc<SceneSwitcher> {
        &self.switcher
    }

    pub fn actions(&self) -> &Arc<ActionsEngine> {
        &self.actions
    }

    pub fn rules(&self) -> &Arc<RulesEngine> {
        &self.rules
    }

    pub fn checkboxes(&self) -> &Arc<CheckboxGroupTracker> {
        &self.checkboxes
    }

    pub fn presence(&self) -> &Arc<ObjectPresenceTracker> {
        &self.presence
    }

    pub fn timers(&self) -> &Arc<TimerService> {
        &self.timers
    }

    /// Last physical object the hand rested on, until a pick consumes it.
    pub fn last_hand_on_top(&self) -> Option<String> {
        self.hand_on_top.get()
    }

    /// Stop the worker threads and unregister every listener. Rule and
    /// action threads already running finish on their own.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.detach_marker_feed();
        if let Some(ticker) = self.ticker.lock().unwrap_or_else(PoisonError::into_inner).take() {
            ticker.shutdown();
        }
        self.events.clear();
        info!("Runtime stopped");
    }
}
