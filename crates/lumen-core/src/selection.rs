//! Selection detector: turns the tracked pointer marker into Selection and
//! HandOnTop events.

use crate::config::{RuntimeConfig, SelectionConfig};
use crate::debounce::Debouncer;
use crate::event::{Event, EventKind, TargetEvent};
use crate::event_manager::EventManager;
use crate::geometry::{Homography, MarkerRect};
use crate::mailbox::MailboxReader;
use crate::model::{AnnotationKind, SceneModel, PROP_CHECKED};
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// What the marker tracker publishes into the marker mailbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerMessage {
    Detected(MarkerRect),
    /// No marker in the last frame. A normal "no signal" tick.
    NoMarker,
    /// Unblocks the reader on teardown.
    Shutdown,
}

pub struct SelectionDetector {
    model: Arc<dyn SceneModel>,
    events: Arc<EventManager>,
    homography: Homography,
    config: SelectionConfig,
    interval: Duration,
    debounce: Debouncer<(EventKind, String)>,
    epoch: Option<u64>,
}

impl SelectionDetector {
    pub fn new(model: Arc<dyn SceneModel>, events: Arc<EventManager>, config: &RuntimeConfig) -> Self {
        Self {
            model,
            events,
            homography: config.projection.homography.unwrap_or_default(),
            config: config.selection.clone(),
            interval: config.tracking.interval(),
            debounce: Debouncer::new(),
            epoch: None,
        }
    }

    /// Run the polling loop on a dedicated thread.
    pub fn spawn(
        mut self,
        markers: MailboxReader<MarkerMessage>,
        stop: Arc<AtomicBool>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("selection-detector".into())
            .spawn(move || {
                info!("Selection detector thread started");
                while !stop.load(Ordering::SeqCst) {
                    match markers.recv_timeout(self.interval) {
                        Ok(MarkerMessage::Detected(rect)) => self.tick_at(&rect, Instant::now()),
                        Ok(MarkerMessage::NoMarker) => trace!("No marker this tick"),
                        Ok(MarkerMessage::Shutdown) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            warn!("Marker mailbox disconnected");
                            break;
                        }
                    }
                }
                info!("Selection detector thread exiting");
            })
    }

    /// Process one marker position observed at `now`.
    pub fn tick_at(&mut self, rect: &MarkerRect, now: Instant) {
        let Some(scene) = self.model.current_scene() else {
            return;
        };
        let epoch = self.model.scene_epoch();
        if self.epoch != Some(epoch) {
            self.debounce.clear();
            self.epoch = Some(epoch);
        }
        let Some(point) = self.homography.apply(rect.center()) else {
            return;
        };

        let mut colliding: Vec<(EventKind, String)> = Vec::new();
        match self.model.physical_objects(&scene) {
            Ok(objects) => colliding.extend(
                objects
                    .into_iter()
                    .filter(|o| o.bounds.contains(point))
                    .map(|o| (EventKind::HandOnTop, o.name)),
            ),
            Err(e) => error!(scene = %scene, error = %e, "Failed to read physical objects"),
        }
        let annotations = match self.model.annotations(&scene) {
            Ok(annotations) => annotations,
            Err(e) => {
                error!(scene = %scene, error = %e, "Failed to read annotations");
                Vec::new()
            }
        };
        colliding.extend(
            annotations
                .iter()
                .filter(|a| a.is_selectable() && a.is_visible() && a.contains(point))
                .map(|a| (EventKind::Selection, a.name.clone())),
        );

        // Losing every collision resets all targets, not only the last one.
        if colliding.is_empty() {
            if !self.debounce.is_empty() {
                trace!("No collision, debounce state cleared");
                self.debounce.clear();
            }
            return;
        }

        for (kind, target) in colliding {
            let (trigger, repeat) = self.intervals(kind);
            if !self.debounce.observe((kind, target.clone()), now, trigger, repeat) {
                continue;
            }
            debug!(%kind, scene = %scene, target = %target, "Selection detector triggered");
            let is_checkbox = kind == EventKind::Selection
                && annotations
                    .iter()
                    .any(|a| a.name == target && a.kind == AnnotationKind::Checkbox);

            let event = TargetEvent::new(scene.as_str(), target.as_str());
            match kind {
                EventKind::HandOnTop => self.events.fire(Event::HandOnTop(event)),
                _ => self.events.fire(Event::Selection(event)),
            }
            if is_checkbox {
                self.toggle_checkbox(&scene, &target);
            }
        }
    }

    fn intervals(&self, kind: EventKind) -> (Duration, Option<Duration>) {
        let trigger = match kind {
            EventKind::HandOnTop => self.config.hand_on_top_trigger_interval_ms,
            _ => self.config.trigger_interval_ms,
        };
        let repeat = kind
            .is_repeatable()
            .then(|| Duration::from_millis(self.config.repeat_interval_ms));
        (Duration::from_millis(trigger), repeat)
    }

    fn toggle_checkbox(&self, scene: &str, target: &str) {
        let checked = match self.model.bool_property(scene, target, PROP_CHECKED) {
            Ok(checked) => !checked,
            Err(e) => {
                error!(scene, target, error = %e, "Failed to read checkbox state");
                return;
            }
        };
        if let Err(e) = self.model.set_bool_property(scene, target, PROP_CHECKED, checked) {
            error!(scene, target, error = %e, "Failed to toggle checkbox");
            return;
        }
        let event = TargetEvent::new(scene, target);
        self.events.fire(if checked {
            Event::CheckboxChecked(event)
        } else {
            Event::CheckboxUnchecked(event)
        });
    }
}
