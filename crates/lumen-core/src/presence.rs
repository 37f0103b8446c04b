//! Physical-object presence: debounced appear/disappear, pick-up detection,
//! group conditions and area membership.
//!
//! The tracking subsystem calls [`ObjectPresenceTracker::on_tracking_captured`],
//! [`ObjectPresenceTracker::on_tracking_lost`] and
//! [`ObjectPresenceTracker::on_tracking_updated`] from its own thread. Each
//! call updates state under one lock and fires the resulting events after
//! the lock is released.

use crate::config::PresenceConfig;
use crate::event::{AreaEvent, Event, GroupEvent, TargetEvent};
use crate::event_manager::EventManager;
use crate::geometry::{Bounds, Point};
use crate::handoff::HandoffCell;
use crate::model::{AnnotationKind, SceneModel};
use crate::navigation::SceneObserver;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug)]
struct GroupCondition {
    targets: BTreeSet<String>,
    satisfied: bool,
}

#[derive(Debug, Default)]
struct PresenceState {
    scene: Option<String>,
    last_appeared: HashMap<String, Instant>,
    last_disappeared: HashMap<String, Instant>,
    present: BTreeSet<String>,
    /// Object → areas it currently occupies.
    areas: HashMap<String, BTreeSet<String>>,
    groups: Vec<GroupCondition>,
}

/// Fires when the last event for `object` is at least `interval` old.
fn debounced(last: &mut HashMap<String, Instant>, object: &str, now: Instant, interval: Duration) -> bool {
    let due = last
        .get(object)
        .map_or(true, |t| now.saturating_duration_since(*t) >= interval);
    if due {
        last.insert(object.to_string(), now);
    }
    due
}

pub struct ObjectPresenceTracker {
    model: Arc<dyn SceneModel>,
    events: Arc<EventManager>,
    hand_on_top: Arc<HandoffCell<String>>,
    appear_interval: Duration,
    disappear_interval: Duration,
    state: Mutex<PresenceState>,
}

impl ObjectPresenceTracker {
    pub fn new(
        model: Arc<dyn SceneModel>,
        events: Arc<EventManager>,
        hand_on_top: Arc<HandoffCell<String>>,
        config: &PresenceConfig,
    ) -> Self {
        Self {
            model,
            events,
            hand_on_top,
            appear_interval: Duration::from_millis(config.min_interval_appear_ms),
            disappear_interval: Duration::from_millis(config.min_interval_disappear_ms),
            state: Mutex::new(PresenceState::default()),
        }
    }

    /// Drop all per-scene state and load the scene's object-group conditions.
    pub fn reset(&self, scene: &str) {
        let mut conditions: Vec<BTreeSet<String>> = Vec::new();
        for rule in self.model.rules(scene).unwrap_or_default() {
            if let Event::ObjectGroupAppeared(g) = rule.event {
                if !g.targets.is_empty() && !conditions.contains(&g.targets) {
                    conditions.push(g.targets);
                }
            }
        }
        debug!(scene, groups = conditions.len(), "Presence state reset");
        *self.lock() = PresenceState {
            scene: Some(scene.to_string()),
            groups: conditions
                .into_iter()
                .map(|targets| GroupCondition { targets, satisfied: false })
                .collect(),
            ..Default::default()
        };
        self.hand_on_top.clear();
    }

    pub fn on_tracking_captured(&self, object: &str) {
        self.on_tracking_captured_at(object, Instant::now());
    }

    pub fn on_tracking_lost(&self, object: &str) {
        self.on_tracking_lost_at(object, Instant::now());
    }

    /// The object moved. Stores its new bounds and re-tests area membership
    /// without any appear debounce.
    pub fn on_tracking_updated(&self, object: &str, bounds: Bounds) {
        let Some(scene) = self.model.current_scene() else {
            return;
        };
        if let Err(e) = self.model.set_object_bounds(&scene, object, bounds) {
            warn!(scene = %scene, object, error = %e, "Failed to update object bounds");
            return;
        }
        let fired = {
            let mut state = self.state_for(&scene);
            if !state.present.contains(object) {
                return;
            }
            self.refresh_areas(&mut state, &scene, object)
        };
        self.fire_all(fired);
    }

    pub fn on_tracking_captured_at(&self, object: &str, now: Instant) {
        let Some(scene) = self.model.current_scene() else {
            return;
        };
        let fired = {
            let mut state = self.state_for(&scene);
            let mut fired = Vec::new();
            if debounced(&mut state.last_appeared, object, now, self.appear_interval) {
                fired.push(Event::ObjectAppeared(TargetEvent::new(scene.as_str(), object)));
            } else {
                debug!(scene = %scene, object, "Appear suppressed");
            }
            state.present.insert(object.to_string());

            let PresenceState { present, groups, .. } = &mut *state;
            for group in groups.iter_mut() {
                let all_present = group.targets.is_subset(present);
                if all_present && !group.satisfied {
                    fired.push(Event::ObjectGroupAppeared(GroupEvent::new(
                        scene.as_str(),
                        group.targets.iter().cloned(),
                    )));
                }
                group.satisfied = all_present;
            }

            fired.extend(self.refresh_areas(&mut state, &scene, object));
            fired
        };
        self.fire_all(fired);
    }

    pub fn on_tracking_lost_at(&self, object: &str, now: Instant) {
        let Some(scene) = self.model.current_scene() else {
            return;
        };
        let fired = {
            let mut state = self.state_for(&scene);
            let mut fired = Vec::new();
            if debounced(&mut state.last_disappeared, object, now, self.disappear_interval) {
                fired.push(Event::ObjectDisappeared(TargetEvent::new(scene.as_str(), object)));
                if self.hand_on_top.take_if(|t| t == object).is_some() {
                    fired.push(Event::ObjectPicked(TargetEvent::new(scene.as_str(), object)));
                }
            } else {
                debug!(scene = %scene, object, "Disappear suppressed");
            }
            state.present.remove(object);
            for group in state.groups.iter_mut().filter(|g| g.targets.contains(object)) {
                group.satisfied = false;
            }
            for area in state.areas.remove(object).unwrap_or_default() {
                fired.push(Event::ObjectRemovedFromArea(AreaEvent {
                    scene: scene.clone(),
                    object: object.to_string(),
                    area,
                }));
            }
            fired
        };
        self.fire_all(fired);
    }

    pub fn is_present(&self, object: &str) -> bool {
        self.lock().present.contains(object)
    }

    /// Areas the object currently occupies.
    pub fn areas_of(&self, object: &str) -> BTreeSet<String> {
        self.lock().areas.get(object).cloned().unwrap_or_default()
    }

    fn refresh_areas(&self, state: &mut PresenceState, scene: &str, object: &str) -> Vec<Event> {
        let Some(center) = self.object_center(scene, object) else {
            debug!(scene, object, "Object not in scene, area membership skipped");
            return Vec::new();
        };
        let inside: BTreeSet<String> = match self.model.annotations_by_kind(scene, AnnotationKind::Area) {
            Ok(areas) => areas
                .into_iter()
                .filter(|a| a.contains(center))
                .map(|a| a.name)
                .collect(),
            Err(e) => {
                warn!(scene, error = %e, "Failed to read area annotations");
                return Vec::new();
            }
        };

        let before = state.areas.remove(object).unwrap_or_default();
        let area_event = |area: &String| AreaEvent {
            scene: scene.to_string(),
            object: object.to_string(),
            area: area.clone(),
        };
        let mut fired: Vec<Event> = before
            .difference(&inside)
            .map(|a| Event::ObjectRemovedFromArea(area_event(a)))
            .collect();
        fired.extend(inside.difference(&before).map(|a| Event::ObjectPlacedInArea(area_event(a))));
        if !inside.is_empty() {
            state.areas.insert(object.to_string(), inside);
        }
        fired
    }

    fn object_center(&self, scene: &str, object: &str) -> Option<Point> {
        self.model
            .physical_objects(scene)
            .ok()?
            .into_iter()
            .find(|o| o.name == object)
            .map(|o| o.bounds.center())
    }

    /// Lock the state, resetting it first if the scene changed underneath.
    fn state_for(&self, scene: &str) -> MutexGuard<'_, PresenceState> {
        if self.lock().scene.as_deref() != Some(scene) {
            self.reset(scene);
        }
        self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, PresenceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire_all(&self, fired: Vec<Event>) {
        for event in fired {
            self.events.fire(event);
        }
    }
}

impl SceneObserver for ObjectPresenceTracker {
    fn scene_activated(&self, scene: &str) {
        self.reset(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpec;
    use crate::event::EventKind;
    use crate::model::tests::sample_project;
    use crate::model::{PhysicalObject, ProjectModel, RuleSpec};

    struct Fixture {
        tracker: ObjectPresenceTracker,
        model: Arc<ProjectModel>,
        hand_on_top: Arc<HandoffCell<String>>,
        fired: Arc<Mutex<Vec<Event>>>,
    }

    fn setup() -> Fixture {
        let mut project = sample_project();
        project.scenes[0]
            .physical_objects
            .push(PhysicalObject::new("plate", Bounds::new(200.0, 200.0, 10.0, 10.0)));
        project.scenes[0].rules.push(RuleSpec {
            name: "set_table".into(),
            event: Event::ObjectGroupAppeared(GroupEvent::new("intro", ["cup", "plate"])),
            action: ActionSpec::NextScene,
        });
        let model = Arc::new(ProjectModel::new(project));
        model.set_current_scene("intro").unwrap();

        let events = Arc::new(EventManager::new());
        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        events.register_all(Arc::new(move |e: &Event| f.lock().unwrap().push(e.clone())));

        let hand_on_top = Arc::new(HandoffCell::new());
        let tracker = ObjectPresenceTracker::new(
            model.clone(),
            events,
            hand_on_top.clone(),
            &PresenceConfig::default(),
        );
        tracker.reset("intro");
        Fixture { tracker, model, hand_on_top, fired }
    }

    fn kinds(fired: &Mutex<Vec<Event>>) -> Vec<EventKind> {
        std::mem::take(&mut *fired.lock().unwrap())
            .iter()
            .map(Event::kind)
            .collect()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_lost_twice_within_interval_fires_once() {
        let fx = setup();
        let t0 = Instant::now();
        fx.tracker.on_tracking_lost_at("cup", t0);
        fx.tracker.on_tracking_lost_at("cup", t0 + ms(400));
        assert_eq!(kinds(&fx.fired), vec![EventKind::ObjectDisappeared]);

        fx.tracker.on_tracking_lost_at("cup", t0 + ms(1000));
        assert_eq!(kinds(&fx.fired), vec![EventKind::ObjectDisappeared]);
    }

    #[test]
    fn test_appear_is_debounced() {
        let fx = setup();
        let t0 = Instant::now();
        fx.tracker.on_tracking_captured_at("cup", t0);
        fx.tracker.on_tracking_lost_at("cup", t0 + ms(100));
        fx.tracker.on_tracking_captured_at("cup", t0 + ms(200));
        assert_eq!(
            kinds(&fx.fired),
            vec![EventKind::ObjectAppeared, EventKind::ObjectDisappeared]
        );
        assert!(fx.tracker.is_present("cup"));
    }

    #[test]
    fn test_picked_after_hand_on_top() {
        let fx = setup();
        fx.hand_on_top.put("cup".to_string());
        fx.tracker.on_tracking_lost_at("plate", Instant::now());
        assert_eq!(kinds(&fx.fired), vec![EventKind::ObjectDisappeared]);

        fx.tracker.on_tracking_lost_at("cup", Instant::now());
        assert_eq!(
            kinds(&fx.fired),
            vec![EventKind::ObjectDisappeared, EventKind::ObjectPicked]
        );
        assert_eq!(fx.hand_on_top.get(), None);
    }

    #[test]
    fn test_group_appears_once_per_transition() {
        let fx = setup();
        let t0 = Instant::now();
        fx.tracker.on_tracking_captured_at("cup", t0);
        fx.tracker.on_tracking_captured_at("plate", t0);
        fx.tracker.on_tracking_captured_at("plate", t0 + ms(1500));
        let groups = |k: &[EventKind]| k.iter().filter(|k| **k == EventKind::ObjectGroupAppeared).count();
        assert_eq!(groups(&kinds(&fx.fired)), 1);

        fx.tracker.on_tracking_lost_at("plate", t0 + ms(2000));
        fx.tracker.on_tracking_captured_at("plate", t0 + ms(3500));
        assert_eq!(groups(&kinds(&fx.fired)), 1);
    }

    #[test]
    fn test_area_membership() {
        let fx = setup();
        let t0 = Instant::now();
        fx.tracker.on_tracking_captured_at("cup", t0);
        assert_eq!(kinds(&fx.fired), vec![EventKind::ObjectAppeared]);

        fx.tracker.on_tracking_updated("cup", Bounds::new(110.0, 110.0, 10.0, 10.0));
        assert_eq!(
            *fx.fired.lock().unwrap(),
            vec![Event::ObjectPlacedInArea(AreaEvent {
                scene: "intro".into(),
                object: "cup".into(),
                area: "tray".into(),
            })]
        );
        fx.fired.lock().unwrap().clear();
        assert!(fx.tracker.areas_of("cup").contains("tray"));

        fx.tracker.on_tracking_updated("cup", Bounds::new(115.0, 115.0, 10.0, 10.0));
        assert!(kinds(&fx.fired).is_empty());

        fx.tracker.on_tracking_lost_at("cup", t0 + ms(100));
        assert_eq!(
            kinds(&fx.fired),
            vec![EventKind::ObjectDisappeared, EventKind::ObjectRemovedFromArea]
        );
        assert!(fx.tracker.areas_of("cup").is_empty());
    }

    #[test]
    fn test_scene_switch_resets_state() {
        let fx = setup();
        let t0 = Instant::now();
        fx.tracker.on_tracking_lost_at("cup", t0);
        fx.model.set_current_scene("outro").unwrap();
        fx.model.set_current_scene("intro").unwrap();
        fx.tracker.scene_activated("intro");
        fx.tracker.on_tracking_lost_at("cup", t0 + ms(100));
        assert_eq!(
            kinds(&fx.fired),
            vec![EventKind::ObjectDisappeared, EventKind::ObjectDisappeared]
        );
    }
}
