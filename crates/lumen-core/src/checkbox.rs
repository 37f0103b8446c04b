//! Checkbox group conditions.

use crate::event::{Event, EventKind, GroupEvent};
use crate::event_manager::{EventListener, EventManager};
use crate::model::{AnnotationKind, SceneModel, PROP_CHECKED};
use crate::navigation::SceneObserver;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug)]
struct GroupCondition {
    targets: BTreeSet<String>,
    satisfied: bool,
}

#[derive(Debug)]
struct Session {
    scene: String,
    checked: BTreeSet<String>,
    groups: Vec<GroupCondition>,
}

impl Session {
    /// Re-evaluate every condition and return the transitions.
    fn evaluate(&mut self) -> Vec<Event> {
        let mut fired = Vec::new();
        for group in &mut self.groups {
            let all_checked = group.targets.is_subset(&self.checked);
            if all_checked == group.satisfied {
                continue;
            }
            group.satisfied = all_checked;
            let event = GroupEvent::new(self.scene.as_str(), group.targets.iter().cloned());
            fired.push(if all_checked {
                Event::CheckboxGroupChecked(event)
            } else {
                Event::CheckboxGroupUnchecked(event)
            });
        }
        fired
    }
}

/// Tracks which checkboxes of the current scene are checked and fires group
/// events when an AND condition starts or stops holding.
pub struct CheckboxGroupTracker {
    model: Arc<dyn SceneModel>,
    events: Arc<EventManager>,
    session: Mutex<Option<Session>>,
}

impl CheckboxGroupTracker {
    pub fn new(model: Arc<dyn SceneModel>, events: Arc<EventManager>) -> Self {
        Self {
            model,
            events,
            session: Mutex::new(None),
        }
    }

    /// Listen to checkbox toggles.
    pub fn register(self: &Arc<Self>, events: &EventManager) {
        events.register(EventKind::CheckboxChecked, self.clone());
        events.register(EventKind::CheckboxUnchecked, self.clone());
    }

    /// Snapshot the scene's checked boxes and group conditions. Conditions
    /// already satisfied fire immediately.
    pub fn activate(&self, scene: &str) {
        let checked = match self.model.annotations_by_kind(scene, AnnotationKind::Checkbox) {
            Ok(boxes) => boxes
                .into_iter()
                .filter(|a| a.bool_property(PROP_CHECKED).unwrap_or(false))
                .map(|a| a.name)
                .collect(),
            Err(e) => {
                warn!(scene, error = %e, "Failed to snapshot checkboxes");
                BTreeSet::new()
            }
        };

        let mut conditions: Vec<BTreeSet<String>> = Vec::new();
        for rule in self.model.rules(scene).unwrap_or_default() {
            if let Event::CheckboxGroupChecked(g) | Event::CheckboxGroupUnchecked(g) = rule.event {
                if !g.targets.is_empty() && !conditions.contains(&g.targets) {
                    conditions.push(g.targets);
                }
            }
        }
        debug!(scene, groups = conditions.len(), checked = checked.len(), "Checkbox groups activated");

        let mut session = Session {
            scene: scene.to_string(),
            checked,
            groups: conditions
                .into_iter()
                .map(|targets| GroupCondition { targets, satisfied: false })
                .collect(),
        };
        let fired = session.evaluate();
        *self.lock() = Some(session);
        self.fire_all(fired);
    }

    pub fn checked(&self) -> BTreeSet<String> {
        self.lock()
            .as_ref()
            .map(|s| s.checked.clone())
            .unwrap_or_default()
    }

    fn update(&self, scene: &str, target: &str, checked: bool) {
        let fired = {
            let mut guard = self.lock();
            let Some(session) = guard.as_mut().filter(|s| s.scene == scene) else {
                debug!(scene, target, "Checkbox toggle outside the active scene ignored");
                return;
            };
            let changed = if checked {
                session.checked.insert(target.to_string())
            } else {
                session.checked.remove(target)
            };
            if !changed {
                return;
            }
            session.evaluate()
        };
        self.fire_all(fired);
    }

    fn fire_all(&self, fired: Vec<Event>) {
        for event in fired {
            self.events.fire(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventListener for CheckboxGroupTracker {
    fn on_event(&self, event: &Event) {
        match event {
            Event::CheckboxChecked(e) => self.update(&e.scene, &e.target, true),
            Event::CheckboxUnchecked(e) => self.update(&e.scene, &e.target, false),
            _ => {}
        }
    }
}

impl SceneObserver for CheckboxGroupTracker {
    fn scene_activated(&self, scene: &str) {
        self.activate(scene);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpec;
    use crate::event::TargetEvent;
    use crate::model::tests::sample_project;
    use crate::model::{ProjectModel, RuleSpec};

    fn group_rule() -> RuleSpec {
        RuleSpec {
            name: "both".into(),
            event: Event::CheckboxGroupChecked(GroupEvent::new("intro", ["c1", "c2"])),
            action: ActionSpec::NextScene,
        }
    }

    fn setup() -> (Arc<CheckboxGroupTracker>, Arc<ProjectModel>, Arc<EventManager>, Arc<Mutex<Vec<Event>>>) {
        let mut project = sample_project();
        project.scenes[0].rules.push(group_rule());
        let model = Arc::new(ProjectModel::new(project));
        let events = Arc::new(EventManager::new());
        let tracker = Arc::new(CheckboxGroupTracker::new(model.clone(), events.clone()));
        tracker.register(&events);

        let fired = Arc::new(Mutex::new(Vec::new()));
        let f = fired.clone();
        let recorder = Arc::new(move |e: &Event| f.lock().unwrap().push(e.clone()));
        events.register(EventKind::CheckboxGroupChecked, recorder.clone());
        events.register(EventKind::CheckboxGroupUnchecked, recorder);
        (tracker, model, events, fired)
    }

    fn toggle(events: &EventManager, target: &str, checked: bool) {
        let e = TargetEvent::new("intro", target);
        events.fire(if checked {
            Event::CheckboxChecked(e)
        } else {
            Event::CheckboxUnchecked(e)
        });
    }

    #[test]
    fn test_group_transitions_fire_once() {
        let (tracker, _, events, fired) = setup();
        tracker.activate("intro");

        toggle(&events, "c1", true);
        assert!(fired.lock().unwrap().is_empty());

        toggle(&events, "c2", true);
        toggle(&events, "c2", true);
        assert_eq!(
            *fired.lock().unwrap(),
            vec![Event::CheckboxGroupChecked(GroupEvent::new("intro", ["c1", "c2"]))]
        );

        toggle(&events, "c1", false);
        toggle(&events, "c1", false);
        assert_eq!(fired.lock().unwrap().len(), 2);
        assert_eq!(
            fired.lock().unwrap()[1],
            Event::CheckboxGroupUnchecked(GroupEvent::new("intro", ["c2", "c1"]))
        );
    }

    #[test]
    fn test_presatisfied_group_fires_on_activation() {
        let (tracker, model, _, fired) = setup();
        model.set_bool_property("intro", "c1", PROP_CHECKED, true).unwrap();
        model.set_bool_property("intro", "c2", PROP_CHECKED, true).unwrap();

        tracker.activate("intro");
        assert_eq!(fired.lock().unwrap().len(), 1);
        assert_eq!(tracker.checked().len(), 2);
    }

    #[test]
    fn test_other_scene_toggles_ignored() {
        let (tracker, _, events, fired) = setup();
        tracker.activate("outro");
        toggle(&events, "c1", true);
        toggle(&events, "c2", true);
        assert!(fired.lock().unwrap().is_empty());
        assert!(tracker.checked().is_empty());
    }
}
