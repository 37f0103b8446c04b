//! Scene-scoped rule matching.

use crate::actions::ActionsEngine;
use crate::config::RulesConfig;
use crate::event::{Event, EventKind};
use crate::event_manager::{EventListener, EventManager};
use crate::model::{RuleSpec, SceneModel};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A rule bound to the live actions engine. Built from a [`RuleSpec`] after
/// load and never persisted.
pub struct Rule {
    pub scene: String,
    pub spec: RuleSpec,
    actions: Arc<ActionsEngine>,
    scene_shown_delay: Duration,
}

impl Rule {
    /// Run the bound action. A rule triggered by `SceneShown` waits first so
    /// the scene can finish rendering.
    ///
    /// `epoch` is the scene epoch at the time `trigger` was dispatched.
    pub fn fire(&self, trigger: &Event, epoch: u64) {
        if trigger.kind() == EventKind::SceneShown && !self.scene_shown_delay.is_zero() {
            thread::sleep(self.scene_shown_delay);
        }
        info!(rule = %self.spec.name, scene = %self.scene, %trigger, "Rule fired");
        self.actions.perform_bound(&self.scene, epoch, &self.spec.action);
    }

    pub fn matches(&self, current_scene: &str, event: &Event) -> bool {
        self.scene == current_scene && self.spec.event == *event
    }
}

pub struct RulesEngine {
    model: Arc<dyn SceneModel>,
    actions: Arc<ActionsEngine>,
    scene_shown_delay: Duration,
    rules: RwLock<HashMap<String, Vec<Arc<Rule>>>>,
}

impl RulesEngine {
    pub fn new(model: Arc<dyn SceneModel>, actions: Arc<ActionsEngine>, config: &RulesConfig) -> Self {
        Self {
            model,
            actions,
            scene_shown_delay: Duration::from_millis(config.scene_shown_delay_ms),
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild every scene's rules from the model. Returns the rule count.
    pub fn bind(&self) -> usize {
        let mut bound = HashMap::new();
        let mut count = 0;
        for scene in self.model.scene_names() {
            match self.model.rules(&scene) {
                Ok(specs) => {
                    count += specs.len();
                    let rules = specs.into_iter().map(|spec| self.bind_rule(&scene, spec)).collect();
                    bound.insert(scene, rules);
                }
                Err(e) => warn!(scene = %scene, error = %e, "Failed to read rules"),
            }
        }
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = bound;
        info!(rules = count, "Rules bound");
        count
    }

    pub fn add_rule(&self, scene: &str, spec: RuleSpec) {
        let rule = self.bind_rule(scene, spec);
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(scene.to_string())
            .or_default()
            .push(rule);
    }

    pub fn rules_for(&self, scene: &str) -> Vec<Arc<Rule>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scene)
            .cloned()
            .unwrap_or_default()
    }

    /// Listen to every event kind.
    pub fn register(self: &Arc<Self>, events: &EventManager) {
        events.register_all(self.clone());
    }

    fn bind_rule(&self, scene: &str, spec: RuleSpec) -> Arc<Rule> {
        Arc::new(Rule {
            scene: scene.to_string(),
            spec,
            actions: self.actions.clone(),
            scene_shown_delay: self.scene_shown_delay,
        })
    }
}

impl EventListener for RulesEngine {
    /// Each matching rule runs on its own thread so a slow action never
    /// stalls dispatch.
    fn on_event(&self, event: &Event) {
        let Some(current) = self.model.current_scene() else {
            debug!(%event, "No current scene, event dropped by rules engine");
            return;
        };

        let epoch = self.model.scene_epoch();

        for rule in self.rules_for(&current) {
            if !rule.matches(&current, event) {
                continue;
            }
            let trigger = event.clone();
            let spawned = thread::Builder::new()
                .name(thread_name(&rule.spec.name))
                .spawn({
                    let rule = rule.clone();
                    move || rule.fire(&trigger, epoch)
                });
            if let Err(e) = spawned {
                error!(rule = %rule.spec.name, error = %e, "Failed to spawn rule thread");
            }
        }
    }
}

/// Thread names cannot hold NUL bytes; std panics on them.
fn thread_name(rule: &str) -> String {
    format!("rule-{}", rule.replace('\0', ""))
}
