//! Scene switching and history.

use crate::actions::SceneNavigator;
use crate::event::Event;
use crate::event_manager::EventManager;
use crate::model::{ModelError, SceneModel};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no current scene")]
    NoCurrentScene,
    #[error("already at the last scene")]
    NoNextScene,
    #[error("already at the first scene")]
    NoPreviousScene,
    #[error("scene history is empty")]
    EmptyHistory,
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Component that must reset or re-snapshot when a scene becomes current.
pub trait SceneObserver: Send + Sync {
    fn scene_activated(&self, scene: &str);
}

/// Makes a scene current and announces the switch.
///
/// A switch fires `SceneLeft` for the old scene while it is still current,
/// updates the model, notifies observers, then fires `SceneShown`.
pub struct SceneSwitcher {
    model: Arc<dyn SceneModel>,
    events: Arc<EventManager>,
    observers: Vec<Arc<dyn SceneObserver>>,
    history: Mutex<Vec<String>>,
}

impl SceneSwitcher {
    pub fn new(
        model: Arc<dyn SceneModel>,
        events: Arc<EventManager>,
        observers: Vec<Arc<dyn SceneObserver>>,
    ) -> Self {
        Self {
            model,
            events,
            observers,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn show(&self, scene: &str) -> Result<(), NavigationError> {
        self.switch(scene, true)
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn switch(&self, scene: &str, record_history: bool) -> Result<(), NavigationError> {
        let previous = self.model.current_scene();
        if previous.as_deref() == Some(scene) {
            debug!(scene, "Scene already current");
            return Ok(());
        }
        if !self.model.scene_names().iter().any(|s| s == scene) {
            return Err(ModelError::SceneNotFound(scene.to_string()).into());
        }

        if let Some(prev) = &previous {
            self.events.fire(Event::scene_left(prev.as_str()));
        }

        self.model.set_current_scene(scene)?;
        if let (Some(prev), true) = (&previous, record_history) {
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(prev.clone());
        }
        info!(from = ?previous, to = scene, "Scene switched");

        for observer in &self.observers {
            observer.scene_activated(scene);
        }
        self.events.fire(Event::scene_shown(scene));
        Ok(())
    }

    fn neighbour(&self, offset: isize) -> Result<String, NavigationError> {
        let current = self.model.current_scene().ok_or(NavigationError::NoCurrentScene)?;
        let names = self.model.scene_names();
        let idx = names
            .iter()
            .position(|s| *s == current)
            .ok_or(NavigationError::NoCurrentScene)?;
        idx.checked_add_signed(offset)
            .and_then(|i| names.get(i))
            .cloned()
            .ok_or(if offset > 0 {
                NavigationError::NoNextScene
            } else {
                NavigationError::NoPreviousScene
            })
    }
}

impl SceneNavigator for SceneSwitcher {
    fn goto(&self, scene: &str) -> Result<(), NavigationError> {
        self.show(scene)
    }

    fn next(&self) -> Result<(), NavigationError> {
        let scene = self.neighbour(1)?;
        self.show(&scene)
    }

    fn previous(&self) -> Result<(), NavigationError> {
        let scene = self.neighbour(-1)?;
        self.show(&scene)
    }

    fn back(&self) -> Result<(), NavigationError> {
        let scene = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(NavigationError::EmptyHistory)?;
        self.switch(&scene, false)
    }
}
