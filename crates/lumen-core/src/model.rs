//! Scene/annotation model.
//!
//! [`SceneModel`] is the contract the runtime consumes; the authoring tool
//! owns the real model. [`ProjectModel`] is an in-memory implementation over
//! a persisted [`Project`], used by the headless runner and tests.

use crate::action::ActionSpec;
use crate::event::Event;
use crate::geometry::{Bounds, Point};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};

pub const PROP_VISIBLE: &str = "visible";
pub const PROP_SELECTABLE: &str = "selectable";
pub const PROP_CHECKED: &str = "checked";
pub const PROP_PLAYING: &str = "playing";
pub const PROP_PAUSED: &str = "paused";
pub const PROP_ANIMATING: &str = "animating";
pub const PROP_DURATION_MS: &str = "duration_ms";
pub const PROP_ELAPSED_MS: &str = "elapsed_ms";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("scene not found: {0}")]
    SceneNotFound(String),
    #[error("annotation not found: {scene}/{name}")]
    AnnotationNotFound { scene: String, name: String },
    #[error("physical object not found: {scene}/{name}")]
    ObjectNotFound { scene: String, name: String },
    #[error("property {property} on {annotation} is not a {expected}")]
    WrongPropertyType {
        annotation: String,
        property: String,
        expected: &'static str,
    },
}

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Text,
    Shape,
    Image,
    Video,
    Audio,
    Timer,
    Checkbox,
    Area,
    Animation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub kind: AnnotationKind,
    pub bounds: Bounds,
    #[serde(default)]
    pub properties: BTreeMap<String, PropValue>,
}

impl Annotation {
    /// New visible annotation with no other properties.
    pub fn new(name: impl Into<String>, kind: AnnotationKind, bounds: Bounds) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(PROP_VISIBLE.to_string(), PropValue::Bool(true));
        Self { name: name.into(), kind, bounds, properties }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Missing properties read as `false`.
    pub fn bool_property(&self, name: &str) -> ModelResult<bool> {
        match self.properties.get(name) {
            None => Ok(false),
            Some(value) => value.as_bool().ok_or_else(|| ModelError::WrongPropertyType {
                annotation: self.name.clone(),
                property: name.to_string(),
                expected: "bool",
            }),
        }
    }

    pub fn number_property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(PropValue::as_f64)
    }

    pub fn is_visible(&self) -> bool {
        self.bool_property(PROP_VISIBLE).unwrap_or(false)
    }

    /// Checkboxes are always selectable; other kinds opt in.
    pub fn is_selectable(&self) -> bool {
        self.kind == AnnotationKind::Checkbox || self.bool_property(PROP_SELECTABLE).unwrap_or(false)
    }

    pub fn contains(&self, p: Point) -> bool {
        self.bounds.contains(p)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalObject {
    pub name: String,
    pub bounds: Bounds,
}

impl PhysicalObject {
    pub fn new(name: impl Into<String>, bounds: Bounds) -> Self {
        Self { name: name.into(), bounds }
    }
}

/// Persisted binding of an event pattern to an action, owned by a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub event: Event,
    pub action: ActionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub physical_objects: Vec<PhysicalObject>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: Vec::new(),
            physical_objects: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub scenes: Vec<Scene>,
}

impl Project {
    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name == name)
    }
}

/// Contract of the scene/annotation model consumed by the runtime.
///
/// Lookups return owned snapshots; callers never hold references into the
/// model across calls.
pub trait SceneModel: Send + Sync {
    fn current_scene(&self) -> Option<String>;

    /// Incremented on every scene switch. Detectors compare it to drop state
    /// that belonged to the previous scene session.
    fn scene_epoch(&self) -> u64;

    fn set_current_scene(&self, scene: &str) -> ModelResult<()>;

    /// Scene names in authored order.
    fn scene_names(&self) -> Vec<String>;

    fn annotations(&self, scene: &str) -> ModelResult<Vec<Annotation>>;

    fn physical_objects(&self, scene: &str) -> ModelResult<Vec<PhysicalObject>>;

    fn rules(&self, scene: &str) -> ModelResult<Vec<RuleSpec>>;

    fn property(&self, scene: &str, annotation: &str, name: &str) -> ModelResult<Option<PropValue>>;

    fn set_property(&self, scene: &str, annotation: &str, name: &str, value: PropValue) -> ModelResult<()>;

    /// Update where the tracking subsystem last saw an object.
    fn set_object_bounds(&self, scene: &str, object: &str, bounds: Bounds) -> ModelResult<()>;

    fn annotations_by_kind(&self, scene: &str, kind: AnnotationKind) -> ModelResult<Vec<Annotation>> {
        Ok(self
            .annotations(scene)?
            .into_iter()
            .filter(|a| a.kind == kind)
            .collect())
    }

    fn annotation(&self, scene: &str, name: &str) -> ModelResult<Annotation> {
        self.annotations(scene)?
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| ModelError::AnnotationNotFound {
                scene: scene.to_string(),
                name: name.to_string(),
            })
    }

    fn bool_property(&self, scene: &str, annotation: &str, name: &str) -> ModelResult<bool> {
        match self.property(scene, annotation, name)? {
            None => Ok(false),
            Some(value) => value.as_bool().ok_or_else(|| ModelError::WrongPropertyType {
                annotation: annotation.to_string(),
                property: name.to_string(),
                expected: "bool",
            }),
        }
    }

    fn set_bool_property(&self, scene: &str, annotation: &str, name: &str, value: bool) -> ModelResult<()> {
        self.set_property(scene, annotation, name, PropValue::Bool(value))
    }
}

struct ProjectState {
    project: Project,
    current: Option<usize>,
}

/// In-memory [`SceneModel`] over a loaded project.
pub struct ProjectModel {
    state: RwLock<ProjectState>,
    epoch: AtomicU64,
}

impl ProjectModel {
    /// Wrap a project. No scene is current until one is shown.
    pub fn new(project: Project) -> Self {
        info!(project = %project.name, scenes = project.scenes.len(), "Project model loaded");
        Self {
            state: RwLock::new(ProjectState { project, current: None }),
            epoch: AtomicU64::new(0),
        }
    }

    /// Copy of the project including all runtime property changes.
    pub fn snapshot(&self) -> Project {
        self.read().project.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, ProjectState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProjectState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_scene<T>(&self, scene: &str, f: impl FnOnce(&Scene) -> T) -> ModelResult<T> {
        let state = self.read();
        state
            .project
            .scene(scene)
            .map(f)
            .ok_or_else(|| ModelError::SceneNotFound(scene.to_string()))
    }

    fn with_scene_mut<T>(&self, scene: &str, f: impl FnOnce(&mut Scene) -> ModelResult<T>) -> ModelResult<T> {
        let mut state = self.write();
        let found = state
            .project
            .scenes
            .iter_mut()
            .find(|s| s.name == scene)
            .ok_or_else(|| ModelError::SceneNotFound(scene.to_string()))?;
        f(found)
    }
}

impl SceneModel for ProjectModel {
    fn current_scene(&self) -> Option<String> {
        let state = self.read();
        state
            .current
            .and_then(|idx| state.project.scenes.get(idx))
            .map(|s| s.name.clone())
    }

    fn scene_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn set_current_scene(&self, scene: &str) -> ModelResult<()> {
        let mut state = self.write();
        let idx = state
            .project
            .scenes
            .iter()
            .position(|s| s.name == scene)
            .ok_or_else(|| ModelError::SceneNotFound(scene.to_string()))?;
        state.current = Some(idx);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(scene, epoch, "Current scene set");
        Ok(())
    }

    fn scene_names(&self) -> Vec<String> {
        self.read().project.scenes.iter().map(|s| s.name.clone()).collect()
    }

    fn annotations(&self, scene: &str) -> ModelResult<Vec<Annotation>> {
        self.with_scene(scene, |s| s.annotations.clone())
    }

    fn physical_objects(&self, scene: &str) -> ModelResult<Vec<PhysicalObject>> {
        self.with_scene(scene, |s| s.physical_objects.clone())
    }

    fn rules(&self, scene: &str) -> ModelResult<Vec<RuleSpec>> {
        self.with_scene(scene, |s| s.rules.clone())
    }

    fn property(&self, scene: &str, annotation: &str, name: &str) -> ModelResult<Option<PropValue>> {
        self.with_scene(scene, |s| {
            s.annotation(annotation)
                .map(|a| a.properties.get(name).cloned())
                .ok_or_else(|| ModelError::AnnotationNotFound {
                    scene: scene.to_string(),
                    name: annotation.to_string(),
                })
        })?
    }

    fn set_property(&self, scene: &str, annotation: &str, name: &str, value: PropValue) -> ModelResult<()> {
        self.with_scene_mut(scene, |s| {
            let found = s
                .annotations
                .iter_mut()
                .find(|a| a.name == annotation)
                .ok_or_else(|| ModelError::AnnotationNotFound {
                    scene: scene.to_string(),
                    name: annotation.to_string(),
                })?;
            found.properties.insert(name.to_string(), value);
            Ok(())
        })
    }

    fn set_object_bounds(&self, scene: &str, object: &str, bounds: Bounds) -> ModelResult<()> {
        self.with_scene_mut(scene, |s| {
            let found = s
                .physical_objects
                .iter_mut()
                .find(|o| o.name == object)
                .ok_or_else(|| ModelError::ObjectNotFound {
                    scene: scene.to_string(),
                    name: object.to_string(),
                })?;
            found.bounds = bounds;
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two scenes: "intro" with a box, a checkbox pair and an area; "outro" empty.
    pub(crate) fn sample_project() -> Project {
        let mut intro = Scene::new("intro");
        intro.annotations = vec![
            Annotation::new("red_box", AnnotationKind::Shape, Bounds::new(0.0, 0.0, 10.0, 10.0))
                .with_property(PROP_SELECTABLE, true),
            Annotation::new("c1", AnnotationKind::Checkbox, Bounds::new(20.0, 0.0, 5.0, 5.0)),
            Annotation::new("c2", AnnotationKind::Checkbox, Bounds::new(30.0, 0.0, 5.0, 5.0)),
            Annotation::new("tray", AnnotationKind::Area, Bounds::new(100.0, 100.0, 50.0, 50.0)),
            Annotation::new("clock", AnnotationKind::Timer, Bounds::new(0.0, 50.0, 10.0, 10.0))
                .with_property(PROP_DURATION_MS, 3_000.0),
            Annotation::new("song", AnnotationKind::Audio, Bounds::new(0.0, 80.0, 5.0, 5.0)),
        ];
        intro.physical_objects = vec![PhysicalObject::new("cup", Bounds::new(60.0, 60.0, 10.0, 10.0))];
        Project {
            name: "demo".into(),
            scenes: vec![intro, Scene::new("outro")],
        }
    }

    #[test]
    fn test_current_scene_and_epoch() {
        let model = ProjectModel::new(sample_project());
        assert_eq!(model.current_scene(), None);
        assert_eq!(model.scene_epoch(), 0);

        model.set_current_scene("intro").unwrap();
        assert_eq!(model.current_scene().as_deref(), Some("intro"));
        assert_eq!(model.scene_epoch(), 1);

        assert!(matches!(model.set_current_scene("missing"), Err(ModelError::SceneNotFound(_))));
        assert_eq!(model.scene_epoch(), 1);
    }

    #[test]
    fn test_bool_properties() {
        let model = ProjectModel::new(sample_project());
        assert!(model.bool_property("intro", "red_box", PROP_VISIBLE).unwrap());
        assert!(!model.bool_property("intro", "c1", PROP_CHECKED).unwrap());

        model.set_bool_property("intro", "c1", PROP_CHECKED, true).unwrap();
        assert!(model.bool_property("intro", "c1", PROP_CHECKED).unwrap());

        assert!(matches!(
            model.bool_property("intro", "clock", PROP_DURATION_MS),
            Err(ModelError::WrongPropertyType { .. })
        ));
        assert!(matches!(
            model.set_bool_property("intro", "ghost", PROP_VISIBLE, true),
            Err(ModelError::AnnotationNotFound { .. })
        ));
    }

    #[test]
    fn test_annotations_by_kind() {
        let model = ProjectModel::new(sample_project());
        let boxes = model.annotations_by_kind("intro", AnnotationKind::Checkbox).unwrap();
        let names: Vec<_> = boxes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c2"]);
    }

    #[test]
    fn test_selectable() {
        let project = sample_project();
        let intro = project.scene("intro").unwrap();
        assert!(intro.annotation("red_box").unwrap().is_selectable());
        assert!(intro.annotation("c1").unwrap().is_selectable());
        assert!(!intro.annotation("tray").unwrap().is_selectable());
    }
}
