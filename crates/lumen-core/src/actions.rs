//! Action execution with per-action failure isolation.

use crate::action::{ActionSpec, MediaCommand};
use crate::config::CompositeCancellation;
use crate::model::{
    AnnotationKind, ModelError, SceneModel, PROP_ANIMATING, PROP_PAUSED, PROP_PLAYING, PROP_VISIBLE,
};
use crate::navigation::NavigationError;
use crate::timers::TimerError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{annotation} is a {actual:?} annotation, expected {expected:?}")]
    WrongKind {
        annotation: String,
        expected: AnnotationKind,
        actual: AnnotationKind,
    },
    #[error("navigation failed: {0}")]
    Navigation(#[from] NavigationError),
    #[error("timer failed: {0}")]
    Timer(#[from] TimerError),
}

pub type ActionResult<T> = Result<T, ActionError>;

/// Scene navigation as seen by actions.
pub trait SceneNavigator: Send + Sync {
    fn goto(&self, scene: &str) -> Result<(), NavigationError>;
    fn next(&self) -> Result<(), NavigationError>;
    fn previous(&self) -> Result<(), NavigationError>;
    fn back(&self) -> Result<(), NavigationError>;
}

/// Timer control as seen by actions.
pub trait TimerControl: Send + Sync {
    fn start(&self, scene: &str, target: &str) -> Result<(), TimerError>;
    fn stop(&self, scene: &str, target: &str) -> Result<(), TimerError>;
    fn reset(&self, scene: &str, target: &str) -> Result<(), TimerError>;
}

/// Live context an action runs against, captured when it is performed.
#[derive(Debug, Clone)]
struct Binding {
    scene: String,
    epoch: u64,
}

pub struct ActionsEngine {
    model: Arc<dyn SceneModel>,
    navigator: Arc<dyn SceneNavigator>,
    timers: Arc<dyn TimerControl>,
    cancellation: CompositeCancellation,
}

impl ActionsEngine {
    pub fn new(
        model: Arc<dyn SceneModel>,
        navigator: Arc<dyn SceneNavigator>,
        timers: Arc<dyn TimerControl>,
        cancellation: CompositeCancellation,
    ) -> Self {
        Self { model, navigator, timers, cancellation }
    }

    /// Bind `spec` to the current scene and run it on the calling thread.
    ///
    /// Never fails and never panics: errors and panics raised by the action
    /// are logged here. Parallel sub-actions continue on their own threads
    /// after this returns.
    pub fn perform(self: &Arc<Self>, spec: &ActionSpec) {
        let Some(scene) = self.model.current_scene() else {
            warn!(action = spec.kind_name(), "No current scene, action dropped");
            return;
        };
        let binding = Binding { scene, epoch: self.model.scene_epoch() };
        self.run_isolated(spec, &binding);
    }

    /// Like [`perform`](Self::perform), but bound to an explicit scene and
    /// the scene epoch observed when the action was triggered. Rules use this
    /// so an action always targets its owning scene's annotations, and so a
    /// scene change between trigger and start counts as a change.
    pub fn perform_bound(self: &Arc<Self>, scene: &str, epoch: u64, spec: &ActionSpec) {
        let binding = Binding { scene: scene.to_string(), epoch };
        if self.cancelled(&binding) {
            info!(action = spec.kind_name(), scene, "Scene changed before start, action skipped");
            return;
        }
        self.run_isolated(spec, &binding);
    }

    fn run_isolated(self: &Arc<Self>, spec: &ActionSpec, binding: &Binding) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(spec, binding)));
        match outcome {
            Ok(Ok(())) => {
                debug!(action = spec.kind_name(), target = %spec.target(), "Action completed");
            }
            Ok(Err(e)) => {
                error!(
                    action = spec.kind_name(),
                    target = %spec.target(),
                    scene = %binding.scene,
                    error = %e,
                    "Action failed"
                );
            }
            Err(payload) => {
                error!(
                    action = spec.kind_name(),
                    target = %spec.target(),
                    scene = %binding.scene,
                    panic = %panic_message(payload.as_ref()),
                    "Action panicked"
                );
            }
        }
    }

    fn run(self: &Arc<Self>, spec: &ActionSpec, binding: &Binding) -> ActionResult<()> {
        let scene = binding.scene.as_str();
        match spec {
            ActionSpec::ToggleVisibility { targets } => {
                for target in targets {
                    if let Some(visible) = self.lookup_bool(scene, target, PROP_VISIBLE)? {
                        self.model.set_bool_property(scene, target, PROP_VISIBLE, !visible)?;
                    }
                }
                Ok(())
            }
            ActionSpec::ShowAnnotations { targets } => self.set_all(scene, targets, PROP_VISIBLE, true),
            ActionSpec::HideAnnotations { targets } => self.set_all(scene, targets, PROP_VISIBLE, false),

            ActionSpec::NextScene => Ok(self.navigator.next()?),
            ActionSpec::PreviousScene => Ok(self.navigator.previous()?),
            ActionSpec::BackScene => Ok(self.navigator.back()?),
            ActionSpec::GotoScene { scene: to } => Ok(self.navigator.goto(to)?),

            ActionSpec::StartTimer { target } => Ok(self.timers.start(scene, target)?),
            ActionSpec::StopTimer { target } => Ok(self.timers.stop(scene, target)?),
            ActionSpec::ResetTimer { target } => Ok(self.timers.reset(scene, target)?),

            ActionSpec::Audio { target, command } => {
                self.media(scene, target, AnnotationKind::Audio, *command)
            }
            ActionSpec::Video { target, command } => {
                self.media(scene, target, AnnotationKind::Video, *command)
            }

            ActionSpec::StartAnimation { target } => {
                self.set_all(scene, std::slice::from_ref(target), PROP_ANIMATING, true)
            }
            ActionSpec::StopAnimation { target } => {
                self.set_all(scene, std::slice::from_ref(target), PROP_ANIMATING, false)
            }

            ActionSpec::Parallel { actions } => {
                for sub in actions {
                    let kind = sub.kind_name();
                    let engine = Arc::clone(self);
                    let sub = sub.clone();
                    let binding = binding.clone();
                    let spawned = thread::Builder::new()
                        .name(format!("action-{}", kind))
                        .spawn(move || {
                            if engine.cancelled(&binding) {
                                info!(action = kind, "Scene changed, parallel sub-action skipped");
                                return;
                            }
                            engine.run_isolated(&sub, &binding);
                        });
                    if let Err(e) = spawned {
                        error!(action = kind, error = %e, "Failed to spawn parallel sub-action");
                    }
                }
                Ok(())
            }
            ActionSpec::Sequential { actions, time_between_actions_ms } => {
                let pause = Duration::from_millis(*time_between_actions_ms);
                for (index, sub) in actions.iter().enumerate() {
                    if index > 0 && !pause.is_zero() {
                        thread::sleep(pause);
                    }
                    if self.cancelled(binding) {
                        info!(index, remaining = actions.len() - index, "Scene changed, sequence cancelled");
                        break;
                    }
                    self.run_isolated(sub, binding);
                }
                Ok(())
            }
        }
    }

    fn cancelled(&self, binding: &Binding) -> bool {
        self.cancellation == CompositeCancellation::CancelOnSceneChange
            && self.model.scene_epoch() != binding.epoch
    }

    /// Missing annotations are logged and read as `None` so callers skip them.
    fn lookup_bool(&self, scene: &str, target: &str, property: &str) -> ActionResult<Option<bool>> {
        match self.model.bool_property(scene, target, property) {
            Ok(value) => Ok(Some(value)),
            Err(ModelError::AnnotationNotFound { .. }) => {
                error!(scene, target, "Annotation not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_all(&self, scene: &str, targets: &[String], property: &str, value: bool) -> ActionResult<()> {
        for target in targets {
            match self.model.set_bool_property(scene, target, property, value) {
                Ok(()) => {}
                Err(ModelError::AnnotationNotFound { .. }) => {
                    error!(scene, target = %target, "Annotation not found");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn media(&self, scene: &str, target: &str, expected: AnnotationKind, command: MediaCommand) -> ActionResult<()> {
        let annotation = match self.model.annotation(scene, target) {
            Ok(a) => a,
            Err(ModelError::AnnotationNotFound { .. }) => {
                error!(scene, target, "Annotation not found");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if annotation.kind != expected {
            return Err(ActionError::WrongKind {
                annotation: target.to_string(),
                expected,
                actual: annotation.kind,
            });
        }

        let (playing, paused) = match command {
            MediaCommand::Play => (true, false),
            MediaCommand::Pause => (false, true),
            MediaCommand::Stop => (false, false),
        };
        self.model.set_bool_property(scene, target, PROP_PLAYING, playing)?;
        self.model.set_bool_property(scene, target, PROP_PAUSED, paused)?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::tests::sample_project;
    use crate::model::ProjectModel;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Records every navigation and timer call with the time it happened.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) calls: Mutex<Vec<(String, Instant)>>,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push((call, Instant::now()));
        }

        pub(crate) fn names(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
        }

        fn wait_for(&self, n: usize) {
            let deadline = Instant::now() + Duration::from_secs(2);
            while self.calls.lock().unwrap().len() < n && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    impl SceneNavigator for Recorder {
        fn goto(&self, scene: &str) -> Result<(), NavigationError> {
            if scene == "explode" {
                panic!("navigator exploded");
            }
            self.push(format!("goto:{}", scene));
            Ok(())
        }
        fn next(&self) -> Result<(), NavigationError> {
            Err(NavigationError::NoNextScene)
        }
        fn previous(&self) -> Result<(), NavigationError> {
            self.push("previous".into());
            Ok(())
        }
        fn back(&self) -> Result<(), NavigationError> {
            self.push("back".into());
            Ok(())
        }
    }

    impl TimerControl for Recorder {
        fn start(&self, _scene: &str, target: &str) -> Result<(), TimerError> {
            self.push(format!("start:{}", target));
            Ok(())
        }
        fn stop(&self, _scene: &str, target: &str) -> Result<(), TimerError> {
            self.push(format!("stop:{}", target));
            Ok(())
        }
        fn reset(&self, _scene: &str, target: &str) -> Result<(), TimerError> {
            self.push(format!("reset:{}", target));
            Ok(())
        }
    }

    fn setup(cancellation: CompositeCancellation) -> (Arc<ActionsEngine>, Arc<ProjectModel>, Arc<Recorder>) {
        let model = Arc::new(ProjectModel::new(sample_project()));
        model.set_current_scene("intro").unwrap();
        let recorder = Arc::new(Recorder::default());
        let engine = Arc::new(ActionsEngine::new(
            model.clone(),
            recorder.clone(),
            recorder.clone(),
            cancellation,
        ));
        (engine, model, recorder)
    }

    fn visible(model: &ProjectModel, name: &str) -> bool {
        model.bool_property("intro", name, PROP_VISIBLE).unwrap()
    }

    #[test]
    fn test_toggle_visibility_twice() {
        let (engine, model, _) = setup(CompositeCancellation::default());
        let toggle = ActionSpec::ToggleVisibility { targets: vec!["red_box".into()] };

        assert!(visible(&model, "red_box"));
        engine.perform(&toggle);
        assert!(!visible(&model, "red_box"));
        engine.perform(&toggle);
        assert!(visible(&model, "red_box"));
    }

    #[test]
    fn test_missing_annotation_is_noop() {
        let (engine, model, _) = setup(CompositeCancellation::default());
        engine.perform(&ActionSpec::HideAnnotations { targets: vec!["ghost".into(), "red_box".into()] });
        assert!(!visible(&model, "red_box"));
    }

    #[test]
    fn test_failures_and_panics_are_absorbed() {
        let (engine, _, recorder) = setup(CompositeCancellation::default());
        engine.perform(&ActionSpec::NextScene);
        engine.perform(&ActionSpec::GotoScene { scene: "explode".into() });
        engine.perform(&ActionSpec::GotoScene { scene: "outro".into() });
        assert_eq!(recorder.names(), vec!["goto:outro"]);
    }

    #[test]
    fn test_media_kind_checked() {
        let (engine, model, _) = setup(CompositeCancellation::default());
        engine.perform(&ActionSpec::Audio { target: "song".into(), command: MediaCommand::Play });
        assert!(model.bool_property("intro", "song", PROP_PLAYING).unwrap());

        engine.perform(&ActionSpec::Video { target: "song".into(), command: MediaCommand::Stop });
        assert!(model.bool_property("intro", "song", PROP_PLAYING).unwrap());

        engine.perform(&ActionSpec::Audio { target: "song".into(), command: MediaCommand::Pause });
        assert!(!model.bool_property("intro", "song", PROP_PLAYING).unwrap());
        assert!(model.bool_property("intro", "song", PROP_PAUSED).unwrap());
    }

    #[test]
    fn test_animation_flag() {
        let (engine, model, _) = setup(CompositeCancellation::default());
        engine.perform(&ActionSpec::StartAnimation { target: "red_box".into() });
        assert!(model.bool_property("intro", "red_box", PROP_ANIMATING).unwrap());
        engine.perform(&ActionSpec::StopAnimation { target: "red_box".into() });
        assert!(!model.bool_property("intro", "red_box", PROP_ANIMATING).unwrap());
    }

    #[test]
    fn test_sequential_respects_delay() {
        let (engine, _, recorder) = setup(CompositeCancellation::default());
        let delay = Duration::from_millis(200);
        engine.perform(&ActionSpec::Sequential {
            actions: vec![
                ActionSpec::StartTimer { target: "a".into() },
                ActionSpec::NextScene,
                ActionSpec::StartTimer { target: "b".into() },
            ],
            time_between_actions_ms: delay.as_millis() as u64,
        });

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "start:a");
        assert_eq!(calls[1].0, "start:b");
        // Two pauses: before the failing NextScene and before b.
        assert!(calls[1].1.duration_since(calls[0].1) >= delay * 2);
    }

    #[test]
    fn test_parallel_runs_all() {
        let (engine, _, recorder) = setup(CompositeCancellation::default());
        engine.perform(&ActionSpec::Parallel {
            actions: vec![
                ActionSpec::StartTimer { target: "a".into() },
                ActionSpec::StartTimer { target: "b".into() },
            ],
        });
        recorder.wait_for(2);

        let mut names = recorder.names();
        names.sort();
        assert_eq!(names, vec!["start:a", "start:b"]);
    }

    #[test]
    fn test_sequence_cancelled_on_scene_change() {
        let (engine, model, recorder) = setup(CompositeCancellation::CancelOnSceneChange);
        let m = model.clone();
        let switcher = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            m.set_current_scene("outro").unwrap();
        });
        engine.perform(&ActionSpec::Sequential {
            actions: vec![
                ActionSpec::StartTimer { target: "a".into() },
                ActionSpec::StartTimer { target: "b".into() },
            ],
            time_between_actions_ms: 200,
        });
        switcher.join().unwrap();
        assert_eq!(recorder.names(), vec!["start:a"]);
    }

    #[test]
    fn test_sequence_runs_to_completion_by_default() {
        let (engine, model, recorder) = setup(CompositeCancellation::RunToCompletion);
        let m = model.clone();
        let switcher = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            m.set_current_scene("outro").unwrap();
        });
        engine.perform(&ActionSpec::Sequential {
            actions: vec![
                ActionSpec::StartTimer { target: "a".into() },
                ActionSpec::StartTimer { target: "b".into() },
            ],
            time_between_actions_ms: 200,
        });
        switcher.join().unwrap();
        assert_eq!(recorder.names(), vec!["start:a", "start:b"]);
    }

    #[test]
    fn test_stale_epoch_skips_action_when_cancelling() {
        let (engine, model, recorder) = setup(CompositeCancellation::CancelOnSceneChange);
        let epoch = model.scene_epoch();
        model.set_current_scene("outro").unwrap();

        engine.perform_bound("intro", epoch, &ActionSpec::StartTimer { target: "a".into() });
        assert!(recorder.names().is_empty());

        engine.perform_bound("intro", model.scene_epoch(), &ActionSpec::StartTimer { target: "b".into() });
        assert_eq!(recorder.names(), vec!["start:b"]);
    }

    #[test]
    fn test_stale_epoch_still_runs_to_completion_by_default() {
        let (engine, model, recorder) = setup(CompositeCancellation::default());
        let epoch = model.scene_epoch();
        model.set_current_scene("outro").unwrap();

        engine.perform_bound("intro", epoch, &ActionSpec::StartTimer { target: "a".into() });
        assert_eq!(recorder.names(), vec!["start:a"]);
    }

    #[test]
    fn test_panic_message() {
        let caught = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 7");
        let caught = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
    }
}
