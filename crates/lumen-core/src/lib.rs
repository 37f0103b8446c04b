//! lumen-core: event/action runtime for projected AR scenes.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Camera capture and marker detection live in `lumen-tracking`.

mod action;
mod actions;
mod checkbox;
mod config;
mod debounce;
mod event;
mod event_manager;
mod geometry;
mod handoff;
mod mailbox;
mod model;
mod navigation;
mod presence;
mod rules;
mod runtime;
mod selection;
mod storage;
mod timers;
mod validate;

pub use action::{ActionSpec, ActionTarget, MediaCommand};
pub use actions::{ActionError, ActionResult, ActionsEngine, SceneNavigator, TimerControl};
pub use checkbox::CheckboxGroupTracker;
pub use config::{
    config_dir, default_config_path, load_config, load_or_default, save_config, ActionsConfig,
    CompositeCancellation, ConfigError, ConfigResult, PresenceConfig, ProjectionConfig,
    RulesConfig, RuntimeConfig, SelectionConfig, TimersConfig, TrackingConfig,
};
pub use debounce::{DebounceEntry, Debouncer};
pub use event::{AreaEvent, Event, EventKind, GroupEvent, SceneEvent, TargetEvent, TimerEvent};
pub use event_manager::{EventListener, EventManager};
pub use geometry::{Bounds, Homography, MarkerRect, Point};
pub use handoff::HandoffCell;
pub use mailbox::{mailbox, MailboxReader, MailboxWriter};
pub use model::{
    Annotation, AnnotationKind, ModelError, ModelResult, PhysicalObject, Project, ProjectModel,
    PropValue, RuleSpec, Scene, SceneModel, PROP_ANIMATING, PROP_CHECKED, PROP_DURATION_MS,
    PROP_ELAPSED_MS, PROP_PAUSED, PROP_PLAYING, PROP_SELECTABLE, PROP_VISIBLE,
};
pub use navigation::{NavigationError, SceneObserver, SceneSwitcher};
pub use presence::ObjectPresenceTracker;
pub use rules::{Rule, RulesEngine};
pub use runtime::Runtime;
pub use selection::{MarkerMessage, SelectionDetector};
pub use storage::{
    delete_project, delete_project_in, get_app_data_dir, get_projects_dir, list_projects,
    list_projects_in, load_project, load_project_file, load_project_in, save_project,
    save_project_in, StorageError, StorageResult,
};
pub use timers::{TimerError, TimerService, TimerTicker};
pub use validate::{validate_project, ValidationError, ValidationResult};
