use lumen_core::{
    ActionSpec, Annotation, AnnotationKind, Bounds, Event, GroupEvent, MarkerMessage, MarkerRect,
    Point, Project, ProjectModel, RuleSpec, Runtime, RuntimeConfig, Scene, SceneModel,
    PROP_VISIBLE,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn project() -> Project {
    let mut lobby = Scene::new("lobby");
    lobby.annotations = vec![
        Annotation::new("button", AnnotationKind::Shape, Bounds::new(0.0, 0.0, 20.0, 20.0))
            .with_property("selectable", true),
        Annotation::new("banner", AnnotationKind::Text, Bounds::new(50.0, 0.0, 40.0, 10.0)),
        Annotation::new("a", AnnotationKind::Checkbox, Bounds::new(0.0, 40.0, 5.0, 5.0)),
        Annotation::new("b", AnnotationKind::Checkbox, Bounds::new(10.0, 40.0, 5.0, 5.0)),
    ];
    lobby.rules = vec![
        RuleSpec {
            name: "press".into(),
            event: Event::selection("lobby", "button"),
            action: ActionSpec::ToggleVisibility { targets: vec!["banner".into()] },
        },
        RuleSpec {
            name: "done".into(),
            event: Event::CheckboxGroupChecked(GroupEvent::new("lobby", ["a", "b"])),
            action: ActionSpec::GotoScene { scene: "hall".into() },
        },
    ];
    Project {
        name: "flow".into(),
        scenes: vec![lobby, Scene::new("hall")],
    }
}

fn config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.tracking.interval_ms = 10;
    config.rules.scene_shown_delay_ms = 0;
    config
}

fn marker_at(x: f64, y: f64) -> MarkerRect {
    MarkerRect::new([
        Point::new(x - 2.0, y - 2.0),
        Point::new(x + 2.0, y - 2.0),
        Point::new(x + 2.0, y + 2.0),
        Point::new(x - 2.0, y + 2.0),
    ])
}

fn wait_until(what: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if what() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn marker_dwell_runs_bound_rule() {
    let model = Arc::new(ProjectModel::new(project()));
    let runtime = Runtime::new(model.clone(), config());
    runtime.show_scene("lobby").unwrap();
    let markers = runtime.attach_marker_feed().unwrap();

    let started = Instant::now();
    while started.elapsed() < Duration::from_millis(400) {
        markers.publish(MarkerMessage::Detected(marker_at(10.0, 10.0)));
        thread::sleep(Duration::from_millis(20));
    }
    markers.publish(MarkerMessage::NoMarker);

    assert!(wait_until(|| !model.bool_property("lobby", "banner", PROP_VISIBLE).unwrap()));
    runtime.shutdown();
}

#[test]
fn checkbox_group_switches_scene() {
    let model = Arc::new(ProjectModel::new(project()));
    let runtime = Runtime::new(model.clone(), config());
    runtime.show_scene("lobby").unwrap();

    runtime.set_checkbox("lobby", "a", true).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(model.current_scene().as_deref(), Some("lobby"));

    runtime.set_checkbox("lobby", "b", true).unwrap();
    assert!(wait_until(|| model.current_scene().as_deref() == Some("hall")));
    assert_eq!(runtime.switcher().history(), vec!["lobby"]);
    runtime.shutdown();
}
