use lumen_core::{
    ActionSpec, Annotation, AnnotationKind, Bounds, Event, MarkerRect, Point, Project, ProjectModel,
    RuleSpec, Runtime, RuntimeConfig, Scene, SceneModel, PROP_VISIBLE,
};
use lumen_tracking::{Camera, CameraError, Frame, MarkerDetector, TrackingPipeline};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Emits a blank frame every 10ms.
struct StubCamera {
    open: bool,
}

impl Camera for StubCamera {
    fn start_capture(&mut self) -> Result<(), CameraError> {
        self.open = true;
        Ok(())
    }

    fn get_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotCapturing);
        }
        thread::sleep(Duration::from_millis(10));
        Ok(Frame::new(2, 2, vec![0; 4]))
    }

    fn stop_capture(&mut self) {
        self.open = false;
    }
}

fn project() -> Project {
    let mut lobby = Scene::new("lobby");
    lobby.annotations = vec![
        Annotation::new("button", AnnotationKind::Shape, Bounds::new(0.0, 0.0, 20.0, 20.0))
            .with_property("selectable", true),
        Annotation::new("banner", AnnotationKind::Text, Bounds::new(50.0, 0.0, 40.0, 10.0)),
    ];
    lobby.rules = vec![RuleSpec {
        name: "press".into(),
        event: Event::selection("lobby", "button"),
        action: ActionSpec::HideAnnotations { targets: vec!["banner".into()] },
    }];
    Project {
        name: "camera".into(),
        scenes: vec![lobby],
    }
}

fn marker_at(x: f64, y: f64) -> MarkerRect {
    MarkerRect::new([
        Point::new(x - 2.0, y - 2.0),
        Point::new(x + 2.0, y - 2.0),
        Point::new(x + 2.0, y + 2.0),
        Point::new(x - 2.0, y + 2.0),
    ])
}

#[test]
fn camera_frames_drive_rules_through_runtime() {
    let model = Arc::new(ProjectModel::new(project()));
    let mut config = RuntimeConfig::default();
    config.tracking.interval_ms = 10;
    let runtime = Runtime::new(model.clone(), config);
    runtime.show_scene("lobby").unwrap();
    let markers = runtime.attach_marker_feed().unwrap();

    let detector: Box<dyn MarkerDetector> = Box::new(|_: &Frame| Some(marker_at(10.0, 10.0)));
    let mut pipeline =
        TrackingPipeline::start(Box::new(StubCamera { open: false }), detector, markers).unwrap();

    let deadline = Instant::now() + Duration::from_secs(3);
    while model.bool_property("lobby", "banner", PROP_VISIBLE).unwrap() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    pipeline.shutdown();
    runtime.shutdown();

    assert!(!model.bool_property("lobby", "banner", PROP_VISIBLE).unwrap());
}
