//! lumen-tracking: camera and marker-tracking I/O boundary for lumen.
//!
//! This crate provides:
//! - The camera service contract and a capture pump thread
//! - The marker detector contract (vision library adapters implement it)
//! - The marker tracker worker, which feeds the runtime's marker mailbox
//!
//! Frames flow camera → frame mailbox → marker tracker → marker mailbox.
//! Both mailboxes hold only the newest value.
//!
//! No camera driver or vision library ships here: a host binary provides a
//! [`Camera`] and a [`MarkerDetector`] and hands the runtime's marker feed to
//! [`TrackingPipeline::start`]. The `lumen` CLI replays recorded sessions
//! straight into that feed instead.

mod camera;
mod detector;
mod error;
mod tracker;

pub use camera::{Camera, Frame, FrameMessage};
pub use detector::MarkerDetector;
pub use error::{CameraError, TrackingError, TrackingResult};

use lumen_core::{mailbox, MailboxWriter, MarkerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Handle to the running capture pump and marker tracker.
pub struct TrackingPipeline {
    frames: MailboxWriter<FrameMessage>,
    running: Arc<AtomicBool>,
    capture: Option<JoinHandle<()>>,
    tracker: Option<JoinHandle<()>>,
}

impl TrackingPipeline {
    /// Open the camera and start both worker threads. A camera that fails to
    /// start is fatal and returned to the caller.
    pub fn start(
        mut camera: Box<dyn Camera>,
        detector: Box<dyn MarkerDetector>,
        markers: MailboxWriter<MarkerMessage>,
    ) -> TrackingResult<Self> {
        camera.start_capture()?;
        info!("Camera capture started");

        let running = Arc::new(AtomicBool::new(true));
        let (frames, frame_reader) = mailbox();

        let tracker = tracker::spawn_marker_tracker(detector, frame_reader, markers, running.clone())
            .map_err(|source| TrackingError::Spawn { name: "marker-tracker", source })?;
        let capture = match camera::spawn_capture_pump(camera, frames.clone(), running.clone()) {
            Ok(handle) => handle,
            Err(source) => {
                running.store(false, Ordering::SeqCst);
                frames.publish(FrameMessage::Shutdown);
                let _ = tracker.join();
                return Err(TrackingError::Spawn { name: "camera-capture", source });
            }
        };

        Ok(Self {
            frames,
            running,
            capture: Some(capture),
            tracker: Some(tracker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop both threads and wait for them to exit.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.frames.publish(FrameMessage::Shutdown);
        for (name, handle) in [("marker-tracker", self.tracker.take()), ("camera-capture", self.capture.take())] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!(thread = name, "Tracking thread panicked");
                }
            }
        }
    }
}

impl Drop for TrackingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{MarkerRect, Point};
    use std::thread;
    use std::time::Duration;

    /// Produces a frame every few milliseconds; byte 0 says whether the
    /// marker is visible.
    struct FakeCamera {
        open: bool,
        fail_open: bool,
        tick: u8,
    }

    impl FakeCamera {
        fn new() -> Self {
            Self { open: false, fail_open: false, tick: 0 }
        }
    }

    impl Camera for FakeCamera {
        fn start_capture(&mut self) -> Result<(), CameraError> {
            if self.fail_open {
                return Err(CameraError::Open("no device".into()));
            }
            self.open = true;
            Ok(())
        }

        fn get_frame(&mut self) -> Result<Frame, CameraError> {
            if !self.open {
                return Err(CameraError::NotCapturing);
            }
            thread::sleep(Duration::from_millis(5));
            self.tick = self.tick.wrapping_add(1);
            Ok(Frame::new(4, 4, vec![1, self.tick]))
        }

        fn stop_capture(&mut self) {
            self.open = false;
        }
    }

    fn square() -> MarkerRect {
        MarkerRect::new([
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ])
    }

    fn detector(visible: bool) -> Box<dyn MarkerDetector> {
        Box::new(move |frame: &Frame| (visible && frame.data[0] == 1).then(square))
    }

    #[test]
    fn test_pipeline_publishes_detections() {
        let (markers, reader) = mailbox();
        let mut pipeline =
            TrackingPipeline::start(Box::new(FakeCamera::new()), detector(true), markers).unwrap();

        let msg = reader.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(msg, MarkerMessage::Detected(square()));
        pipeline.shutdown();
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_no_marker_is_published_as_no_signal() {
        let (markers, reader) = mailbox();
        let mut pipeline =
            TrackingPipeline::start(Box::new(FakeCamera::new()), detector(false), markers).unwrap();

        let msg = reader.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(msg, MarkerMessage::NoMarker);
        pipeline.shutdown();
    }

    #[test]
    fn test_camera_open_failure_is_fatal() {
        let (markers, _reader) = mailbox();
        let camera = FakeCamera { fail_open: true, ..FakeCamera::new() };
        let result = TrackingPipeline::start(Box::new(camera), detector(true), markers);
        assert!(matches!(result, Err(TrackingError::Camera(CameraError::Open(_)))));
    }
}
