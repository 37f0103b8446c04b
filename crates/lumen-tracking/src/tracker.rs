//! The marker tracker worker.

use crate::camera::FrameMessage;
use crate::detector::MarkerDetector;
use lumen_core::{MailboxReader, MailboxWriter, MarkerMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, trace};

/// Runs marker detection on its own thread so it never competes with the
/// runtime's detector and rule threads.
///
/// Blocks on the frame mailbox, detects, and publishes the newest result
/// (or `NoMarker`) into the marker mailbox. Exits on `FrameMessage::Shutdown`,
/// when every frame writer is gone, or when `running` is cleared.
pub(crate) fn spawn_marker_tracker(
    mut detector: Box<dyn MarkerDetector>,
    frames: MailboxReader<FrameMessage>,
    markers: MailboxWriter<MarkerMessage>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("marker-tracker".into())
        .spawn(move || {
            info!("Marker tracker thread started");
            while running.load(Ordering::SeqCst) {
                let frame = match frames.recv() {
                    Some(FrameMessage::Data(frame)) => frame,
                    Some(FrameMessage::Shutdown) | None => break,
                };
                match detector.detect(&frame) {
                    Some(rect) => markers.publish(MarkerMessage::Detected(rect)),
                    None => {
                        trace!("No marker in frame");
                        markers.publish(MarkerMessage::NoMarker);
                    }
                }
            }
            info!("Marker tracker thread exiting");
        })
}
