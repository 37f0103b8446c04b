//! Camera service contract and the capture pump.
//!
//! The pump pulls frames from a [`Camera`] on its own thread and publishes
//! each one into a single-slot mailbox, so the marker tracker always works on
//! the newest frame and stale frames are dropped rather than queued.

use crate::error::CameraError;
use lumen_core::MailboxWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One captured camera image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed pixel data as delivered by the camera.
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self { width, height, data, captured_at: Instant::now() }
    }
}

/// What flows through the frame mailbox.
#[derive(Debug, Clone)]
pub enum FrameMessage {
    Data(Frame),
    Shutdown,
}

/// Camera service. `get_frame` blocks until the next frame is available.
pub trait Camera: Send {
    fn start_capture(&mut self) -> Result<(), CameraError>;
    fn get_frame(&mut self) -> Result<Frame, CameraError>;
    fn stop_capture(&mut self);
}

/// Spawn the capture pump. The camera must already be capturing.
pub(crate) fn spawn_capture_pump(
    mut camera: Box<dyn Camera>,
    frames: MailboxWriter<FrameMessage>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("camera-capture".into())
        .spawn(move || {
            info!("Camera capture thread started");
            let mut count: u64 = 0;
            while running.load(Ordering::SeqCst) {
                match camera.get_frame() {
                    Ok(frame) => {
                        count += 1;
                        frames.publish(FrameMessage::Data(frame));
                    }
                    Err(CameraError::NotCapturing) => break,
                    Err(e) => {
                        warn!(error = %e, "Frame capture failed, skipping");
                    }
                }
            }
            camera.stop_capture();
            debug!(frames = count, "Camera capture stopped");
            info!("Camera capture thread exiting");
        })
}
