//! Fiducial-marker detection contract.

use crate::camera::Frame;
use lumen_core::MarkerRect;

/// Finds the pointer marker in a frame. Implementations wrap a vision
/// library; returning `None` means no marker is visible.
pub trait MarkerDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Option<MarkerRect>;
}

impl<F> MarkerDetector for F
where
    F: FnMut(&Frame) -> Option<MarkerRect> + Send,
{
    fn detect(&mut self, frame: &Frame) -> Option<MarkerRect> {
        self(frame)
    }
}
