//! services/client/src/flow/staging.rs
//!
//! Single-slot handoff between the capture flow and the solve flow.

use snapsolve_core::domain::CapturedImage;
use std::sync::Mutex;
use tracing::debug;

/// Holds at most one captured image until a solve session takes it.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    slot: Mutex<Option<CapturedImage>>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new capture, discarding any image that was never solved.
    pub fn stage(&self, image: CapturedImage) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if slot.replace(image).is_some() {
            debug!("Replaced an unsolved staged image");
        }
    }

    /// Moves the staged image out, leaving the slot empty.
    pub fn take(&self) -> Option<CapturedImage> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub fn clear(&self) {
        self.take();
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).is_none()
    }
}
