//! Shared camera state.
//!
//! The latest camera snapshot is the only post-initialization mutable
//! singleton in the process. Any request handler may write it; readers
//! take a copy under one short exclusive section. Last writer wins:
//! concurrent requests may interleave their writes, and the snapshot
//! is a read-only convenience, not a consistency guarantee.

use crate::geom::Aabb;
use parking_lot::Mutex;

/// Camera projection mode as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    TwoD,
    ThreeD,
}

/// One camera snapshot: the viewport in CRS meters, the client's
/// meters-per-pixel scale, the real-valued zoom, and the mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub view: Aabb,
    pub meters_per_pixel: f64,
    pub zoom: f64,
    pub mode: CameraMode,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            view: Aabb::new([0.0, 0.0], [0.0, 0.0]),
            meters_per_pixel: 1.0,
            zoom: 0.0,
            mode: CameraMode::TwoD,
        }
    }
}

/// Single-writer, many-reader store for the latest camera state.
///
/// Both operations hold the lock only for the duration of the copy.
#[derive(Debug, Default)]
pub struct CameraStore {
    latest: Mutex<CameraState>,
}

impl CameraStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new snapshot, replacing the previous one.
    pub fn publish(&self, state: CameraState) {
        *self.latest.lock() = state;
    }

    /// Copy the latest snapshot.
    pub fn snapshot(&self) -> CameraState {
        *self.latest.lock()
    }
}
