//! Camera subsystem
//!
//! A [`FrameSource`] produces JPEG frames; [`Camera`] lends them out through
//! scoped [`FrameGuard`]s from a bounded pool.

mod directory;
mod frame;
mod pacer;
mod pool;
mod synthetic;
#[cfg(test)]
pub mod testing;
#[cfg(feature = "v4l2")]
mod v4l2;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{CameraConfig, SourceKind};

pub use directory::DirectorySource;
pub use frame::Frame;
pub use pacer::Pacer;
pub use pool::{Camera, FrameGuard, DEFAULT_ACQUIRE_TIMEOUT};
pub use synthetic::SyntheticSource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;

#[derive(Debug, Error)]
pub enum CameraError {
    /// No frame ready right now; callers may retry
    #[error("no frame available: {0}")]
    Unavailable(String),

    #[error("no free frame slot ({capacity} frames outstanding)")]
    PoolExhausted { capacity: usize },

    #[error("camera device error: {0}")]
    Device(String),

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capture worker failed: {0}")]
    Worker(String),
}

/// Producer of JPEG frames
///
/// Implementations must be safe to call from several blocking threads. The
/// [`Camera`] pool bounds how many frames are out at once, and callers pace
/// themselves, so `capture` should return as soon as a frame exists.
pub trait FrameSource: Send + Sync {
    fn name(&self) -> &str;

    /// Produce the next frame, blocking until one is ready
    fn capture(&self) -> Result<Frame, CameraError>;

    /// Take back a frame once its borrower is done with it
    fn recycle(&self, frame: Frame) {
        drop(frame);
    }
}

/// Open the configured source and wrap it in a pool
pub fn open(config: &CameraConfig) -> Result<Arc<Camera>, CameraError> {
    let source: Box<dyn FrameSource> = match config.source {
        SourceKind::Synthetic => Box::new(SyntheticSource::new(config)?),
        SourceKind::Directory => Box::new(DirectorySource::open(config)?),
        SourceKind::V4l2 => open_v4l2(config)?,
    };
    Ok(Camera::with_acquire_timeout(
        source,
        config.pool_size,
        config.acquire_timeout(),
    ))
}

#[cfg(feature = "v4l2")]
fn open_v4l2(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Ok(Box::new(V4l2Source::open(config)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_v4l2(_config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    Err(CameraError::Device(
        "built without V4L2 support (enable the `v4l2` feature)".to_string(),
    ))
}
