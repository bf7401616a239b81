//! Bounded frame pool
//!
//! Wraps a [`FrameSource`] so that every acquisition is matched by exactly one
//! release: acquiring yields a [`FrameGuard`] that hands the frame back when
//! it goes out of scope, including on early returns and task cancellation.
//!
//! Slots are semaphore permits. A caller that finds every slot taken waits
//! in line for one, up to the acquire timeout.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::{CameraError, Frame, FrameSource};

/// Wait for a free slot used by [`Camera::new`]
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Camera subsystem shared by all handlers
pub struct Camera {
    source: Box<dyn FrameSource>,
    capacity: usize,
    slots: Arc<Semaphore>,
    acquire_timeout: Duration,
    outstanding: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl Camera {
    /// Wrap a source, allowing at most `capacity` frames out at once
    pub fn new(source: Box<dyn FrameSource>, capacity: usize) -> Arc<Self> {
        Self::with_acquire_timeout(source, capacity, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_acquire_timeout(
        source: Box<dyn FrameSource>,
        capacity: usize,
        acquire_timeout: Duration,
    ) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            source,
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            acquire_timeout,
            outstanding: AtomicUsize::new(0),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not held by a frame or an in-flight capture
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Frames currently held by callers
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Total successful acquisitions
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Total releases back to the source
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Acquire one frame
    ///
    /// Waits in line for a free slot, then captures on a blocking thread.
    /// Fails with [`CameraError::PoolExhausted`] if no slot frees up within
    /// the acquire timeout.
    pub async fn acquire(self: &Arc<Self>) -> Result<FrameGuard, CameraError> {
        let capacity = self.capacity;
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(CameraError::Unavailable("frame pool closed".to_string()))
            }
            Err(_elapsed) => return Err(CameraError::PoolExhausted { capacity }),
        };

        // The guard is built on the blocking thread, so a caller that gives
        // up mid-capture still has the frame released when the result drops
        let camera = Arc::clone(self);
        tokio::task::spawn_blocking(move || camera.capture_into_guard(permit))
            .await
            .map_err(|e| CameraError::Worker(e.to_string()))?
    }

    fn capture_into_guard(
        self: &Arc<Self>,
        permit: OwnedSemaphorePermit,
    ) -> Result<FrameGuard, CameraError> {
        // On error the permit drops here and the slot is free again
        let frame = self.source.capture()?;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(FrameGuard {
            camera: Arc::clone(self),
            frame: Some(frame),
            _permit: permit,
        })
    }

    fn release(&self, frame: Frame) {
        self.source.recycle(frame);
        self.released.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A frame on loan from the [`Camera`]; released on drop
pub struct FrameGuard {
    camera: Arc<Camera>,
    frame: Option<Frame>,
    // Dropped after `Drop::drop` recycles the frame
    _permit: OwnedSemaphorePermit,
}

impl FrameGuard {
    /// Release the frame now rather than at end of scope
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for FrameGuard {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        // Only `Drop` takes the frame out
        self.frame
            .as_ref()
            .unwrap_or_else(|| unreachable!("frame guard used after release"))
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.camera.release(frame);
        }
    }
}
