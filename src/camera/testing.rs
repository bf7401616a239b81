//! In-memory frame source for tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use super::{CameraError, Frame, FrameSource};

#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Deliver a frame of this many bytes
    Frame(usize),
    Fail,
}

#[derive(Debug, Default)]
pub struct SourceStats {
    captures: AtomicUsize,
    recycled: AtomicUsize,
}

impl SourceStats {
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn recycled(&self) -> usize {
        self.recycled.load(Ordering::SeqCst)
    }
}

/// Plays back a fixed script of steps, then repeats `tail` forever
pub struct ScriptedSource {
    script: Mutex<VecDeque<Step>>,
    tail: Step,
    sequence: AtomicU64,
    stats: Arc<SourceStats>,
}

impl ScriptedSource {
    pub fn script(steps: impl IntoIterator<Item = Step>, tail: Step) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            tail,
            sequence: AtomicU64::new(0),
            stats: Arc::default(),
        }
    }

    pub fn frames(len: usize) -> Self {
        Self::script([], Step::Frame(len))
    }

    pub fn failing() -> Self {
        Self::script([], Step::Fail)
    }

    pub fn stats(&self) -> Arc<SourceStats> {
        Arc::clone(&self.stats)
    }
}

impl FrameSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capture(&self) -> Result<Frame, CameraError> {
        self.stats.captures.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.tail);
        match step {
            Step::Frame(len) => {
                let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
                #[allow(clippy::cast_possible_truncation)]
                let fill = sequence as u8;
                Ok(Frame::new(Bytes::from(vec![fill; len]), sequence))
            }
            Step::Fail => Err(CameraError::Unavailable("scripted failure".to_string())),
        }
    }

    fn recycle(&self, _frame: Frame) {
        self.stats.recycled.fetch_add(1, Ordering::SeqCst);
    }
}
