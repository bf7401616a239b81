use bytes::Bytes;
use std::time::Instant;

/// One JPEG-encoded image
///
/// `data` is reference counted, so handing the bytes to a response body
/// does not copy the image.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Bytes,

    /// Per-source sequence number, starting at 1
    pub sequence: u64,

    /// When the source produced the frame
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(data: Bytes, sequence: u64) -> Self {
        Self {
            data,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
