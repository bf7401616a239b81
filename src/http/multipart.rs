//! Multipart part framing for MJPEG streams
//!
//! Each frame goes out as one `multipart/x-mixed-replace` part:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <len>\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```

use bytes::Bytes;
use thiserror::Error;

/// Boundary token separating parts
pub const BOUNDARY: &str = "frame";

/// Content type of the stream response; the boundary must match [`BOUNDARY`]
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Upper bound on a formatted part header
pub const PART_HEADER_CAPACITY: usize = 64;

/// Closes each part after the JPEG body
pub const PART_TRAILER: &[u8] = b"\r\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartHeaderError {
    #[error("part header for a {frame_len}-byte frame needs {needed} bytes (limit 64)")]
    TooLong { frame_len: usize, needed: usize },
}

/// Format the header that precedes a frame of `frame_len` bytes
pub fn part_header(frame_len: usize) -> Result<Bytes, PartHeaderError> {
    let header = format!(
        "--{BOUNDARY}\r\nContent-Type: {JPEG_CONTENT_TYPE}\r\nContent-Length: {frame_len}\r\n\r\n"
    );

    if header.len() > PART_HEADER_CAPACITY {
        return Err(PartHeaderError::TooLong {
            frame_len,
            needed: header.len(),
        });
    }
    Ok(Bytes::from(header))
}
