//! HTTP protocol layer module
//!
//! Response builders, body types and MJPEG part framing, kept apart from
//! the camera and routing logic.

pub mod body;
pub mod multipart;
pub mod response;

// Re-export commonly used types
pub use body::{ChunkError, ChunkSender, ChunkSink, ResponseBody};
pub use response::{
    build_404_response, build_405_response, build_500_response, build_health_response,
    build_html_response, build_jpeg_response, build_stream_response,
};
