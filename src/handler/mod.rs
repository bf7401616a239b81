//! Request handler module
//!
//! Routing plus the capture, stream and index handlers.

pub mod capture;
pub mod index;
pub mod router;
pub mod stream;

// Re-export main entry point
pub use router::{handle_request, RequestContext, Resolution, RouteTarget, Router};
pub use stream::{RetryPolicy, StreamEnd, StreamSettings, StreamStats};
