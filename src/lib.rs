//! Camera HTTP server
//!
//! Serves JPEG frames from a camera: single images on a capture route and
//! an MJPEG (`multipart/x-mixed-replace`) stream on a stream route.

pub mod camera;
pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod state;
