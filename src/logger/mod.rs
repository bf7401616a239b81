//! Logger module
//!
//! Provides logging utilities for the camera server including:
//! - Server lifecycle logging
//! - Access logging (common or JSON)
//! - Camera and stream events
//! - File-based logging support

mod format;
pub mod writer;

pub use format::AccessLogEntry;
pub use writer::Level;

use crate::camera::CameraError;
use crate::config::Config;
use std::net::SocketAddr;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        Level::parse(&config.logging.level),
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write(level: Level, message: &str) {
    match writer::get() {
        Some(w) => w.write(level, message),
        None if level >= Level::Warn => eprintln!("{message}"),
        None if level >= Level::Info => println!("{message}"),
        None => {}
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, source: &str) {
    write(Level::Info, "======================================");
    write(Level::Info, "Camera server started");
    write(Level::Info, &format!("Listening on: http://{addr}"));
    write(
        Level::Info,
        &format!("  - GET {}  (single JPEG)", config.routes.capture_path),
    );
    write(
        Level::Info,
        &format!("  - GET {}  (MJPEG stream)", config.routes.stream_path),
    );
    write(Level::Info, &format!("Frame source: {source}"));
    write(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write(Level::Info, &format!("Worker threads: {workers}"));
    }
    if let Some(max) = config.performance.max_connections {
        write(Level::Info, &format!("Max connections: {max}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write(Level::Info, &format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write(Level::Info, &format!("Error log: {path}"));
    }
    write(Level::Info, "======================================\n");
}

pub fn log_server_stopped(addr: &SocketAddr) {
    write(Level::Info, &format!("[Shutdown] Server on {addr} stopped"));
}

pub fn log_startup_failed(err: &impl std::fmt::Display) {
    log_error(&format!("[Startup] Camera server failed to start: {err}"));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write(Level::Debug, &format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    log_error(&format!("Failed to serve connection: {err:?}"));
}

pub fn log_capture_failed(err: &CameraError) {
    log_error(&format!("[Capture] Camera capture failed: {err}"));
}

pub fn log_acquire_retry(attempt: u32, err: &CameraError) {
    log_warning(&format!(
        "[Stream] Camera capture failed (attempt {attempt}): {err}"
    ));
}

pub fn log_stream_started(peer_addr: &SocketAddr) {
    write(Level::Info, &format!("[Stream] Client {peer_addr} connected"));
}

pub fn log_stream_ended(peer_addr: &SocketAddr, frames: u64, reason: &str) {
    write(
        Level::Info,
        &format!("[Stream] Client {peer_addr} finished after {frames} frames: {reason}"),
    );
}

pub fn log_signal(name: &str) {
    write(Level::Info, &format!("[Signal] {name} received, shutting down"));
}

pub fn log_error(message: &str) {
    write(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write(Level::Warn, &format!("[WARN] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}
