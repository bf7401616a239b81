//! Access log format module
//!
//! Supports:
//! - `common` (Common Log Format - CLF, with stream details appended)
//! - `json` (one JSON object per line)

use chrono::Local;
use serde_json::json;

/// Access log entry for one request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: chrono::DateTime<Local>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub body_bytes: u64,
    /// Frames delivered, for stream requests
    pub frames: Option<u64>,
    /// Why a stream ended
    pub end_reason: Option<String>,
    /// Request processing time in microseconds
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Create a new access log entry with current timestamp
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            status: 200,
            body_bytes: 0,
            frames: None,
            end_reason: None,
            request_time_us: 0,
        }
    }

    /// Format the log entry; unknown formats fall back to `common`
    pub fn format(&self, format: &str) -> String {
        match format {
            "json" => self.format_json(),
            _ => self.format_common(),
        }
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent [frames=N end=reason]`
    fn format_common(&self) -> String {
        let mut line = format!(
            "{} - - [{}] \"{} {} HTTP/1.1\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.method,
            self.path,
            self.status,
            self.body_bytes,
        );
        if let Some(frames) = self.frames {
            line.push_str(&format!(" frames={frames}"));
        }
        if let Some(reason) = &self.end_reason {
            line.push_str(&format!(" end=\"{reason}\""));
        }
        line
    }

    fn format_json(&self) -> String {
        json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "frames": self.frames,
            "end_reason": self.end_reason,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }
}
