//! MJPEG stream handler
//!
//! One acquisition loop per client. Each iteration waits for the stream's
//! next frame time, then writes a part header, the frame body and a trailing
//! CRLF as three chunks. Any failed or stalled write ends the session in
//! that same iteration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::Response;

use crate::camera::{Camera, CameraError, Pacer};
use crate::config::{CameraConfig, Config};
use crate::handler::router::RequestContext;
use crate::http::body::{self, ChunkSender, ChunkSink};
use crate::http::multipart::{self, PartHeaderError, PART_TRAILER};
use crate::http::{self, ResponseBody};
use crate::logger;
use crate::state::{self, AppState};

/// How a stream copes with a camera that has no frame ready
///
/// Failures are retried after `delay`; `max_attempts` consecutive failures
/// end the stream (0 retries forever).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn from_config(config: &CameraConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            delay: config.retry_delay(),
        }
    }
}

/// Per-session stream parameters
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    pub retry: RetryPolicy,
    /// Minimum spacing between frames, `None` when unthrottled
    pub frame_interval: Option<Duration>,
    /// Longest one chunk write may wait on the client
    pub write_timeout: Duration,
}

impl StreamSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.camera),
            frame_interval: config.camera.frame_interval(),
            write_timeout: config.performance.write_timeout(),
        }
    }
}

/// Running totals for one stream session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Parts written completely
    pub frames: u64,
    pub bytes: u64,
}

/// Why a stream session ended
#[derive(Debug)]
pub enum StreamEnd {
    ClientGone,
    /// The client stopped reading for longer than the write timeout
    ClientStalled,
    CameraFailed(CameraError),
    Framing(PartHeaderError),
    Shutdown,
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientGone => f.write_str("client disconnected"),
            Self::ClientStalled => f.write_str("client stopped reading"),
            Self::CameraFailed(e) => write!(f, "camera gave up: {e}"),
            Self::Framing(e) => write!(f, "{e}"),
            Self::Shutdown => f.write_str("server shutting down"),
        }
    }
}

async fn send<S: ChunkSink + Send>(
    sink: &mut S,
    chunk: Bytes,
    write_timeout: Duration,
) -> Result<(), StreamEnd> {
    match tokio::time::timeout(write_timeout, sink.send_chunk(chunk)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(StreamEnd::ClientGone),
        Err(_elapsed) => Err(StreamEnd::ClientStalled),
    }
}

/// Write frames to `sink` until a write fails or the camera gives up
pub async fn stream_frames<S: ChunkSink + Send>(
    camera: &Arc<Camera>,
    sink: &mut S,
    settings: StreamSettings,
    stats: &mut StreamStats,
) -> StreamEnd {
    let retry = settings.retry;
    let mut pacer = Pacer::new(settings.frame_interval);
    let mut failures: u32 = 0;
    loop {
        pacer.wait().await;
        let frame = match camera.acquire().await {
            Ok(frame) => {
                failures = 0;
                frame
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if retry.max_attempts > 0 && failures >= retry.max_attempts {
                    return StreamEnd::CameraFailed(e);
                }
                logger::log_acquire_retry(failures, &e);
                tokio::time::sleep(retry.delay).await;
                continue;
            }
        };

        let header = match multipart::part_header(frame.len()) {
            Ok(header) => header,
            Err(e) => return StreamEnd::Framing(e),
        };
        let header_len = header.len() as u64;

        if let Err(end) = send(sink, header, settings.write_timeout).await {
            return end;
        }

        let body_len = frame.len() as u64;
        let sent = send(sink, frame.data.clone(), settings.write_timeout).await;
        frame.release();
        if let Err(end) = sent {
            return end;
        }

        if let Err(end) = send(
            sink,
            Bytes::from_static(PART_TRAILER),
            settings.write_timeout,
        )
        .await
        {
            return end;
        }

        stats.frames += 1;
        stats.bytes += header_len + body_len + PART_TRAILER.len() as u64;
    }
}

/// Start an MJPEG stream for one client
///
/// Returns the response head right away; frames are pushed from a separate
/// task for as long as the client keeps reading.
pub fn handle_stream(state: &Arc<AppState>, ctx: RequestContext) -> Response<ResponseBody> {
    let (sender, stream_body) = body::channel();
    let response = match http::build_stream_response(stream_body) {
        Ok(response) => response,
        Err(e) => {
            logger::log_error(&format!("Failed to build stream response: {e}"));
            return http::build_500_response();
        }
    };

    tokio::spawn(run_session(Arc::clone(state), sender, ctx));
    response
}

async fn run_session(state: Arc<AppState>, mut sender: ChunkSender, ctx: RequestContext) {
    logger::log_stream_started(&ctx.remote_addr);

    let settings = StreamSettings::from_config(&state.config);
    let mut stats = StreamStats::default();
    let mut shutdown = state.shutdown.clone();

    let end = tokio::select! {
        end = stream_frames(&state.camera, &mut sender, settings, &mut stats) => end,
        () = state::wait_for_shutdown(&mut shutdown) => StreamEnd::Shutdown,
    };
    // Ends the response body
    drop(sender);

    let reason = end.to_string();
    if matches!(end, StreamEnd::CameraFailed(_) | StreamEnd::Framing(_)) {
        logger::log_error(&format!("[Stream] {}: {reason}", ctx.remote_addr));
    }
    logger::log_stream_ended(&ctx.remote_addr, stats.frames, &reason);

    if state.config.logging.access_log {
        let mut entry = ctx.access_entry(200, stats.bytes);
        entry.frames = Some(stats.frames);
        entry.end_reason = Some(reason);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::testing::{ScriptedSource, Step};
    use crate::config::Config;
    use crate::http::ChunkError;
    use http_body_util::BodyExt;
    use hyper::header::CONTENT_TYPE;
    use hyper::Method;
    use std::future::Future;
    use std::time::Instant;
    use tokio::sync::watch;

    /// Records chunks; fails every write from chunk number `fail_at` (1-based)
    #[derive(Default)]
    struct RecordingSink {
        chunks: Vec<Bytes>,
        fail_at: Option<usize>,
        attempts: usize,
    }

    impl RecordingSink {
        fn failing_at(n: usize) -> Self {
            Self {
                fail_at: Some(n),
                ..Self::default()
            }
        }
    }

    impl ChunkSink for RecordingSink {
        fn send_chunk(
            &mut self,
            chunk: Bytes,
        ) -> impl Future<Output = Result<(), ChunkError>> + Send {
            self.attempts += 1;
            let result = if self.fail_at.is_some_and(|n| self.attempts >= n) {
                Err(ChunkError::Closed)
            } else {
                self.chunks.push(chunk);
                Ok(())
            };
            std::future::ready(result)
        }
    }

    /// Accepts `stall_after` chunks, then never completes another write
    struct StalledSink {
        accepted: usize,
        stall_after: usize,
    }

    impl ChunkSink for StalledSink {
        fn send_chunk(
            &mut self,
            _chunk: Bytes,
        ) -> impl Future<Output = Result<(), ChunkError>> + Send {
            self.accepted += 1;
            let stall = self.accepted > self.stall_after;
            async move {
                if stall {
                    std::future::pending::<()>().await;
                }
                Ok::<(), ChunkError>(())
            }
        }
    }

    fn test_settings(max_attempts: u32) -> StreamSettings {
        StreamSettings {
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(1),
            },
            frame_interval: None,
            write_timeout: Duration::from_secs(5),
        }
    }

    fn expected_header(len: usize) -> String {
        format!("--frame\r\nContent-Type: image/jpeg\r\nContent-Length: {len}\r\n\r\n")
    }

    #[tokio::test]
    async fn test_parts_are_framed() {
        let source = ScriptedSource::script([Step::Frame(10), Step::Frame(300)], Step::Frame(7));
        let camera = Camera::new(Box::new(source), 1);
        // Two full parts, then the third header fails
        let mut sink = RecordingSink::failing_at(7);
        let mut stats = StreamStats::default();

        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut stats).await;
        assert!(matches!(end, StreamEnd::ClientGone));

        assert_eq!(sink.chunks.len(), 6);
        for (part, len) in sink.chunks.chunks(3).zip([10usize, 300]) {
            assert_eq!(&part[0][..], expected_header(len).as_bytes());
            assert_eq!(part[1].len(), len);
            assert_eq!(&part[2][..], b"\r\n");
        }
        assert_eq!(stats.frames, 2);
        assert_eq!(
            stats.bytes,
            (expected_header(10).len() + 10 + 2 + expected_header(300).len() + 300 + 2) as u64
        );
    }

    #[tokio::test]
    async fn test_header_write_failure_stops_loop() {
        let source = ScriptedSource::frames(50);
        let stats = source.stats();
        let camera = Camera::new(Box::new(source), 1);
        let mut sink = RecordingSink::failing_at(1);

        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut StreamStats::default()).await;
        assert!(matches!(end, StreamEnd::ClientGone));
        assert_eq!(stats.captures(), 1);
        assert_eq!(camera.acquired(), 1);
        assert_eq!(camera.released(), 1);
    }

    #[tokio::test]
    async fn test_body_write_failure_releases_frame() {
        let source = ScriptedSource::frames(50);
        let stats = source.stats();
        let camera = Camera::new(Box::new(source), 1);
        let mut sink = RecordingSink::failing_at(2);

        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut StreamStats::default()).await;
        assert!(matches!(end, StreamEnd::ClientGone));
        assert_eq!(stats.captures(), 1);
        assert_eq!(stats.recycled(), 1);
        assert_eq!(camera.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_trailer_write_failure_stops_loop() {
        let source = ScriptedSource::frames(50);
        let stats = source.stats();
        let camera = Camera::new(Box::new(source), 1);
        let mut sink = RecordingSink::failing_at(3);
        let mut counts = StreamStats::default();

        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut counts).await;
        assert!(matches!(end, StreamEnd::ClientGone));
        assert_eq!(stats.captures(), 1);
        assert_eq!(camera.acquired(), camera.released());
        // The part never completed
        assert_eq!(counts.frames, 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let source = ScriptedSource::script([Step::Fail, Step::Fail], Step::Frame(20));
        let stats = source.stats();
        let camera = Camera::new(Box::new(source), 1);
        let mut sink = RecordingSink::failing_at(4);
        let mut counts = StreamStats::default();

        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut counts).await;
        assert!(matches!(end, StreamEnd::ClientGone));
        assert_eq!(counts.frames, 1);
        assert_eq!(stats.captures(), 4);
        assert_eq!(camera.acquired(), 2);
        assert_eq!(camera.released(), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let source = ScriptedSource::failing();
        let stats = source.stats();
        let camera = Camera::new(Box::new(source), 1);
        let mut sink = RecordingSink::default();

        let started = Instant::now();
        let end = stream_frames(&camera, &mut sink, test_settings(5), &mut StreamStats::default()).await;
        assert!(matches!(end, StreamEnd::CameraFailed(_)));
        assert_eq!(stats.captures(), 5);
        assert!(sink.chunks.is_empty());
        // Four sleeps between five attempts
        assert!(started.elapsed() >= Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_failure_count_resets_after_success() {
        let steps = [Step::Fail, Step::Fail, Step::Frame(5), Step::Fail, Step::Fail];
        let source = ScriptedSource::script(steps, Step::Frame(5));
        let camera = Camera::new(Box::new(source), 1);
        // Two complete parts, then the third header fails
        let mut sink = RecordingSink::failing_at(7);
        let mut counts = StreamStats::default();

        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut counts).await;
        assert!(matches!(end, StreamEnd::ClientGone));
        assert_eq!(counts.frames, 2);
    }

    #[tokio::test]
    async fn test_stalled_client_gives_up_its_slot() {
        let source = ScriptedSource::frames(32);
        let stats = source.stats();
        let camera = Camera::new(Box::new(source), 1);
        let mut sink = StalledSink {
            accepted: 0,
            stall_after: 1,
        };
        let mut settings = test_settings(3);
        settings.write_timeout = Duration::from_millis(30);

        let end = stream_frames(&camera, &mut sink, settings, &mut StreamStats::default()).await;
        assert!(matches!(end, StreamEnd::ClientStalled));
        assert_eq!(stats.recycled(), 1);
        assert_eq!(camera.outstanding(), 0);
        assert_eq!(camera.available_slots(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiting_stream_gets_frames_from_busy_pool() {
        let camera = Camera::new(Box::new(ScriptedSource::frames(16)), 1);

        // An unthrottled stream that re-acquires as soon as it releases
        let busy = {
            let camera = Arc::clone(&camera);
            tokio::spawn(async move {
                let mut sink = RecordingSink::failing_at(3 * 200 + 1);
                stream_frames(&camera, &mut sink, test_settings(3), &mut StreamStats::default())
                    .await
            })
        };

        let mut sink = RecordingSink::failing_at(3 * 5 + 1);
        let mut counts = StreamStats::default();
        let end = stream_frames(&camera, &mut sink, test_settings(3), &mut counts).await;
        assert!(matches!(end, StreamEnd::ClientGone));
        assert_eq!(counts.frames, 5);

        assert!(matches!(busy.await.unwrap(), StreamEnd::ClientGone));
        assert_eq!(camera.acquired(), camera.released());
    }

    #[tokio::test]
    async fn test_handle_stream_end_to_end() {
        let mut config = Config::from_toml_str("").unwrap();
        config.logging.access_log = false;
        let camera = Camera::new(Box::new(ScriptedSource::frames(64)), 2);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(AppState::new(config, Arc::clone(&camera), shutdown_rx));

        let ctx = RequestContext {
            remote_addr: "127.0.0.1:40000".parse().unwrap(),
            method: Method::GET,
            path: "/stream".to_string(),
            started: Instant::now(),
        };
        let resp = handle_stream(&state, ctx);
        assert_eq!(
            resp.headers()[CONTENT_TYPE],
            "multipart/x-mixed-replace; boundary=frame"
        );

        let mut body = resp.into_body();
        let mut received = Vec::new();
        while received.len() < 6 {
            let frame = body.frame().await.unwrap().unwrap();
            received.push(frame.into_data().unwrap());
        }
        assert_eq!(&received[0][..], expected_header(64).as_bytes());
        assert_eq!(received[1].len(), 64);
        assert_eq!(&received[2][..], b"\r\n");

        // Client goes away
        drop(body);
        for _ in 0..100 {
            if camera.outstanding() == 0 && camera.acquired() == camera.released() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(camera.acquired(), camera.released());
        drop(shutdown_tx);
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let mut config = Config::from_toml_str("").unwrap();
        config.logging.access_log = false;
        let camera = Camera::new(Box::new(ScriptedSource::frames(8)), 1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(AppState::new(config, Arc::clone(&camera), shutdown_rx));

        let ctx = RequestContext {
            remote_addr: "127.0.0.1:40001".parse().unwrap(),
            method: Method::GET,
            path: "/stream".to_string(),
            started: Instant::now(),
        };
        let resp = handle_stream(&state, ctx);
        shutdown_tx.send(true).unwrap();

        // Body completes once the session drops its sender
        let collected = tokio::time::timeout(Duration::from_secs(2), resp.into_body().collect())
            .await
            .expect("stream did not end on shutdown")
            .unwrap()
            .to_bytes();
        assert!(collected.starts_with(expected_header(8).as_bytes()) || collected.is_empty());

        for _ in 0..100 {
            if camera.outstanding() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(camera.acquired(), camera.released());
    }
}
