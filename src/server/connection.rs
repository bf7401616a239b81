// Connection handling module
// Accepts and serves individual TCP connections

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;

use crate::handler;
use crate::logger;
use crate::state::{self, AppState};

/// Accept and process a connection, checking limits and logging.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    set_nodelay(&stream, peer_addr);

    handle_connection(stream, peer_addr, Arc::clone(state));
}

/// Send frame chunks as soon as they are written
///
/// A failure only costs latency, so the connection is still served.
fn set_nodelay(stream: &TcpStream, peer_addr: SocketAddr) -> bool {
    match stream.set_nodelay(true) {
        Ok(()) => true,
        Err(e) => {
            logger::log_warning(&format!("Failed to set TCP_NODELAY for {peer_addr}: {e}"));
            false
        }
    }
}

/// Serve one HTTP/1.1 connection in a spawned task.
///
/// There is no overall connection timeout: a stream response lasts as long
/// as the client keeps reading. Only the request head is time-limited. On
/// shutdown the connection finishes its current response and closes.
fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let mut shutdown = state.shutdown.clone();

        let service_state = Arc::clone(&state);
        let service = service_fn(move |req| {
            handler::handle_request(req, Arc::clone(&service_state), peer_addr)
        });

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(
                state.config.performance.header_read_timeout,
            ))
            .keep_alive(true);

        let conn = builder.serve_connection(io, service);
        tokio::pin!(conn);

        let mut draining = false;
        let result = loop {
            tokio::select! {
                res = conn.as_mut() => break res,
                () = state::wait_for_shutdown(&mut shutdown), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        };

        if let Err(err) = result {
            // Clients closing mid-request is routine for camera viewers
            if !err.is_incomplete_message() {
                logger::log_connection_error(&err);
            }
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}
