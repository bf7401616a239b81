// Server module entry point
// Starts the camera HTTP server and hands back an owned handle to it

pub mod connection;
pub mod listener;
pub mod signal;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::camera::{self, Camera, CameraError};
use crate::config::Config;
use crate::logger;
use crate::state::{self, AppState};

pub use connection::accept_connection;
pub use listener::create_listener;
pub use signal::shutdown_signal;

/// How long `wait` lets open connections finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    InvalidAddress(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open camera: {0}")]
    Camera(#[from] CameraError),
}

/// Starts the HTTP server and registers the camera routes
pub struct ServerBootstrap;

impl ServerBootstrap {
    /// Open the configured camera, then start serving it
    pub fn launch(config: Config) -> Result<CameraServer, ServerError> {
        let camera = camera::open(&config.camera).map_err(|e| {
            logger::log_startup_failed(&e);
            ServerError::from(e)
        })?;
        Self::start(config, camera)
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Must be called from within a tokio runtime. Failures are logged and
    /// returned; nothing keeps running after an error.
    pub fn start(config: Config, camera: Arc<Camera>) -> Result<CameraServer, ServerError> {
        Self::bind(config, camera).map_err(|e| {
            logger::log_startup_failed(&e);
            e
        })
    }

    fn bind(config: Config, camera: Arc<Camera>) -> Result<CameraServer, ServerError> {
        let addr = config
            .get_socket_addr()
            .map_err(ServerError::InvalidAddress)?;
        let listener =
            create_listener(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(AppState::new(config, camera, shutdown_rx));

        logger::log_server_start(&local_addr, &state.config, state.camera.source_name());

        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(&state)));

        Ok(CameraServer {
            local_addr,
            state,
            shutdown: shutdown_tx,
            accept_task,
        })
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<AppState>) {
    let mut shutdown = state.shutdown.clone();
    loop {
        tokio::select! {
            accept_result = listener.accept() => match accept_result {
                Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                Err(e) => {
                    logger::log_error(&format!("Failed to accept connection: {e}"));
                    // Usually fd exhaustion; give open connections a moment
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            () = state::wait_for_shutdown(&mut shutdown) => break,
        }
    }
}

/// A running camera server
///
/// Dropping the handle without calling [`CameraServer::shutdown`] also
/// stops the server.
pub struct CameraServer {
    local_addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl CameraServer {
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn camera(&self) -> &Arc<Camera> {
        &self.state.camera
    }

    pub fn active_connections(&self) -> usize {
        self.state.active_connections.load(Ordering::SeqCst)
    }

    /// Stop accepting, end streams, and let open responses finish
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait for the server to stop after [`CameraServer::shutdown`]
    pub async fn wait(self) {
        let Self {
            local_addr,
            state,
            shutdown: _shutdown,
            accept_task,
        } = self;

        if let Err(e) = accept_task.await {
            logger::log_error(&format!("Accept loop failed: {e}"));
        }

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while state.active_connections.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if drained.is_err() {
            logger::log_warning(&format!(
                "{} connections still open after {}s, closing anyway",
                state.active_connections.load(Ordering::SeqCst),
                DRAIN_TIMEOUT.as_secs()
            ));
        }

        logger::log_server_stopped(&local_addr);
    }

    /// Shut down and wait
    pub async fn stop(self) {
        self.shutdown();
        self.wait().await;
    }
}
