// Application state module
// Everything a request handler needs, shared behind an Arc

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::camera::Camera;
use crate::config::Config;
use crate::handler::Router;

/// Application state
pub struct AppState {
    pub config: Config,
    pub camera: Arc<Camera>,
    pub router: Router,
    /// Flips to `true` when the server is shutting down
    pub shutdown: watch::Receiver<bool>,
    /// Connections currently being served
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: Config, camera: Arc<Camera>, shutdown: watch::Receiver<bool>) -> Self {
        let router = Router::from_config(&config.routes);
        Self {
            config,
            camera,
            router,
            shutdown,
            active_connections: AtomicUsize::new(0),
        }
    }
}

/// Resolve once shutdown is requested or the server handle is gone
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|&stop| stop).await;
}
