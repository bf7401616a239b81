//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: exact path match against the
//! registered routes, method check, then dispatch.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Body;
use hyper::{Method, Request, Response};

use crate::config::RoutesConfig;
use crate::handler::{capture, index, stream};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use crate::state::AppState;

/// What a route serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Capture,
    Stream,
    Health,
    Index,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub method: Method,
    pub target: RouteTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Matched(RouteTarget),
    MethodNotAllowed,
    NotFound,
}

/// Route table, matched by exact path
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Register the camera routes from configuration
    pub fn from_config(config: &RoutesConfig) -> Self {
        let mut router = Self::default();
        router.register(&config.capture_path, Method::GET, RouteTarget::Capture);
        router.register(&config.stream_path, Method::GET, RouteTarget::Stream);
        router.register(&config.health_path, Method::GET, RouteTarget::Health);
        if config.index_page {
            router.register("/", Method::GET, RouteTarget::Index);
        }
        router
    }

    /// Register a handler; a later registration for the same path and method wins
    pub fn register(&mut self, path: &str, method: Method, target: RouteTarget) {
        self.routes
            .retain(|r| !(r.path == path && r.method == method));
        self.routes.push(Route {
            path: path.to_string(),
            method,
            target,
        });
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let mut path_known = false;
        for route in self.routes.iter().filter(|r| r.path == path) {
            if route.method == *method {
                return Resolution::Matched(route.target);
            }
            path_known = true;
        }
        if path_known {
            Resolution::MethodNotAllowed
        } else {
            Resolution::NotFound
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Per-request information handed to handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub remote_addr: SocketAddr,
    pub method: Method,
    pub path: String,
    pub started: Instant,
}

impl RequestContext {
    pub fn access_entry(&self, status: u16, body_bytes: u64) -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            self.remote_addr.to_string(),
            self.method.to_string(),
            self.path.clone(),
        );
        entry.status = status;
        entry.body_bytes = body_bytes;
        entry.request_time_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        entry
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let ctx = RequestContext {
        remote_addr,
        method: req.method().clone(),
        path: req.uri().path().to_string(),
        started: Instant::now(),
    };

    let response = match state.router.resolve(&ctx.method, &ctx.path) {
        Resolution::Matched(RouteTarget::Stream) => {
            // Streams write their own access log entry when they end
            return Ok(stream::handle_stream(&state, ctx));
        }
        Resolution::Matched(RouteTarget::Capture) => capture::handle_capture(&state.camera).await,
        Resolution::Matched(RouteTarget::Health) => http::build_health_response("ok"),
        Resolution::Matched(RouteTarget::Index) => index::serve_index(&state.config.routes),
        Resolution::MethodNotAllowed => {
            logger::log_warning(&format!("Method not allowed: {} {}", ctx.method, ctx.path));
            http::build_405_response()
        }
        Resolution::NotFound => http::build_404_response(),
    };

    if state.config.logging.access_log {
        let body_bytes = response.body().size_hint().exact().unwrap_or(0);
        logger::log_access(
            &ctx.access_entry(response.status().as_u16(), body_bytes),
            &state.config.logging.access_log_format,
        );
    }
    Ok(response)
}
