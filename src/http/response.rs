//! HTTP response building module
//!
//! Builders never panic: a builder error is logged and replaced by a bare
//! response with the same body.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use super::body::{self, ChannelBody, ResponseBody};
use super::multipart::{JPEG_CONTENT_TYPE, STREAM_CONTENT_TYPE};

/// Build 200 response carrying one JPEG image
pub fn build_jpeg_response(data: Bytes) -> Response<ResponseBody> {
    let len = data.len();
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, JPEG_CONTENT_TYPE)
        .header(CONTENT_LENGTH, len)
        .header(CACHE_CONTROL, "no-store")
        .body(body::full(data.clone()))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(body::full(data))
        })
}

/// Build the head of an MJPEG stream response
///
/// Unlike the other builders this reports failure, since a stream must not
/// start without its multipart content type.
pub fn build_stream_response(
    body: ChannelBody,
) -> Result<Response<ResponseBody>, hyper::http::Error> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, STREAM_CONTENT_TYPE)
        .header(CACHE_CONTROL, "no-store")
        .body(body.boxed())
}

/// Build 500 Internal Server Error response with empty body
pub fn build_500_response() -> Response<ResponseBody> {
    let mut response = Response::new(body::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, "text/plain")
        .header(ALLOW, "GET")
        .body(body::full("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(body::full("405 Method Not Allowed"))
        })
}

/// Build liveness probe response
pub fn build_health_response(status: &'static str) -> Response<ResponseBody> {
    build_text_response(StatusCode::OK, status)
}

/// Build generic HTML response
pub fn build_html_response(content: String) -> Response<ResponseBody> {
    let content_length = content.len();
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CONTENT_LENGTH, content_length)
        .body(body::full(content))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(body::empty())
        })
}

fn build_text_response(status: StatusCode, text: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(body::full(text))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(body::full(text))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
