//! Single-shot capture handler

use std::sync::Arc;

use hyper::Response;

use crate::camera::Camera;
use crate::http::{self, ResponseBody};
use crate::logger;

/// Serve one frame as `image/jpeg`, or an empty 500 if the camera has none
///
/// Waits in line while every frame slot is taken, up to the acquire
/// timeout. A failed capture is not retried; the client can simply ask
/// again.
pub async fn handle_capture(camera: &Arc<Camera>) -> Response<ResponseBody> {
    match camera.acquire().await {
        Ok(frame) => {
            let response = http::build_jpeg_response(frame.data.clone());
            frame.release();
            response
        }
        Err(e) => {
            logger::log_capture_failed(&e);
            http::build_500_response()
        }
    }
}
