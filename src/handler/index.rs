//! Viewer page served at `/`

use hyper::Response;

use crate::config::RoutesConfig;
use crate::http::{self, ResponseBody};

pub fn render_index(routes: &RoutesConfig) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Camera</title>
<style>body{{margin:0;background:#111;color:#ddd;font-family:sans-serif;text-align:center}}img{{max-width:100%}}a{{color:#8cf}}</style>
</head>
<body>
<img src="{stream}" alt="live stream">
<p><a href="{capture}">Still image</a></p>
</body>
</html>
"#,
        stream = routes.stream_path,
        capture = routes.capture_path,
    )
}

pub fn serve_index(routes: &RoutesConfig) -> Response<ResponseBody> {
    http::build_html_response(render_index(routes))
}
