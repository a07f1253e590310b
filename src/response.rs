//! HTTP response building module
//!
//! Builders for the JSON endpoints and the framework-level status responses,
//! decoupled from routing logic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::config::HttpConfig;
use crate::logger;

/// Build a JSON response from any serializable payload.
///
/// Serialization failure degrades to a 500 with a generic body; the cause
/// is logged, never sent to the client.
pub fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    http_config: &HttpConfig,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let json = match serde_json::to_string(body) {
        Ok(j) => j,
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            return build_500_response(http_config, is_head);
        }
    };

    let content_length = json.len();
    let payload = if is_head {
        Bytes::new()
    } else {
        Bytes::from(json)
    };

    let mut builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", content_length)
        .header("Server", &http_config.server_name);

    if http_config.enable_cors {
        builder = builder.header("Access-Control-Allow-Origin", "*");
    }

    builder.body(Full::new(payload)).unwrap_or_else(|e| {
        log_build_error("JSON", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 500 Internal Server Error response with an opaque JSON body
pub fn build_500_response(http_config: &HttpConfig, is_head: bool) -> Response<Full<Bytes>> {
    const BODY: &str = r#"{"error":"Internal Server Error"}"#;
    let payload = if is_head {
        Bytes::new()
    } else {
        Bytes::from(BODY)
    };

    Response::builder()
        .status(500)
        .header("Content-Type", "application/json")
        .header("Content-Length", BODY.len())
        .header("Server", &http_config.server_name)
        .body(Full::new(payload))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    const BODY: &str = r#"{"error":"Not Found","available_endpoints":["/","/users","/posts"]}"#;
    Response::builder()
        .status(404)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(BODY)))
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            Response::new(Full::new(Bytes::from("Not Found")))
        })
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain")
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(204)
        .header("Allow", "GET, HEAD, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, HEAD, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(413)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from("413 Payload Too Large")))
        .unwrap_or_else(|e| {
            log_build_error("413", &e);
            Response::new(Full::new(Bytes::from("413 Payload Too Large")))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {status} response: {error}"));
}
