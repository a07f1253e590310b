//! Request routing dispatch module
//!
//! Maps the three dataset routes to the store and the transform pipeline.
//! Per-request errors are converted to HTTP statuses here; nothing a single
//! request does can take the process down.

use crate::config::AppState;
use crate::logger;
use crate::response;
use crate::store;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method();
    let uri = req.uri();
    let path = uri.path();
    let is_head = *method == Method::HEAD;

    let access_log = state.config.logging.access_log;
    if access_log {
        logger::log_request(method, uri, req.version());
    }

    // 1. Check HTTP method
    if let Some(resp) = check_http_method(method, state.config.http.enable_cors) {
        return Ok(resp);
    }

    // 2. Check body size
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return Ok(resp);
    }

    // 3. Log headers if enabled
    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    // 4. Dispatch
    Ok(route_request(path, &state, access_log, is_head))
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match method {
        &Method::GET | &Method::HEAD => None,
        &Method::OPTIONS => Some(response::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(response::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(
    req: &Request<hyper::body::Incoming>,
    max_body_size: u64,
) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(response::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Route request based on path
///
/// The three data routes read only from the immutable store, so dispatch
/// needs no locking and no await points.
fn route_request(
    path: &str,
    state: &AppState,
    access_log: bool,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let response = match path {
        "/users" => serve_collection(state, store::USERS, is_head),
        "/posts" => serve_collection(state, store::POSTS, is_head),
        "/" => serve_overview(state, is_head),
        _ => response::build_404_response(),
    };

    if access_log {
        let size = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        logger::log_response(response.status().as_u16(), size);
    }

    response
}

/// Serve one collection verbatim as a JSON array.
fn serve_collection(state: &AppState, name: &str, is_head: bool) -> Response<Full<Bytes>> {
    match state.store.get(name) {
        Ok(records) => {
            response::json_response(StatusCode::OK, records, &state.config.http, is_head)
        }
        Err(err) => {
            // Route names are fixed, so this only fires on a programming error
            logger::log_error(&err.to_string());
            response::build_500_response(&state.config.http, is_head)
        }
    }
}

/// Combined endpoint: build the composite from both collections and run it
/// through the transform pipeline.
fn serve_overview(state: &AppState, is_head: bool) -> Response<Full<Bytes>> {
    // The composite is built fresh per request from copies of the records,
    // so steps can never touch the store's collections.
    let composite = json!({
        "users": state.store.users(),
        "posts": state.store.posts(),
    });

    match state.pipeline.run(composite) {
        Ok(result) => {
            response::json_response(StatusCode::OK, &result, &state.config.http, is_head)
        }
        Err(err) => {
            logger::log_transform_failed(&err);
            response::build_500_response(&state.config.http, is_head)
        }
    }
}
