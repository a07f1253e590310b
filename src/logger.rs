use crate::config::Config;
use hyper::{Method, Uri, Version};
use std::net::SocketAddr;

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    println!("======================================");
    println!("Async server started successfully");
    println!("Listening on: http://{addr}");
    println!("Log level: {}", config.logging.level);
    println!("Data directory: {}", config.datasets.data_dir);
    if let Some(workers) = config.server.workers {
        println!("Worker threads: {workers}");
    }
    println!("Using Tokio runtime for concurrency");
    println!("======================================\n");
}

pub fn log_datasets_loaded(user_count: usize, post_count: usize) {
    println!("[Datasets] Loaded {user_count} users, {post_count} posts");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    println!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    eprintln!("[ERROR] Failed to serve connection: {err:?}");
}

pub fn log_request(method: &Method, uri: &Uri, version: Version) {
    println!("[Request] {method} {uri} {version:?}");
}

pub fn log_headers_count(count: usize, show: bool) {
    if show {
        println!("[Headers] Count: {count}");
    }
}

pub fn log_response(status: u16, size: usize) {
    println!("[Response] Sent {status} ({size} bytes)\n");
}

pub fn log_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn log_warning(message: &str) {
    eprintln!("[WARN] {message}");
}

// Step failures are logged with their cause but the HTTP body never carries it
pub fn log_transform_failed(err: &impl std::fmt::Display) {
    eprintln!("[ERROR] Transform pipeline failed: {err}");
}

pub fn log_shutdown() {
    println!("\n[Shutdown] Server stopping, no longer accepting connections");
}
