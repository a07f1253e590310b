// Signal handling module
//
// SIGTERM and SIGINT trigger graceful shutdown: the accept loop stops and
// in-flight connections finish naturally. Steps are pure, so an abandoned
// in-flight transform leaves nothing to roll back.

use std::sync::Arc;
use tokio::sync::Notify;

/// Start signal handlers (Unix)
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

        println!("[SIGNAL] Signal handlers registered:");
        println!("  - SIGTERM (kill <pid>)        : Graceful shutdown");
        println!("  - SIGINT  (Ctrl+C)            : Graceful shutdown");
        println!("[SIGNAL] Process ID: {}", std::process::id());

        tokio::select! {
            _ = sigterm.recv() => {
                println!("\n[SIGNAL] SIGTERM received, initiating graceful shutdown...");
            }
            _ = sigint.recv() => {
                println!("\n[SIGNAL] SIGINT received (Ctrl+C), initiating graceful shutdown...");
            }
        }

        // notify_one stores a permit, so the accept loop sees the shutdown
        // even if it was busy accepting when the signal arrived
        shutdown.notify_one();
    });
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        println!("[SIGNAL] Windows mode: Only Ctrl+C is supported");

        if let Ok(()) = tokio::signal::ctrl_c().await {
            println!("\n[SIGNAL] Ctrl+C received, initiating shutdown...");
            shutdown.notify_one();
        }
    });
}
