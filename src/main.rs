use std::sync::Arc;
use tokio::sync::Notify;

mod config;
mod handler;
mod logger;
mod response;
mod server;
mod store;
mod transform;

use transform::{AuxContext, Clock, Pipeline, CLOCK};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;

    // Build the Tokio runtime, sizing the thread pool from the workers config
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        println!("[CONFIG] Using {workers} worker threads");
    } else {
        println!("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    // One-time dataset load; a missing or malformed file aborts startup
    let store = store::DatasetStore::load(&cfg.datasets)?;
    logger::log_datasets_loaded(store.users().len(), store.posts().len());

    // Utility registry and pipeline definition. Utility names are resolved
    // here, so a misconfigured injection list fails startup, not a request.
    let mut context = AuxContext::new();
    context.register(CLOCK, Arc::new(Clock));

    let pipeline = Pipeline::new(
        context,
        vec![CLOCK.to_string()],
        transform::overview_steps(),
    )?;

    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(config::AppState::new(cfg, store, pipeline));

    logger::log_server_start(&addr, &state.config);
    println!("[CONFIG] Loaded configuration:");
    println!(
        "  - Server: {}:{}",
        state.config.server.host, state.config.server.port
    );
    println!("  - Max body size: {} bytes", state.config.http.max_body_size);
    println!(
        "  - Max connections: {:?}\n",
        state.config.performance.max_connections
    );

    let shutdown = Arc::new(Notify::new());
    server::signal::start_signal_handler(Arc::clone(&shutdown));

    server::start_server_loop(listener, state, shutdown).await;

    Ok(())
}
