//! CF Orchestrator HTTP server
//!
//! Serves the bulk operation stream, domain toggles, rule analysis and
//! template management over the shared JSON cache.

mod config;
mod error;
mod logging;
mod routes;

use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;

use cf_orchestrator_app::AppStateBuilder;

use crate::config::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    let _log_guard = logging::init(&config.log)?;

    tracing::info!(
        "Starting CF Orchestrator v{} (cache: {})",
        env!("CARGO_PKG_VERSION"),
        config.cache.dir.display()
    );

    let state = AppStateBuilder::new()
        .cache_dir(&config.cache.dir)
        .bulk_config(config.bulk.to_bulk_config())
        .build()
        .await
        .context("initializing application state")?;
    state.log_cache_summary().await;
    let state = web::Data::new(state);

    let (host, port) = config.bind_addr();
    let workers = config.server.worker_count();
    tracing::info!("Listening on http://{host}:{port} with {workers} worker(s)");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host.as_str(), port))
    .with_context(|| format!("binding {host}:{port}"))?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
