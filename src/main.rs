use actix_web::{middleware, web, App, HttpServer};
use log::{info, warn};
use std::io;
use std::path::Path;

use file_vault::api;
use file_vault::app_state::AppState;
use file_vault::config::{log_config_path, AppConfig};

fn init_logging(config_file: &str) {
    if Path::new(config_file).exists() {
        match log4rs::init_file(config_file, Default::default()) {
            Ok(()) => return,
            Err(e) => eprintln!("Failed to load log config {}: {}", config_file, e),
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    warn!("Log config {} not usable, logging to stderr", config_file);
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_logging(&log_config_path());
    let config = AppConfig::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let state = AppState::from_config(config)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let _sweeper = state.retention_worker().map(|worker| worker.start_background());

    let server = state.config.server.clone();
    info!("Starting server on {}:{}", server.host, server.port);

    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .configure(api::configure)
    })
    .workers(server.workers.max(1))
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
