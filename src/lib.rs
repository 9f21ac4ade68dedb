pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod shared;

use crate::application::{ExecutionEngine, Workbook, WorkbookHandle};
use crate::infrastructure::agent::SimulatedAgent;
use crate::infrastructure::config::AppConfig;
use crate::interfaces::http::start_server;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub async fn run() -> std::io::Result<()> {
    let config = AppConfig::load().map_err(|e| std::io::Error::other(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let workbook = WorkbookHandle::spawn(Workbook::new());
    let agent = Arc::new(SimulatedAgent::new(config.execution));
    let engine = Arc::new(ExecutionEngine::new(workbook, agent, config.execution));

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting casegrid"
    );
    start_server(engine, &config.server)?.await
}
