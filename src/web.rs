#![cfg(not(tarpaulin_include))]

use excel_analytics::app;
use excel_analytics::config::AppConfig;

/// Main entry point for the web application
///
/// Reads configuration from `EXCEL_ANALYTICS_*` environment variables and serves
/// until the process is stopped. Log verbosity follows `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    app::run(config).await
}
