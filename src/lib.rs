pub mod config;
pub mod core_state; // Release service: the UI boundary
pub mod models;
pub mod db;
pub mod pipeline; // Two-stage diagnosis → card pipeline
pub mod persistence; // Outcome → durable records
pub mod release_limit; // Daily release counter

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()`.
/// Safe to call more than once (later calls are no-ops).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Entry point for the embedding shell: logging + a ready release service.
pub fn run() -> Result<core_state::ReleaseService, core_state::ReleaseError> {
    init_tracing();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let api = config::ApiConfig::from_env()?;
    let service = core_state::ReleaseService::open(api, &config::database_path())?;
    Ok(service)
}
