pub mod account; // Auth/session collaborator (HTTP contract)
pub mod config;
pub mod core_state; // Explicit session/context object — no ambient globals
pub mod editor; // Queue → sequential processing → compare view
pub mod payment; // Order collaborator + token top-up settlement
pub mod processing_service; // At-most-one-in-flight render gate
pub mod remote; // Image-processing backend client

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the embedding shell.
///
/// Call once at startup, before any editing session is created.
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Pixlift core starting v{}", config::APP_VERSION);
}
