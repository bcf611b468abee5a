//! HTTP surface: serves the dashboard page and renders dashboards as JSON
//! chart specs.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::ApiError;
pub use handlers::{DEFAULT_END, DEFAULT_START};
pub use routes::create_router;
pub use state::AppState;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` controls the filter, `info` by default. Call this before
/// resolving [`Settings`] so configuration warnings are recorded. Later
/// calls leave the installed subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .try_init();
}

/// Runs the dashboard server
///
/// # Arguments
/// * `settings` - Resolved process configuration
///
/// # Returns
/// Returns an error if the server fails to bind or encounters a fatal error
///
/// # Example
/// ```rust,no_run
/// use vitals::{run_server, Settings};
/// use vitals::server::init_tracing;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init_tracing();
///     let settings = Settings::from_env()?;
///     run_server(settings).await?;
///     Ok(())
/// }
/// ```
pub async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_settings(&settings));
    let app = create_router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
