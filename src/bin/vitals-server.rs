//! Vitals Dashboard Server Binary
//!
//! Run with: `cargo run --bin vitals-server`

use vitals::server::init_tracing;
use vitals::{run_server, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before settings, so credential lookup warnings are kept.
    // Set RUST_LOG environment variable to control log level:
    //   RUST_LOG=debug cargo run --bin vitals-server
    //   RUST_LOG=vitals::pipeline=debug cargo run --bin vitals-server
    init_tracing();

    let settings = Settings::from_env()?;

    println!("Starting Vitals Dashboard Server...");
    println!("   Host: {}", settings.host);
    println!("   Port: {}", settings.port);
    println!("   Environment samples: {}", settings.environment_csv.display());
    match &settings.weather_csv {
        Some(path) => println!("   Weather extremes: {}", path.display()),
        None => println!("   Weather extremes: (not configured)"),
    }
    println!(
        "   Remote API: {}",
        if settings.credential.is_ok() { "token configured" } else { "no token" }
    );
    println!();
    println!(
        "Dashboard will be available at: http://{}:{}",
        settings.host, settings.port
    );
    println!();
    println!("Available endpoints:");
    println!("  GET  /                  - Dashboard page");
    println!("  GET  /health            - Health check");
    println!("  GET  /api/users         - Selectable users");
    println!("  GET  /api/charts        - Chart catalog");
    println!("  GET  /api/dashboard     - Render a view (user, start, end, view)");
    println!();

    run_server(settings).await?;

    Ok(())
}
