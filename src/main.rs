use std::sync::Arc;

pub mod config;
pub mod email_probe;
pub mod metrics;
pub mod prober;
pub mod server;

use email_probe::SmtpVerifier;
use prober::{Prober, TracingSink};
use server::AppState;

const LISTEN_ADDR: &str = "0.0.0.0:2112";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let app_config = config::load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("postbox={}", app_config.log_level).parse()?),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %app_config.log_level,
        smtp_check = app_config.verifier.smtp_check,
        "Starting postbox"
    );

    let resolver = config::setup_resolver(&app_config.dns_hosts)?;
    let verifier = SmtpVerifier::new(app_config.verifier, resolver);

    let state = Arc::new(AppState {
        prober: Prober::new(Arc::new(verifier)),
        process_registry: metrics::process_registry()?,
        sink: Arc::new(TracingSink),
    });

    let listener = tokio::net::TcpListener::bind(LISTEN_ADDR).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for scrapes");

    axum::serve(listener, server::build_router(state)).await?;
    Ok(())
}
