use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Content type of the text exposition format, matching what Prometheus
/// expects from a scrape target.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to encode metrics")]
    Encode(#[from] prometheus::Error),
    #[error("metrics contain invalid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render a registry's current metrics as exposition text. Works the same
/// for the per-probe registries and the process-wide one.
pub fn render(registry: &Registry) -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Build the process-wide registry served on /metrics. Holds build/version
/// info; per-probe gauges never land here.
pub fn process_registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();

    let opts = Opts::new("postbox_build_info", "Build information for this postbox binary")
        .const_label("version", env!("CARGO_PKG_VERSION"));
    let build_info = IntGauge::with_opts(opts)?;
    build_info.set(1);
    registry.register(Box::new(build_info))?;

    Ok(registry)
}
