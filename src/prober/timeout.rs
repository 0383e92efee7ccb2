use std::num::ParseFloatError;
use std::time::Duration;

use thiserror::Error;

/// Header Prometheus sets on every scrape to announce its own timeout.
pub const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

/// Used when the scraper does not announce a timeout.
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 120.0;

#[derive(Debug, Error)]
pub enum TimeoutError {
    #[error("invalid timeout value {value:?}: {source}")]
    Parse {
        value: String,
        #[source]
        source: ParseFloatError,
    },
}

/// Derive the probe timeout in seconds from the scrape timeout header.
///
/// An absent, empty, or exactly-zero header falls back to the default.
/// Anything else is honored as-is, however small; the header comes from the
/// scraping system, so a malformed value is a resolver fault (HTTP 500 at the
/// endpoint), not a bad request.
pub fn resolve_timeout(header: Option<&str>) -> Result<f64, TimeoutError> {
    let mut timeout_seconds = 0.0;
    if let Some(value) = header {
        if !value.is_empty() {
            timeout_seconds = value.parse().map_err(|source| TimeoutError::Parse {
                value: value.to_string(),
                source,
            })?;
        }
    }
    if timeout_seconds == 0.0 {
        timeout_seconds = DEFAULT_TIMEOUT_SECONDS;
    }
    Ok(timeout_seconds)
}

/// Convert the resolved seconds into a deadline duration. Negative or
/// non-finite values behave like an already-expired deadline.
pub fn as_deadline(timeout_seconds: f64) -> Duration {
    Duration::try_from_secs_f64(timeout_seconds).unwrap_or(Duration::ZERO)
}
