pub mod scrape_log;
pub mod timeout;

use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::{Gauge, Registry};
use thiserror::Error;

use crate::email_probe::{EmailVerifier, Reachability, VerifyError};

pub use scrape_log::{LogSink, ScrapeLogger, TracingSink};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not verify email {target}")]
    Verify {
        target: String,
        #[source]
        source: VerifyError,
    },
    #[error("metric registration failed")]
    Register(#[from] prometheus::Error),
}

/// What one successful probe measured. Exists only to populate gauges and
/// log lines; overall success is carried by the surrounding `Result`.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub duration_seconds: f64,
    pub reachable: Reachability,
}

/// One probe's isolated registry plus its outcome. The registry is owned by
/// the request that ran the probe and is dropped once the response is
/// rendered; nothing in it is shared with concurrent probes.
pub struct ProbeReport {
    pub registry: Registry,
    pub duration_seconds: f64,
    pub result: Result<ProbeResult, ProbeError>,
}

struct ProbeGauges {
    success: Gauge,
    duration: Gauge,
    reachable: Gauge,
}

impl ProbeGauges {
    fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let success = Gauge::new(
            "probe_success",
            "Displays whether or not the probe was a success",
        )?;
        let duration = Gauge::new(
            "probe_duration_seconds",
            "Returns how long the probe took to complete in seconds",
        )?;
        let reachable = Gauge::new("probe_email_reachable", "Indicates if email is reachable")?;

        registry.register(Box::new(success.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(reachable.clone()))?;

        Ok(ProbeGauges {
            success,
            duration,
            reachable,
        })
    }
}

/// Runs a single verification attempt against a fresh, request-scoped metric
/// registry. The verifier is shared and immutable; everything mutable lives
/// in the per-call registry, which is what makes concurrent probes safe
/// without locking.
pub struct Prober {
    verifier: Arc<dyn EmailVerifier>,
}

impl Prober {
    pub fn new(verifier: Arc<dyn EmailVerifier>) -> Self {
        Prober { verifier }
    }

    /// Probe one target, bounded by the given deadline. Deadline expiry
    /// surfaces as a verification timeout, never as a panic or a hung
    /// request. `probe_duration_seconds` is set on both paths;
    /// `probe_success` and `probe_email_reachable` stay at 0 on failure.
    pub async fn probe(&self, target: &str, deadline: Duration) -> ProbeReport {
        let registry = Registry::new();
        let gauges = match ProbeGauges::register(&registry) {
            Ok(gauges) => gauges,
            Err(e) => {
                return ProbeReport {
                    registry,
                    duration_seconds: 0.0,
                    result: Err(ProbeError::Register(e)),
                };
            }
        };

        let start = Instant::now();
        let verified = match tokio::time::timeout(deadline, self.verifier.verify(target)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(VerifyError::Timeout),
        };
        let duration_seconds = start.elapsed().as_secs_f64();
        gauges.duration.set(duration_seconds);

        let result = match verified {
            Ok(verification) => {
                gauges.reachable.set(verification.reachable.as_gauge());
                gauges.success.set(1.0);
                Ok(ProbeResult {
                    duration_seconds,
                    reachable: verification.reachable,
                })
            }
            Err(source) => Err(ProbeError::Verify {
                target: target.to_string(),
                source,
            }),
        };

        ProbeReport {
            registry,
            duration_seconds,
            result,
        }
    }
}
