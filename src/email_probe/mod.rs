pub mod smtp;
pub mod syntax;

use std::fmt::Write;
use std::io;

use async_trait::async_trait;
use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

pub use smtp::SmtpVerifier;

/// The mail server's judgment of whether it would accept the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Yes,
    No,
    Unknown,
}

impl Reachability {
    /// Collapse the tri-state signal into the boolean `probe_email_reachable`
    /// gauge value. "No" and "unknown" both map to 0.
    pub fn as_gauge(self) -> f64 {
        match self {
            Reachability::Yes => 1.0,
            Reachability::No | Reachability::Unknown => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Reachability::Yes => "yes",
            Reachability::No => "no",
            Reachability::Unknown => "unknown",
        }
    }
}

/// Outcome of a successful verification attempt.
#[derive(Debug, Clone)]
pub struct Verification {
    pub reachable: Reachability,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid address syntax: {0}")]
    Syntax(String),
    #[error("mx resolution failed for {domain}")]
    Dns {
        domain: String,
        #[source]
        source: ResolveError,
    },
    #[error("no mail exchanger found for {0}")]
    NoMailHost(String),
    #[error("smtp dialogue with {host} failed")]
    Smtp {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("unexpected smtp reply from {host}: {reply}")]
    Protocol { host: String, reply: String },
    #[error("verification timed out")]
    Timeout,
}

/// The verification capability consumed by the probe orchestrator.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    async fn verify(&self, target: &str) -> Result<Verification, VerifyError>;
}

/// Render an error with its full source chain on one line, for log output.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachable_yes_maps_to_one() {
        assert_eq!(Reachability::Yes.as_gauge(), 1.0);
    }

    #[test]
    fn no_and_unknown_collapse_to_zero() {
        assert_eq!(Reachability::No.as_gauge(), 0.0);
        assert_eq!(Reachability::Unknown.as_gauge(), 0.0);
    }

    #[test]
    fn report_includes_source_chain() {
        let err = VerifyError::Smtp {
            host: "mx.example.com".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        };
        let rendered = report(&err);
        assert!(rendered.contains("mx.example.com"));
        assert!(rendered.contains("connection refused"));
    }
}
