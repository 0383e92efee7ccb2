use std::net::IpAddr;
use std::time::Duration;
use std::{env, io};

use thiserror::Error;
use tracing::Level;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::verifier_config::VerifierConfig;

pub struct AppConfig {
    pub verifier: VerifierConfig,
    pub log_level: Level,
    pub dns_hosts: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown log level: {0}")]
    UnknownLogLevel(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid DNS host: {0}")]
    InvalidDnsHost(String),
}

/// Load the application configuration from a YAML file and environment variables.
/// The configuration file location is taken from the `CONFIG_FILE` environment
/// variable and defaults to `config.yml`; a missing file falls back to defaults.
/// The log level comes from `LOG_LEVEL` and the resolver hosts from `DNS_HOSTS`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config_file_location = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yml".to_string());

    let verifier = match std::fs::read_to_string(&config_file_location) {
        Ok(config_str) => serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Yaml {
            path: config_file_location.clone(),
            source,
        })?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => VerifierConfig::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_file_location,
                source,
            });
        }
    };

    let log_level = parse_log_level(&env::var("LOG_LEVEL").unwrap_or_default())?;

    let dns_hosts = env::var("DNS_HOSTS")
        .unwrap_or_else(|_| "1.1.1.1,8.8.8.8".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .collect();

    Ok(AppConfig {
        verifier,
        log_level,
        dns_hosts,
    })
}

/// Map the `LOG_LEVEL` selector onto a tracing level.
/// An empty or unset value means info; anything unrecognized is a startup error.
pub fn parse_log_level(lvl: &str) -> Result<Level, ConfigError> {
    match lvl.to_lowercase().as_str() {
        "" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(ConfigError::UnknownLogLevel(other.to_string())),
    }
}

/// Setup a DNS resolver using the provided DNS hosts.
/// MX lookups go over TCP with 2 attempts and a small cache, so that a
/// misbehaving name server cannot eat into the probe deadline for long.
pub fn setup_resolver(dns_hosts: &[String]) -> Result<TokioAsyncResolver, ConfigError> {
    let mut opts = ResolverOpts::default();
    opts.attempts = 2;
    opts.timeout = Duration::from_secs(2);
    opts.cache_size = 1024;

    let mut name_servers = NameServerConfigGroup::new();

    for host in dns_hosts {
        let ip: IpAddr = host
            .parse()
            .map_err(|_| ConfigError::InvalidDnsHost(host.clone()))?;
        name_servers.push(NameServerConfig {
            socket_addr: (ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}
