pub mod app_config;
pub mod verifier_config;

pub use app_config::{AppConfig, ConfigError, load_config, setup_resolver};
pub use verifier_config::VerifierConfig;
