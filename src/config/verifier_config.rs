use serde::Deserialize;

/// Settings for the SMTP email verifier.
/// All fields are optional in the YAML file and fall back to their defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    /// Whether to perform the SMTP-level reachability check.
    /// When disabled, a probe only validates syntax and MX records and
    /// reports reachability as unknown.
    #[serde(default = "default_smtp_check")]
    pub smtp_check: bool,

    /// The hostname announced in the EHLO command.
    #[serde(default = "default_hello_name")]
    pub hello_name: String,

    /// The sender address used in the MAIL FROM command.
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// The port mail exchangers are contacted on.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

fn default_smtp_check() -> bool {
    true
}

fn default_hello_name() -> String {
    "localhost".to_string()
}

fn default_from_email() -> String {
    "postbox@localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig {
            smtp_check: default_smtp_check(),
            hello_name: default_hello_name(),
            from_email: default_from_email(),
            smtp_port: default_smtp_port(),
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VerifierConfig::default();
        assert!(config.smtp_check);
        assert_eq!(config.hello_name, "localhost");
        assert_eq!(config.from_email, "postbox@localhost");
        assert_eq!(config.smtp_port, 25);
    }

    #[test]
    fn test_verifier_config_deserialization() {
        let yaml = r#"
                    smtp_check: false
                    hello_name: probe.example.com
                    from_email: postbox@example.com
                    "#;

        let config: VerifierConfig = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert!(!config.smtp_check);
        assert_eq!(config.hello_name, "probe.example.com");
        assert_eq!(config.from_email, "postbox@example.com");
        // check default port
        assert_eq!(config.smtp_port, 25);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: VerifierConfig = serde_yaml::from_str("{}").expect("Invalid YAML");
        assert!(config.smtp_check);
        assert_eq!(config.smtp_port, 25);
    }
}
