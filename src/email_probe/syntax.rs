use super::VerifyError;

/// An email address split into its local part and domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub local: String,
    pub domain: String,
}

/// Validate the address shape before touching the network.
///
/// This is deliberately not a full RFC 5322 parser; it rejects the inputs a
/// mail exchanger would refuse anyway (empty parts, whitespace, missing or
/// malformed domain) and leaves the final verdict to the SMTP dialogue.
pub fn parse_address(raw: &str) -> Result<Address, VerifyError> {
    if raw.is_empty() {
        return Err(VerifyError::Syntax("address is empty".to_string()));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(VerifyError::Syntax(format!(
            "address {raw:?} contains whitespace or control characters"
        )));
    }

    let Some((local, domain)) = raw.rsplit_once('@') else {
        return Err(VerifyError::Syntax(format!("address {raw:?} is missing an @ sign")));
    };

    if local.is_empty() {
        return Err(VerifyError::Syntax(format!("address {raw:?} has an empty local part")));
    }
    if local.len() > 64 {
        return Err(VerifyError::Syntax(format!(
            "local part of {raw:?} exceeds 64 characters"
        )));
    }

    check_domain(raw, domain)?;

    Ok(Address {
        local: local.to_string(),
        domain: domain.to_string(),
    })
}

fn check_domain(raw: &str, domain: &str) -> Result<(), VerifyError> {
    if domain.is_empty() {
        return Err(VerifyError::Syntax(format!("address {raw:?} has an empty domain")));
    }
    if !domain.contains('.') {
        return Err(VerifyError::Syntax(format!(
            "domain of {raw:?} is not fully qualified"
        )));
    }
    for label in domain.split('.') {
        if label.is_empty() {
            return Err(VerifyError::Syntax(format!(
                "domain of {raw:?} contains an empty label"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(VerifyError::Syntax(format!(
                "domain label {label:?} of {raw:?} starts or ends with a hyphen"
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(VerifyError::Syntax(format!(
                "domain label {label:?} of {raw:?} contains invalid characters"
            )));
        }
    }
    Ok(())
}
