use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::error::ResolveErrorKind;

use super::syntax::{Address, parse_address};
use super::{EmailVerifier, Reachability, Verification, VerifyError};
use crate::config::VerifierConfig;

/// Verifies deliverability by resolving the target's mail exchanger and,
/// when enabled, asking it over SMTP whether it would accept the address.
/// The message is never actually sent; the dialogue stops after RCPT TO.
pub struct SmtpVerifier {
    config: VerifierConfig,
    resolver: TokioAsyncResolver,
}

impl SmtpVerifier {
    pub fn new(config: VerifierConfig, resolver: TokioAsyncResolver) -> Self {
        SmtpVerifier { config, resolver }
    }

    /// Pick the mail exchanger with the lowest preference value, falling back
    /// to the domain's own address record when no MX records exist (RFC 5321
    /// implicit MX).
    async fn resolve_mail_host(&self, domain: &str) -> Result<String, VerifyError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(mx) => {
                let records = mx
                    .iter()
                    .map(|record| (record.preference(), record.exchange().to_utf8()));
                match select_mx_host(records) {
                    MxSelection::Host(host) => return Ok(host),
                    MxSelection::NullMx => {
                        return Err(VerifyError::NoMailHost(domain.to_string()));
                    }
                    MxSelection::NoRecords => {}
                }
            }
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {}
            Err(source) => {
                return Err(VerifyError::Dns {
                    domain: domain.to_string(),
                    source,
                });
            }
        }

        match self.resolver.lookup_ip(domain).await {
            Ok(ips) if ips.iter().next().is_some() => Ok(domain.to_string()),
            Ok(_) => Err(VerifyError::NoMailHost(domain.to_string())),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                Err(VerifyError::NoMailHost(domain.to_string()))
            }
            Err(source) => Err(VerifyError::Dns {
                domain: domain.to_string(),
                source,
            }),
        }
    }

    /// Run the EHLO / MAIL FROM / RCPT TO dialogue against one mail exchanger
    /// and classify its answer to RCPT TO.
    async fn check_rcpt(&self, host: &str, address: &Address) -> Result<Reachability, VerifyError> {
        let smtp_err = |source: io::Error| VerifyError::Smtp {
            host: host.to_string(),
            source,
        };
        let protocol_err = |reply: u16| VerifyError::Protocol {
            host: host.to_string(),
            reply: reply.to_string(),
        };

        let stream = TcpStream::connect((host, self.config.smtp_port))
            .await
            .map_err(smtp_err)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let greeting = read_reply(&mut reader).await.map_err(smtp_err)?;
        if !is_positive(greeting) {
            return Err(protocol_err(greeting));
        }

        send_command(&mut write_half, &format!("EHLO {}", self.config.hello_name))
            .await
            .map_err(smtp_err)?;
        let reply = read_reply(&mut reader).await.map_err(smtp_err)?;
        if !is_positive(reply) {
            return Err(protocol_err(reply));
        }

        send_command(
            &mut write_half,
            &format!("MAIL FROM:<{}>", self.config.from_email),
        )
        .await
        .map_err(smtp_err)?;
        let reply = read_reply(&mut reader).await.map_err(smtp_err)?;
        if !is_positive(reply) {
            return Err(protocol_err(reply));
        }

        send_command(
            &mut write_half,
            &format!("RCPT TO:<{}@{}>", address.local, address.domain),
        )
        .await
        .map_err(smtp_err)?;
        let rcpt_reply = read_reply(&mut reader).await.map_err(smtp_err)?;

        // The verdict is in; the close is best effort.
        let _ = send_command(&mut write_half, "QUIT").await;

        Ok(classify_rcpt(rcpt_reply))
    }
}

#[async_trait]
impl EmailVerifier for SmtpVerifier {
    async fn verify(&self, target: &str) -> Result<Verification, VerifyError> {
        let address = parse_address(target)?;
        let host = self.resolve_mail_host(&address.domain).await?;

        if !self.config.smtp_check {
            return Ok(Verification {
                reachable: Reachability::Unknown,
            });
        }

        let reachable = self.check_rcpt(&host, &address).await?;
        Ok(Verification { reachable })
    }
}

/// What an MX record set says about where (or whether) to deliver.
#[derive(Debug, PartialEq, Eq)]
enum MxSelection {
    Host(String),
    /// RFC 7505 null MX: the domain accepts no mail at all.
    NullMx,
    /// Empty record set; the caller falls back to RFC 5321 implicit MX.
    NoRecords,
}

/// Choose the exchanger with the lowest preference value from a set of
/// (preference, exchange) records, normalizing the trailing root dot.
fn select_mx_host(records: impl IntoIterator<Item = (u16, String)>) -> MxSelection {
    match records.into_iter().min_by_key(|(preference, _)| *preference) {
        None => MxSelection::NoRecords,
        Some((_, exchange)) => {
            let host = exchange.trim_end_matches('.');
            if host.is_empty() {
                MxSelection::NullMx
            } else {
                MxSelection::Host(host.to_string())
            }
        }
    }
}

fn is_positive(code: u16) -> bool {
    (200..300).contains(&code)
}

/// Map the RCPT TO reply code onto the tri-state reachability signal.
/// Transient rejections (greylisting, mailbox busy) are neither a yes nor a no.
fn classify_rcpt(code: u16) -> Reachability {
    match code {
        200..=299 => Reachability::Yes,
        500..=599 => Reachability::No,
        _ => Reachability::Unknown,
    }
}

async fn send_command<W: AsyncWrite + Unpin>(writer: &mut W, command: &str) -> io::Result<()> {
    writer.write_all(command.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Read one SMTP reply, skipping continuation lines ("250-..."), and return
/// the three-digit reply code of the final line.
async fn read_reply<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> io::Result<u16> {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-reply",
            ));
        }
        if line.len() < 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed smtp reply line: {line:?}"),
            ));
        }
        // A hyphen after the code marks a continuation line.
        if line.as_bytes()[3] == b'-' {
            continue;
        }
        // Checked lookup: the reply is untrusted, and byte 3 being a char
        // boundary is not guaranteed by the length check above.
        return match line.get(..3).and_then(|code| code.parse().ok()) {
            Some(code) => Ok(code),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed smtp reply code: {line:?}"),
            )),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};

    fn test_verifier(smtp_port: u16) -> SmtpVerifier {
        let config = VerifierConfig {
            smtp_port,
            ..VerifierConfig::default()
        };
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        SmtpVerifier::new(config, resolver)
    }

    /// A mail exchanger that greets, accepts EHLO and MAIL FROM, and answers
    /// RCPT TO with a canned reply.
    async fn mock_exchanger(listener: TcpListener, rcpt_reply: &'static str) {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        write_half.write_all(b"220 mock ESMTP\r\n").await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = line.to_ascii_uppercase();
            let reply: &str = if command.starts_with("EHLO") {
                "250-mock greets you\r\n250 OK\r\n"
            } else if command.starts_with("MAIL") {
                "250 OK\r\n"
            } else if command.starts_with("RCPT") {
                rcpt_reply
            } else if command.starts_with("QUIT") {
                write_half.write_all(b"221 bye\r\n").await.unwrap();
                break;
            } else {
                "502 command not implemented\r\n"
            };
            write_half.write_all(reply.as_bytes()).await.unwrap();
        }
    }

    async fn rcpt_outcome(rcpt_reply: &'static str) -> Reachability {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(mock_exchanger(listener, rcpt_reply));

        let verifier = test_verifier(port);
        let address = parse_address("alice@example.com").unwrap();
        verifier.check_rcpt("127.0.0.1", &address).await.unwrap()
    }

    fn mx(records: &[(u16, &str)]) -> Vec<(u16, String)> {
        records
            .iter()
            .map(|(preference, exchange)| (*preference, exchange.to_string()))
            .collect()
    }

    #[test]
    fn lowest_preference_exchanger_wins() {
        let records = mx(&[
            (20, "backup.example.com."),
            (10, "mx1.example.com."),
            (30, "last.example.com."),
        ]);
        assert_eq!(
            select_mx_host(records),
            MxSelection::Host("mx1.example.com".to_string())
        );
    }

    #[test]
    fn trailing_root_dot_is_trimmed() {
        let records = mx(&[(10, "mail.example.org.")]);
        assert_eq!(
            select_mx_host(records),
            MxSelection::Host("mail.example.org".to_string())
        );
    }

    #[test]
    fn null_mx_means_the_domain_takes_no_mail() {
        let records = mx(&[(0, ".")]);
        assert_eq!(select_mx_host(records), MxSelection::NullMx);
    }

    #[test]
    fn null_mx_is_not_shadowed_by_higher_preference_records() {
        // A null MX published at preference 0 wins over real exchangers.
        let records = mx(&[(10, "mx1.example.com."), (0, ".")]);
        assert_eq!(select_mx_host(records), MxSelection::NullMx);
    }

    #[test]
    fn empty_record_set_defers_to_implicit_mx() {
        assert_eq!(select_mx_host(mx(&[])), MxSelection::NoRecords);
    }

    #[tokio::test]
    async fn reply_code_on_a_multibyte_boundary_is_malformed_not_a_panic() {
        // First line starts with a 4-byte character, so byte 3 is not a char
        // boundary; must come back as InvalidData like any malformed reply.
        let mut reader = BufReader::new(&b"\xF0\x9F\x98\x8000 hi\r\n"[..]);
        let err = read_reply(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn non_numeric_reply_code_is_malformed() {
        let mut reader = BufReader::new(&b"abc hello\r\n"[..]);
        let err = read_reply(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn continuation_lines_are_skipped() {
        let mut reader = BufReader::new(&b"250-first\r\n250-second\r\n250 done\r\n"[..]);
        assert_eq!(read_reply(&mut reader).await.unwrap(), 250);
    }

    #[test]
    fn classify_rcpt_maps_reply_classes() {
        assert_eq!(classify_rcpt(250), Reachability::Yes);
        assert_eq!(classify_rcpt(550), Reachability::No);
        assert_eq!(classify_rcpt(553), Reachability::No);
        assert_eq!(classify_rcpt(451), Reachability::Unknown);
        assert_eq!(classify_rcpt(354), Reachability::Unknown);
    }

    #[tokio::test]
    async fn accepted_rcpt_is_reachable() {
        assert_eq!(rcpt_outcome("250 Accepted\r\n").await, Reachability::Yes);
    }

    #[tokio::test]
    async fn rejected_rcpt_is_unreachable() {
        assert_eq!(
            rcpt_outcome("550 No such user here\r\n").await,
            Reachability::No
        );
    }

    #[tokio::test]
    async fn greylisted_rcpt_is_unknown() {
        assert_eq!(
            rcpt_outcome("451 Greylisted, try again later\r\n").await,
            Reachability::Unknown
        );
    }

    #[tokio::test]
    async fn unreachable_exchanger_is_an_smtp_error() {
        // Bind then drop, so the port is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let verifier = test_verifier(port);
        let address = parse_address("alice@example.com").unwrap();
        let err = verifier
            .check_rcpt("127.0.0.1", &address)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Smtp { .. }));
    }

    #[tokio::test]
    async fn invalid_syntax_fails_before_any_network_io() {
        let verifier = test_verifier(25);
        let err = verifier.verify("not-an-address").await.unwrap_err();
        assert!(matches!(err, VerifyError::Syntax(_)));
    }
}
