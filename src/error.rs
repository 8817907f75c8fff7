use thiserror::Error;

use crate::types::AlertDescription;

/// Errors produced by the TLS client.
///
/// Every error that terminates a connection is also reported to
/// [`Handler::on_tls_end`](crate::Handler::on_tls_end).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Framing of a record, handshake message or extension is broken.
    #[error("Malformed: {0}")]
    Malformed(String),

    /// A message arrived that is not allowed in the current state.
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    /// Server selected a cipher suite we don't support or didn't offer.
    #[error("Unsupported cipher suite: 0x{0:04x}")]
    UnsupportedCipherSuite(u16),

    /// Server selected a protocol version we don't support.
    #[error("Unsupported protocol version: 0x{0:04x}")]
    UnsupportedVersion(u16),

    /// Server selected a key exchange group we didn't offer.
    #[error("Unsupported curve: 0x{0:04x}")]
    UnsupportedCurve(u16),

    /// Compression method other than null.
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u8),

    /// Same extension type seen twice in one message.
    #[error("Duplicate extension: 0x{0:04x}")]
    DuplicateExtension(u16),

    /// TLS 1.3 ServerHello without a key_share extension.
    #[error("Missing key share in TLS 1.3 ServerHello")]
    MissingKeyShare,

    /// Server selected an ALPN protocol we didn't offer.
    #[error("Unsupported ALPN protocol: {0}")]
    UnsupportedAlpn(String),

    /// Server answered with a HelloRetryRequest.
    #[error("HelloRetryRequest is not supported")]
    HelloRetryRequest,

    /// CBC record MAC did not verify.
    #[error("Record MAC mismatch")]
    MacMismatch,

    /// CBC record padding is malformed.
    #[error("Invalid record padding")]
    InvalidPadding,

    /// AEAD tag did not verify.
    #[error("Record authentication failed")]
    AuthenticationFailed,

    /// Peer Finished verify_data mismatch.
    #[error("Finished verification failed")]
    FinishVerificationFailed,

    /// Signature over handshake data or certificate did not verify.
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// No certificate name matches the host.
    #[error("Hostname mismatch: {0}")]
    HostnameMismatch(String),

    /// Chain does not end in a trusted root.
    #[error("Untrusted root: {0}")]
    UntrustedRoot(String),

    /// Certificate validity ended.
    #[error("Certificate expired: {0}")]
    CertificateExpired(String),

    /// Certificate validity has not started.
    #[error("Certificate not yet valid: {0}")]
    CertificateNotYetValid(String),

    /// Certificate could not be parsed or used.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Crypto provider failure.
    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// Peer sent a fatal alert.
    #[error("Peer alert: {0:?}")]
    PeerAlert(AlertDescription),

    /// Operation requires a completed handshake.
    #[error("Handshake not done")]
    HandshakeNotDone,

    /// Connection has ended.
    #[error("Connection ended")]
    ConnectionEnded,

    /// Session ticket lifetime has passed.
    #[error("Session ticket expired")]
    TicketExpired,

    /// Invalid configuration.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// The connection worker thread is gone.
    #[error("Connection worker gone")]
    WorkerGone,
}

impl Error {
    /// The alert to send to the peer when this error ends the connection.
    ///
    /// `None` means no alert should be sent.
    pub fn alert_description(&self) -> Option<AlertDescription> {
        use AlertDescription::*;
        let d = match self {
            Error::Malformed(_) => DecodeError,
            Error::UnexpectedMessage(_) => UnexpectedMessage,
            Error::UnsupportedCipherSuite(_)
            | Error::UnsupportedCurve(_)
            | Error::UnsupportedCompression(_)
            | Error::DuplicateExtension(_)
            | Error::HelloRetryRequest => IllegalParameter,
            Error::UnsupportedVersion(_) => ProtocolVersion,
            Error::MissingKeyShare => MissingExtension,
            Error::UnsupportedAlpn(_) => NoApplicationProtocol,
            Error::MacMismatch | Error::InvalidPadding | Error::AuthenticationFailed => {
                BadRecordMac
            }
            Error::FinishVerificationFailed | Error::SignatureVerificationFailed(_) => {
                DecryptError
            }
            Error::HostnameMismatch(_) | Error::CertificateError(_) => BadCertificate,
            Error::UntrustedRoot(_) => UnknownCa,
            Error::CertificateExpired(_) | Error::CertificateNotYetValid(_) => {
                CertificateExpired
            }
            Error::CryptoError(_) => InternalError,
            Error::PeerAlert(_)
            | Error::HandshakeNotDone
            | Error::ConnectionEnded
            | Error::TicketExpired
            | Error::ConfigError(_)
            | Error::WorkerGone => return None,
        };
        Some(d)
    }

    /// Whether this error came from a failed cryptographic check.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Error::MacMismatch
                | Error::InvalidPadding
                | Error::AuthenticationFailed
                | Error::FinishVerificationFailed
                | Error::SignatureVerificationFailed(_)
                | Error::HostnameMismatch(_)
                | Error::UntrustedRoot(_)
                | Error::CertificateExpired(_)
                | Error::CertificateNotYetValid(_)
        )
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(value: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let reason = match value {
            nom::Err::Incomplete(_) => "incomplete input".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} with {} bytes left", e.code, e.input.len())
            }
        };
        Error::Malformed(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_map_to_alerts() {
        assert_eq!(
            Error::MacMismatch.alert_description(),
            Some(AlertDescription::BadRecordMac)
        );
        assert_eq!(
            Error::UntrustedRoot("x".into()).alert_description(),
            Some(AlertDescription::UnknownCa)
        );
        assert!(Error::PeerAlert(AlertDescription::HandshakeFailure)
            .alert_description()
            .is_none());
        assert!(Error::FinishVerificationFailed.is_verification_failure());
        assert!(!Error::MissingKeyShare.is_verification_failure());
    }

    #[test]
    fn nom_error_is_malformed() {
        let input: &[u8] = &[1];
        let res: nom::IResult<&[u8], u16> = nom::number::complete::be_u16(input);
        let err: Error = res.unwrap_err().into();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
