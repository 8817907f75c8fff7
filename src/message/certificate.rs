use super::extension::Extension;
use super::write_handshake;
use crate::buffer::Buf;
use crate::types::{HandshakeType, SignatureScheme};
use crate::util::{all_of, u16_prefixed, u24_prefixed, u8_prefixed, with_u24_len, with_u8_len};
use crate::Error;

/// Certificate message: DER certificates in the order received, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMessage {
    /// TLS 1.3 certificate_request_context, empty for TLS 1.2.
    pub context: Vec<u8>,
    pub certificates: Vec<Vec<u8>>,
}

impl CertificateMessage {
    /// `certificate_list<0..2^24-1>` of `ASN.1Cert<1..2^24-1>`.
    pub fn parse_tls12(body: &[u8]) -> Result<Self, Error> {
        let (rest, list) = u24_prefixed(body)?;
        if !rest.is_empty() {
            return Err(Error::Malformed("Trailing bytes after Certificate".to_string()));
        }
        let (_, certs) = all_of(list, u24_prefixed)?;
        Ok(CertificateMessage {
            context: Vec::new(),
            certificates: certs.into_iter().map(|c| c.to_vec()).collect(),
        })
    }

    /// TLS 1.3 adds a request context and per-entry extensions, which are
    /// read and dropped.
    pub fn parse_tls13(body: &[u8]) -> Result<Self, Error> {
        let (rest, context) = u8_prefixed(body)?;
        let (rest, list) = u24_prefixed(rest)?;
        if !rest.is_empty() {
            return Err(Error::Malformed("Trailing bytes after Certificate".to_string()));
        }
        let (_, certs) = all_of(list, |i| {
            let (i, cert) = u24_prefixed(i)?;
            let (i, _extensions) = u16_prefixed(i)?;
            Ok((i, cert))
        })?;
        Ok(CertificateMessage {
            context: context.to_vec(),
            certificates: certs.into_iter().map(|c| c.to_vec()).collect(),
        })
    }

    /// An empty Certificate, sent when a server asks for a client certificate
    /// we don't have.
    pub fn write_empty(out: &mut Buf, tls13_context: Option<&[u8]>) {
        write_handshake(out, HandshakeType::Certificate, |out| {
            if let Some(ctx) = tls13_context {
                with_u8_len(out, |out| out.extend_from_slice(ctx));
            }
            with_u24_len(out, |_| {});
        });
    }
}

/// The part of a CertificateRequest the client acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub context: Vec<u8>,
}

impl CertificateRequest {
    pub fn parse_tls13(body: &[u8]) -> Result<Self, Error> {
        let (rest, context) = u8_prefixed(body)?;
        let (_, extensions) = u16_prefixed(rest)?;
        Extension::parse_all(extensions)?;
        Ok(CertificateRequest {
            context: context.to_vec(),
        })
    }

    /// TLS 1.2: `certificate_types`, `supported_signature_algorithms` and
    /// `certificate_authorities`. Only framing is checked.
    pub fn parse_tls12(body: &[u8]) -> Result<Self, Error> {
        let (rest, _types) = u8_prefixed(body)?;
        let (rest, _algorithms) = u16_prefixed(rest)?;
        let (_, _authorities) = u16_prefixed(rest)?;
        Ok(CertificateRequest {
            context: Vec::new(),
        })
    }
}

/// Signature over the transcript (TLS 1.3) or the ECDHE parameters (TLS 1.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub scheme: SignatureScheme,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        let (rest, scheme) = SignatureScheme::parse(body)?;
        let (rest, signature) = u16_prefixed(rest)?;
        if !rest.is_empty() {
            return Err(Error::Malformed(
                "Trailing bytes after CertificateVerify".to_string(),
            ));
        }
        Ok(CertificateVerify {
            scheme,
            signature: signature.to_vec(),
        })
    }

    /// Content signed by a TLS 1.3 server: 64 spaces, the context string,
    /// a zero byte and the transcript hash (RFC 8446 4.4.3).
    pub fn tls13_signed_content(transcript_hash: &[u8]) -> Buf {
        let mut out = Buf::with_capacity(64 + 34 + transcript_hash.len());
        out.extend_from_slice(&[0x20; 64]);
        out.extend_from_slice(b"TLS 1.3, server CertificateVerify");
        out.push(0);
        out.extend_from_slice(transcript_hash);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HANDSHAKE_HEADER_LEN;

    #[test]
    fn tls12_certificate_list() {
        let body = [0, 0, 9, 0, 0, 2, 0xaa, 0xbb, 0, 0, 1, 0xcc];
        let msg = CertificateMessage::parse_tls12(&body).unwrap();
        assert_eq!(msg.certificates, vec![vec![0xaa, 0xbb], vec![0xcc]]);
    }

    #[test]
    fn tls13_certificate_list_with_extensions() {
        let body = [
            0, // context
            0, 0, 12, // list
            0, 0, 2, 0xaa, 0xbb, 0, 1, 0xff, // cert + extensions (bad content, not read)
            0, 0, 1, 0xcc, //
        ];
        // Second entry lacks its extensions length.
        assert!(CertificateMessage::parse_tls13(&body).is_err());

        let body = [
            0, 0, 0, 13, //
            0, 0, 2, 0xaa, 0xbb, 0, 0, //
            0, 0, 1, 0xcc, 0, 0, //
        ];
        let msg = CertificateMessage::parse_tls13(&body).unwrap();
        assert_eq!(msg.certificates.len(), 2);
        assert!(msg.context.is_empty());
    }

    #[test]
    fn empty_certificate_message() {
        let mut out = Buf::new();
        CertificateMessage::write_empty(&mut out, None);
        assert_eq!(&*out, &[11, 0, 0, 3, 0, 0, 0]);

        let mut out = Buf::new();
        CertificateMessage::write_empty(&mut out, Some(&[7]));
        assert_eq!(&*out, &[11, 0, 0, 5, 1, 7, 0, 0, 0]);
        let msg = CertificateMessage::parse_tls13(&out[HANDSHAKE_HEADER_LEN..]).unwrap();
        assert_eq!(msg.context, vec![7]);
        assert!(msg.certificates.is_empty());
    }

    #[test]
    fn certificate_verify() {
        let cv = CertificateVerify::parse(&[4, 3, 0, 2, 9, 9]).unwrap();
        assert_eq!(cv.scheme, SignatureScheme::ECDSA_SECP256R1_SHA256);
        assert_eq!(cv.signature, vec![9, 9]);
        assert!(CertificateVerify::parse(&[4, 3, 0, 2, 9]).is_err());
    }

    #[test]
    fn signed_content_layout() {
        let c = CertificateVerify::tls13_signed_content(&[1; 32]);
        assert_eq!(c.len(), 64 + 33 + 1 + 32);
        assert_eq!(c[64 + 33], 0);
    }

    #[test]
    fn certificate_request_tls13() {
        let req = CertificateRequest::parse_tls13(&[2, 5, 6, 0, 4, 0, 13, 0, 0]).unwrap();
        assert_eq!(req.context, vec![5, 6]);
    }
}
