use nom::number::complete::be_u8;

use super::write_handshake;
use crate::buffer::Buf;
use crate::types::{HandshakeType, NamedGroup, SignatureScheme};
use crate::util::{u16_prefixed, u8_prefixed, with_u8_len};
use crate::Error;

/// ECCurveType.named_curve (RFC 8422 5.4).
const NAMED_CURVE: u8 = 3;

/// TLS 1.2 ECDHE ServerKeyExchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub group: NamedGroup,
    pub public_key: Vec<u8>,
    pub scheme: SignatureScheme,
    pub signature: Vec<u8>,
    /// `curve_type || named_curve || public`, as covered by the signature.
    params: Vec<u8>,
}

impl ServerKeyExchange {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        let (rest, curve_type) = be_u8(body)?;
        if curve_type != NAMED_CURVE {
            return Err(Error::Malformed(format!(
                "Unsupported ECCurveType: {}",
                curve_type
            )));
        }
        let (rest, group) = NamedGroup::parse(rest)?;
        let (rest, public_key) = u8_prefixed(rest)?;
        let params_len = body.len() - rest.len();

        let (rest, scheme) = SignatureScheme::parse(rest)?;
        let (rest, signature) = u16_prefixed(rest)?;
        if !rest.is_empty() {
            return Err(Error::Malformed(
                "Trailing bytes after ServerKeyExchange".to_string(),
            ));
        }

        Ok(ServerKeyExchange {
            group,
            public_key: public_key.to_vec(),
            scheme,
            signature: signature.to_vec(),
            params: body[..params_len].to_vec(),
        })
    }

    /// `client_random || server_random || params`
    pub fn signed_data(&self, client_random: &[u8], server_random: &[u8]) -> Buf {
        let mut out = Buf::with_capacity(64 + self.params.len());
        out.extend_from_slice(client_random);
        out.extend_from_slice(server_random);
        out.extend_from_slice(&self.params);
        out
    }
}

/// ECDHE ClientKeyExchange carrying our public key.
pub fn write_client_key_exchange(out: &mut Buf, public_key: &[u8]) {
    write_handshake(out, HandshakeType::ClientKeyExchange, |out| {
        with_u8_len(out, |out| out.extend_from_slice(public_key));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKE: &[u8] = &[
        3, 0, 29, // named_curve x25519
        4, 1, 2, 3, 4, // public
        4, 3, // ecdsa_secp256r1_sha256
        0, 3, 7, 8, 9, // signature
    ];

    #[test]
    fn parse_ecdhe_params() {
        let ske = ServerKeyExchange::parse(SKE).unwrap();
        assert_eq!(ske.group, NamedGroup::X25519);
        assert_eq!(ske.public_key, vec![1, 2, 3, 4]);
        assert_eq!(ske.scheme, SignatureScheme::ECDSA_SECP256R1_SHA256);
        assert_eq!(ske.signature, vec![7, 8, 9]);

        let signed = ske.signed_data(&[0xc; 32], &[0x5; 32]);
        assert_eq!(signed.len(), 64 + 8);
        assert_eq!(&signed[64..], &SKE[..8]);
    }

    #[test]
    fn explicit_curves_rejected() {
        let mut body = SKE.to_vec();
        body[0] = 1;
        assert!(matches!(
            ServerKeyExchange::parse(&body),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn client_key_exchange_layout() {
        let mut out = Buf::new();
        write_client_key_exchange(&mut out, &[1, 2]);
        assert_eq!(&*out, &[16, 0, 0, 3, 2, 1, 2]);
    }
}
