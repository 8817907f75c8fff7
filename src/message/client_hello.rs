use std::net::IpAddr;

use super::extension::*;
use super::write_handshake;
use crate::buffer::Buf;
use crate::cipher_suite::CipherSuite;
use crate::crypto::SecureRandom;
use crate::types::{HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::util::{with_u16_len, with_u8_len};
use crate::Error;

/// PSK identity offered for resumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskOffer {
    pub identity: Vec<u8>,
    pub obfuscated_ticket_age: u32,
    /// Binder length, the output length of the PSK's hash.
    pub binder_len: usize,
}

/// Assembles a ClientHello.
///
/// Unset lists default to everything supported. The result is a
/// [`PendingClientHello`], which becomes an immutable [`ClientHello`] once the
/// PSK binder (if any) is spliced in.
#[derive(Debug, Default)]
pub struct ClientHelloBuilder<'a> {
    host: Option<&'a str>,
    random: Option<[u8; 32]>,
    session_id: Option<Vec<u8>>,
    cipher_suites: Option<&'a [CipherSuite]>,
    versions: Option<&'a [ProtocolVersion]>,
    signature_schemes: Option<&'a [SignatureScheme]>,
    key_shares: Vec<(NamedGroup, &'a [u8])>,
    alpn: &'a [String],
    psk: Option<PskOffer>,
}

impl<'a> ClientHelloBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host for `server_name`. IP literals are not sent.
    pub fn host(mut self, host: &'a str) -> Self {
        self.host = Some(host);
        self
    }

    pub fn random(mut self, random: Option<[u8; 32]>) -> Self {
        self.random = random;
        self
    }

    pub fn session_id(mut self, session_id: Option<Vec<u8>>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn cipher_suites(mut self, suites: &'a [CipherSuite]) -> Self {
        self.cipher_suites = Some(suites);
        self
    }

    pub fn versions(mut self, versions: &'a [ProtocolVersion]) -> Self {
        self.versions = Some(versions);
        self
    }

    pub fn signature_schemes(mut self, schemes: &'a [SignatureScheme]) -> Self {
        self.signature_schemes = Some(schemes);
        self
    }

    /// One ephemeral public key per offered group, in preference order.
    pub fn key_share(mut self, group: NamedGroup, public_key: &'a [u8]) -> Self {
        self.key_shares.push((group, public_key));
        self
    }

    pub fn alpn(mut self, protocols: &'a [String]) -> Self {
        self.alpn = protocols;
        self
    }

    pub fn psk(mut self, psk: Option<PskOffer>) -> Self {
        self.psk = psk;
        self
    }

    /// Serialize everything except the binder value.
    pub fn build(self, rng: &dyn SecureRandom) -> Result<PendingClientHello, Error> {
        let versions = self
            .versions
            .unwrap_or(&[ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2]);
        let offers_tls13 = versions.contains(&ProtocolVersion::TLS1_3);

        let cipher_suites: Vec<CipherSuite> = self
            .cipher_suites
            .unwrap_or(CipherSuite::all())
            .iter()
            .copied()
            .filter(|s| versions.contains(&s.version()))
            .collect();
        if cipher_suites.is_empty() {
            return Err(Error::ConfigError(
                "No cipher suite matches the offered versions".to_string(),
            ));
        }
        if self.key_shares.is_empty() {
            return Err(Error::ConfigError("No key share to offer".to_string()));
        }
        if self.psk.is_some() && !offers_tls13 {
            return Err(Error::ConfigError("PSK requires TLS 1.3".to_string()));
        }

        let schemes = self
            .signature_schemes
            .unwrap_or(SignatureScheme::supported());
        let groups: Vec<NamedGroup> = self.key_shares.iter().map(|(g, _)| *g).collect();

        let random = match self.random {
            Some(r) => r,
            None => {
                let mut r = [0u8; 32];
                rng.fill(&mut r).map_err(Error::CryptoError)?;
                r
            }
        };
        let session_id = match self.session_id {
            Some(s) if s.len() <= 32 => s,
            Some(s) => {
                return Err(Error::ConfigError(format!(
                    "Session id too long: {}",
                    s.len()
                )))
            }
            None => {
                let mut s = vec![0u8; 32];
                rng.fill(&mut s).map_err(Error::CryptoError)?;
                s
            }
        };

        let sni = self.host.filter(|h| h.parse::<IpAddr>().is_err());
        let psk = self.psk;

        let mut buf = Buf::new();
        write_handshake(&mut buf, HandshakeType::ClientHello, |out| {
            out.extend_from_slice(&ProtocolVersion::TLS1_2.as_u16().to_be_bytes());
            out.extend_from_slice(&random);
            with_u8_len(out, |out| out.extend_from_slice(&session_id));
            with_u16_len(out, |out| {
                for s in &cipher_suites {
                    out.extend_from_slice(&s.as_u16().to_be_bytes());
                }
            });
            // null compression only
            out.extend_from_slice(&[1, 0]);

            with_u16_len(out, |out| {
                if let Some(host) = sni {
                    write_server_name(out, host);
                }
                write_supported_groups(out, &groups);
                write_signature_algorithms(out, schemes);
                if !self.alpn.is_empty() {
                    write_alpn(out, self.alpn);
                }
                write_session_ticket(out);
                write_renegotiation_info(out);
                if offers_tls13 {
                    write_supported_versions(out, versions);
                    write_psk_key_exchange_modes(out);
                    write_key_share(out, &self.key_shares);
                }
                // pre_shared_key must be the last extension
                if let Some(psk) = &psk {
                    write_extension(out, ExtensionType::PreSharedKey, |out| {
                        with_u16_len(out, |out| {
                            with_u16_len(out, |out| out.extend_from_slice(&psk.identity));
                            out.extend_from_slice(&psk.obfuscated_ticket_age.to_be_bytes());
                        });
                        with_u16_len(out, |out| {
                            with_u8_len(out, |out| {
                                for _ in 0..psk.binder_len {
                                    out.push(0);
                                }
                            });
                        });
                    });
                }
            });
        });

        Ok(PendingClientHello {
            buf,
            binder_len: psk.map(|p| p.binder_len),
            random,
            session_id,
            cipher_suites,
            alpn: self.alpn.to_vec(),
            groups,
        })
    }
}

/// A serialized ClientHello whose binder placeholder is still zero.
#[derive(Debug)]
pub struct PendingClientHello {
    buf: Buf,
    binder_len: Option<usize>,
    random: [u8; 32],
    session_id: Vec<u8>,
    cipher_suites: Vec<CipherSuite>,
    alpn: Vec<String>,
    groups: Vec<NamedGroup>,
}

impl PendingClientHello {
    /// Length of the binder the message waits for.
    pub fn binder_len(&self) -> Option<usize> {
        self.binder_len
    }

    /// The message up to and including the PSK identities, which is what the
    /// binder covers. Without a PSK this is the whole message.
    pub fn binder_prefix(&self) -> &[u8] {
        match self.binder_len {
            // binders list length (2) + binder length (1) + binder
            Some(n) => &self.buf[..self.buf.len() - (2 + 1 + n)],
            None => &self.buf,
        }
    }

    /// Splice in the binder and freeze the message.
    pub fn finish(mut self, binder: Option<&[u8]>) -> Result<ClientHello, Error> {
        match (self.binder_len, binder) {
            (Some(n), Some(b)) if b.len() == n => {
                let at = self.buf.len() - n;
                self.buf[at..].copy_from_slice(b);
            }
            (None, None) => {}
            (n, b) => {
                return Err(Error::CryptoError(format!(
                    "Binder mismatch: expected {:?} got {:?}",
                    n,
                    b.map(|b| b.len())
                )))
            }
        }

        Ok(ClientHello {
            raw: self.buf,
            random: self.random,
            session_id: self.session_id,
            cipher_suites: self.cipher_suites,
            alpn: self.alpn,
            groups: self.groups,
            offered_psk: self.binder_len.is_some(),
        })
    }
}

/// A finished ClientHello.
#[derive(Debug, Clone)]
pub struct ClientHello {
    raw: Buf,
    random: [u8; 32],
    session_id: Vec<u8>,
    cipher_suites: Vec<CipherSuite>,
    alpn: Vec<String>,
    groups: Vec<NamedGroup>,
    offered_psk: bool,
}

impl ClientHello {
    /// Full handshake message, header included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn random(&self) -> &[u8; 32] {
        &self.random
    }

    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    pub fn alpn(&self) -> &[String] {
        &self.alpn
    }

    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    pub fn offered_psk(&self) -> bool {
        self.offered_psk
    }
}
