//! Hello extensions: `type(2) || length(2) || data`.
//!
//! Only the set the client offers is understood. Unknown types are skipped
//! when parsing, repeated types are a protocol error.

use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{NamedGroup, ProtocolVersion, SignatureScheme};
use crate::util::{all_of, u16_prefixed, u8_prefixed};
use crate::util::{with_u16_len, with_u8_len};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    SignatureAlgorithms,
    ApplicationLayerProtocolNegotiation,
    SessionTicket,
    PreSharedKey,
    SupportedVersions,
    PskKeyExchangeModes,
    KeyShare,
    RenegotiationInfo,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => ExtensionType::ServerName,
            0x000A => ExtensionType::SupportedGroups,
            0x000D => ExtensionType::SignatureAlgorithms,
            0x0010 => ExtensionType::ApplicationLayerProtocolNegotiation,
            0x0023 => ExtensionType::SessionTicket,
            0x0029 => ExtensionType::PreSharedKey,
            0x002B => ExtensionType::SupportedVersions,
            0x002D => ExtensionType::PskKeyExchangeModes,
            0x0033 => ExtensionType::KeyShare,
            0xFF01 => ExtensionType::RenegotiationInfo,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::ServerName => 0x0000,
            ExtensionType::SupportedGroups => 0x000A,
            ExtensionType::SignatureAlgorithms => 0x000D,
            ExtensionType::ApplicationLayerProtocolNegotiation => 0x0010,
            ExtensionType::SessionTicket => 0x0023,
            ExtensionType::PreSharedKey => 0x0029,
            ExtensionType::SupportedVersions => 0x002B,
            ExtensionType::PskKeyExchangeModes => 0x002D,
            ExtensionType::KeyShare => 0x0033,
            ExtensionType::RenegotiationInfo => 0xFF01,
            ExtensionType::Unknown(value) => *value,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Extension<'a> {
    pub extension_type: ExtensionType,
    pub extension_data: &'a [u8],
}

impl<'a> Extension<'a> {
    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Extension<'a>> {
        let (input, extension_type) = be_u16(input)?;
        let (input, extension_length) = be_u16(input)?;
        let (input, extension_data) = take(extension_length)(input)?;

        Ok((
            input,
            Extension {
                extension_type: ExtensionType::from_u16(extension_type),
                extension_data,
            },
        ))
    }

    /// Parse a complete extension block (without its outer length), rejecting
    /// repeated types.
    pub fn parse_all(input: &'a [u8]) -> Result<Vec<Extension<'a>>, Error> {
        let (_, extensions) = all_of(input, Extension::parse)?;
        for (i, a) in extensions.iter().enumerate() {
            let id = a.extension_type.as_u16();
            if extensions[i + 1..]
                .iter()
                .any(|b| b.extension_type.as_u16() == id)
            {
                return Err(Error::DuplicateExtension(id));
            }
        }
        Ok(extensions)
    }
}

/// Write one extension, the closure writes the data.
pub fn write_extension(out: &mut Buf, extension_type: ExtensionType, f: impl FnOnce(&mut Buf)) {
    out.extend_from_slice(&extension_type.as_u16().to_be_bytes());
    with_u16_len(out, f);
}

/// `server_name` with one host_name entry (RFC 6066).
pub fn write_server_name(out: &mut Buf, host: &str) {
    write_extension(out, ExtensionType::ServerName, |out| {
        with_u16_len(out, |out| {
            out.push(0); // host_name
            with_u16_len(out, |out| out.extend_from_slice(host.as_bytes()));
        });
    });
}

pub fn write_supported_groups(out: &mut Buf, groups: &[NamedGroup]) {
    write_extension(out, ExtensionType::SupportedGroups, |out| {
        with_u16_len(out, |out| {
            for g in groups {
                out.extend_from_slice(&g.as_u16().to_be_bytes());
            }
        });
    });
}

pub fn write_signature_algorithms(out: &mut Buf, schemes: &[SignatureScheme]) {
    write_extension(out, ExtensionType::SignatureAlgorithms, |out| {
        with_u16_len(out, |out| {
            for s in schemes {
                out.extend_from_slice(&s.as_u16().to_be_bytes());
            }
        });
    });
}

pub fn write_alpn(out: &mut Buf, protocols: &[String]) {
    write_extension(
        out,
        ExtensionType::ApplicationLayerProtocolNegotiation,
        |out| {
            with_u16_len(out, |out| {
                for p in protocols {
                    with_u8_len(out, |out| out.extend_from_slice(p.as_bytes()));
                }
            });
        },
    );
}

/// Empty `session_ticket`, asking a TLS 1.2 server for a ticket.
pub fn write_session_ticket(out: &mut Buf) {
    write_extension(out, ExtensionType::SessionTicket, |_| {});
}

pub fn write_supported_versions(out: &mut Buf, versions: &[ProtocolVersion]) {
    write_extension(out, ExtensionType::SupportedVersions, |out| {
        with_u8_len(out, |out| {
            for v in versions {
                out.extend_from_slice(&v.as_u16().to_be_bytes());
            }
        });
    });
}

/// `psk_key_exchange_modes` offering only psk_dhe_ke.
pub fn write_psk_key_exchange_modes(out: &mut Buf) {
    write_extension(out, ExtensionType::PskKeyExchangeModes, |out| {
        with_u8_len(out, |out| out.push(1));
    });
}

pub fn write_key_share(out: &mut Buf, shares: &[(NamedGroup, &[u8])]) {
    write_extension(out, ExtensionType::KeyShare, |out| {
        with_u16_len(out, |out| {
            for (group, key) in shares {
                out.extend_from_slice(&group.as_u16().to_be_bytes());
                with_u16_len(out, |out| out.extend_from_slice(key));
            }
        });
    });
}

/// Initial `renegotiation_info`: an empty renegotiated_connection.
pub fn write_renegotiation_info(out: &mut Buf) {
    write_extension(out, ExtensionType::RenegotiationInfo, |out| out.push(0));
}

/// Server `key_share` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    pub group: NamedGroup,
    pub key_exchange: Vec<u8>,
}

/// Extensions a server may send in ServerHello or EncryptedExtensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerExtensions {
    pub supported_version: Option<ProtocolVersion>,
    pub key_share: Option<KeyShareEntry>,
    /// Group requested by a HelloRetryRequest.
    pub retry_group: Option<NamedGroup>,
    /// Index of the PSK identity the server accepted.
    pub pre_shared_key: Option<u16>,
    pub alpn: Option<String>,
    pub session_ticket: bool,
    pub server_name: bool,
    pub renegotiation_info: Option<Vec<u8>>,
}

impl ServerExtensions {
    /// Parse an extension block (without its outer length).
    ///
    /// `offered_alpn` is the list the client sent; a selected protocol
    /// outside of it fails with `UnsupportedAlpn`.
    pub fn parse(input: &[u8], offered_alpn: &[String], is_retry: bool) -> Result<Self, Error> {
        let mut out = ServerExtensions::default();

        for ext in Extension::parse_all(input)? {
            let data = ext.extension_data;
            match ext.extension_type {
                ExtensionType::SupportedVersions => {
                    let (_, v) = ProtocolVersion::parse(data)?;
                    out.supported_version = Some(v);
                }
                ExtensionType::KeyShare if is_retry => {
                    let (_, g) = NamedGroup::parse(data)?;
                    out.retry_group = Some(g);
                }
                ExtensionType::KeyShare => {
                    let (rest, group) = NamedGroup::parse(data)?;
                    let (_, key) = u16_prefixed(rest)?;
                    out.key_share = Some(KeyShareEntry {
                        group,
                        key_exchange: key.to_vec(),
                    });
                }
                ExtensionType::PreSharedKey => {
                    let (_, idx) = be_u16(data)?;
                    out.pre_shared_key = Some(idx);
                }
                ExtensionType::ApplicationLayerProtocolNegotiation => {
                    let (_, list) = u16_prefixed(data)?;
                    let (rest, name) = u8_prefixed(list)?;
                    if !rest.is_empty() {
                        return Err(Error::Malformed(
                            "Server ALPN must name exactly one protocol".to_string(),
                        ));
                    }
                    let name = String::from_utf8_lossy(name).into_owned();
                    if !offered_alpn.iter().any(|p| *p == name) {
                        return Err(Error::UnsupportedAlpn(name));
                    }
                    out.alpn = Some(name);
                }
                ExtensionType::SessionTicket => out.session_ticket = true,
                ExtensionType::ServerName => out.server_name = true,
                ExtensionType::RenegotiationInfo => {
                    let (_, v) = u8_prefixed(data)?;
                    out.renegotiation_info = Some(v.to_vec());
                }
                ExtensionType::Unknown(t) => {
                    trace!("Ignoring unknown extension 0x{:04x}", t);
                }
                t => {
                    trace!("Ignoring extension {:?} in server message", t);
                }
            }
        }

        Ok(out)
    }
}

/// Parse a `supported_versions` list as sent by a client. Used in tests.
#[cfg(test)]
pub(crate) fn parse_client_versions(data: &[u8]) -> IResult<&[u8], Vec<ProtocolVersion>> {
    let (rest, list) = u8_prefixed(data)?;
    let (_, v) = all_of(list, ProtocolVersion::parse)?;
    Ok((rest, v))
}

/// Parse a `key_share` client list. Used in tests.
#[cfg(test)]
pub(crate) fn parse_client_key_shares(data: &[u8]) -> IResult<&[u8], Vec<(NamedGroup, &[u8])>> {
    let (rest, list) = u16_prefixed(data)?;
    let (_, v) = all_of(list, |i| {
        let (i, g) = NamedGroup::parse(i)?;
        let (i, k) = u16_prefixed(i)?;
        Ok((i, (g, k)))
    })?;
    Ok((rest, v))
}
