use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::extension::ServerExtensions;
use crate::cipher_suite::CipherSuite;
use crate::types::ProtocolVersion;
use crate::util::{u16_prefixed, u8_prefixed};
use crate::Error;

/// ServerHello.random value marking a HelloRetryRequest (RFC 8446 4.1.3).
pub const HRR_RANDOM: [u8; 32] = [
    0xCF, 0x21, 0xAD, 0x74, 0xE5, 0x9A, 0x61, 0x11, 0xBE, 0x1D, 0x8C, 0x02, 0x1E, 0x65, 0xB8, 0x91,
    0xC2, 0xA2, 0x11, 0x16, 0x7A, 0xBB, 0x8C, 0x5E, 0x07, 0x9E, 0x09, 0xE2, 0xC8, 0xA8, 0x33, 0x9C,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub legacy_version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub extensions: ServerExtensions,
}

struct Raw<'a> {
    legacy_version: ProtocolVersion,
    random: &'a [u8],
    session_id: &'a [u8],
    cipher_suite: u16,
    compression: u8,
    extensions: &'a [u8],
}

fn parse_raw(input: &[u8]) -> IResult<&[u8], Raw<'_>> {
    let (input, legacy_version) = ProtocolVersion::parse(input)?;
    let (input, random) = take(32usize)(input)?;
    let (input, session_id) = u8_prefixed(input)?;
    let (input, cipher_suite) = be_u16(input)?;
    let (input, compression) = be_u8(input)?;
    // The extension block is optional in TLS 1.2.
    let (input, extensions) = if input.is_empty() {
        (input, &input[..0])
    } else {
        u16_prefixed(input)?
    };
    Ok((
        input,
        Raw {
            legacy_version,
            random,
            session_id,
            cipher_suite,
            compression,
            extensions,
        },
    ))
}

impl ServerHello {
    /// Parse a ServerHello body.
    ///
    /// A HelloRetryRequest fails with `Error::HelloRetryRequest`.
    pub fn parse(body: &[u8], offered_alpn: &[String]) -> Result<ServerHello, Error> {
        let (rest, raw) = parse_raw(body)?;
        if !rest.is_empty() {
            return Err(Error::Malformed("Trailing bytes after ServerHello".to_string()));
        }

        let mut random = [0u8; 32];
        random.copy_from_slice(raw.random);

        if random == HRR_RANDOM {
            let ext = ServerExtensions::parse(raw.extensions, offered_alpn, true)?;
            debug!("HelloRetryRequest for group {:?}", ext.retry_group);
            return Err(Error::HelloRetryRequest);
        }

        let cipher_suite = CipherSuite::from_u16(raw.cipher_suite)
            .ok_or(Error::UnsupportedCipherSuite(raw.cipher_suite))?;

        if raw.compression != 0 {
            return Err(Error::UnsupportedCompression(raw.compression));
        }

        let extensions = ServerExtensions::parse(raw.extensions, offered_alpn, false)?;

        let hello = ServerHello {
            legacy_version: raw.legacy_version,
            random,
            session_id: raw.session_id.to_vec(),
            cipher_suite,
            extensions,
        };

        match hello.version() {
            ProtocolVersion::TLS1_3 => {
                if hello.extensions.key_share.is_none() {
                    return Err(Error::MissingKeyShare);
                }
            }
            ProtocolVersion::TLS1_2 => {}
            v => return Err(Error::UnsupportedVersion(v.as_u16())),
        }

        if hello.cipher_suite.version() != hello.version() {
            return Err(Error::UnsupportedCipherSuite(raw.cipher_suite));
        }

        Ok(hello)
    }

    /// Negotiated version: `supported_versions` if present, else TLS 1.2.
    pub fn version(&self) -> ProtocolVersion {
        self.extensions
            .supported_version
            .unwrap_or(ProtocolVersion::TLS1_2)
    }
}
