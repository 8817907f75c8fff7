//! TLS record layer: framing, stream reassembly and record protection.

mod cipher;
mod stream;

pub use cipher::{OpenedRecord, RecordCipher};
pub use stream::RecordStream;

use std::fmt;

use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use crate::buffer::Buf;
use crate::types::{ContentType, ProtocolVersion};

/// Record header length: `type(1) || version(2) || length(2)`.
pub const RECORD_HEADER_LEN: usize = 5;

/// Largest plaintext fragment a record may carry (2^14).
pub const MAX_PLAINTEXT_LEN: usize = 16384;

/// Largest protected fragment we accept (2^14 + 2048).
pub const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 2048;

/// Parsed view of a 5 byte record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub length: u16,
}

impl RecordHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], RecordHeader> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, length) = be_u16(input)?;
        Ok((
            input,
            RecordHeader {
                content_type,
                version,
                length,
            },
        ))
    }

    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_LEN] {
        let v = self.version.as_u16().to_be_bytes();
        let l = self.length.to_be_bytes();
        [self.content_type.as_u8(), v[0], v[1], l[0], l[1]]
    }
}

/// One record as it travels on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsRecord {
    pub header: [u8; RECORD_HEADER_LEN],
    pub content: Buf,
}

impl TlsRecord {
    /// Build a record, filling in the header length from `content`.
    pub fn new(content_type: ContentType, version: ProtocolVersion, content: Buf) -> Self {
        debug_assert!(content.len() <= u16::MAX as usize);
        let header = RecordHeader {
            content_type,
            version,
            length: content.len() as u16,
        };
        TlsRecord {
            header: header.to_bytes(),
            content,
        }
    }

    /// Parse one complete record from the front of `input`.
    pub fn parse(input: &[u8]) -> IResult<&[u8], TlsRecord> {
        let (rest, header) = RecordHeader::parse(input)?;
        let (rest, content) = take(header.length as usize)(rest)?;
        let mut h = [0; RECORD_HEADER_LEN];
        h.copy_from_slice(&input[..RECORD_HEADER_LEN]);
        Ok((
            rest,
            TlsRecord {
                header: h,
                content: Buf::from_slice(content),
            },
        ))
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::from_u8(self.header[0])
    }

    pub fn version(&self) -> ProtocolVersion {
        ProtocolVersion::from_u16(u16::from_be_bytes([self.header[1], self.header[2]]))
    }

    /// Append header and content to `out`.
    pub fn serialize(&self, out: &mut Buf) {
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.content);
    }

    pub fn to_bytes(&self) -> Buf {
        let mut out = Buf::with_capacity(RECORD_HEADER_LEN + self.content.len());
        self.serialize(&mut out);
        out
    }
}

impl fmt::Debug for TlsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsRecord")
            .field("content_type", &self.content_type())
            .field("version", &self.version())
            .field("len", &self.content.len())
            .finish()
    }
}

/// Crypto context of a received record, handed to
/// [`Handler::on_read`](crate::Handler::on_read).
///
/// Borrows from the connection, so it cannot outlive the callback.
#[derive(Clone, Copy)]
pub enum PacketContext<'a> {
    /// Record was not protected.
    Plaintext,
    /// Record was decrypted.
    Ciphertext {
        /// Encryption key of the direction that protected the record.
        enc_key: &'a [u8],
        /// Static IV from the key schedule (4 bytes for TLS 1.2 GCM, empty for CBC).
        fixed_iv: &'a [u8],
        /// Nonce (AEAD) or explicit IV (CBC) the record was processed with.
        iv: &'a [u8],
        /// Sequence number within the current key epoch.
        record_number: u64,
        /// HMAC key, CBC suites only.
        mac_key: Option<&'a [u8]>,
        /// Protected fragment as received.
        ciphertext: &'a [u8],
        /// Recovered fragment, without padding or inner content type.
        plaintext: &'a [u8],
        /// Inner content type (TLS 1.3), or the record type (TLS 1.2).
        content_type: Option<ContentType>,
    },
}

impl<'a> fmt::Debug for PacketContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketContext::Plaintext => write!(f, "Plaintext"),
            PacketContext::Ciphertext {
                record_number,
                ciphertext,
                plaintext,
                content_type,
                ..
            } => f
                .debug_struct("Ciphertext")
                .field("record_number", record_number)
                .field("ciphertext_len", &ciphertext.len())
                .field("plaintext_len", &plaintext.len())
                .field("content_type", content_type)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &[u8] = &[
        0x16, // ContentType::Handshake
        0x03, 0x03, // TLS 1.2
        0x00, 0x04, // length
        0x01, 0x02, 0x03, 0x04, // fragment
        0xff, // trailing byte of the next record
    ];

    #[test]
    fn parse_and_serialize() {
        let (rest, record) = TlsRecord::parse(RECORD).unwrap();
        assert_eq!(rest, &[0xff]);
        assert_eq!(record.content_type(), ContentType::Handshake);
        assert_eq!(record.version(), ProtocolVersion::TLS1_2);
        assert_eq!(&*record.content, &[1, 2, 3, 4]);
        assert_eq!(&*record.to_bytes(), &RECORD[..9]);
    }

    #[test]
    fn new_sets_length() {
        let r = TlsRecord::new(
            ContentType::Alert,
            ProtocolVersion::TLS1_2,
            Buf::from_slice(&[2, 40]),
        );
        assert_eq!(r.header, [21, 3, 3, 0, 2]);
    }

    #[test]
    fn short_content_is_incomplete() {
        assert!(TlsRecord::parse(&RECORD[..7]).is_err());
    }
}
