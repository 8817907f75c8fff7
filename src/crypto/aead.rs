//! AEAD nonce and additional data construction for TLS records.

use std::ops::Deref;

use arrayvec::ArrayVec;

use crate::types::{ContentType, ProtocolVersion};
use crate::util::xor_sequence;

/// AEAD authentication tag length (GCM and Poly1305).
pub(crate) const AEAD_TAG_LEN: usize = 16;

/// Full 12 byte AEAD nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; 12]);

impl Nonce {
    /// TLS 1.2 GCM nonce: 4 byte fixed IV followed by the 8 byte explicit nonce.
    pub(crate) fn new(fixed_iv: &[u8], explicit_nonce: &[u8]) -> Result<Self, String> {
        if fixed_iv.len() != 4 || explicit_nonce.len() != 8 {
            return Err(format!(
                "Bad nonce parts: fixed {} explicit {}",
                fixed_iv.len(),
                explicit_nonce.len()
            ));
        }
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(fixed_iv);
        nonce[4..].copy_from_slice(explicit_nonce);
        Ok(Self(nonce))
    }

    /// TLS 1.3 and ChaCha20 nonce: the IV XOR the left-padded sequence number.
    ///
    /// Per RFC 8446 Section 5.3: nonce = iv XOR pad_left(seq, iv_len)
    pub(crate) fn xor(iv: &[u8], seq: u64) -> Result<Self, String> {
        let mut nonce: [u8; 12] = iv
            .try_into()
            .map_err(|_| format!("Bad IV length: {}", iv.len()))?;
        xor_sequence(&mut nonce, seq);
        Ok(Self(nonce))
    }
}

impl Deref for Nonce {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Additional Authenticated Data for TLS records.
///
/// 13 bytes for TLS 1.2, the 5 byte record header for TLS 1.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aad(pub ArrayVec<u8, 13>);

impl Aad {
    /// `seq_num(8) || type(1) || version(2) || length(2)`, where length is the
    /// plaintext length (RFC 5246 Section 6.2.3.3).
    pub(crate) fn new_tls12(
        content_type: ContentType,
        seq: u64,
        version: ProtocolVersion,
        length: u16,
    ) -> Self {
        let mut aad = ArrayVec::new();
        for b in seq.to_be_bytes() {
            aad.push(b);
        }
        aad.push(content_type.as_u8());
        for b in version.as_u16().to_be_bytes() {
            aad.push(b);
        }
        for b in length.to_be_bytes() {
            aad.push(b);
        }
        Aad(aad)
    }

    /// The record header with the ciphertext length (RFC 8446 Section 5.2).
    pub(crate) fn new_tls13(ciphertext_len: u16) -> Self {
        let mut aad = ArrayVec::new();
        aad.push(ContentType::ApplicationData.as_u8());
        for b in ProtocolVersion::TLS1_2.as_u16().to_be_bytes() {
            aad.push(b);
        }
        for b in ciphertext_len.to_be_bytes() {
            aad.push(b);
        }
        Aad(aad)
    }
}

impl Deref for Aad {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
