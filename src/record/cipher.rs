//! Record protection for one direction of a connection.
//!
//! A [`RecordCipher`] is built whenever traffic keys change and owns the
//! sequence number of that key epoch, so a new epoch always starts at 0.

use std::fmt;

use zeroize::Zeroizing;

use super::{PacketContext, TlsRecord, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN};
use crate::buffer::Buf;
use crate::cipher_suite::{BulkCipher, CipherSuite};
use crate::crypto::{Aad, BlockCipher, Cipher, CryptoProvider, HmacProvider, Nonce};
use crate::crypto::{SecureRandom, AEAD_TAG_LEN};
use crate::types::{ContentType, HashAlgorithm, ProtocolVersion};
use crate::util::{add_tls_padding, ct_eq, strip_tls_padding};
use crate::Error;

enum Engine {
    Aead(Box<dyn Cipher>),
    Cbc {
        cipher: Box<dyn BlockCipher>,
        hmac: &'static dyn HmacProvider,
        random: &'static dyn SecureRandom,
        mac_hash: HashAlgorithm,
    },
}

/// Keys and sequence number protecting records in one direction.
pub struct RecordCipher {
    suite: CipherSuite,
    version: ProtocolVersion,
    engine: Engine,
    enc_key: Zeroizing<Vec<u8>>,
    fixed_iv: Zeroizing<Vec<u8>>,
    mac_key: Option<Zeroizing<Vec<u8>>>,
    seq: u64,
}

/// Result of opening a protected record.
#[derive(Debug, PartialEq, Eq)]
pub struct OpenedRecord {
    /// Inner content type for TLS 1.3, the record type otherwise.
    pub content_type: ContentType,
    pub plaintext: Buf,
    /// Nonce or explicit CBC IV used for this record.
    pub iv: Buf,
    /// Sequence number the record was opened with.
    pub record_number: u64,
}

impl RecordCipher {
    /// Install traffic keys for `suite`.
    ///
    /// `iv` is the fixed IV from the key schedule. `mac_key` is required for
    /// CBC suites and ignored otherwise.
    pub fn new(
        provider: &CryptoProvider,
        suite: CipherSuite,
        enc_key: &[u8],
        iv: &[u8],
        mac_key: Option<&[u8]>,
    ) -> Result<Self, Error> {
        let d = suite.descriptor();
        if enc_key.len() != d.key_len || iv.len() != d.fixed_iv_len {
            return Err(Error::CryptoError(format!(
                "Bad key material for {}: key {} iv {}",
                suite,
                enc_key.len(),
                iv.len()
            )));
        }

        let engine = match d.bulk {
            BulkCipher::Aead(alg) => {
                let aead = provider
                    .find_aead(alg)
                    .ok_or(Error::UnsupportedCipherSuite(d.id))?;
                Engine::Aead(aead.create_cipher(enc_key).map_err(Error::CryptoError)?)
            }
            BulkCipher::Cbc(alg) => {
                let block = provider
                    .find_block_cipher(alg)
                    .ok_or(Error::UnsupportedCipherSuite(d.id))?;
                match mac_key {
                    Some(k) if k.len() == d.mac_key_len => {}
                    _ => {
                        return Err(Error::CryptoError(format!(
                            "Missing or bad MAC key for {}",
                            suite
                        )))
                    }
                }
                Engine::Cbc {
                    cipher: block.create_cipher(enc_key).map_err(Error::CryptoError)?,
                    hmac: provider.hmac_provider,
                    random: provider.secure_random,
                    mac_hash: d.hash,
                }
            }
        };

        let mac_key = match engine {
            Engine::Cbc { .. } => mac_key.map(|k| Zeroizing::new(k.to_vec())),
            Engine::Aead(_) => None,
        };

        Ok(RecordCipher {
            suite,
            version: d.version,
            engine,
            enc_key: Zeroizing::new(enc_key.to_vec()),
            fixed_iv: Zeroizing::new(iv.to_vec()),
            mac_key,
            seq: 0,
        })
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    /// Number of records processed under these keys.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn enc_key(&self) -> &[u8] {
        &self.enc_key
    }

    pub fn fixed_iv(&self) -> &[u8] {
        &self.fixed_iv
    }

    pub fn mac_key(&self) -> Option<&[u8]> {
        self.mac_key.as_deref().map(|k| k.as_slice())
    }

    /// Protect `plaintext` as a record of `content_type`.
    pub fn seal(&mut self, content_type: ContentType, plaintext: &[u8]) -> Result<TlsRecord, Error> {
        let explicit_iv = match &self.engine {
            Engine::Cbc { random, cipher, .. } => {
                let mut iv = Buf::new();
                iv.resize(cipher.block_len(), 0);
                random.fill(&mut iv).map_err(Error::CryptoError)?;
                Some(iv)
            }
            Engine::Aead(_) => None,
        };
        self.seal_with_iv(content_type, plaintext, explicit_iv.as_deref())
    }

    /// Like [`seal`](Self::seal) with a caller chosen CBC IV.
    pub(crate) fn seal_with_iv(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        cbc_iv: Option<&[u8]>,
    ) -> Result<TlsRecord, Error> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(Error::Malformed(format!(
                "Plaintext too large: {}",
                plaintext.len()
            )));
        }
        let seq = self.seq;

        let record = match self.version {
            ProtocolVersion::TLS1_3 => self.seal_tls13(content_type, plaintext, seq)?,
            _ => self.seal_tls12(content_type, plaintext, seq, cbc_iv)?,
        };

        self.seq += 1;
        Ok(record)
    }

    fn seal_tls13(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        seq: u64,
    ) -> Result<TlsRecord, Error> {
        let Engine::Aead(cipher) = &mut self.engine else {
            return Err(Error::CryptoError("TLS 1.3 requires an AEAD".to_string()));
        };

        // TLSInnerPlaintext without padding
        let mut buf = Buf::with_capacity(plaintext.len() + 1 + AEAD_TAG_LEN);
        buf.extend_from_slice(plaintext);
        buf.push(content_type.as_u8());

        let aad = Aad::new_tls13((buf.len() + AEAD_TAG_LEN) as u16);
        let nonce = Nonce::xor(&self.fixed_iv, seq).map_err(Error::CryptoError)?;
        cipher
            .encrypt(&mut buf, aad, nonce)
            .map_err(Error::CryptoError)?;

        Ok(TlsRecord::new(
            ContentType::ApplicationData,
            ProtocolVersion::TLS1_2,
            buf,
        ))
    }

    fn seal_tls12(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
        seq: u64,
        cbc_iv: Option<&[u8]>,
    ) -> Result<TlsRecord, Error> {
        let aad = Aad::new_tls12(
            content_type,
            seq,
            ProtocolVersion::TLS1_2,
            plaintext.len() as u16,
        );

        let content = match &mut self.engine {
            Engine::Aead(cipher) => {
                let mut buf = Buf::with_capacity(8 + plaintext.len() + AEAD_TAG_LEN);
                let nonce = if self.fixed_iv.len() == 4 {
                    // GCM: the explicit nonce part is the sequence number
                    let explicit = seq.to_be_bytes();
                    buf.extend_from_slice(&explicit);
                    Nonce::new(&self.fixed_iv, &explicit)
                } else {
                    Nonce::xor(&self.fixed_iv, seq)
                }
                .map_err(Error::CryptoError)?;

                let mut body = Buf::from_slice(plaintext);
                cipher
                    .encrypt(&mut body, aad, nonce)
                    .map_err(Error::CryptoError)?;
                buf.extend_from_slice(&body);
                buf
            }
            Engine::Cbc {
                cipher,
                hmac,
                mac_hash,
                ..
            } => {
                let iv = cbc_iv
                    .ok_or_else(|| Error::CryptoError("CBC record without IV".to_string()))?;
                let mac_key = self
                    .mac_key
                    .as_deref()
                    .ok_or_else(|| Error::CryptoError("CBC record without MAC key".to_string()))?;

                let mut body = Buf::from_slice(plaintext);
                let mut mac = Buf::new();
                cbc_mac(*hmac, *mac_hash, mac_key, &aad, plaintext, &mut mac)?;
                body.extend_from_slice(&mac);
                add_tls_padding(&mut body, cipher.block_len());
                cipher.encrypt_cbc(iv, &mut body).map_err(Error::CryptoError)?;

                let mut buf = Buf::from_slice(iv);
                buf.extend_from_slice(&body);
                buf
            }
        };

        Ok(TlsRecord::new(content_type, ProtocolVersion::TLS1_2, content))
    }

    /// Remove protection from a received record.
    ///
    /// Fails closed: no plaintext is returned when authentication fails.
    pub fn open(&mut self, record: &TlsRecord) -> Result<OpenedRecord, Error> {
        if record.content.len() > MAX_CIPHERTEXT_LEN {
            return Err(Error::Malformed(format!(
                "Ciphertext too large: {}",
                record.content.len()
            )));
        }
        let seq = self.seq;

        let opened = match self.version {
            ProtocolVersion::TLS1_3 => self.open_tls13(record, seq)?,
            _ => self.open_tls12(record, seq)?,
        };

        self.seq += 1;
        Ok(opened)
    }

    fn open_tls13(&mut self, record: &TlsRecord, seq: u64) -> Result<OpenedRecord, Error> {
        let Engine::Aead(cipher) = &mut self.engine else {
            return Err(Error::CryptoError("TLS 1.3 requires an AEAD".to_string()));
        };
        if record.content_type() != ContentType::ApplicationData {
            return Err(Error::UnexpectedMessage(format!(
                "Protected record with outer type {:?}",
                record.content_type()
            )));
        }
        if record.content.len() < AEAD_TAG_LEN + 1 {
            return Err(Error::AuthenticationFailed);
        }

        let aad = Aad::new_tls13(record.content.len() as u16);
        let nonce = Nonce::xor(&self.fixed_iv, seq).map_err(Error::CryptoError)?;
        let mut buf = record.content.clone();
        cipher
            .decrypt(&mut buf, aad, nonce)
            .map_err(|_| Error::AuthenticationFailed)?;

        // Strip zero padding, the last non-zero byte is the real content type.
        let Some(pos) = buf.iter().rposition(|b| *b != 0) else {
            return Err(Error::UnexpectedMessage(
                "Protected record without content type".to_string(),
            ));
        };
        let content_type = ContentType::from_u8(buf[pos]);
        buf.truncate(pos);

        Ok(OpenedRecord {
            content_type,
            plaintext: buf,
            iv: Buf::from_slice(&nonce),
            record_number: seq,
        })
    }

    fn open_tls12(&mut self, record: &TlsRecord, seq: u64) -> Result<OpenedRecord, Error> {
        let content_type = record.content_type();
        let content = &record.content;

        match &mut self.engine {
            Engine::Aead(cipher) => {
                let (nonce, body) = if self.fixed_iv.len() == 4 {
                    if content.len() < 8 + AEAD_TAG_LEN {
                        return Err(Error::AuthenticationFailed);
                    }
                    let nonce = Nonce::new(&self.fixed_iv, &content[..8]);
                    (nonce, &content[8..])
                } else {
                    if content.len() < AEAD_TAG_LEN {
                        return Err(Error::AuthenticationFailed);
                    }
                    (Nonce::xor(&self.fixed_iv, seq), &content[..])
                };
                let nonce = nonce.map_err(Error::CryptoError)?;

                let aad = Aad::new_tls12(
                    content_type,
                    seq,
                    ProtocolVersion::TLS1_2,
                    (body.len() - AEAD_TAG_LEN) as u16,
                );
                let mut buf = Buf::from_slice(body);
                cipher
                    .decrypt(&mut buf, aad, nonce)
                    .map_err(|_| Error::AuthenticationFailed)?;

                Ok(OpenedRecord {
                    content_type,
                    plaintext: buf,
                    iv: Buf::from_slice(&nonce),
                    record_number: seq,
                })
            }
            Engine::Cbc {
                cipher,
                hmac,
                mac_hash,
                ..
            } => {
                let block_len = cipher.block_len();
                let mac_len = mac_hash.output_len();
                if content.len() < block_len * 2
                    || content.len() % block_len != 0
                    || content.len() < block_len + mac_len + 1
                {
                    return Err(Error::InvalidPadding);
                }
                let mac_key = self
                    .mac_key
                    .as_deref()
                    .ok_or_else(|| Error::CryptoError("CBC record without MAC key".to_string()))?;

                let (iv, body) = content.split_at(block_len);
                let mut buf = Buf::from_slice(body);
                cipher.decrypt_cbc(iv, &mut buf).map_err(Error::CryptoError)?;

                let unpadded = strip_tls_padding(&buf).ok_or(Error::InvalidPadding)?;
                if unpadded < mac_len {
                    return Err(Error::MacMismatch);
                }
                let data_len = unpadded - mac_len;

                let aad = Aad::new_tls12(
                    content_type,
                    seq,
                    ProtocolVersion::TLS1_2,
                    data_len as u16,
                );
                let mut expected = Buf::new();
                cbc_mac(
                    *hmac,
                    *mac_hash,
                    mac_key,
                    &aad,
                    &buf[..data_len],
                    &mut expected,
                )?;
                if !ct_eq(&expected, &buf[data_len..unpadded]) {
                    return Err(Error::MacMismatch);
                }

                buf.truncate(data_len);
                Ok(OpenedRecord {
                    content_type,
                    plaintext: buf,
                    iv: Buf::from_slice(iv),
                    record_number: seq,
                })
            }
        }
    }

    /// Diagnostics view of an opened record.
    pub fn packet_context<'a>(
        &'a self,
        record: &'a TlsRecord,
        opened: &'a OpenedRecord,
    ) -> PacketContext<'a> {
        PacketContext::Ciphertext {
            enc_key: &self.enc_key,
            fixed_iv: &self.fixed_iv,
            iv: &opened.iv,
            record_number: opened.record_number,
            mac_key: self.mac_key(),
            ciphertext: &record.content,
            plaintext: &opened.plaintext,
            content_type: Some(opened.content_type),
        }
    }
}

/// HMAC over `seq_num || type || version || length || data`.
///
/// The pseudo header is the same 13 bytes as the TLS 1.2 AEAD additional data.
fn cbc_mac(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    mac_key: &[u8],
    header: &[u8],
    data: &[u8],
    out: &mut Buf,
) -> Result<(), Error> {
    let mut input = Buf::with_capacity(header.len() + data.len());
    input.extend_from_slice(header);
    input.extend_from_slice(data);
    hmac.hmac(hash, mac_key, &input, out)
        .map_err(Error::CryptoError)
}

impl fmt::Debug for RecordCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCipher")
            .field("suite", &self.suite)
            .field("seq", &self.seq)
            .finish()
    }
}

#[cfg(test)]
#[cfg(feature = "rust-crypto")]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;
    use crate::util::unhex;

    fn pair(suite: CipherSuite) -> (RecordCipher, RecordCipher) {
        let p = default_provider();
        let d = suite.descriptor();
        let key = vec![0x42; d.key_len];
        let iv = vec![0x24; d.fixed_iv_len];
        let mac = vec![0x11; d.mac_key_len];
        let mac = (d.mac_key_len > 0).then_some(&mac[..]);
        (
            RecordCipher::new(&p, suite, &key, &iv, mac).unwrap(),
            RecordCipher::new(&p, suite, &key, &iv, mac).unwrap(),
        )
    }

    #[test]
    fn roundtrip_every_suite() {
        for suite in CipherSuite::all() {
            let (mut tx, mut rx) = pair(*suite);
            for (i, msg) in [&b"hello"[..], &[], &[7u8; 1000]].iter().enumerate() {
                let record = tx.seal(ContentType::ApplicationData, msg).unwrap();
                let opened = rx.open(&record).unwrap();
                assert_eq!(&*opened.plaintext, *msg, "{}", suite);
                assert_eq!(opened.content_type, ContentType::ApplicationData);
                assert_eq!(opened.record_number, i as u64);
            }
            assert_eq!(tx.seq(), 3);
            assert_eq!(rx.seq(), 3);
        }
    }

    #[test]
    fn tampering_fails_closed() {
        for suite in CipherSuite::all() {
            let (mut tx, mut rx) = pair(*suite);
            let mut record = tx.seal(ContentType::ApplicationData, b"secret").unwrap();
            let last = record.content.len() - 1;
            record.content[last] ^= 0x01;
            let err = rx.open(&record).unwrap_err();
            assert!(err.is_verification_failure(), "{}: {:?}", suite, err);
            // A failed open does not advance the counter.
            assert_eq!(rx.seq(), 0);
        }
    }

    #[test]
    fn tls13_inner_content_type() {
        let (mut tx, mut rx) = pair(CipherSuite::TLS13_AES_128_GCM_SHA256);
        let record = tx.seal(ContentType::Handshake, &[20, 0, 0, 0]).unwrap();
        assert_eq!(record.content_type(), ContentType::ApplicationData);
        assert_eq!(record.content.len(), 4 + 1 + 16);
        let opened = rx.open(&record).unwrap();
        assert_eq!(opened.content_type, ContentType::Handshake);
    }

    #[test]
    fn tls13_known_answer() {
        // Client handshake traffic key and iv from RFC 8448 section 3.
        let p = default_provider();
        let key = unhex("dbfaa693d1762c5b666af5d950258d01");
        let iv = unhex("5bd3c71b836e0b76bb73265f");
        let mut tx =
            RecordCipher::new(&p, CipherSuite::TLS13_AES_128_GCM_SHA256, &key, &iv, None).unwrap();
        tx.seal(ContentType::Handshake, b"skip").unwrap();
        let record = tx.seal(ContentType::ApplicationData, b"hello").unwrap();
        assert_eq!(record.header, [23, 3, 3, 0, 22]);
        assert_eq!(
            &*record.content,
            &unhex("4b2826246f856e7245e975a3c01554a87793a12765da")[..]
        );
    }

    #[test]
    fn tls12_gcm_known_answer() {
        let p = default_provider();
        let key: Vec<u8> = (0..16).collect();
        let mut tx = RecordCipher::new(
            &p,
            CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
            &key,
            &[1, 2, 3, 4],
            None,
        )
        .unwrap();
        for _ in 0..5 {
            tx.seal(ContentType::ApplicationData, b"x").unwrap();
        }
        let record = tx.seal(ContentType::ApplicationData, b"hello, world").unwrap();
        assert_eq!(
            &*record.content,
            &unhex(
                "00000000000000057d95ab3764863716ff84dcf90e419047182e1b85c679ee1bd8e767b5"
            )[..]
        );
    }

    #[test]
    fn cbc_known_answer() {
        let p = default_provider();
        let key: Vec<u8> = (0x00..0x10).collect();
        let mac_key: Vec<u8> = (0x20..0x40).collect();
        let iv: Vec<u8> = (0xa0..0xb0).collect();
        let suite = CipherSuite::ECDHE_RSA_AES128_CBC_SHA256;

        let mut tx = RecordCipher::new(&p, suite, &key, &[], Some(&mac_key)).unwrap();
        let record = tx
            .seal_with_iv(ContentType::ApplicationData, b"hello, world", Some(&iv))
            .unwrap();
        let expected = unhex(
            "a0a1a2a3a4a5a6a7a8a9aaabacadaeaf30f0bb2a6fe66fd1038774a9e92e0a72\
             a18be57e1c4e8fc77a45bd3f46d99c690248e35351f557b4026bf3811294b6b2",
        );
        assert_eq!(&*record.content, &expected[..]);

        let mut rx = RecordCipher::new(&p, suite, &key, &[], Some(&mac_key)).unwrap();
        let opened = rx.open(&record).unwrap();
        assert_eq!(&*opened.plaintext, b"hello, world");
        assert_eq!(&*opened.iv, &iv[..]);
    }

    #[test]
    fn cbc_bad_padding_and_mac() {
        let p = default_provider();
        let suite = CipherSuite::ECDHE_RSA_AES128_CBC_SHA256;
        let key = [3u8; 16];
        let mac_key = [5u8; 32];
        let iv = [9u8; 16];

        // Corrupting the first ciphertext block flips plaintext bits of the
        // data, so padding survives but the MAC fails.
        let mut tx = RecordCipher::new(&p, suite, &key, &[], Some(&mac_key)).unwrap();
        let mut record = tx
            .seal_with_iv(ContentType::ApplicationData, &[0u8; 40], Some(&iv))
            .unwrap();
        record.content[0] ^= 1;
        let mut rx = RecordCipher::new(&p, suite, &key, &[], Some(&mac_key)).unwrap();
        assert_eq!(rx.open(&record), Err(Error::MacMismatch));

        // Misaligned ciphertext is rejected before decryption.
        let record = TlsRecord::new(
            ContentType::ApplicationData,
            ProtocolVersion::TLS1_2,
            Buf::from_slice(&[0u8; 70]),
        );
        assert_eq!(rx.open(&record), Err(Error::InvalidPadding));
    }

    #[test]
    fn cbc_requires_mac_key() {
        let p = default_provider();
        let res = RecordCipher::new(
            &p,
            CipherSuite::ECDHE_RSA_AES256_CBC_SHA384,
            &[0; 32],
            &[],
            None,
        );
        assert!(res.is_err());
    }
}
