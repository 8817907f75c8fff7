//! Cipher suites and their static descriptor table.
//!
//! Each [`CipherSuite`] variant has exactly one [`CipherSuiteDescriptor`] in
//! [`DESCRIPTORS`], indexed by the variant's discriminant. The descriptor
//! decides whether the record layer takes the AEAD or the CBC-HMAC path.

use std::fmt;

use crate::types::{HashAlgorithm, ProtocolVersion};

/// AEAD bulk ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl AeadAlgorithm {
    pub fn key_len(&self) -> usize {
        match self {
            AeadAlgorithm::Aes128Gcm => 16,
            AeadAlgorithm::Aes256Gcm | AeadAlgorithm::ChaCha20Poly1305 => 32,
        }
    }
}

/// Block ciphers used in CBC mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCipherAlgorithm {
    Aes128Cbc,
    Aes256Cbc,
}

impl BlockCipherAlgorithm {
    pub fn key_len(&self) -> usize {
        match self {
            BlockCipherAlgorithm::Aes128Cbc => 16,
            BlockCipherAlgorithm::Aes256Cbc => 32,
        }
    }

    pub fn block_len(&self) -> usize {
        16
    }
}

/// Bulk cipher family of a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkCipher {
    Aead(AeadAlgorithm),
    Cbc(BlockCipherAlgorithm),
}

/// Supported cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    TLS13_AES_128_GCM_SHA256 = 0,
    TLS13_AES_256_GCM_SHA384,
    TLS13_CHACHA20_POLY1305_SHA256,
    ECDHE_ECDSA_AES128_GCM_SHA256,
    ECDHE_RSA_AES128_GCM_SHA256,
    ECDHE_ECDSA_AES256_GCM_SHA384,
    ECDHE_RSA_AES256_GCM_SHA384,
    ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
    ECDHE_RSA_CHACHA20_POLY1305_SHA256,
    ECDHE_ECDSA_AES128_CBC_SHA256,
    ECDHE_RSA_AES128_CBC_SHA256,
    ECDHE_ECDSA_AES256_CBC_SHA384,
    ECDHE_RSA_AES256_CBC_SHA384,
}

/// Static parameters of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteDescriptor {
    pub suite: CipherSuite,
    /// Wire identifier.
    pub id: u16,
    pub name: &'static str,
    /// Protocol version the suite belongs to.
    pub version: ProtocolVersion,
    pub bulk: BulkCipher,
    /// Encryption key length.
    pub key_len: usize,
    /// Implicit IV length taken from the key schedule.
    pub fixed_iv_len: usize,
    /// Explicit per-record IV length carried in each record.
    pub record_iv_len: usize,
    /// HMAC key length, 0 for AEAD suites.
    pub mac_key_len: usize,
    /// Transcript, HKDF and HMAC hash.
    pub hash: HashAlgorithm,
    /// Overrides `hash` for the TLS 1.2 PRF.
    pub prf_hash: Option<HashAlgorithm>,
}

const fn tls13(
    suite: CipherSuite,
    id: u16,
    name: &'static str,
    aead: AeadAlgorithm,
    key_len: usize,
    hash: HashAlgorithm,
) -> CipherSuiteDescriptor {
    CipherSuiteDescriptor {
        suite,
        id,
        name,
        version: ProtocolVersion::TLS1_3,
        bulk: BulkCipher::Aead(aead),
        key_len,
        fixed_iv_len: 12,
        record_iv_len: 0,
        mac_key_len: 0,
        hash,
        prf_hash: None,
    }
}

const fn tls12_gcm(
    suite: CipherSuite,
    id: u16,
    name: &'static str,
    aead: AeadAlgorithm,
    key_len: usize,
    hash: HashAlgorithm,
) -> CipherSuiteDescriptor {
    CipherSuiteDescriptor {
        suite,
        id,
        name,
        version: ProtocolVersion::TLS1_2,
        bulk: BulkCipher::Aead(aead),
        key_len,
        fixed_iv_len: 4,
        record_iv_len: 8,
        mac_key_len: 0,
        hash,
        prf_hash: None,
    }
}

const fn tls12_chacha(suite: CipherSuite, id: u16, name: &'static str) -> CipherSuiteDescriptor {
    CipherSuiteDescriptor {
        suite,
        id,
        name,
        version: ProtocolVersion::TLS1_2,
        bulk: BulkCipher::Aead(AeadAlgorithm::ChaCha20Poly1305),
        key_len: 32,
        fixed_iv_len: 12,
        record_iv_len: 0,
        mac_key_len: 0,
        hash: HashAlgorithm::SHA256,
        prf_hash: None,
    }
}

const fn tls12_cbc(
    suite: CipherSuite,
    id: u16,
    name: &'static str,
    block: BlockCipherAlgorithm,
    key_len: usize,
    hash: HashAlgorithm,
    mac_key_len: usize,
) -> CipherSuiteDescriptor {
    CipherSuiteDescriptor {
        suite,
        id,
        name,
        version: ProtocolVersion::TLS1_2,
        bulk: BulkCipher::Cbc(block),
        key_len,
        fixed_iv_len: 0,
        record_iv_len: 16,
        mac_key_len,
        hash,
        prf_hash: None,
    }
}

use AeadAlgorithm::*;
use BlockCipherAlgorithm::*;
use CipherSuite::*;
use HashAlgorithm::*;

/// Descriptor table, indexed by `CipherSuite as usize`.
pub static DESCRIPTORS: [CipherSuiteDescriptor; 13] = [
    tls13(TLS13_AES_128_GCM_SHA256, 0x1301, "TLS_AES_128_GCM_SHA256", Aes128Gcm, 16, SHA256),
    tls13(TLS13_AES_256_GCM_SHA384, 0x1302, "TLS_AES_256_GCM_SHA384", Aes256Gcm, 32, SHA384),
    tls13(
        TLS13_CHACHA20_POLY1305_SHA256,
        0x1303,
        "TLS_CHACHA20_POLY1305_SHA256",
        ChaCha20Poly1305,
        32,
        SHA256,
    ),
    tls12_gcm(
        ECDHE_ECDSA_AES128_GCM_SHA256,
        0xc02b,
        "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
        Aes128Gcm,
        16,
        SHA256,
    ),
    tls12_gcm(
        ECDHE_RSA_AES128_GCM_SHA256,
        0xc02f,
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        Aes128Gcm,
        16,
        SHA256,
    ),
    tls12_gcm(
        ECDHE_ECDSA_AES256_GCM_SHA384,
        0xc02c,
        "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
        Aes256Gcm,
        32,
        SHA384,
    ),
    tls12_gcm(
        ECDHE_RSA_AES256_GCM_SHA384,
        0xc030,
        "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        Aes256Gcm,
        32,
        SHA384,
    ),
    tls12_chacha(
        ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
        0xcca9,
        "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    ),
    tls12_chacha(
        ECDHE_RSA_CHACHA20_POLY1305_SHA256,
        0xcca8,
        "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    ),
    tls12_cbc(
        ECDHE_ECDSA_AES128_CBC_SHA256,
        0xc023,
        "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256",
        Aes128Cbc,
        16,
        SHA256,
        32,
    ),
    tls12_cbc(
        ECDHE_RSA_AES128_CBC_SHA256,
        0xc027,
        "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        Aes128Cbc,
        16,
        SHA256,
        32,
    ),
    tls12_cbc(
        ECDHE_ECDSA_AES256_CBC_SHA384,
        0xc024,
        "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384",
        Aes256Cbc,
        32,
        SHA384,
        48,
    ),
    tls12_cbc(
        ECDHE_RSA_AES256_CBC_SHA384,
        0xc028,
        "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
        Aes256Cbc,
        32,
        SHA384,
        48,
    ),
];

impl CipherSuite {
    /// All supported suites, TLS 1.3 first.
    pub const fn all() -> &'static [CipherSuite; 13] {
        &[
            TLS13_AES_128_GCM_SHA256,
            TLS13_AES_256_GCM_SHA384,
            TLS13_CHACHA20_POLY1305_SHA256,
            ECDHE_ECDSA_AES128_GCM_SHA256,
            ECDHE_RSA_AES128_GCM_SHA256,
            ECDHE_ECDSA_AES256_GCM_SHA384,
            ECDHE_RSA_AES256_GCM_SHA384,
            ECDHE_ECDSA_CHACHA20_POLY1305_SHA256,
            ECDHE_RSA_CHACHA20_POLY1305_SHA256,
            ECDHE_ECDSA_AES128_CBC_SHA256,
            ECDHE_RSA_AES128_CBC_SHA256,
            ECDHE_ECDSA_AES256_CBC_SHA384,
            ECDHE_RSA_AES256_CBC_SHA384,
        ]
    }

    /// Look up a suite by wire identifier.
    pub fn from_u16(id: u16) -> Option<CipherSuite> {
        DESCRIPTORS.iter().find(|d| d.id == id).map(|d| d.suite)
    }

    pub fn as_u16(&self) -> u16 {
        self.descriptor().id
    }

    #[inline(always)]
    pub fn descriptor(&self) -> &'static CipherSuiteDescriptor {
        &DESCRIPTORS[*self as usize]
    }

    pub fn version(&self) -> ProtocolVersion {
        self.descriptor().version
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.descriptor().hash
    }

    pub fn is_aead(&self) -> bool {
        matches!(self.descriptor().bulk, BulkCipher::Aead(_))
    }
}

impl CipherSuiteDescriptor {
    /// Hash used by the TLS 1.2 PRF.
    pub fn prf_hash(&self) -> HashAlgorithm {
        self.prf_hash.unwrap_or(self.hash)
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_discriminant() {
        for s in CipherSuite::all() {
            assert_eq!(s.descriptor().suite, *s);
            assert_eq!(CipherSuite::from_u16(s.as_u16()), Some(*s));
        }
        assert_eq!(DESCRIPTORS.len(), CipherSuite::all().len());
    }

    #[test]
    fn ids_unique() {
        for (i, a) in DESCRIPTORS.iter().enumerate() {
            for b in &DESCRIPTORS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn aead_and_cbc_are_exclusive() {
        for d in DESCRIPTORS.iter() {
            match d.bulk {
                BulkCipher::Aead(a) => {
                    assert_eq!(d.mac_key_len, 0);
                    assert_eq!(a.key_len(), d.key_len);
                }
                BulkCipher::Cbc(b) => {
                    assert!(d.mac_key_len > 0);
                    assert_eq!(d.version, ProtocolVersion::TLS1_2);
                    assert_eq!(b.key_len(), d.key_len);
                    assert_eq!(d.record_iv_len, b.block_len());
                }
            }
        }
    }

    #[test]
    fn unknown_id() {
        assert_eq!(CipherSuite::from_u16(0x0035), None);
        assert_eq!(
            CipherSuite::from_u16(0x1302),
            Some(CipherSuite::TLS13_AES_256_GCM_SHA384)
        );
    }
}
