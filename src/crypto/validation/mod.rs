//! Validation of crypto providers.
//!
//! A provider is checked once when a [`Config`](crate::Config) is built: the
//! components the client relies on must exist and produce known answers.

use crate::buffer::Buf;
use crate::cipher_suite::{BulkCipher, CipherSuite};
use crate::crypto::prf::prf_tls12;
use crate::crypto::provider::CryptoProvider;
use crate::types::{HashAlgorithm, NamedGroup};
use crate::Error;

impl CryptoProvider {
    /// Whether the provider has the bulk cipher needed by `suite`.
    pub fn supports_suite(&self, suite: CipherSuite) -> bool {
        match suite.descriptor().bulk {
            BulkCipher::Aead(a) => self.find_aead(a).is_some(),
            BulkCipher::Cbc(b) => self.find_block_cipher(b).is_some(),
        }
    }

    /// Cipher suites this provider can run, in default preference order.
    pub fn supported_cipher_suites(&self) -> impl Iterator<Item = CipherSuite> + '_ {
        CipherSuite::all()
            .iter()
            .copied()
            .filter(|s| self.supports_suite(*s))
    }

    /// Key exchange groups this provider can run, in default preference order.
    pub fn supported_kx_groups(&self) -> impl Iterator<Item = NamedGroup> + '_ {
        NamedGroup::supported()
            .iter()
            .copied()
            .filter(|g| self.find_kx_group(*g).is_some())
    }

    /// Validates the provider for use with the client.
    ///
    /// - At least one supported cipher suite
    /// - At least one supported key exchange group
    /// - Hash, HMAC, PRF and HKDF produce known answers
    ///
    /// Returns `Error::ConfigError` if validation fails.
    pub fn validate(&self) -> Result<(), Error> {
        if self.supported_cipher_suites().next().is_none() {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported cipher suites".to_string(),
            ));
        }
        if self.supported_kx_groups().next().is_none() {
            return Err(Error::ConfigError(
                "CryptoProvider has no supported key exchange groups".to_string(),
            ));
        }
        self.validate_hash_provider()?;
        self.validate_hmac_provider()?;
        self.validate_prf()?;
        self.validate_hkdf_provider()?;
        Ok(())
    }

    fn validate_hash_provider(&self) -> Result<(), Error> {
        for (hash, expected) in HASH_TEST_VECTORS {
            let mut result = Buf::new();
            self.hash_provider.hash(*hash, &[], &mut result);
            if result.as_ref() != *expected {
                return Err(Error::ConfigError(format!(
                    "Hash provider {:?} produced incorrect result",
                    hash
                )));
            }
        }
        Ok(())
    }

    fn validate_hmac_provider(&self) -> Result<(), Error> {
        let mut result = Buf::new();
        self.hmac_provider
            .hmac(
                HashAlgorithm::SHA256,
                b"key",
                b"The quick brown fox jumps over the lazy dog",
                &mut result,
            )
            .map_err(|e| Error::ConfigError(format!("HMAC provider failed: {}", e)))?;

        if result.as_ref() != HMAC_SHA256_TEST_VECTOR {
            return Err(Error::ConfigError(
                "HMAC provider produced incorrect result for HMAC-SHA256".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_prf(&self) -> Result<(), Error> {
        for (hash, expected) in PRF_TEST_VECTORS {
            let mut result = Buf::new();
            prf_tls12(
                self.hmac_provider,
                *hash,
                b"test_secret",
                "test label",
                b"test_seed",
                &mut result,
                32,
            )
            .map_err(|e| Error::ConfigError(format!("PRF failed for {:?}: {}", hash, e)))?;

            if result.as_ref() != *expected {
                return Err(Error::ConfigError(format!(
                    "PRF {:?} produced incorrect result",
                    hash
                )));
            }
        }
        Ok(())
    }

    /// RFC 5869 test case 1.
    fn validate_hkdf_provider(&self) -> Result<(), Error> {
        let ikm = [0x0bu8; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();

        let mut prk = Buf::new();
        self.hkdf_provider
            .hkdf_extract(HashAlgorithm::SHA256, &salt, &ikm, &mut prk)
            .map_err(|e| Error::ConfigError(format!("HKDF extract failed: {}", e)))?;
        if prk.as_ref() != HKDF_PRK_TEST_VECTOR {
            return Err(Error::ConfigError(
                "HKDF provider produced incorrect PRK".to_string(),
            ));
        }

        let mut okm = Buf::new();
        self.hkdf_provider
            .hkdf_expand(HashAlgorithm::SHA256, &prk, &info, &mut okm, 42)
            .map_err(|e| Error::ConfigError(format!("HKDF expand failed: {}", e)))?;
        if okm.as_ref() != HKDF_OKM_TEST_VECTOR {
            return Err(Error::ConfigError(
                "HKDF provider produced incorrect OKM".to_string(),
            ));
        }
        Ok(())
    }
}

// Hash of the empty string.
const HASH_TEST_VECTORS: &[(HashAlgorithm, &[u8])] = &[
    (
        HashAlgorithm::SHA256,
        &[
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ],
    ),
    (
        HashAlgorithm::SHA384,
        &[
            0x38, 0xb0, 0x60, 0xa7, 0x51, 0xac, 0x96, 0x38, 0x4c, 0xd9, 0x32, 0x7e, 0xb1, 0xb1,
            0xe3, 0x6a, 0x21, 0xfd, 0xb7, 0x11, 0x14, 0xbe, 0x07, 0x43, 0x4c, 0x0c, 0xc7, 0xbf,
            0x63, 0xf6, 0xe1, 0xda, 0x27, 0x4e, 0xde, 0xbf, 0xe7, 0x6f, 0x65, 0xfb, 0xd5, 0x1a,
            0xd2, 0xf1, 0x48, 0x98, 0xb9, 0x5b,
        ],
    ),
];

// PRF(secret="test_secret", label="test label", seed="test_seed", output_len=32)
const PRF_TEST_VECTORS: &[(HashAlgorithm, &[u8])] = &[
    (
        HashAlgorithm::SHA256,
        &[
            0xc7, 0x49, 0xce, 0xdf, 0xad, 0xaf, 0x3d, 0xf1, 0x18, 0x2c, 0xa2, 0x25, 0xab, 0xe9,
            0x4e, 0x0c, 0x19, 0xc3, 0x81, 0x49, 0x57, 0xbd, 0xdc, 0x28, 0x55, 0x78, 0x73, 0xdb,
            0xb7, 0x9f, 0xce, 0x29,
        ],
    ),
    (
        HashAlgorithm::SHA384,
        &[
            0x74, 0x9a, 0xf3, 0x03, 0x23, 0x9e, 0x3f, 0x65, 0x4e, 0x9a, 0xd1, 0xb1, 0xd1, 0x22,
            0x31, 0x02, 0x1a, 0xd2, 0x17, 0x26, 0x04, 0x75, 0x21, 0xf4, 0x66, 0xad, 0xcd, 0x37,
            0x2b, 0xe4, 0x7e, 0x8b,
        ],
    ),
];

// HMAC-SHA256(key="key", data="The quick brown fox jumps over the lazy dog")
const HMAC_SHA256_TEST_VECTOR: &[u8] = &[
    0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98, 0xe6, 0xaa, 0x6f, 0xb1, 0x43,
    0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46, 0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc, 0x2d, 0x1a, 0x3c, 0xd8,
];

const HKDF_PRK_TEST_VECTOR: &[u8] = &[
    0x07, 0x77, 0x09, 0x36, 0x2c, 0x2e, 0x32, 0xdf, 0x0d, 0xdc, 0x3f, 0x0d, 0xc4, 0x7b, 0xba, 0x63,
    0x90, 0xb6, 0xc7, 0x3b, 0xb5, 0x0f, 0x9c, 0x31, 0x22, 0xec, 0x84, 0x4a, 0xd7, 0xc2, 0xb3, 0xe5,
];

const HKDF_OKM_TEST_VECTOR: &[u8] = &[
    0x3c, 0xb2, 0x5f, 0x25, 0xfa, 0xac, 0xd5, 0x7a, 0x90, 0x43, 0x4f, 0x64, 0xd0, 0x36, 0x2f, 0x2a,
    0x2d, 0x2d, 0x0a, 0x90, 0xcf, 0x1a, 0x5a, 0x4c, 0x5d, 0xb0, 0x2d, 0x56, 0xec, 0xc4, 0xc5, 0xbf,
    0x34, 0x00, 0x72, 0x08, 0xd5, 0xb8, 0x87, 0x18, 0x58, 0x65,
];

#[cfg(test)]
#[cfg(feature = "rust-crypto")]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto;

    #[test]
    fn default_provider_validates() {
        let provider = rust_crypto::default_provider();
        provider.validate().unwrap();
    }

    #[test]
    fn default_provider_runs_every_suite() {
        let provider = rust_crypto::default_provider();
        assert_eq!(
            provider.supported_cipher_suites().count(),
            CipherSuite::all().len()
        );
        assert_eq!(provider.supported_kx_groups().count(), 3);
    }

    #[test]
    fn provider_without_aeads_and_block_ciphers_is_rejected() {
        let mut provider = rust_crypto::default_provider();
        provider.aeads = &[];
        provider.block_ciphers = &[];
        assert!(matches!(provider.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn provider_without_cbc_drops_cbc_suites() {
        let mut provider = rust_crypto::default_provider();
        provider.block_ciphers = &[];
        assert!(provider.validate().is_ok());
        assert!(provider.supported_cipher_suites().all(|s| s.is_aead()));
    }
}
