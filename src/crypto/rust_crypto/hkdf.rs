//! HKDF implementation using RustCrypto crates for TLS 1.3 key derivation.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::HkdfProvider;
use crate::types::HashAlgorithm;

/// HKDF provider implementation using RustCrypto.
#[derive(Debug)]
pub(super) struct RustCryptoHkdfProvider;

impl HkdfProvider for RustCryptoHkdfProvider {
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        out.clear();
        // An empty salt is the same as a zero-filled one of hash length (RFC 5869)
        let salt = if salt.is_empty() { None } else { Some(salt) };

        match hash {
            HashAlgorithm::SHA256 => {
                let (prk, _) = Hkdf::<Sha256>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            HashAlgorithm::SHA384 => {
                let (prk, _) = Hkdf::<Sha384>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
            HashAlgorithm::SHA512 => {
                let (prk, _) = Hkdf::<Sha512>::extract(salt, ikm);
                out.extend_from_slice(prk.as_slice());
            }
        }

        Ok(())
    }

    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        out.clear();
        out.resize(output_len, 0);

        match hash {
            HashAlgorithm::SHA256 => {
                let hk =
                    Hkdf::<Sha256>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out)
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
            HashAlgorithm::SHA384 => {
                let hk =
                    Hkdf::<Sha384>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out)
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
            HashAlgorithm::SHA512 => {
                let hk =
                    Hkdf::<Sha512>::from_prk(prk).map_err(|e| format!("Invalid PRK: {:?}", e))?;
                hk.expand(info, out)
                    .map_err(|e| format!("HKDF expand failed: {:?}", e))?;
            }
        }

        Ok(())
    }
}

/// Static instance of the HKDF provider.
pub(super) static HKDF_PROVIDER: RustCryptoHkdfProvider = RustCryptoHkdfProvider;
