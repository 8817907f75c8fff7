//! HMAC using RustCrypto.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::HmacProvider;
use crate::types::HashAlgorithm;

fn mac<M: Mac + hmac::digest::KeyInit>(key: &[u8], data: &[u8], out: &mut Buf) -> Result<(), String> {
    let mut m = <M as hmac::digest::KeyInit>::new_from_slice(key)
        .map_err(|_| "Invalid HMAC key length".to_string())?;
    m.update(data);
    out.clear();
    out.extend_from_slice(&m.finalize().into_bytes());
    Ok(())
}

/// HMAC provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHmacProvider;

impl HmacProvider for RustCryptoHmacProvider {
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String> {
        match hash {
            HashAlgorithm::SHA256 => mac::<Hmac<Sha256>>(key, data, out),
            HashAlgorithm::SHA384 => mac::<Hmac<Sha384>>(key, data, out),
            HashAlgorithm::SHA512 => mac::<Hmac<Sha512>>(key, data, out),
        }
    }
}

/// Static instance of the HMAC provider.
pub(super) static HMAC_PROVIDER: RustCryptoHmacProvider = RustCryptoHmacProvider;
