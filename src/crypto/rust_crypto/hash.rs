//! Hash implementations using RustCrypto.

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::buffer::Buf;
use crate::crypto::provider::{HashContext, HashProvider};
use crate::types::HashAlgorithm;

/// Hash context implementation using RustCrypto.
enum RustCryptoHashContext {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl std::fmt::Debug for RustCryptoHashContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RustCryptoHashContext::Sha256(_) => "Sha256",
            RustCryptoHashContext::Sha384(_) => "Sha384",
            RustCryptoHashContext::Sha512(_) => "Sha512",
        };
        f.debug_tuple("RustCryptoHashContext").field(&name).finish()
    }
}

impl HashContext for RustCryptoHashContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            RustCryptoHashContext::Sha256(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha384(ctx) => ctx.update(data),
            RustCryptoHashContext::Sha512(ctx) => ctx.update(data),
        }
    }

    fn clone_and_finalize(&self, out: &mut Buf) {
        out.clear();
        match self {
            RustCryptoHashContext::Sha256(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha384(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
            RustCryptoHashContext::Sha512(ctx) => out.extend_from_slice(&ctx.clone().finalize()),
        }
    }
}

/// Hash provider implementation.
#[derive(Debug)]
pub(super) struct RustCryptoHashProvider;

impl HashProvider for RustCryptoHashProvider {
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext> {
        match algorithm {
            HashAlgorithm::SHA256 => Box::new(RustCryptoHashContext::Sha256(Sha256::new())),
            HashAlgorithm::SHA384 => Box::new(RustCryptoHashContext::Sha384(Sha384::new())),
            HashAlgorithm::SHA512 => Box::new(RustCryptoHashContext::Sha512(Sha512::new())),
        }
    }
}

/// Static instance of the hash provider.
pub(super) static HASH_PROVIDER: RustCryptoHashProvider = RustCryptoHashProvider;
