//! Cryptographic provider traits for pluggable crypto backends.
//!
//! The TLS core never implements a primitive itself. Everything from ECDH to
//! AEAD sealing goes through a [`CryptoProvider`], a struct of static trait
//! object references, each representing one capability.
//!
//! # Architecture
//!
//! - **AEAD ciphers** ([`SupportedAead`]): factory for [`Cipher`] instances
//! - **Block ciphers** ([`SupportedBlockCipher`]): factory for raw CBC [`BlockCipher`]s
//! - **Key exchange groups** ([`SupportedKxGroup`]): generate or import ECDH key pairs
//! - **Signature verification** ([`SignatureVerifier`]): verify against a SubjectPublicKeyInfo
//! - **Secure random** ([`SecureRandom`])
//! - **Hash provider** ([`HashProvider`]): factory for incremental hash contexts
//! - **HMAC provider** ([`HmacProvider`])
//! - **HKDF provider** ([`HkdfProvider`]): extract, expand and the TLS 1.3 label format
//!
//! The TLS 1.2 PRF is built on top of the HMAC provider in
//! [`prf`](crate::crypto::prf), so a provider does not implement it separately.
//!
//! # Using a Custom Provider
//!
//! ```
//! # #[cfg(feature = "rust-crypto")]
//! # fn main() {
//! use tlsclient::Config;
//! use tlsclient::crypto::rust_crypto;
//!
//! let provider = rust_crypto::default_provider();
//! let config = Config::builder()
//!     .with_crypto_provider(provider)
//!     .build()
//!     .unwrap();
//! # let _ = config;
//! # }
//! # #[cfg(not(feature = "rust-crypto"))]
//! # fn main() {}
//! ```
//!
//! # Thread Safety
//!
//! All provider traits require `Send + Sync + UnwindSafe + RefUnwindSafe`. The
//! same provider is shared by every connection, including ones running on
//! different threads.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::sync::OnceLock;

use crate::buffer::Buf;
use crate::cipher_suite::{AeadAlgorithm, BlockCipherAlgorithm};
use crate::crypto::{Aad, Nonce};
use crate::types::{HashAlgorithm, NamedGroup, SignatureScheme};

// ============================================================================
// Marker Trait
// ============================================================================

/// Marker trait for types that are safe to use in crypto provider components.
///
/// This trait is automatically implemented for all types that satisfy the bounds.
pub trait CryptoSafe: Send + Sync + Debug + UnwindSafe + RefUnwindSafe {}

impl<T: Send + Sync + Debug + UnwindSafe + RefUnwindSafe> CryptoSafe for T {}

// ============================================================================
// Instance Traits (created by factories)
// ============================================================================

/// AEAD cipher for in-place encryption/decryption.
pub trait Cipher: CryptoSafe {
    /// Encrypt plaintext in-place, appending the authentication tag.
    fn encrypt(&mut self, plaintext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;

    /// Decrypt ciphertext in-place, verifying and removing the authentication tag.
    ///
    /// On failure the buffer content is unspecified and must not be used.
    fn decrypt(&mut self, ciphertext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String>;
}

/// Raw block cipher in CBC mode, without padding.
pub trait BlockCipher: CryptoSafe {
    /// Block length in bytes.
    fn block_len(&self) -> usize;

    /// CBC-encrypt `data` in place. `data.len()` must be a multiple of the block length.
    fn encrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;

    /// CBC-decrypt `data` in place. `data.len()` must be a multiple of the block length.
    fn decrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String>;
}

/// Stateful hash context for incremental hashing.
pub trait HashContext: CryptoSafe {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Clone the context and finalize it, writing the hash to `out`.
    /// The original context can continue to be updated.
    fn clone_and_finalize(&self, out: &mut Buf);
}

/// An ECDH key pair.
///
/// Unlike a one-shot exchange the pair can compute any number of shared
/// secrets, so one pair per curve can be reused for a whole connection.
pub trait KeyPair: CryptoSafe {
    /// The group of this key pair.
    fn group(&self) -> NamedGroup;

    /// Public key in TLS wire encoding (uncompressed point or raw X25519).
    fn public_key(&self) -> &[u8];

    /// Compute the shared secret with the peer's public key.
    fn shared_secret(&self, peer_pub: &[u8], out: &mut Buf) -> Result<(), String>;

    /// Export the private scalar.
    fn private_key(&self, out: &mut Buf);
}

// ============================================================================
// Factory Traits (used by CryptoProvider)
// ============================================================================

/// AEAD algorithm support (factory for [`Cipher`]).
pub trait SupportedAead: CryptoSafe {
    fn algorithm(&self) -> AeadAlgorithm;

    /// Create a cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String>;
}

/// Block cipher support (factory for [`BlockCipher`]).
pub trait SupportedBlockCipher: CryptoSafe {
    fn algorithm(&self) -> BlockCipherAlgorithm;

    /// Create a block cipher instance with the given key.
    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn BlockCipher>, String>;
}

/// Key exchange group support (factory for [`KeyPair`]).
pub trait SupportedKxGroup: CryptoSafe {
    /// Named group for this key exchange group.
    fn name(&self) -> NamedGroup;

    /// Generate a fresh ephemeral key pair.
    fn generate_key_pair(&self) -> Result<Box<dyn KeyPair>, String>;

    /// Import a key pair from its private scalar.
    fn import_private_key(&self, private_key: &[u8]) -> Result<Box<dyn KeyPair>, String>;
}

/// Signature verification.
pub trait SignatureVerifier: CryptoSafe {
    /// Verify `signature` over `data` with a DER-encoded SubjectPublicKeyInfo.
    ///
    /// For ECDSA schemes only the hash is taken from `scheme`; the curve is
    /// the one of the key.
    fn verify_signature(
        &self,
        spki_der: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String>;
}

/// Secure random number generator.
pub trait SecureRandom: CryptoSafe {
    /// Fill buffer with cryptographically secure random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), String>;
}

/// Hash provider (factory for [`HashContext`]).
pub trait HashProvider: CryptoSafe {
    /// Create a new hash context for the specified algorithm.
    fn create_hash(&self, algorithm: HashAlgorithm) -> Box<dyn HashContext>;

    /// One-shot hash of `data`.
    fn hash(&self, algorithm: HashAlgorithm, data: &[u8], out: &mut Buf) {
        let mut ctx = self.create_hash(algorithm);
        ctx.update(data);
        ctx.clone_and_finalize(out);
    }
}

/// HMAC provider.
pub trait HmacProvider: CryptoSafe {
    /// Compute HMAC(key, data) with `hash`, writing the tag to `out`.
    fn hmac(
        &self,
        hash: HashAlgorithm,
        key: &[u8],
        data: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;
}

/// HKDF provider (RFC 5869).
pub trait HkdfProvider: CryptoSafe {
    /// HKDF-Extract: PRK = HKDF-Extract(salt, IKM)
    fn hkdf_extract(
        &self,
        hash: HashAlgorithm,
        salt: &[u8],
        ikm: &[u8],
        out: &mut Buf,
    ) -> Result<(), String>;

    /// HKDF-Expand: OKM = HKDF-Expand(PRK, info, L)
    fn hkdf_expand(
        &self,
        hash: HashAlgorithm,
        prk: &[u8],
        info: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String>;

    /// HKDF-Expand-Label for TLS 1.3 (RFC 8446 Section 7.1).
    ///
    /// HkdfLabel = struct {
    ///     uint16 length;
    ///     opaque label<7..255> = "tls13 " + Label;
    ///     opaque context<0..255> = Context;
    /// }
    /// OKM = HKDF-Expand(Secret, HkdfLabel, Length)
    fn hkdf_expand_label(
        &self,
        hash: HashAlgorithm,
        secret: &[u8],
        label: &[u8],
        context: &[u8],
        out: &mut Buf,
        output_len: usize,
    ) -> Result<(), String> {
        let full_label_len = 6 + label.len();

        if full_label_len > 255 {
            return Err("Label too long for HKDF-Expand-Label".to_string());
        }
        if context.len() > 255 {
            return Err("Context too long for HKDF-Expand-Label".to_string());
        }
        if output_len > 65535 {
            return Err("Output length too large for HKDF-Expand-Label".to_string());
        }

        let mut info = Vec::with_capacity(2 + 1 + full_label_len + 1 + context.len());
        info.extend_from_slice(&(output_len as u16).to_be_bytes());
        info.push(full_label_len as u8);
        info.extend_from_slice(b"tls13 ");
        info.extend_from_slice(label);
        info.push(context.len() as u8);
        info.extend_from_slice(context);

        self.hkdf_expand(hash, secret, &info, out, output_len)
    }
}

// ============================================================================
// Core Provider Struct
// ============================================================================

/// Cryptographic provider for the TLS client.
///
/// Every component is a `&'static dyn Trait`, so a provider is cheap to clone
/// and can be built from statics in a custom backend.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// AEAD algorithms (AES-GCM, ChaCha20-Poly1305).
    pub aeads: &'static [&'static dyn SupportedAead],

    /// Block ciphers for the TLS 1.2 CBC suites.
    pub block_ciphers: &'static [&'static dyn SupportedBlockCipher],

    /// Key exchange groups (X25519, P-256, P-384).
    pub kx_groups: &'static [&'static dyn SupportedKxGroup],

    /// Signature verification for handshake signatures and certificates.
    pub signature_verification: &'static dyn SignatureVerifier,

    /// Secure random number generator.
    pub secure_random: &'static dyn SecureRandom,

    /// Hash provider for transcript hashing.
    pub hash_provider: &'static dyn HashProvider,

    /// HMAC provider for Finished, binders, CBC record MACs and the TLS 1.2 PRF.
    pub hmac_provider: &'static dyn HmacProvider,

    /// HKDF provider for the TLS 1.3 key schedule.
    pub hkdf_provider: &'static dyn HkdfProvider,
}

/// Static storage for the default crypto provider.
static DEFAULT: OnceLock<CryptoProvider> = OnceLock::new();

impl CryptoProvider {
    /// Install a default crypto provider for the process.
    ///
    /// Used by [`Config::builder()`](crate::Config::builder) when no explicit
    /// provider is given.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn install_default(provider: CryptoProvider) {
        DEFAULT
            .set(provider)
            .expect("CryptoProvider::install_default() called more than once");
    }

    /// Get the default crypto provider, if one has been installed.
    pub fn get_default() -> Option<&'static CryptoProvider> {
        DEFAULT.get()
    }

    /// Find the AEAD implementation for `algorithm`.
    pub fn find_aead(&self, algorithm: AeadAlgorithm) -> Option<&'static dyn SupportedAead> {
        self.aeads.iter().copied().find(|a| a.algorithm() == algorithm)
    }

    /// Find the block cipher implementation for `algorithm`.
    pub fn find_block_cipher(
        &self,
        algorithm: BlockCipherAlgorithm,
    ) -> Option<&'static dyn SupportedBlockCipher> {
        self.block_ciphers
            .iter()
            .copied()
            .find(|b| b.algorithm() == algorithm)
    }

    /// Find the key exchange group for `group`.
    pub fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups.iter().copied().find(|g| g.name() == group)
    }

    /// Random bytes into a new buffer.
    pub fn random_bytes(&self, len: usize) -> Result<Buf, String> {
        let mut buf = Buf::new();
        buf.resize(len, 0);
        self.secure_random.fill(&mut buf)?;
        Ok(buf)
    }
}
