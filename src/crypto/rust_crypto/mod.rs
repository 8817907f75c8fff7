//! RustCrypto cryptographic provider implementation.
//!
//! This module provides a pure Rust cryptographic backend using crates from
//! the [RustCrypto](https://github.com/RustCrypto) organization.
//!
//! # Feature Flag
//!
//! Only available when the `rust-crypto` feature is enabled (default). To use
//! the client with another backend, disable default features:
//!
//! ```toml
//! tlsclient = { version = "...", default-features = false }
//! ```

mod cipher;
mod hash;
mod hkdf;
mod hmac;
mod kx_group;
mod random;
mod sign;

use crate::crypto::provider::CryptoProvider;

/// Get the default RustCrypto-based crypto provider.
///
/// # AEAD
///
/// - AES-128-GCM, AES-256-GCM (`aes-gcm`)
/// - ChaCha20-Poly1305 (`chacha20poly1305`)
///
/// # Block Ciphers
///
/// - AES-128, AES-256 in CBC mode (`aes`)
///
/// # Key Exchange Groups
///
/// - X25519 (`x25519-dalek`)
/// - secp256r1 / P-256, secp384r1 / P-384 (`p256`, `p384`)
///
/// # Signature Schemes
///
/// - ECDSA with P-256 or P-384 and SHA-256/384
/// - RSA-PSS (rsaEncryption) with SHA-256/384/512
/// - RSA PKCS#1 v1.5 with SHA-256/384/512
///
/// # Random Number Generation
///
/// Uses `OsRng` from the `rand` crate.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        aeads: cipher::ALL_AEADS,
        block_ciphers: cipher::ALL_BLOCK_CIPHERS,
        kx_groups: kx_group::ALL_KX_GROUPS,
        signature_verification: &sign::SIGNATURE_VERIFIER,
        secure_random: &random::SECURE_RANDOM,
        hash_provider: &hash::HASH_PROVIDER,
        hmac_provider: &hmac::HMAC_PROVIDER,
        hkdf_provider: &hkdf::HKDF_PROVIDER,
    }
}
