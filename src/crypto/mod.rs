//! Cryptographic primitives and helpers used by the TLS client.

#[cfg(feature = "rust-crypto")]
pub mod rust_crypto;

mod aead;
pub mod prf;
pub mod provider;
mod validation;

// Re-export AEAD types needed for Cipher trait implementations (public API)
pub use aead::{Aad, Nonce};

pub(crate) use aead::AEAD_TAG_LEN;

pub use provider::{BlockCipher, Cipher, CryptoProvider, CryptoSafe, HashContext, KeyPair};
pub use provider::{HashProvider, HkdfProvider, HmacProvider};
pub use provider::{SecureRandom, SignatureVerifier};
pub use provider::{SupportedAead, SupportedBlockCipher, SupportedKxGroup};

// Re-export shared types for provider trait implementations
pub use crate::cipher_suite::{AeadAlgorithm, BlockCipherAlgorithm};
pub use crate::types::{HashAlgorithm, NamedGroup, SignatureScheme};
