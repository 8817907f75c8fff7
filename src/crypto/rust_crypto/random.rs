//! Secure random number generation using RustCrypto.

use super::super::SecureRandom;

/// Secure random number generator implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSecureRandom;

impl SecureRandom for RustCryptoSecureRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), String> {
        use rand::rngs::OsRng;
        use rand::RngCore;
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| format!("OS random source failed: {e}"))
    }
}

/// Static instance of the secure random generator.
pub(super) static SECURE_RANDOM: RustCryptoSecureRandom = RustCryptoSecureRandom;
