//! AEAD and CBC block cipher implementations using RustCrypto.

use aes::cipher::{BlockDecrypt, BlockEncrypt};
use aes::{Aes128, Aes256};
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use generic_array::GenericArray;

use super::super::{BlockCipher, Cipher, SupportedAead, SupportedBlockCipher};
use crate::buffer::Buf;
use crate::cipher_suite::{AeadAlgorithm, BlockCipherAlgorithm};
use crate::crypto::{Aad, Nonce};

const AES_BLOCK_LEN: usize = 16;

/// AEAD cipher implementation using RustCrypto.
enum Aead {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
    ChaCha(Box<ChaCha20Poly1305>),
}

impl std::fmt::Debug for Aead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aead::Aes128(_) => f.debug_tuple("Aead::Aes128Gcm").finish(),
            Aead::Aes256(_) => f.debug_tuple("Aead::Aes256Gcm").finish(),
            Aead::ChaCha(_) => f.debug_tuple("Aead::ChaCha20Poly1305").finish(),
        }
    }
}

impl Aead {
    fn new(algorithm: AeadAlgorithm, key: &[u8]) -> Result<Self, String> {
        let bad_key = |_| format!("Invalid key size for {:?}: {}", algorithm, key.len());
        Ok(match algorithm {
            AeadAlgorithm::Aes128Gcm => {
                Aead::Aes128(Box::new(Aes128Gcm::new_from_slice(key).map_err(bad_key)?))
            }
            AeadAlgorithm::Aes256Gcm => {
                Aead::Aes256(Box::new(Aes256Gcm::new_from_slice(key).map_err(bad_key)?))
            }
            AeadAlgorithm::ChaCha20Poly1305 => Aead::ChaCha(Box::new(
                ChaCha20Poly1305::new_from_slice(key).map_err(bad_key)?,
            )),
        })
    }
}

impl Cipher for Aead {
    fn encrypt(&mut self, data: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        let n = GenericArray::from_slice(&nonce.0);
        let res = match self {
            Aead::Aes128(c) => c.encrypt_in_place(n, &aad, data),
            Aead::Aes256(c) => c.encrypt_in_place(n, &aad, data),
            Aead::ChaCha(c) => c.encrypt_in_place(n, &aad, data),
        };
        res.map_err(|_| "AEAD encryption failed".to_string())
    }

    fn decrypt(&mut self, ciphertext: &mut Buf, aad: Aad, nonce: Nonce) -> Result<(), String> {
        if ciphertext.len() < 16 {
            return Err(format!("Ciphertext too short: {}", ciphertext.len()));
        }
        let n = GenericArray::from_slice(&nonce.0);
        // decrypt_in_place removes the tag and shortens the buffer
        let res = match self {
            Aead::Aes128(c) => c.decrypt_in_place(n, &aad, ciphertext),
            Aead::Aes256(c) => c.decrypt_in_place(n, &aad, ciphertext),
            Aead::ChaCha(c) => c.decrypt_in_place(n, &aad, ciphertext),
        };
        res.map_err(|_| "AEAD decryption failed".to_string())
    }
}

#[derive(Debug)]
struct AeadFactory(AeadAlgorithm);

impl SupportedAead for AeadFactory {
    fn algorithm(&self) -> AeadAlgorithm {
        self.0
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn Cipher>, String> {
        Ok(Box::new(Aead::new(self.0, key)?))
    }
}

static AES_128_GCM: AeadFactory = AeadFactory(AeadAlgorithm::Aes128Gcm);
static AES_256_GCM: AeadFactory = AeadFactory(AeadAlgorithm::Aes256Gcm);
static CHACHA20_POLY1305: AeadFactory = AeadFactory(AeadAlgorithm::ChaCha20Poly1305);

/// All supported AEAD algorithms.
pub(super) static ALL_AEADS: &[&dyn SupportedAead] =
    &[&AES_128_GCM, &AES_256_GCM, &CHACHA20_POLY1305];

// ============================================================================
// AES-CBC
// ============================================================================

enum AesCbc {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl std::fmt::Debug for AesCbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesCbc::Aes128(_) => f.debug_tuple("AesCbc::Aes128").finish(),
            AesCbc::Aes256(_) => f.debug_tuple("AesCbc::Aes256").finish(),
        }
    }
}

impl AesCbc {
    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCbc::Aes128(c) => c.encrypt_block(block),
            AesCbc::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            AesCbc::Aes128(c) => c.decrypt_block(block),
            AesCbc::Aes256(c) => c.decrypt_block(block),
        }
    }
}

fn check_cbc_input(iv: &[u8], data: &[u8]) -> Result<(), String> {
    if iv.len() != AES_BLOCK_LEN {
        return Err(format!("Invalid CBC IV length: {}", iv.len()));
    }
    if data.len() % AES_BLOCK_LEN != 0 {
        return Err(format!("CBC data not block aligned: {}", data.len()));
    }
    Ok(())
}

impl BlockCipher for AesCbc {
    fn block_len(&self) -> usize {
        AES_BLOCK_LEN
    }

    fn encrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        check_cbc_input(iv, data)?;
        let mut prev = [0u8; AES_BLOCK_LEN];
        prev.copy_from_slice(iv);

        for chunk in data.chunks_exact_mut(AES_BLOCK_LEN) {
            for (c, p) in chunk.iter_mut().zip(prev.iter()) {
                *c ^= p;
            }
            self.encrypt_block(chunk);
            prev.copy_from_slice(chunk);
        }
        Ok(())
    }

    fn decrypt_cbc(&self, iv: &[u8], data: &mut [u8]) -> Result<(), String> {
        check_cbc_input(iv, data)?;
        let mut prev = [0u8; AES_BLOCK_LEN];
        prev.copy_from_slice(iv);

        for chunk in data.chunks_exact_mut(AES_BLOCK_LEN) {
            let mut ct = [0u8; AES_BLOCK_LEN];
            ct.copy_from_slice(chunk);
            self.decrypt_block(chunk);
            for (c, p) in chunk.iter_mut().zip(prev.iter()) {
                *c ^= p;
            }
            prev = ct;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AesCbcFactory(BlockCipherAlgorithm);

impl SupportedBlockCipher for AesCbcFactory {
    fn algorithm(&self) -> BlockCipherAlgorithm {
        self.0
    }

    fn create_cipher(&self, key: &[u8]) -> Result<Box<dyn BlockCipher>, String> {
        let bad_key = |_| format!("Invalid key size for {:?}: {}", self.0, key.len());
        let c = match self.0 {
            BlockCipherAlgorithm::Aes128Cbc => {
                AesCbc::Aes128(Box::new(Aes128::new_from_slice(key).map_err(bad_key)?))
            }
            BlockCipherAlgorithm::Aes256Cbc => {
                AesCbc::Aes256(Box::new(Aes256::new_from_slice(key).map_err(bad_key)?))
            }
        };
        Ok(Box::new(c))
    }
}

static AES_128_CBC: AesCbcFactory = AesCbcFactory(BlockCipherAlgorithm::Aes128Cbc);
static AES_256_CBC: AesCbcFactory = AesCbcFactory(BlockCipherAlgorithm::Aes256Cbc);

/// All supported block ciphers.
pub(super) static ALL_BLOCK_CIPHERS: &[&dyn SupportedBlockCipher] = &[&AES_128_CBC, &AES_256_CBC];
