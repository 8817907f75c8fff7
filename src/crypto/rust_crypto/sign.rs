//! Signature verification using RustCrypto.

use der::Decode;
use ecdsa::signature::hazmat::PrehashVerifier;
use ecdsa::{Signature, VerifyingKey};
use p256::NistP256;
use p384::NistP384;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::Verifier;
use spki::{ObjectIdentifier, SubjectPublicKeyInfoRef};

use super::super::SignatureVerifier;
use crate::types::{HashAlgorithm, SignatureScheme};

const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_P256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const OID_P384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

fn prehash(hash: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match hash {
        HashAlgorithm::SHA256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::SHA384 => Sha384::digest(data).to_vec(),
        HashAlgorithm::SHA512 => Sha512::digest(data).to_vec(),
    }
}

fn verify_ecdsa(
    spki: &SubjectPublicKeyInfoRef<'_>,
    hash: HashAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    let curve_oid: ObjectIdentifier = spki
        .algorithm
        .parameters
        .as_ref()
        .ok_or("Missing EC curve parameter")?
        .decode_as()
        .map_err(|_| "Invalid EC curve parameter".to_string())?;

    let pubkey_bytes = spki
        .subject_public_key
        .as_bytes()
        .ok_or_else(|| "Invalid EC subject_public_key bitstring".to_string())?;

    // PrehashVerifier expects a hash digest
    let digest = prehash(hash, data);

    match curve_oid {
        OID_P256 => {
            let key = VerifyingKey::<NistP256>::from_sec1_bytes(pubkey_bytes)
                .map_err(|_| "Invalid P-256 public key".to_string())?;
            let sig = Signature::<NistP256>::from_der(signature)
                .map_err(|_| "Invalid signature format".to_string())?;
            key.verify_prehash(&digest, &sig)
                .map_err(|_| format!("ECDSA P-256 verification failed for {:?}", hash))
        }
        OID_P384 => {
            let key = VerifyingKey::<NistP384>::from_sec1_bytes(pubkey_bytes)
                .map_err(|_| "Invalid P-384 public key".to_string())?;
            let sig = Signature::<NistP384>::from_der(signature)
                .map_err(|_| "Invalid signature format".to_string())?;
            key.verify_prehash(&digest, &sig)
                .map_err(|_| format!("ECDSA P-384 verification failed for {:?}", hash))
        }
        _ => Err(format!("Unsupported EC curve: {}", curve_oid)),
    }
}

fn verify_rsa_pkcs1(
    key: RsaPublicKey,
    hash: HashAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};

    let sig = Signature::try_from(signature).map_err(|e| format!("Invalid RSA signature: {e}"))?;
    let res = match hash {
        HashAlgorithm::SHA256 => VerifyingKey::<Sha256>::new(key).verify(data, &sig),
        HashAlgorithm::SHA384 => VerifyingKey::<Sha384>::new(key).verify(data, &sig),
        HashAlgorithm::SHA512 => VerifyingKey::<Sha512>::new(key).verify(data, &sig),
    };
    res.map_err(|_| format!("RSA PKCS#1 verification failed for {:?}", hash))
}

fn verify_rsa_pss(
    key: RsaPublicKey,
    hash: HashAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    use rsa::pss::{Signature, VerifyingKey};

    let sig = Signature::try_from(signature).map_err(|e| format!("Invalid RSA signature: {e}"))?;
    let res = match hash {
        HashAlgorithm::SHA256 => VerifyingKey::<Sha256>::new(key).verify(data, &sig),
        HashAlgorithm::SHA384 => VerifyingKey::<Sha384>::new(key).verify(data, &sig),
        HashAlgorithm::SHA512 => VerifyingKey::<Sha512>::new(key).verify(data, &sig),
    };
    res.map_err(|_| format!("RSA-PSS verification failed for {:?}", hash))
}

/// Signature verifier implementation.
#[derive(Debug)]
pub(super) struct RustCryptoSignatureVerifier;

impl SignatureVerifier for RustCryptoSignatureVerifier {
    fn verify_signature(
        &self,
        spki_der: &[u8],
        data: &[u8],
        signature: &[u8],
        scheme: SignatureScheme,
    ) -> Result<(), String> {
        let hash = scheme
            .hash_algorithm()
            .ok_or_else(|| format!("Unsupported signature scheme: {:?}", scheme))?;

        let spki = SubjectPublicKeyInfoRef::from_der(spki_der)
            .map_err(|e| format!("Failed to parse public key: {e}"))?;
        let key_oid = spki.algorithm.oid;

        match scheme {
            SignatureScheme::ECDSA_SECP256R1_SHA256 | SignatureScheme::ECDSA_SECP384R1_SHA384 => {
                if key_oid != OID_EC_PUBLIC_KEY {
                    return Err(format!("ECDSA scheme with non-EC key: {}", key_oid));
                }
                verify_ecdsa(&spki, hash, data, signature)
            }
            SignatureScheme::RSA_PKCS1_SHA256
            | SignatureScheme::RSA_PKCS1_SHA384
            | SignatureScheme::RSA_PKCS1_SHA512
            | SignatureScheme::RSA_PSS_RSAE_SHA256
            | SignatureScheme::RSA_PSS_RSAE_SHA384
            | SignatureScheme::RSA_PSS_RSAE_SHA512 => {
                if key_oid != OID_RSA_ENCRYPTION {
                    return Err(format!("RSA scheme with non-RSA key: {}", key_oid));
                }
                let key = RsaPublicKey::from_public_key_der(spki_der)
                    .map_err(|e| format!("Invalid RSA public key: {e}"))?;
                if scheme.is_pkcs1() {
                    verify_rsa_pkcs1(key, hash, data, signature)
                } else {
                    verify_rsa_pss(key, hash, data, signature)
                }
            }
            SignatureScheme::Unknown(v) => Err(format!("Unsupported signature scheme: {:04x}", v)),
        }
    }
}

/// Static instance of the signature verifier.
pub(super) static SIGNATURE_VERIFIER: RustCryptoSignatureVerifier = RustCryptoSignatureVerifier;
