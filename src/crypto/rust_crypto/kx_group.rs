//! Key exchange group implementations using RustCrypto.

use elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::buffer::Buf;
use crate::crypto::provider::{KeyPair, SupportedKxGroup};
use crate::types::NamedGroup;

/// ECDH key pair for one of the supported groups.
enum EcdhKeyPair {
    X25519 {
        secret: StaticSecret,
        public_key: Buf,
    },
    P256 {
        secret: p256::SecretKey,
        public_key: Buf,
    },
    P384 {
        secret: p384::SecretKey,
        public_key: Buf,
    },
}

impl std::fmt::Debug for EcdhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcdhKeyPair")
            .field("group", &self.group())
            .field("public_key_len", &self.public_key().len())
            .finish_non_exhaustive()
    }
}

impl EcdhKeyPair {
    fn from_x25519(secret: StaticSecret) -> Self {
        let public_key = Buf::from_slice(X25519PublicKey::from(&secret).as_bytes());
        EcdhKeyPair::X25519 { secret, public_key }
    }

    fn from_p256(secret: p256::SecretKey) -> Self {
        let point = secret.public_key().to_encoded_point(false);
        let public_key = Buf::from_slice(point.as_bytes());
        EcdhKeyPair::P256 { secret, public_key }
    }

    fn from_p384(secret: p384::SecretKey) -> Self {
        let point = secret.public_key().to_encoded_point(false);
        let public_key = Buf::from_slice(point.as_bytes());
        EcdhKeyPair::P384 { secret, public_key }
    }
}

impl KeyPair for EcdhKeyPair {
    fn group(&self) -> NamedGroup {
        match self {
            EcdhKeyPair::X25519 { .. } => NamedGroup::X25519,
            EcdhKeyPair::P256 { .. } => NamedGroup::Secp256r1,
            EcdhKeyPair::P384 { .. } => NamedGroup::Secp384r1,
        }
    }

    fn public_key(&self) -> &[u8] {
        match self {
            EcdhKeyPair::X25519 { public_key, .. } => public_key,
            EcdhKeyPair::P256 { public_key, .. } => public_key,
            EcdhKeyPair::P384 { public_key, .. } => public_key,
        }
    }

    fn shared_secret(&self, peer_pub: &[u8], out: &mut Buf) -> Result<(), String> {
        out.clear();
        match self {
            EcdhKeyPair::X25519 { secret, .. } => {
                let peer: [u8; 32] = peer_pub
                    .try_into()
                    .map_err(|_| format!("Invalid X25519 public key length: {}", peer_pub.len()))?;
                let shared = secret.diffie_hellman(&X25519PublicKey::from(peer));
                if !shared.was_contributory() {
                    return Err("X25519 shared secret is all zeros".to_string());
                }
                out.extend_from_slice(shared.as_bytes());
            }
            EcdhKeyPair::P256 { secret, .. } => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-256 public key".to_string())?;
                let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
            EcdhKeyPair::P384 { secret, .. } => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_pub)
                    .map_err(|_| "Invalid P-384 public key".to_string())?;
                let shared = p384::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                out.extend_from_slice(shared.raw_secret_bytes().as_slice());
            }
        }
        Ok(())
    }

    fn private_key(&self, out: &mut Buf) {
        out.clear();
        match self {
            EcdhKeyPair::X25519 { secret, .. } => out.extend_from_slice(&secret.to_bytes()),
            EcdhKeyPair::P256 { secret, .. } => out.extend_from_slice(&secret.to_bytes()),
            EcdhKeyPair::P384 { secret, .. } => out.extend_from_slice(&secret.to_bytes()),
        }
    }
}

/// X25519 key exchange group.
#[derive(Debug)]
struct X25519;

impl SupportedKxGroup for X25519 {
    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }

    fn generate_key_pair(&self) -> Result<Box<dyn KeyPair>, String> {
        let secret = StaticSecret::random_from_rng(OsRng);
        Ok(Box::new(EcdhKeyPair::from_x25519(secret)))
    }

    fn import_private_key(&self, private_key: &[u8]) -> Result<Box<dyn KeyPair>, String> {
        let bytes: [u8; 32] = private_key
            .try_into()
            .map_err(|_| format!("Invalid X25519 private key length: {}", private_key.len()))?;
        Ok(Box::new(EcdhKeyPair::from_x25519(StaticSecret::from(bytes))))
    }
}

/// P-256 (secp256r1) key exchange group.
#[derive(Debug)]
struct P256;

impl SupportedKxGroup for P256 {
    fn name(&self) -> NamedGroup {
        NamedGroup::Secp256r1
    }

    fn generate_key_pair(&self) -> Result<Box<dyn KeyPair>, String> {
        let secret = p256::SecretKey::random(&mut OsRng);
        Ok(Box::new(EcdhKeyPair::from_p256(secret)))
    }

    fn import_private_key(&self, private_key: &[u8]) -> Result<Box<dyn KeyPair>, String> {
        let secret = p256::SecretKey::from_slice(private_key)
            .map_err(|_| "Invalid P-256 private key".to_string())?;
        Ok(Box::new(EcdhKeyPair::from_p256(secret)))
    }
}

/// P-384 (secp384r1) key exchange group.
#[derive(Debug)]
struct P384;

impl SupportedKxGroup for P384 {
    fn name(&self) -> NamedGroup {
        NamedGroup::Secp384r1
    }

    fn generate_key_pair(&self) -> Result<Box<dyn KeyPair>, String> {
        let secret = p384::SecretKey::random(&mut OsRng);
        Ok(Box::new(EcdhKeyPair::from_p384(secret)))
    }

    fn import_private_key(&self, private_key: &[u8]) -> Result<Box<dyn KeyPair>, String> {
        let secret = p384::SecretKey::from_slice(private_key)
            .map_err(|_| "Invalid P-384 private key".to_string())?;
        Ok(Box::new(EcdhKeyPair::from_p384(secret)))
    }
}

static KX_GROUP_X25519: X25519 = X25519;
static KX_GROUP_P256: P256 = P256;
static KX_GROUP_P384: P384 = P384;

/// All supported key exchange groups, in preference order.
pub(super) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&KX_GROUP_X25519, &KX_GROUP_P256, &KX_GROUP_P384];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_group_agrees_with_itself() {
        for g in ALL_KX_GROUPS {
            let a = g.generate_key_pair().unwrap();
            let b = g.generate_key_pair().unwrap();
            let mut s1 = Buf::new();
            let mut s2 = Buf::new();
            a.shared_secret(b.public_key(), &mut s1).unwrap();
            b.shared_secret(a.public_key(), &mut s2).unwrap();
            assert_eq!(s1, s2);
            assert!(!s1.is_empty());

            // The pair is reusable.
            let mut s3 = Buf::new();
            a.shared_secret(b.public_key(), &mut s3).unwrap();
            assert_eq!(s1, s3);
        }
    }

    #[test]
    fn import_roundtrip() {
        for g in ALL_KX_GROUPS {
            let a = g.generate_key_pair().unwrap();
            let mut private = Buf::new();
            a.private_key(&mut private);
            let b = g.import_private_key(&private).unwrap();
            assert_eq!(a.public_key(), b.public_key());
        }
    }

    #[test]
    fn uncompressed_point_lengths() {
        let p256 = KX_GROUP_P256.generate_key_pair().unwrap();
        assert_eq!(p256.public_key().len(), 65);
        assert_eq!(p256.public_key()[0], 4);
        let p384 = KX_GROUP_P384.generate_key_pair().unwrap();
        assert_eq!(p384.public_key().len(), 97);
        let x = KX_GROUP_X25519.generate_key_pair().unwrap();
        assert_eq!(x.public_key().len(), 32);
    }

    #[test]
    fn bad_peer_key() {
        let a = KX_GROUP_X25519.generate_key_pair().unwrap();
        let mut out = Buf::new();
        assert!(a.shared_secret(&[0; 31], &mut out).is_err());
        // Low order point gives an all zero secret.
        assert!(a.shared_secret(&[0; 32], &mut out).is_err());
        let p = KX_GROUP_P256.generate_key_pair().unwrap();
        assert!(p.shared_secret(&[4; 65], &mut out).is_err());
    }
}
