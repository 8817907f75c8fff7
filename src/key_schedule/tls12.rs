//! TLS 1.2 key schedule (RFC 5246 6.3, 8.1).

use super::{secret, KeyScheduleResult, Secret};
use crate::buffer::Buf;
use crate::cipher_suite::CipherSuite;
use crate::crypto::prf::prf_tls12;
use crate::crypto::HmacProvider;
use crate::Error;

/// Master secret length.
pub const MASTER_SECRET_LEN: usize = 48;

/// Finished verify_data length.
pub const VERIFY_DATA_LEN: usize = 12;

/// `PRF(pre_master_secret, "master secret", client_random + server_random)[0..48]`
pub fn master_secret(
    hmac: &dyn HmacProvider,
    suite: CipherSuite,
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Secret, Error> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    let mut out = Buf::new();
    prf_tls12(
        hmac,
        suite.descriptor().prf_hash(),
        pre_master_secret,
        "master secret",
        &seed,
        &mut out,
        MASTER_SECRET_LEN,
    )
    .map_err(Error::CryptoError)?;
    let s = secret(&out);
    out.wipe();
    Ok(s)
}

/// Expand the master secret into the key block and slice it:
/// client MAC key, server MAC key, client key, server key, client IV, server IV.
///
/// MAC keys are empty for AEAD suites and IVs are empty for CBC suites.
pub fn key_block(
    hmac: &dyn HmacProvider,
    suite: CipherSuite,
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<KeyScheduleResult, Error> {
    let d = suite.descriptor();
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let total = 2 * (d.mac_key_len + d.key_len + d.fixed_iv_len);
    let mut block = Buf::new();
    prf_tls12(
        hmac,
        d.prf_hash(),
        master_secret,
        "key expansion",
        &seed,
        &mut block,
        total,
    )
    .map_err(Error::CryptoError)?;

    let mut rest: &[u8] = &block;
    let mut take = |n: usize| {
        let (a, b) = rest.split_at(n);
        rest = b;
        secret(a)
    };

    let client_mac = take(d.mac_key_len);
    let server_mac = take(d.mac_key_len);
    let client_enc_key = take(d.key_len);
    let server_enc_key = take(d.key_len);
    let client_iv = take(d.fixed_iv_len);
    let server_iv = take(d.fixed_iv_len);

    let (client_mac_key, server_mac_key) = if d.mac_key_len > 0 {
        (Some(client_mac), Some(server_mac))
    } else {
        (None, None)
    };

    let result = KeyScheduleResult {
        master_secret: secret(master_secret),
        client_secret: Secret::default(),
        server_secret: Secret::default(),
        client_enc_key,
        server_enc_key,
        client_iv,
        server_iv,
        client_mac_key,
        server_mac_key,
    };
    block.wipe();
    Ok(result)
}

/// Which side's Finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishedLabel {
    Client,
    Server,
}

impl FinishedLabel {
    fn as_str(&self) -> &'static str {
        match self {
            FinishedLabel::Client => "client finished",
            FinishedLabel::Server => "server finished",
        }
    }
}

/// `PRF(master_secret, finished_label, Hash(handshake_messages))[0..12]`
pub fn verify_data(
    hmac: &dyn HmacProvider,
    suite: CipherSuite,
    master_secret: &[u8],
    label: FinishedLabel,
    handshake_hash: &[u8],
) -> Result<Buf, Error> {
    let mut out = Buf::new();
    prf_tls12(
        hmac,
        suite.descriptor().prf_hash(),
        master_secret,
        label.as_str(),
        handshake_hash,
        &mut out,
        VERIFY_DATA_LEN,
    )
    .map_err(Error::CryptoError)?;
    Ok(out)
}

#[cfg(all(test, feature = "rust-crypto"))]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;
    use crate::types::HashAlgorithm;
    use crate::util::{hex, unhex};

    const CLIENT_RANDOM: [u8; 32] = [0x11; 32];
    const SERVER_RANDOM: [u8; 32] = [0x22; 32];

    fn pre_master() -> Vec<u8> {
        (0u8..32).collect()
    }

    #[test]
    fn prf_known_answer() {
        let provider = default_provider();
        let mut out = Buf::new();
        prf_tls12(
            provider.hmac_provider,
            HashAlgorithm::SHA256,
            &unhex("9bbe436ba940f017b17652849a71db35"),
            "test label",
            &unhex("a0ba9f936cda311827a6f796ffd5198c"),
            &mut out,
            100,
        )
        .unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(hex(&out[..16]), "e3f229ba727be17b8d122620557cd453");
    }

    #[test]
    fn master_secret_and_cbc_key_block() {
        let provider = default_provider();
        let suite = CipherSuite::ECDHE_RSA_AES128_CBC_SHA256;
        let ms = master_secret(
            provider.hmac_provider,
            suite,
            &pre_master(),
            &CLIENT_RANDOM,
            &SERVER_RANDOM,
        )
        .unwrap();
        assert_eq!(
            hex(&ms),
            "f6550fc97649b6cb29f5d4d5006cbf69edacc80c5af55f7cf19db4e3\
             e3b90ca2a198457b64a6ed72c4b524d822cefc59"
        );

        let keys = key_block(
            provider.hmac_provider,
            suite,
            &ms,
            &CLIENT_RANDOM,
            &SERVER_RANDOM,
        )
        .unwrap();
        assert_eq!(
            hex(keys.client_mac_key.as_ref().unwrap()),
            "eaa6f8f3aa10fcdd334aa6ce53560ab5f060b8dd60f95f726da9630c23482f35"
        );
        assert_eq!(
            hex(keys.server_mac_key.as_ref().unwrap()),
            "6752cc847a8065f7ec162e4b387b572c8856f2919939854b9af9bebb5606b41d"
        );
        assert_eq!(hex(&keys.client_enc_key), "c2f801ae5d2721d10bf1fcfeb1f23d29");
        assert_eq!(hex(&keys.server_enc_key), "0872bdcbeda72d83fca3b8348b909731");
        assert!(keys.client_iv.is_empty());
        assert!(keys.server_iv.is_empty());
    }

    #[test]
    fn gcm_key_block_has_fixed_ivs() {
        let provider = default_provider();
        let suite = CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256;
        let keys = key_block(
            provider.hmac_provider,
            suite,
            &[7; 48],
            &CLIENT_RANDOM,
            &SERVER_RANDOM,
        )
        .unwrap();
        assert!(keys.client_mac_key.is_none());
        assert_eq!(keys.client_enc_key.len(), 16);
        assert_eq!(keys.client_iv.len(), 4);
        assert_ne!(keys.client_iv, keys.server_iv);
        keys.client_cipher(&provider, suite).unwrap();
        keys.server_cipher(&provider, suite).unwrap();
    }

    #[test]
    fn sha384_suites_use_sha384_prf() {
        let provider = default_provider();
        let ms = master_secret(
            provider.hmac_provider,
            CipherSuite::ECDHE_RSA_AES256_GCM_SHA384,
            &pre_master(),
            &CLIENT_RANDOM,
            &SERVER_RANDOM,
        )
        .unwrap();
        assert_eq!(
            hex(&ms),
            "ec126f7fbd84ac774c085a84853fa1cb63e1ed6759d749389f954f04\
             e25b43eb0562738094c03ce23552e4fbeaa88654"
        );
    }

    #[test]
    fn finished_verify_data() {
        let provider = default_provider();
        let suite = CipherSuite::ECDHE_RSA_AES128_GCM_SHA256;
        let ms = unhex(
            "f6550fc97649b6cb29f5d4d5006cbf69edacc80c5af55f7cf19db4e3\
             e3b90ca2a198457b64a6ed72c4b524d822cefc59",
        );
        let mut hash = Buf::new();
        provider
            .hash_provider
            .hash(HashAlgorithm::SHA256, b"abc", &mut hash);

        let client = verify_data(
            provider.hmac_provider,
            suite,
            &ms,
            FinishedLabel::Client,
            &hash,
        )
        .unwrap();
        assert_eq!(hex(&client), "42596a72e60e1e76d4304293");

        let server = verify_data(
            provider.hmac_provider,
            suite,
            &ms,
            FinishedLabel::Server,
            &hash,
        )
        .unwrap();
        assert_eq!(hex(&server), "7e6809e4a135a5e76c1bcc2f");
    }
}
