//! TLS 1.3 key schedule (RFC 8446 7.1).
//!
//! ```text
//!              0
//!              |
//!    PSK ->  HKDF-Extract = Early Secret
//!              |
//!              +-----> Derive-Secret(., "res binder", "") = binder_key
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!   (EC)DHE -> HKDF-Extract = Handshake Secret
//!              |
//!              +-----> Derive-Secret(., "c hs traffic", CH..SH)
//!              +-----> Derive-Secret(., "s hs traffic", CH..SH)
//!              v
//!        Derive-Secret(., "derived", "")
//!              |
//!         0 -> HKDF-Extract = Master Secret
//!              |
//!              +-----> Derive-Secret(., "c ap traffic", CH..server Finished)
//!              +-----> Derive-Secret(., "s ap traffic", CH..server Finished)
//!              +-----> Derive-Secret(., "res master", CH..client Finished)
//! ```

use std::fmt;

use super::{secret, KeyScheduleResult, Secret};
use crate::buffer::Buf;
use crate::cipher_suite::CipherSuite;
use crate::crypto::{CryptoProvider, HashProvider, HkdfProvider, HmacProvider};
use crate::types::HashAlgorithm;
use crate::Error;

/// `HKDF-Expand-Label(secret, label, context, len)`.
pub fn expand_label(
    hkdf: &dyn HkdfProvider,
    hash: HashAlgorithm,
    secret_bytes: &[u8],
    label: &[u8],
    context: &[u8],
    len: usize,
) -> Result<Secret, Error> {
    let mut out = Buf::new();
    hkdf.hkdf_expand_label(hash, secret_bytes, label, context, &mut out, len)
        .map_err(Error::CryptoError)?;
    let s = secret(&out);
    out.wipe();
    Ok(s)
}

/// `HKDF-Extract(salt, ikm)`.
fn extract(
    hkdf: &dyn HkdfProvider,
    hash: HashAlgorithm,
    salt: &[u8],
    ikm: &[u8],
) -> Result<Secret, Error> {
    let mut out = Buf::new();
    hkdf.hkdf_extract(hash, salt, ikm, &mut out)
        .map_err(Error::CryptoError)?;
    let s = secret(&out);
    out.wipe();
    Ok(s)
}

/// `Early Secret = HKDF-Extract(0, PSK)`, with a zero PSK when not resuming.
pub fn early_secret(
    hkdf: &dyn HkdfProvider,
    hash: HashAlgorithm,
    psk: Option<&[u8]>,
) -> Result<Secret, Error> {
    let zeros = vec![0u8; hash.output_len()];
    extract(hkdf, hash, &zeros, psk.unwrap_or(&zeros))
}

/// Traffic key and IV from a traffic secret.
pub fn traffic_key_iv(
    hkdf: &dyn HkdfProvider,
    suite: CipherSuite,
    traffic_secret: &[u8],
) -> Result<(Secret, Secret), Error> {
    let d = suite.descriptor();
    let key = expand_label(hkdf, d.hash, traffic_secret, b"key", &[], d.key_len)?;
    let iv = expand_label(hkdf, d.hash, traffic_secret, b"iv", &[], d.fixed_iv_len)?;
    Ok((key, iv))
}

/// `application_traffic_secret_N+1`, used by KeyUpdate.
pub fn next_traffic_secret(
    hkdf: &dyn HkdfProvider,
    hash: HashAlgorithm,
    traffic_secret: &[u8],
) -> Result<Secret, Error> {
    expand_label(
        hkdf,
        hash,
        traffic_secret,
        b"traffic upd",
        &[],
        hash.output_len(),
    )
}

/// `HMAC(finished_key, transcript_hash)` where
/// `finished_key = HKDF-Expand-Label(base_key, "finished", "", Hash.length)`.
///
/// Used for both Finished messages and PSK binders.
pub fn finished_verify_data(
    hkdf: &dyn HkdfProvider,
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    base_key: &[u8],
    transcript_hash: &[u8],
) -> Result<Buf, Error> {
    let finished_key = expand_label(hkdf, hash, base_key, b"finished", &[], hash.output_len())?;
    let mut out = Buf::new();
    hmac.hmac(hash, &finished_key, transcript_hash, &mut out)
        .map_err(Error::CryptoError)?;
    Ok(out)
}

/// PSK for a ticket: `HKDF-Expand-Label(resumption_master_secret, "resumption",
/// ticket_nonce, Hash.length)`.
pub fn resumption_psk(
    hkdf: &dyn HkdfProvider,
    hash: HashAlgorithm,
    resumption_master_secret: &[u8],
    nonce: &[u8],
) -> Result<Secret, Error> {
    expand_label(
        hkdf,
        hash,
        resumption_master_secret,
        b"resumption",
        nonce,
        hash.output_len(),
    )
}

/// Progress through the TLS 1.3 key schedule for one connection.
pub struct Tls13KeySchedule {
    hkdf: &'static dyn HkdfProvider,
    hash_provider: &'static dyn HashProvider,
    hash: HashAlgorithm,
    early_secret: Secret,
    /// `Derive-Secret(., "derived", "")` of the last extracted secret.
    derived: Secret,
    master_secret: Option<Secret>,
}

impl Tls13KeySchedule {
    /// Start from the early secret, keyed by `psk` when resuming.
    pub fn new(
        provider: &CryptoProvider,
        hash: HashAlgorithm,
        psk: Option<&[u8]>,
    ) -> Result<Self, Error> {
        let hkdf = provider.hkdf_provider;
        let early_secret = early_secret(hkdf, hash, psk)?;
        let mut ks = Tls13KeySchedule {
            hkdf,
            hash_provider: provider.hash_provider,
            hash,
            early_secret,
            derived: Secret::default(),
            master_secret: None,
        };
        ks.derived = ks.derive_secret(&ks.early_secret, b"derived", &ks.empty_hash())?;
        Ok(ks)
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn early_secret(&self) -> &[u8] {
        &self.early_secret
    }

    /// Key for resumption PSK binders.
    pub fn binder_key(&self) -> Result<Secret, Error> {
        self.derive_secret(&self.early_secret, b"res binder", &self.empty_hash())
    }

    /// Mix in the (EC)DHE shared secret and derive handshake traffic keys.
    ///
    /// `transcript_hash` covers ClientHello..ServerHello.
    pub fn handshake(
        &mut self,
        suite: CipherSuite,
        shared_secret: &[u8],
        transcript_hash: &[u8],
    ) -> Result<KeyScheduleResult, Error> {
        let handshake_secret = extract(self.hkdf, self.hash, &self.derived, shared_secret)?;
        let result = self.traffic(
            suite,
            &handshake_secret,
            b"c hs traffic",
            b"s hs traffic",
            transcript_hash,
        )?;
        self.derived = self.derive_secret(&handshake_secret, b"derived", &self.empty_hash())?;
        Ok(result)
    }

    /// Derive application traffic keys.
    ///
    /// `transcript_hash` covers ClientHello..server Finished.
    pub fn application(
        &mut self,
        suite: CipherSuite,
        transcript_hash: &[u8],
    ) -> Result<KeyScheduleResult, Error> {
        let zeros = vec![0u8; self.hash.output_len()];
        let master_secret = extract(self.hkdf, self.hash, &self.derived, &zeros)?;
        let result = self.traffic(
            suite,
            &master_secret,
            b"c ap traffic",
            b"s ap traffic",
            transcript_hash,
        )?;
        self.master_secret = Some(master_secret);
        Ok(result)
    }

    /// `transcript_hash` covers ClientHello..client Finished.
    pub fn resumption_master_secret(&self, transcript_hash: &[u8]) -> Result<Secret, Error> {
        let master = self
            .master_secret
            .as_ref()
            .ok_or_else(|| Error::CryptoError("Master secret not derived yet".to_string()))?;
        self.derive_secret(master, b"res master", transcript_hash)
    }

    fn traffic(
        &self,
        suite: CipherSuite,
        base: &Secret,
        client_label: &[u8],
        server_label: &[u8],
        transcript_hash: &[u8],
    ) -> Result<KeyScheduleResult, Error> {
        let client_secret = self.derive_secret(base, client_label, transcript_hash)?;
        let server_secret = self.derive_secret(base, server_label, transcript_hash)?;
        let (client_enc_key, client_iv) = traffic_key_iv(self.hkdf, suite, &client_secret)?;
        let (server_enc_key, server_iv) = traffic_key_iv(self.hkdf, suite, &server_secret)?;
        Ok(KeyScheduleResult {
            master_secret: base.clone(),
            client_secret,
            server_secret,
            client_enc_key,
            server_enc_key,
            client_iv,
            server_iv,
            client_mac_key: None,
            server_mac_key: None,
        })
    }

    fn derive_secret(
        &self,
        base: &[u8],
        label: &[u8],
        transcript_hash: &[u8],
    ) -> Result<Secret, Error> {
        expand_label(
            self.hkdf,
            self.hash,
            base,
            label,
            transcript_hash,
            self.hash.output_len(),
        )
    }

    fn empty_hash(&self) -> Buf {
        let mut out = Buf::new();
        self.hash_provider.hash(self.hash, &[], &mut out);
        out
    }
}

impl fmt::Debug for Tls13KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tls13KeySchedule")
            .field("hash", &self.hash)
            .field("master_secret", &self.master_secret.is_some())
            .finish()
    }
}

#[cfg(all(test, feature = "rust-crypto"))]
mod tests {
    use super::*;
    use crate::crypto::rust_crypto::default_provider;
    use crate::util::{hex, unhex};

    // RFC 8448 section 3, simple 1-RTT handshake.
    const SHARED: &str = "8bd4054fb55b9d63fdfbacf9f04b9f0d35e6d63f537563efd46272900f89492d";
    const CH_SH: &str = "860c06edc07858ee8e78f0e7428c58edd6b43f2ca3e6e95f02ed063cf0e1cad8";
    const CH_SF: &str = "9608102a0f1ccc6db6250b7b7e417b1a000eaada3daae4777a7686c9ff83df13";
    const CH_CV: &str = "edb7725fa7a3473b031ec8ef65a2485493900138a2b91291407d7951a06110ed";
    const CH_CF: &str = "209145a96ee8e2a122ff810047cc952684658d6049e86429426db87c54ad143d";

    const SUITE: CipherSuite = CipherSuite::TLS13_AES_128_GCM_SHA256;

    #[test]
    fn rfc8448_handshake_and_application_secrets() {
        let provider = default_provider();
        let mut ks = Tls13KeySchedule::new(&provider, HashAlgorithm::SHA256, None).unwrap();
        assert_eq!(
            hex(ks.early_secret()),
            "33ad0a1c607ec03b09e6cd9893680ce210adf300aa1f2660e1b22e10f170f92a"
        );

        let hs = ks.handshake(SUITE, &unhex(SHARED), &unhex(CH_SH)).unwrap();
        assert_eq!(
            hex(&hs.master_secret),
            "1dc826e93606aa6fdc0aadc12f741b01046aa6b99f691ed221a9f0ca043fbeac"
        );
        assert_eq!(
            hex(&hs.client_secret),
            "b3eddb126e067f35a780b3abf45e2d8f3b1a950738f52e9600746a0e27a55a21"
        );
        assert_eq!(
            hex(&hs.server_secret),
            "b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38"
        );
        assert_eq!(hex(&hs.server_enc_key), "3fce516009c21727d0f2e4e86ee403bc");
        assert_eq!(hex(&hs.server_iv), "5d313eb2671276ee13000b30");
        assert_eq!(hex(&hs.client_enc_key), "dbfaa693d1762c5b666af5d950258d01");
        assert_eq!(hex(&hs.client_iv), "5bd3c71b836e0b76bb73265f");

        let ap = ks.application(SUITE, &unhex(CH_SF)).unwrap();
        assert_eq!(
            hex(&ap.master_secret),
            "18df06843d13a08bf2a449844c5f8a478001bc4d4c627984d5a41da8d0402919"
        );
        assert_eq!(
            hex(&ap.client_secret),
            "9e40646ce79a7f9dc05af8889bce6552875afa0b06df0087f792ebb7c17504a5"
        );
        assert_eq!(
            hex(&ap.server_secret),
            "a11af9f05531f856ad47116b45a950328204b4f44bfb6b3a4b4f1f3fcb631643"
        );
        assert_eq!(hex(&ap.server_enc_key), "9f02283b6c9c07efc26bb9f2ac92e356");
        assert_eq!(hex(&ap.server_iv), "cf782b88dd83549aadf1e984");
        assert_eq!(hex(&ap.client_iv), "5b78923dee08579033e523d9");

        let res = ks.resumption_master_secret(&unhex(CH_CF)).unwrap();
        assert_eq!(
            hex(&res),
            "7df235f2031d2a051287d02b0241b0bfdaf86cc856231f2d5aba46c434ec196c"
        );
        let psk = resumption_psk(provider.hkdf_provider, HashAlgorithm::SHA256, &res, &[0, 0])
            .unwrap();
        assert_eq!(
            hex(&psk),
            "4ecd0eb6ec3b4d87f5d6028f922ca4c5851a277fd41311c9e62d2c9492e1c4f3"
        );
    }

    #[test]
    fn rfc8448_server_finished() {
        let provider = default_provider();
        let server_hs =
            unhex("b67b7d690cc16c4e75e54213cb2d37b4e9c912bcded9105d42befd59d391ad38");
        let vd = finished_verify_data(
            provider.hkdf_provider,
            provider.hmac_provider,
            HashAlgorithm::SHA256,
            &server_hs,
            &unhex(CH_CV),
        )
        .unwrap();
        assert_eq!(
            hex(&vd),
            "9b9b141d906337fbd2cbdce71df4deda4ab42c309572cb7fffee5454b78f0718"
        );
    }

    #[test]
    fn traffic_update_changes_key() {
        let provider = default_provider();
        let c_ap = unhex("9e40646ce79a7f9dc05af8889bce6552875afa0b06df0087f792ebb7c17504a5");
        let next = next_traffic_secret(provider.hkdf_provider, HashAlgorithm::SHA256, &c_ap)
            .unwrap();
        assert_eq!(
            hex(&next),
            "fcdfcc72725aaee48bf64e4fd8b749cdbdbab39d90da0b26e2245ca6ea167207"
        );
        let (key, _) = traffic_key_iv(provider.hkdf_provider, SUITE, &next).unwrap();
        assert_eq!(hex(&key), "3879d82f5f14056e623f2ce5bfc66fce");
    }

    #[test]
    fn resumption_requires_master_secret() {
        let provider = default_provider();
        let ks = Tls13KeySchedule::new(&provider, HashAlgorithm::SHA256, None).unwrap();
        assert!(ks.resumption_master_secret(&[0; 32]).is_err());
    }
}
