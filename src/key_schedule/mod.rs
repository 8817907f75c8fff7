//! Key schedules for TLS 1.3 (HKDF) and TLS 1.2 (PRF).
//!
//! The two are selected by negotiated version and never mixed within one
//! connection. Both hand out [`KeyScheduleResult`]s, from which the record
//! layer builds its [`RecordCipher`]s.

pub mod tls12;
pub mod tls13;

use std::fmt;

use zeroize::Zeroizing;

use crate::cipher_suite::CipherSuite;
use crate::crypto::CryptoProvider;
use crate::record::RecordCipher;
use crate::Error;

/// Secret bytes that are wiped on drop.
pub type Secret = Zeroizing<Vec<u8>>;

pub(crate) fn secret(data: &[u8]) -> Secret {
    Zeroizing::new(data.to_vec())
}

/// Keys for both directions at one point of the key schedule.
///
/// Immutable once produced. Rotation builds a new value.
#[derive(Clone)]
pub struct KeyScheduleResult {
    /// TLS 1.3: the handshake or master secret this stage was derived from.
    /// TLS 1.2: the master secret.
    pub master_secret: Secret,
    /// TLS 1.3 traffic secrets, empty for TLS 1.2.
    pub client_secret: Secret,
    pub server_secret: Secret,
    pub client_enc_key: Secret,
    pub server_enc_key: Secret,
    pub client_iv: Secret,
    pub server_iv: Secret,
    /// TLS 1.2 CBC suites only.
    pub client_mac_key: Option<Secret>,
    pub server_mac_key: Option<Secret>,
}

impl KeyScheduleResult {
    /// Cipher protecting records we send.
    pub fn client_cipher(
        &self,
        provider: &CryptoProvider,
        suite: CipherSuite,
    ) -> Result<RecordCipher, Error> {
        RecordCipher::new(
            provider,
            suite,
            &self.client_enc_key,
            &self.client_iv,
            self.client_mac_key.as_ref().map(|k| k.as_slice()),
        )
    }

    /// Cipher opening records the server sends.
    pub fn server_cipher(
        &self,
        provider: &CryptoProvider,
        suite: CipherSuite,
    ) -> Result<RecordCipher, Error> {
        RecordCipher::new(
            provider,
            suite,
            &self.server_enc_key,
            &self.server_iv,
            self.server_mac_key.as_ref().map(|k| k.as_slice()),
        )
    }
}

impl fmt::Debug for KeyScheduleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyScheduleResult")
            .field("master_secret", &self.master_secret.len())
            .field("client_secret", &self.client_secret.len())
            .field("server_secret", &self.server_secret.len())
            .field("enc_key", &self.client_enc_key.len())
            .field("iv", &self.client_iv.len())
            .field("mac_key", &self.client_mac_key.as_ref().map(|k| k.len()))
            .finish()
    }
}
