//! Session tickets and the resumption PSKs made from them.

use std::fmt;
use std::time::{Duration, SystemTime};

use crate::buffer::Buf;
use crate::cipher_suite::CipherSuite;
use crate::crypto::CryptoProvider;
use crate::key_schedule::tls13::{early_secret, expand_label, resumption_psk};
use crate::key_schedule::{secret, Secret};
use crate::message::{NewSessionTicket, PskOffer};
use crate::Error;

/// Longest ticket lifetime a server may announce (RFC 8446 4.6.1).
const MAX_TICKET_LIFETIME: u32 = 7 * 24 * 3600;

/// A TLS 1.3 ticket together with what is needed to resume with it.
#[derive(Clone)]
pub struct SessionTicket {
    /// The ticket as received.
    pub message: NewSessionTicket,
    pub cipher_suite: CipherSuite,
    pub received_at: SystemTime,
    resumption_master_secret: Secret,
}

impl SessionTicket {
    pub fn new(
        message: NewSessionTicket,
        cipher_suite: CipherSuite,
        resumption_master_secret: &[u8],
        received_at: SystemTime,
    ) -> Self {
        SessionTicket {
            message,
            cipher_suite,
            received_at,
            resumption_master_secret: secret(resumption_master_secret),
        }
    }

    /// Opaque ticket, also the PSK identity.
    pub fn ticket(&self) -> &[u8] {
        &self.message.ticket
    }

    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.message.lifetime.min(MAX_TICKET_LIFETIME) as u64)
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        match now.duration_since(self.received_at) {
            Ok(age) => age > self.lifetime(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for SessionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTicket")
            .field("ticket_len", &self.message.ticket.len())
            .field("lifetime", &self.message.lifetime)
            .field("cipher_suite", &self.cipher_suite)
            .finish()
    }
}

/// Resumption PSK ready to be offered in a ClientHello.
#[derive(Clone)]
pub struct Psk {
    pub identity: Vec<u8>,
    pub obfuscated_ticket_age: u32,
    pub cipher_suite: CipherSuite,
    psk: Secret,
    early_secret: Secret,
    finish_key: Secret,
}

impl Psk {
    /// Derive the PSK, early secret and binder finish key for `ticket`.
    pub fn from_ticket(
        provider: &CryptoProvider,
        ticket: &SessionTicket,
        now: SystemTime,
    ) -> Result<Psk, Error> {
        if ticket.is_expired(now) {
            return Err(Error::TicketExpired);
        }
        let hkdf = provider.hkdf_provider;
        let hash = ticket.cipher_suite.hash();
        let hash_len = hash.output_len();

        let psk = resumption_psk(
            hkdf,
            hash,
            &ticket.resumption_master_secret,
            &ticket.message.nonce,
        )?;
        let early = early_secret(hkdf, hash, Some(&psk))?;

        let mut empty_hash = Buf::new();
        provider.hash_provider.hash(hash, &[], &mut empty_hash);
        let binder_key = expand_label(hkdf, hash, &early, b"res binder", &empty_hash, hash_len)?;
        let finish_key = expand_label(hkdf, hash, &binder_key, b"finished", &[], hash_len)?;

        let age_ms = now
            .duration_since(ticket.received_at)
            .unwrap_or_default()
            .as_millis() as u32;

        Ok(Psk {
            identity: ticket.message.ticket.clone(),
            obfuscated_ticket_age: age_ms.wrapping_add(ticket.message.age_add),
            cipher_suite: ticket.cipher_suite,
            psk,
            early_secret: early,
            finish_key,
        })
    }

    pub fn secret(&self) -> &[u8] {
        &self.psk
    }

    pub fn early_secret(&self) -> &[u8] {
        &self.early_secret
    }

    pub fn finish_key(&self) -> &[u8] {
        &self.finish_key
    }

    /// What the ClientHello builder needs to reserve the binder.
    pub fn offer(&self) -> PskOffer {
        PskOffer {
            identity: self.identity.clone(),
            obfuscated_ticket_age: self.obfuscated_ticket_age,
            binder_len: self.cipher_suite.hash().output_len(),
        }
    }

    /// `HMAC(finish_key, Hash(prefix))` over the ClientHello up to the binders.
    pub fn binder(&self, provider: &CryptoProvider, prefix: &[u8]) -> Result<Buf, Error> {
        let hash = self.cipher_suite.hash();
        let mut digest = Buf::new();
        provider.hash_provider.hash(hash, prefix, &mut digest);
        let mut out = Buf::new();
        provider
            .hmac_provider
            .hmac(hash, &self.finish_key, &digest, &mut out)
            .map_err(Error::CryptoError)?;
        Ok(out)
    }
}

impl fmt::Debug for Psk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Psk")
            .field("identity_len", &self.identity.len())
            .field("obfuscated_ticket_age", &self.obfuscated_ticket_age)
            .field("cipher_suite", &self.cipher_suite)
            .finish()
    }
}
