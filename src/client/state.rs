use std::collections::HashMap;
use std::fmt;

use crate::buffer::Buf;
use crate::certificate::ParsedCertificate;
use crate::cipher_suite::CipherSuite;
use crate::crypto::{CryptoProvider, HashProvider, KeyPair};
use crate::key_schedule::tls13::Tls13KeySchedule;
use crate::key_schedule::{KeyScheduleResult, Secret};
use crate::message::ServerKeyExchange;
use crate::record::RecordCipher;
use crate::session::Psk;
use crate::types::{HashAlgorithm, NamedGroup, ProtocolVersion};
use crate::Error;

/// Handshake progress.
///
/// States named `*Recv` are entered after the named message was handled,
/// `*Sent` after the named message went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Init,
    HelloSent,

    // Both versions.
    ServerHelloRecv,
    CertificateRequestRecv,
    CertificateRecv,

    // TLS 1.2
    ServerKeyExchangeRecv,
    ServerHelloDoneRecv,
    ClientKeyExchangeSent,
    ChangeCipherSpecSent,
    FinishSent,
    AwaitingServerFinish,

    // TLS 1.3
    EncryptedExtensionsRecv,
    CertificateVerifyRecv,
    ServerFinishRecv,
    ClientFinishSent,

    Done,
    Ended,
}

impl State {
    /// Whether the state waits for a handshake message from the server.
    ///
    /// The others send our next flight without input.
    pub fn awaits_message(&self) -> bool {
        !matches!(
            self,
            State::Init
                | State::ServerHelloDoneRecv
                | State::ClientKeyExchangeSent
                | State::ChangeCipherSpecSent
                | State::FinishSent
                | State::ServerFinishRecv
                | State::ClientFinishSent
                | State::Ended
        )
    }
}

/// Handshake messages in the order sent and received.
#[derive(Default)]
pub(crate) struct Transcript {
    messages: Vec<Buf>,
}

impl Transcript {
    pub fn push(&mut self, raw: &[u8]) {
        self.messages.push(Buf::from_slice(raw));
    }

    /// Hash over every message so far.
    pub fn hash(&self, provider: &dyn HashProvider, algorithm: HashAlgorithm) -> Buf {
        let mut ctx = provider.create_hash(algorithm);
        for m in &self.messages {
            ctx.update(m);
        }
        let mut out = Buf::new();
        ctx.clone_and_finalize(&mut out);
        out
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        for m in &mut self.messages {
            m.wipe();
        }
        self.messages.clear();
    }
}

/// Everything one connection knows, owned by the client and handed to the
/// state transitions.
#[derive(Default)]
pub(crate) struct ConnectionState {
    pub host: String,
    pub session_id: Vec<u8>,
    pub client_random: [u8; 32],
    pub server_random: [u8; 32],

    pub version: Option<ProtocolVersion>,
    pub cipher_suite: Option<CipherSuite>,
    pub group: Option<NamedGroup>,

    pub handshake_done: bool,
    pub ended: bool,
    pub resumed: bool,

    /// One ephemeral key pair per curve, created on first use.
    pub key_pairs: HashMap<NamedGroup, Box<dyn KeyPair>>,
    pub transcript: Transcript,

    /// Key material of the current epoch.
    pub keys: Option<KeyScheduleResult>,
    /// Protects records we send. Owns the send counter.
    pub send: Option<RecordCipher>,
    /// Opens records we receive. Owns the receive counter.
    pub recv: Option<RecordCipher>,

    pub certificates: Option<Vec<ParsedCertificate>>,
    pub offered_alpn: Vec<String>,
    pub selected_alpn: Option<String>,
    pub client_certificate_requested: bool,
    pub certificate_request_context: Vec<u8>,
    pub certificates_verified: bool,

    pub psk: Option<Psk>,
    pub key_schedule: Option<Tls13KeySchedule>,
    pub resumption_master_secret: Option<Secret>,
    pub server_key_exchange: Option<ServerKeyExchange>,
    /// TLS 1.2: server announced session_ticket support.
    pub expect_ticket: bool,
}

impl ConnectionState {
    pub fn new(host: &str, client_random: [u8; 32], session_id: Vec<u8>) -> Self {
        ConnectionState {
            host: host.to_string(),
            client_random,
            session_id,
            ..Default::default()
        }
    }

    /// The key pair for `group`, generated the first time it is asked for.
    pub fn key_pair(
        &mut self,
        provider: &CryptoProvider,
        group: NamedGroup,
    ) -> Result<&dyn KeyPair, Error> {
        if !self.key_pairs.contains_key(&group) {
            let kx = provider
                .find_kx_group(group)
                .ok_or(Error::UnsupportedCurve(group.as_u16()))?;
            let pair = kx.generate_key_pair().map_err(Error::CryptoError)?;
            self.key_pairs.insert(group, pair);
        }
        self.key_pairs
            .get(&group)
            .map(|k| k.as_ref())
            .ok_or(Error::UnsupportedCurve(group.as_u16()))
    }

    pub fn suite(&self) -> Result<CipherSuite, Error> {
        self.cipher_suite
            .ok_or_else(|| Error::UnexpectedMessage("No cipher suite negotiated".to_string()))
    }

    pub fn keys(&self) -> Result<&KeyScheduleResult, Error> {
        self.keys
            .as_ref()
            .ok_or_else(|| Error::UnexpectedMessage("No keys established".to_string()))
    }

    pub fn transcript_hash(&self, provider: &CryptoProvider) -> Result<Buf, Error> {
        let hash = self.suite()?.hash();
        Ok(self.transcript.hash(provider.hash_provider, hash))
    }

    /// Drop all key material and counters.
    pub fn clear_keys(&mut self) {
        self.keys = None;
        self.send = None;
        self.recv = None;
        self.key_pairs.clear();
        self.key_schedule = None;
        self.resumption_master_secret = None;
        self.psk = None;
        self.transcript.clear();
    }
}

impl fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionState")
            .field("host", &self.host)
            .field("version", &self.version)
            .field("cipher_suite", &self.cipher_suite)
            .field("group", &self.group)
            .field("handshake_done", &self.handshake_done)
            .field("ended", &self.ended)
            .field("transcript_len", &self.transcript.len())
            .field("send_seq", &self.send.as_ref().map(|c| c.seq()))
            .field("recv_seq", &self.recv.as_ref().map(|c| c.seq()))
            .finish()
    }
}
