// TLS client handshake flows.
//
// TLS 1.3 (RFC 8446):
//
// 1. Client sends ClientHello with one key share per configured group and,
//    when resuming, a PSK whose binder covers the hello itself.
// 2. Server sends ServerHello (plaintext). Both sides derive handshake keys.
// 3. Server sends EncryptedExtensions, optionally CertificateRequest, then
//    Certificate and CertificateVerify (skipped when the PSK was accepted),
//    and Finished. All encrypted.
// 4. Client derives application keys, sends an empty Certificate if one was
//    requested, then Finished under its handshake key.
// 5. Application data, NewSessionTicket and KeyUpdate follow.
//
// TLS 1.2 (RFC 5246, RFC 8422):
//
// 1. ClientHello as above.
// 2. Server sends ServerHello, Certificate, ServerKeyExchange, optionally
//    CertificateRequest, and ServerHelloDone.
// 3. Client sends ClientKeyExchange, ChangeCipherSpec and Finished.
// 4. Server sends optionally NewSessionTicket, then ChangeCipherSpec and
//    Finished.
//
// This is a sans-IO client. Bytes come in through handle_received_bytes and
// go out through Handler::on_write.

mod state;
mod tls12;
mod tls13;

use std::sync::Arc;
use std::time::SystemTime;

use self::state::{ConnectionState, State};
use crate::buffer::Buf;
use crate::certificate::{verify_certificate_chain, ParsedCertificate};
use crate::cipher_suite::CipherSuite;
use crate::handler::Handler;
use crate::key_schedule::KeyScheduleResult;
use crate::message::{Alert, ClientHelloBuilder, HandshakeBuffer, HandshakeMessage, ServerHello};
use crate::record::{PacketContext, RecordStream, TlsRecord, MAX_PLAINTEXT_LEN};
use crate::session::{Psk, SessionTicket};
use crate::types::{AlertDescription, ContentType, HandshakeType, NamedGroup};
use crate::types::{ProtocolVersion, SignatureScheme};
use crate::{Config, Error};

/// Last 8 bytes of a TLS 1.3 capable server's random when it negotiates
/// TLS 1.2 (RFC 8446 4.1.3).
const DOWNGRADE_TLS12: [u8; 8] = [0x44, 0x4F, 0x57, 0x4E, 0x47, 0x52, 0x44, 0x01];

/// What was negotiated.
///
/// Fields fill in as the handshake progresses and are complete when
/// [`Handler::on_handshake`] is called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub version: Option<ProtocolVersion>,
    pub cipher_suite: Option<CipherSuite>,
    /// Key exchange group.
    pub group: Option<NamedGroup>,
    pub alpn: Option<String>,
    /// Whether a PSK from an earlier session was accepted.
    pub resumed: bool,
}

/// Per-connection input to [`TlsClient::start_handshake`].
#[derive(Debug, Clone)]
pub struct HandshakeOptions {
    /// Server name, sent as SNI and checked against the certificate.
    pub host: String,
    /// Resumption PSK from [`TlsClient::psk_from_ticket`].
    pub psk: Option<Psk>,
    /// ClientHello.random, generated when `None`.
    pub random: Option<[u8; 32]>,
    /// Legacy session id, 32 random bytes when `None`.
    pub session_id: Option<Vec<u8>>,
}

impl HandshakeOptions {
    pub fn new(host: impl Into<String>) -> Self {
        HandshakeOptions {
            host: host.into(),
            psk: None,
            random: None,
            session_id: None,
        }
    }

    pub fn with_psk(mut self, psk: Psk) -> Self {
        self.psk = Some(psk);
        self
    }
}

/// TLS 1.2/1.3 client for one connection.
pub struct TlsClient<H> {
    config: Arc<Config>,
    handler: H,

    /// Current handshake state.
    state: State,

    /// Created when the handshake starts.
    conn: ConnectionState,

    /// Reassembles records from the byte stream.
    stream: RecordStream,

    /// Reassembles handshake messages from records.
    handshake: HandshakeBuffer,
}

impl<H: Handler> TlsClient<H> {
    pub fn new(config: Arc<Config>, handler: H) -> Self {
        TlsClient {
            config,
            handler,
            state: State::Init,
            conn: ConnectionState::default(),
            stream: RecordStream::new(),
            handshake: HandshakeBuffer::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Send the ClientHello.
    pub fn start_handshake(&mut self, options: HandshakeOptions) -> Result<(), Error> {
        match self.state {
            State::Init => {}
            State::Ended => return Err(Error::ConnectionEnded),
            _ => {
                return Err(Error::UnexpectedMessage(
                    "Handshake already started".to_string(),
                ))
            }
        }
        let res = self.send_client_hello(options);
        self.check(res)
    }

    /// Feed bytes read from the transport.
    ///
    /// Partial records are buffered until the rest arrives. Any error ends the
    /// connection before it is returned.
    pub fn handle_received_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if self.conn.ended {
            warn!("Ignoring {} bytes received after end", bytes.len());
            return Ok(());
        }

        let mut records = Vec::new();
        let framing = self.stream.feed(bytes, |record| {
            records.push(record);
            Ok(())
        });

        let mut res = Ok(());
        for record in records {
            if let Err(e) = self.handle_record(record) {
                res = Err(e);
                break;
            }
        }
        let res = res.and(framing);
        self.check(res)
    }

    /// Send application data, split into records of at most
    /// [`Config::max_record_plaintext`] bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.conn.ended {
            return Err(Error::ConnectionEnded);
        }
        if !self.conn.handshake_done {
            return Err(Error::HandshakeNotDone);
        }
        let max = self.config.max_record_plaintext();
        for chunk in data.chunks(max) {
            let res = self.send_record(ContentType::ApplicationData, chunk);
            self.check(res)?;
        }
        Ok(())
    }

    /// Rotate our sending keys with a KeyUpdate (TLS 1.3).
    ///
    /// With `request_peer_update` the server is asked to rotate its keys too.
    /// Only the send counter restarts here; the receive counter restarts when
    /// the server's KeyUpdate arrives.
    pub fn update_traffic_keys(&mut self, request_peer_update: bool) -> Result<(), Error> {
        if self.conn.ended {
            return Err(Error::ConnectionEnded);
        }
        if !self.conn.handshake_done {
            return Err(Error::HandshakeNotDone);
        }
        if self.conn.version != Some(ProtocolVersion::TLS1_3) {
            return Err(Error::UnexpectedMessage(
                "KeyUpdate requires TLS 1.3".to_string(),
            ));
        }
        let res = tls13::send_key_update(self, request_peer_update);
        self.check(res)
    }

    /// Resumption PSK for a ticket this or an earlier connection received.
    pub fn psk_from_ticket(&self, ticket: &SessionTicket) -> Result<Psk, Error> {
        Psk::from_ticket(self.config.crypto_provider(), ticket, SystemTime::now())
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            version: self.conn.version,
            cipher_suite: self.conn.cipher_suite,
            group: self.conn.group,
            alpn: self.conn.selected_alpn.clone(),
            resumed: self.conn.resumed,
        }
    }

    pub fn is_handshake_done(&self) -> bool {
        self.conn.handshake_done
    }

    pub fn is_ended(&self) -> bool {
        self.conn.ended
    }

    /// Key material of the current epoch.
    pub fn keys(&self) -> Option<&KeyScheduleResult> {
        self.conn.keys.as_ref()
    }

    /// Records sent and received under the current keys.
    pub fn record_counts(&self) -> (u64, u64) {
        (
            self.conn.send.as_ref().map(|c| c.seq()).unwrap_or(0),
            self.conn.recv.as_ref().map(|c| c.seq()).unwrap_or(0),
        )
    }

    /// Server certificates, leaf first.
    pub fn certificates(&self) -> Option<&[ParsedCertificate]> {
        self.conn.certificates.as_deref()
    }

    /// Whether the server's signature and (unless disabled) chain checked out.
    pub fn certificates_verified(&self) -> bool {
        self.conn.certificates_verified
    }

    /// End the connection.
    ///
    /// Sends close_notify, or for an error the matching fatal alert, then
    /// drops all key material and calls [`Handler::on_tls_end`]. Calling it
    /// again does nothing.
    pub fn end(&mut self, error: Option<Error>) {
        if self.conn.ended {
            trace!("end() on ended connection");
            return;
        }
        match &error {
            Some(e) => debug!("Ending connection: {}", e),
            None => debug!("Closing connection"),
        }

        let alert = match &error {
            None => Some(Alert::close_notify()),
            Some(e) => e.alert_description().map(Alert::fatal),
        };
        if let Some(alert) = alert {
            if self.state != State::Init {
                if let Err(e) = self.send_record(ContentType::Alert, &alert.to_bytes()) {
                    debug!("Failed to send {:?}: {}", alert.description, e);
                }
            }
        }

        self.conn.ended = true;
        self.conn.clear_keys();
        self.stream.reset();
        self.handshake.clear();

        trace!("{:?} -> {:?}", self.state, State::Ended);
        self.state = State::Ended;

        self.handler.on_tls_end(error.as_ref());
    }

    /// End the connection on error, passing the result through.
    fn check<T>(&mut self, res: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &res {
            self.end(Some(e.clone()));
        }
        res
    }

    fn send_client_hello(&mut self, options: HandshakeOptions) -> Result<(), Error> {
        let config = self.config.clone();
        let provider = config.crypto_provider();

        if options.host.is_empty() {
            return Err(Error::ConfigError("Empty host".to_string()));
        }

        let random = match options.random {
            Some(r) => r,
            None => {
                let mut r = [0u8; 32];
                provider.secure_random.fill(&mut r).map_err(Error::CryptoError)?;
                r
            }
        };
        let session_id = match options.session_id {
            Some(id) if id.len() <= 32 => id,
            Some(id) => {
                return Err(Error::ConfigError(format!(
                    "Session id of {} bytes",
                    id.len()
                )))
            }
            None => provider
                .random_bytes(32)
                .map_err(Error::CryptoError)?
                .into_vec(),
        };

        let suites = config.offered_suites();
        let psk = match options.psk {
            Some(_) if !config.offers(ProtocolVersion::TLS1_3) => {
                return Err(Error::ConfigError("PSK requires TLS 1.3".to_string()));
            }
            Some(psk) if !suites.contains(&psk.cipher_suite) => {
                return Err(Error::ConfigError(format!(
                    "PSK cipher suite {} is not offered",
                    psk.cipher_suite
                )));
            }
            psk => psk,
        };

        self.conn = ConnectionState::new(&options.host, random, session_id);
        self.conn.offered_alpn = config.alpn_protocols().to_vec();

        let mut shares = Vec::with_capacity(config.named_groups().len());
        for &group in config.named_groups() {
            let pair = self.conn.key_pair(provider, group)?;
            shares.push((group, pair.public_key().to_vec()));
        }

        let mut builder = ClientHelloBuilder::new()
            .host(&options.host)
            .random(Some(random))
            .session_id(Some(self.conn.session_id.clone()))
            .cipher_suites(&suites)
            .versions(config.versions())
            .signature_schemes(config.signature_schemes())
            .alpn(config.alpn_protocols())
            .psk(psk.as_ref().map(|p| p.offer()));
        for (group, public_key) in &shares {
            builder = builder.key_share(*group, public_key);
        }

        let pending = builder.build(provider.secure_random)?;
        let binder = match &psk {
            Some(p) => Some(p.binder(provider, pending.binder_prefix())?),
            None => None,
        };
        let hello = pending.finish(binder.as_deref())?;

        if psk.is_some() {
            debug!("Offering PSK for resumption");
        }
        self.conn.psk = psk;
        self.conn.transcript.push(hello.raw());

        // Record version 0x0301 in the first flight for middlebox compatibility.
        let record = TlsRecord::new(
            ContentType::Handshake,
            ProtocolVersion::TLS1_0,
            Buf::from_slice(hello.raw()),
        );
        self.handler.on_write(&record.to_bytes());

        trace!("{:?} -> {:?}", self.state, State::HelloSent);
        self.state = State::HelloSent;
        Ok(())
    }

    fn handle_record(&mut self, record: TlsRecord) -> Result<(), Error> {
        if self.conn.ended {
            warn!("Ignoring {:?} record after end", record.content_type());
            return Ok(());
        }
        if self.state == State::Init {
            return Err(Error::UnexpectedMessage(
                "Record before handshake start".to_string(),
            ));
        }

        if record.content_type() == ContentType::ChangeCipherSpec {
            self.handler.on_read(&record, &PacketContext::Plaintext);
            return self.handle_change_cipher_spec(&record);
        }

        let (content_type, plaintext) = match self.conn.recv.as_mut() {
            Some(cipher) => {
                let opened = cipher.open(&record)?;
                let ctx = cipher.packet_context(&record, &opened);
                self.handler.on_read(&record, &ctx);
                (opened.content_type, opened.plaintext)
            }
            None => {
                self.handler.on_read(&record, &PacketContext::Plaintext);
                (record.content_type(), record.content)
            }
        };

        match content_type {
            ContentType::Handshake => {
                if plaintext.is_empty() {
                    return Err(Error::Malformed("Empty handshake record".to_string()));
                }
                self.handshake.push(&plaintext);
                self.make_progress()
            }
            ContentType::Alert => self.handle_alert(&plaintext),
            ContentType::ApplicationData => {
                if !self.conn.handshake_done {
                    return Err(Error::UnexpectedMessage(
                        "Application data before handshake completed".to_string(),
                    ));
                }
                self.handler.on_application_data(&plaintext);
                Ok(())
            }
            t => Err(Error::UnexpectedMessage(format!("Record of type {:?}", t))),
        }
    }

    fn handle_change_cipher_spec(&mut self, record: &TlsRecord) -> Result<(), Error> {
        if record.content.len() != 1 || record.content[0] != 1 {
            return Err(Error::Malformed("Bad ChangeCipherSpec".to_string()));
        }
        match self.conn.version {
            Some(ProtocolVersion::TLS1_3) if !self.conn.handshake_done => {
                trace!("Ignoring ChangeCipherSpec");
                Ok(())
            }
            Some(ProtocolVersion::TLS1_2)
                if self.state == State::AwaitingServerFinish && self.conn.recv.is_none() =>
            {
                self.ensure_record_boundary()?;
                let suite = self.conn.suite()?;
                let cipher = self
                    .conn
                    .keys()?
                    .server_cipher(self.config.crypto_provider(), suite)?;
                self.conn.recv = Some(cipher);
                debug!("Server ChangeCipherSpec, receiving encrypted");
                Ok(())
            }
            _ => Err(Error::UnexpectedMessage(format!(
                "ChangeCipherSpec in {:?}",
                self.state
            ))),
        }
    }

    fn handle_alert(&mut self, content: &[u8]) -> Result<(), Error> {
        let alert = Alert::parse(content)?;
        if !alert.is_terminal() {
            warn!("Ignoring warning alert {:?}", alert.description);
            return Ok(());
        }
        if alert.description == AlertDescription::CloseNotify {
            debug!("Server sent close_notify");
            self.end(None);
            return Ok(());
        }
        Err(Error::PeerAlert(alert.description))
    }

    fn make_progress(&mut self) -> Result<(), Error> {
        loop {
            if self.conn.ended {
                break;
            }
            let prev_state = self.state;

            let new_state = if prev_state.awaits_message() {
                let Some(msg) = self.handshake.next_message()? else {
                    break;
                };
                trace!("Received {:?} in {:?}", msg.msg_type(), prev_state);
                prev_state.handle_message(self, msg)?
            } else {
                prev_state.make_progress(self)?
            };

            if prev_state != new_state {
                trace!("{:?} -> {:?}", prev_state, new_state);
                self.state = new_state;
            }
        }
        Ok(())
    }

    /// Send a handshake message and add it to the transcript.
    fn send_handshake(&mut self, message: &[u8]) -> Result<(), Error> {
        self.conn.transcript.push(message);
        for chunk in message.chunks(MAX_PLAINTEXT_LEN) {
            self.send_record(ContentType::Handshake, chunk)?;
        }
        Ok(())
    }

    /// Send one record, encrypted once we have sending keys.
    fn send_record(&mut self, content_type: ContentType, data: &[u8]) -> Result<(), Error> {
        let record = match self.conn.send.as_mut() {
            Some(cipher) => cipher.seal(content_type, data)?,
            None => TlsRecord::new(content_type, ProtocolVersion::TLS1_2, Buf::from_slice(data)),
        };
        self.handler.on_write(&record.to_bytes());
        Ok(())
    }

    /// A key change must fall on a record boundary.
    fn ensure_record_boundary(&self) -> Result<(), Error> {
        if self.handshake.is_empty() {
            Ok(())
        } else {
            Err(Error::UnexpectedMessage(
                "Handshake data spans a key change".to_string(),
            ))
        }
    }

    /// Check the server's signature over `signed` with the leaf key, then the
    /// chain and hostname. Only then are the certificates marked verified.
    ///
    /// Used for the TLS 1.2 ServerKeyExchange and TLS 1.3 CertificateVerify.
    fn verify_server_identity(
        &mut self,
        signed: &[u8],
        scheme: SignatureScheme,
        signature: &[u8],
    ) -> Result<(), Error> {
        if !self.config.signature_schemes().contains(&scheme) {
            return Err(Error::SignatureVerificationFailed(format!(
                "Scheme {:?} was not offered",
                scheme
            )));
        }
        let provider = self.config.crypto_provider();
        let certs = self
            .conn
            .certificates
            .as_deref()
            .ok_or_else(|| Error::CertificateError("No server certificate".to_string()))?;
        let leaf = certs
            .first()
            .ok_or_else(|| Error::CertificateError("Empty certificate chain".to_string()))?;

        provider
            .signature_verification
            .verify_signature(leaf.public_key_der(), signed, signature, scheme)
            .map_err(Error::SignatureVerificationFailed)?;

        if self.config.verify_certificates() {
            verify_certificate_chain(
                certs,
                &self.conn.host,
                self.config.roots(),
                provider.signature_verification,
                SystemTime::now(),
            )?;
        } else {
            debug!("Certificate chain verification disabled");
        }

        self.conn.certificates_verified = true;
        Ok(())
    }

    /// Parse certificates and hand them to the handler.
    fn receive_certificates(&mut self, ders: &[Vec<u8>]) -> Result<(), Error> {
        if ders.is_empty() {
            return Err(Error::CertificateError(
                "Server sent no certificate".to_string(),
            ));
        }
        let certs = ders
            .iter()
            .map(|der| ParsedCertificate::parse(der))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Server certificate {} with {} more",
            certs[0].subject(),
            certs.len() - 1
        );
        self.handler.on_recv_certificates(&certs)?;
        self.conn.certificates = Some(certs);
        Ok(())
    }

    fn handshake_complete(&mut self) -> State {
        self.conn.handshake_done = true;
        let metadata = self.metadata();
        info!(
            "Handshake done with {}: {:?} {:?}{}",
            self.conn.host,
            metadata.version,
            metadata.cipher_suite,
            if metadata.resumed { " (resumed)" } else { "" }
        );
        self.handler.on_handshake(&metadata);
        State::Done
    }
}

impl State {
    fn handle_message<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: HandshakeMessage,
    ) -> Result<State, Error> {
        match (self, msg.msg_type()) {
            (State::HelloSent, HandshakeType::ServerHello) => self.server_hello(client, &msg),
            (State::HelloSent, t) => Err(Error::UnexpectedMessage(format!(
                "{:?} instead of ServerHello",
                t
            ))),
            (State::Done, _) => self.post_handshake(client, &msg),
            _ => match client.conn.version {
                Some(ProtocolVersion::TLS1_3) => self.tls13_message(client, &msg),
                Some(ProtocolVersion::TLS1_2) => self.tls12_message(client, &msg),
                _ => Err(Error::UnexpectedMessage(format!(
                    "{:?} in {:?}",
                    msg.msg_type(),
                    self
                ))),
            },
        }
    }

    /// Advance a state that sends without waiting for input.
    fn make_progress<H: Handler>(self, client: &mut TlsClient<H>) -> Result<State, Error> {
        match self {
            State::ServerHelloDoneRecv => self.send_client_key_exchange(client),
            State::ClientKeyExchangeSent => self.send_change_cipher_spec(client),
            State::ChangeCipherSpecSent => self.send_finished12(client),
            State::FinishSent => Ok(State::AwaitingServerFinish),
            State::ServerFinishRecv => self.send_client_finished(client),
            State::ClientFinishSent => Ok(client.handshake_complete()),
            s => Err(Error::UnexpectedMessage(format!(
                "No progress possible in {:?}",
                s
            ))),
        }
    }

    fn server_hello<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let hello = ServerHello::parse(msg.body(), &client.conn.offered_alpn)?;
        let version = hello.version();
        let suite = hello.cipher_suite;

        if !client.config.offers(version) {
            return Err(Error::UnsupportedVersion(version.as_u16()));
        }
        if !client.config.offered_suites().contains(&suite) {
            return Err(Error::UnsupportedCipherSuite(suite.as_u16()));
        }
        if version == ProtocolVersion::TLS1_2
            && client.config.offers(ProtocolVersion::TLS1_3)
            && hello.random[24..] == DOWNGRADE_TLS12
        {
            return Err(Error::UnsupportedVersion(version.as_u16()));
        }
        if let Some(info) = &hello.extensions.renegotiation_info {
            if !info.is_empty() {
                return Err(Error::Malformed(
                    "Non-empty renegotiation_info".to_string(),
                ));
            }
        }

        debug!("Server selected {} {}", version, suite);
        client.conn.server_random = hello.random;
        client.conn.version = Some(version);
        client.conn.cipher_suite = Some(suite);
        if hello.extensions.alpn.is_some() {
            client.conn.selected_alpn = hello.extensions.alpn.clone();
        }
        client.conn.transcript.push(msg.raw());

        match version {
            ProtocolVersion::TLS1_3 => tls13::server_hello(client, &hello),
            _ => tls12::server_hello(client, &hello),
        }
    }

    fn post_handshake<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let version = client.conn.version;
        match msg.msg_type() {
            HandshakeType::NewSessionTicket if version == Some(ProtocolVersion::TLS1_3) => {
                tls13::new_session_ticket(client, msg)?;
            }
            HandshakeType::KeyUpdate if version == Some(ProtocolVersion::TLS1_3) => {
                tls13::receive_key_update(client, msg)?;
            }
            HandshakeType::HelloRequest if version == Some(ProtocolVersion::TLS1_2) => {
                warn!("Ignoring HelloRequest, renegotiation is not supported");
            }
            HandshakeType::Unknown(t) => {
                warn!("Ignoring unknown handshake message {} after handshake", t);
            }
            t => {
                return Err(Error::UnexpectedMessage(format!(
                    "{:?} after handshake",
                    t
                )))
            }
        }
        Ok(State::Done)
    }
}

#[cfg(all(test, feature = "rust-crypto"))]
mod tests {
    use super::*;
    use crate::message::{handshake_message, HRR_RANDOM};

    #[derive(Default)]
    struct Recorder {
        written: Vec<u8>,
        ended: Vec<Option<Error>>,
        reads: usize,
    }

    impl Handler for Recorder {
        fn on_write(&mut self, data: &[u8]) {
            self.written.extend_from_slice(data);
        }

        fn on_tls_end(&mut self, error: Option<&Error>) {
            self.ended.push(error.cloned());
        }

        fn on_read(&mut self, _record: &TlsRecord, _ctx: &PacketContext<'_>) {
            self.reads += 1;
        }
    }

    fn config() -> Arc<Config> {
        Arc::new(
            Config::builder()
                .use_system_roots(false)
                .cipher_suites(&[
                    CipherSuite::TLS13_AES_128_GCM_SHA256,
                    CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256,
                ])
                .build()
                .unwrap(),
        )
    }

    fn started() -> TlsClient<Recorder> {
        let _ = env_logger::try_init();
        let mut client = TlsClient::new(config(), Recorder::default());
        client
            .start_handshake(HandshakeOptions::new("example.com"))
            .unwrap();
        client
    }

    fn record(content_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = vec![content_type, 3, 3];
        out.extend_from_slice(&(body.len() as u16).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn server_hello(random: [u8; 32], suite: u16, extensions: &[u8]) -> Vec<u8> {
        let mut body = vec![3, 3];
        body.extend_from_slice(&random);
        body.push(0);
        body.extend_from_slice(&suite.to_be_bytes());
        body.push(0);
        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(extensions);
        record(22, &handshake_message(HandshakeType::ServerHello, &body))
    }

    const TLS13_EXTENSIONS: &[u8] = &[
        0x00, 0x2b, 0x00, 0x02, 0x03, 0x04, // supported_versions: TLS 1.3
        0x00, 0x33, 0x00, 0x06, 0x00, 0x1d, 0x00, 0x02, 0xaa, 0xbb, // key_share
    ];

    #[test]
    fn client_hello_is_written() {
        let client = started();
        let w = &client.handler().written;
        assert_eq!(&w[..3], &[22, 3, 1]);
        assert_eq!(w[5], 1);
        let len = u16::from_be_bytes([w[3], w[4]]) as usize;
        assert_eq!(w.len(), 5 + len);
        assert!(w.windows(11).any(|x| x == b"example.com"));
        assert!(!client.is_handshake_done());
        assert_eq!(client.metadata(), Metadata::default());
    }

    #[test]
    fn write_before_handshake_done() {
        let mut client = started();
        assert_eq!(client.write(b"hello"), Err(Error::HandshakeNotDone));
        assert!(!client.is_ended());
        assert!(client.handler().ended.is_empty());
    }

    #[test]
    fn end_twice_calls_back_once() {
        let mut client = started();
        let before = client.handler().written.len();
        client.end(None);
        client.end(Some(Error::ConnectionEnded));

        let h = client.handler();
        assert_eq!(h.ended, vec![None]);
        assert_eq!(&h.written[before..], &[21, 3, 3, 0, 2, 1, 0]);
        assert!(client.keys().is_none());
        assert_eq!(client.record_counts(), (0, 0));

        // Input after end is ignored.
        assert_eq!(client.handle_received_bytes(&record(21, &[2, 40])), Ok(()));
        assert_eq!(client.handler().reads, 0);
        assert_eq!(client.write(b"x"), Err(Error::ConnectionEnded));
        assert_eq!(
            client.start_handshake(HandshakeOptions::new("example.com")),
            Err(Error::ConnectionEnded)
        );
    }

    #[test]
    fn end_before_start() {
        let mut client = TlsClient::new(config(), Recorder::default());
        client.end(None);
        client.end(None);
        assert_eq!(client.handler().ended, vec![None]);
        assert!(client.handler().written.is_empty());
    }

    #[test]
    fn hello_retry_request_is_fatal() {
        let mut client = started();
        let before = client.handler().written.len();
        let hrr = server_hello(
            HRR_RANDOM,
            0x1301,
            &[
                0x00, 0x2b, 0x00, 0x02, 0x03, 0x04, // supported_versions
                0x00, 0x33, 0x00, 0x02, 0x00, 0x17, // key_share: P-256
            ],
        );
        assert_eq!(
            client.handle_received_bytes(&hrr),
            Err(Error::HelloRetryRequest)
        );
        let h = client.handler();
        assert_eq!(h.ended, vec![Some(Error::HelloRetryRequest)]);
        // illegal_parameter, in plaintext since no keys were established
        assert_eq!(&h.written[before..], &[21, 3, 3, 0, 2, 2, 47]);
    }

    #[test]
    fn suite_not_offered() {
        let mut client = started();
        let sh = server_hello([7; 32], 0x1302, TLS13_EXTENSIONS);
        assert_eq!(
            client.handle_received_bytes(&sh),
            Err(Error::UnsupportedCipherSuite(0x1302))
        );
        assert!(client.is_ended());
    }

    #[test]
    fn downgrade_sentinel() {
        let mut client = started();
        let mut random = [9; 32];
        random[24..].copy_from_slice(&DOWNGRADE_TLS12);
        let sh = server_hello(random, 0xc02b, &[]);
        assert_eq!(
            client.handle_received_bytes(&sh),
            Err(Error::UnsupportedVersion(0x0303))
        );
    }

    #[test]
    fn tls12_server_hello_split_across_reads() {
        let mut client = started();
        let sh = server_hello([9; 32], 0xc02b, &[0xff, 0x01, 0x00, 0x01, 0x00]);
        for b in &sh {
            client.handle_received_bytes(&[*b]).unwrap();
        }
        assert_eq!(client.state, State::ServerHelloRecv);
        let m = client.metadata();
        assert_eq!(m.version, Some(ProtocolVersion::TLS1_2));
        assert_eq!(
            m.cipher_suite,
            Some(CipherSuite::ECDHE_ECDSA_AES128_GCM_SHA256)
        );
        assert_eq!(client.handler().reads, 1);
    }

    #[test]
    fn renegotiation_info_must_be_empty() {
        let mut client = started();
        let sh = server_hello([9; 32], 0xc02b, &[0xff, 0x01, 0x00, 0x02, 0x01, 0x00]);
        assert!(matches!(
            client.handle_received_bytes(&sh),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn alerts() {
        let mut client = started();
        let before = client.handler().written.len();

        // unrecognized_name warning is only logged
        client.handle_received_bytes(&record(21, &[1, 112])).unwrap();
        assert!(!client.is_ended());

        let res = client.handle_received_bytes(&record(21, &[2, 40]));
        assert_eq!(
            res,
            Err(Error::PeerAlert(AlertDescription::HandshakeFailure))
        );
        let h = client.handler();
        assert_eq!(
            h.ended,
            vec![Some(Error::PeerAlert(AlertDescription::HandshakeFailure))]
        );
        // No alert is sent in reply to a fatal one.
        assert_eq!(h.written.len(), before);
    }

    #[test]
    fn close_notify_ends_cleanly() {
        let mut client = started();
        client.handle_received_bytes(&record(21, &[1, 0])).unwrap();
        assert_eq!(client.handler().ended, vec![None]);
    }

    #[test]
    fn application_data_before_handshake() {
        let mut client = started();
        let res = client.handle_received_bytes(&record(23, b"early"));
        assert!(matches!(res, Err(Error::UnexpectedMessage(_))));
    }

    #[test]
    fn record_before_start() {
        let mut client = TlsClient::new(config(), Recorder::default());
        let res = client.handle_received_bytes(&record(22, &[2, 0, 0, 0]));
        assert!(matches!(res, Err(Error::UnexpectedMessage(_))));
        assert_eq!(client.handler().ended.len(), 1);
    }

    #[test]
    fn psk_needs_tls13() {
        let config = Arc::new(
            Config::builder()
                .use_system_roots(false)
                .versions(&[ProtocolVersion::TLS1_2])
                .build()
                .unwrap(),
        );
        let body = [0, 0, 0, 60, 0, 0, 0, 1, 0, 0, 1, 7, 0, 0];
        let nst = crate::message::NewSessionTicket::parse_tls13(&body).unwrap();
        let ticket = SessionTicket::new(
            nst,
            CipherSuite::TLS13_AES_128_GCM_SHA256,
            &[1; 32],
            SystemTime::now(),
        );
        let psk = Psk::from_ticket(config.crypto_provider(), &ticket, SystemTime::now()).unwrap();
        let mut client = TlsClient::new(config, Recorder::default());
        let res = client.start_handshake(HandshakeOptions::new("example.com").with_psk(psk));
        assert!(matches!(res, Err(Error::ConfigError(_))));
    }
}
