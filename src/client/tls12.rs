use super::state::State;
use super::TlsClient;
use crate::buffer::Buf;
use crate::handler::Handler;
use crate::key_schedule::tls12::{key_block, master_secret, verify_data, FinishedLabel};
use crate::message::{handshake_message, write_client_key_exchange, CertificateMessage};
use crate::message::{CertificateRequest, HandshakeMessage, NewSessionTicket};
use crate::message::{ServerHello, ServerKeyExchange};
use crate::types::{ContentType, HandshakeType};
use crate::util::ct_eq;
use crate::Error;

/// ServerHello selected TLS 1.2. Keys come after ServerKeyExchange.
pub(super) fn server_hello<H: Handler>(
    client: &mut TlsClient<H>,
    hello: &ServerHello,
) -> Result<State, Error> {
    if hello.extensions.pre_shared_key.is_some() {
        return Err(Error::UnexpectedMessage(
            "pre_shared_key in TLS 1.2 ServerHello".to_string(),
        ));
    }
    if client.conn.psk.take().is_some() {
        debug!("Server chose TLS 1.2, offered PSK unused");
    }
    client.conn.expect_ticket = hello.extensions.session_ticket;
    Ok(State::ServerHelloRecv)
}

impl State {
    pub(super) fn tls12_message<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        match (self, msg.msg_type()) {
            (State::ServerHelloRecv, HandshakeType::Certificate) => self.certificate12(client, msg),
            (State::CertificateRecv, HandshakeType::ServerKeyExchange) => {
                self.server_key_exchange(client, msg)
            }
            (State::ServerKeyExchangeRecv, HandshakeType::CertificateRequest) => {
                self.certificate_request12(client, msg)
            }
            (
                State::ServerKeyExchangeRecv | State::CertificateRequestRecv,
                HandshakeType::ServerHelloDone,
            ) => self.server_hello_done(client, msg),
            (State::AwaitingServerFinish, HandshakeType::NewSessionTicket) => {
                self.new_session_ticket12(client, msg)
            }
            (State::AwaitingServerFinish, HandshakeType::Finished) => {
                self.server_finished12(client, msg)
            }
            (s, t) => Err(Error::UnexpectedMessage(format!("{:?} in {:?}", t, s))),
        }
    }

    fn certificate12<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let certificate = CertificateMessage::parse_tls12(msg.body())?;
        client.receive_certificates(&certificate.certificates)?;
        client.conn.transcript.push(msg.raw());
        Ok(State::CertificateRecv)
    }

    fn server_key_exchange<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let ske = ServerKeyExchange::parse(msg.body())?;
        if !client.config.named_groups().contains(&ske.group) {
            return Err(Error::UnsupportedCurve(ske.group.as_u16()));
        }

        let signed = ske.signed_data(&client.conn.client_random, &client.conn.server_random);
        client.verify_server_identity(&signed, ske.scheme, &ske.signature)?;

        debug!("ECDHE with {:?}", ske.group);
        client.conn.group = Some(ske.group);
        client.conn.server_key_exchange = Some(ske);
        client.conn.transcript.push(msg.raw());
        Ok(State::ServerKeyExchangeRecv)
    }

    fn certificate_request12<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        CertificateRequest::parse_tls12(msg.body())?;
        debug!("Server requested a client certificate");
        client.conn.client_certificate_requested = true;
        client.conn.transcript.push(msg.raw());
        Ok(State::CertificateRequestRecv)
    }

    fn server_hello_done<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        if !msg.body().is_empty() {
            return Err(Error::Malformed("ServerHelloDone with a body".to_string()));
        }
        client.conn.transcript.push(msg.raw());
        Ok(State::ServerHelloDoneRecv)
    }

    /// Complete ECDHE, send ClientKeyExchange and derive the key block.
    pub(super) fn send_client_key_exchange<H: Handler>(
        self,
        client: &mut TlsClient<H>,
    ) -> Result<State, Error> {
        let config = client.config.clone();
        let provider = config.crypto_provider();
        let suite = client.conn.suite()?;

        if client.conn.client_certificate_requested {
            let mut message = Buf::new();
            CertificateMessage::write_empty(&mut message, None);
            client.send_handshake(&message)?;
        }

        let ske = client
            .conn
            .server_key_exchange
            .take()
            .ok_or_else(|| Error::UnexpectedMessage("No ServerKeyExchange".to_string()))?;

        let mut pre_master_secret = Buf::new();
        let pair = client.conn.key_pair(provider, ske.group)?;
        pair.shared_secret(&ske.public_key, &mut pre_master_secret)
            .map_err(Error::CryptoError)?;
        let mut message = Buf::new();
        write_client_key_exchange(&mut message, pair.public_key());

        client.send_handshake(&message)?;

        let master = master_secret(
            provider.hmac_provider,
            suite,
            &pre_master_secret,
            &client.conn.client_random,
            &client.conn.server_random,
        )?;
        pre_master_secret.wipe();

        let keys = key_block(
            provider.hmac_provider,
            suite,
            &master,
            &client.conn.client_random,
            &client.conn.server_random,
        )?;
        client.conn.keys = Some(keys);
        Ok(State::ClientKeyExchangeSent)
    }

    pub(super) fn send_change_cipher_spec<H: Handler>(
        self,
        client: &mut TlsClient<H>,
    ) -> Result<State, Error> {
        client.send_record(ContentType::ChangeCipherSpec, &[1])?;
        let suite = client.conn.suite()?;
        let cipher = client
            .conn
            .keys()?
            .client_cipher(client.config.crypto_provider(), suite)?;
        client.conn.send = Some(cipher);
        Ok(State::ChangeCipherSpecSent)
    }

    pub(super) fn send_finished12<H: Handler>(
        self,
        client: &mut TlsClient<H>,
    ) -> Result<State, Error> {
        let verify = finished(client, FinishedLabel::Client)?;
        let message = handshake_message(HandshakeType::Finished, &verify);
        client.send_handshake(&message)?;
        Ok(State::FinishSent)
    }

    fn new_session_ticket12<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        if !client.conn.expect_ticket || client.conn.recv.is_some() {
            return Err(Error::UnexpectedMessage(
                "Unexpected TLS 1.2 NewSessionTicket".to_string(),
            ));
        }
        let ticket = NewSessionTicket::parse_tls12(msg.body())?;
        debug!("Ignoring TLS 1.2 session ticket of {} bytes", ticket.ticket.len());
        client.conn.transcript.push(msg.raw());
        Ok(self)
    }

    fn server_finished12<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        if client.conn.recv.is_none() {
            return Err(Error::UnexpectedMessage(
                "Finished before ChangeCipherSpec".to_string(),
            ));
        }
        let expected = finished(client, FinishedLabel::Server)?;
        if !ct_eq(&expected, msg.body()) {
            return Err(Error::FinishVerificationFailed);
        }
        client.conn.transcript.push(msg.raw());
        Ok(client.handshake_complete())
    }
}

/// verify_data over the transcript so far.
fn finished<H: Handler>(client: &TlsClient<H>, label: FinishedLabel) -> Result<Buf, Error> {
    let provider = client.config.crypto_provider();
    let suite = client.conn.suite()?;
    let hash = suite.descriptor().prf_hash();
    let handshake_hash = client.conn.transcript.hash(provider.hash_provider, hash);
    verify_data(
        provider.hmac_provider,
        suite,
        &client.conn.keys()?.master_secret,
        label,
        &handshake_hash,
    )
}
