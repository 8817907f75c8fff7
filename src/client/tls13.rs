use std::time::SystemTime;

use super::state::State;
use super::TlsClient;
use crate::buffer::Buf;
use crate::handler::Handler;
use crate::key_schedule::tls13::{finished_verify_data, next_traffic_secret, traffic_key_iv};
use crate::key_schedule::tls13::Tls13KeySchedule;
use crate::key_schedule::{secret, KeyScheduleResult};
use crate::message::{handshake_message, CertificateMessage, CertificateRequest};
use crate::message::{CertificateVerify, HandshakeMessage, KeyUpdate, NewSessionTicket};
use crate::message::{ServerExtensions, ServerHello};
use crate::session::SessionTicket;
use crate::types::{ContentType, HandshakeType};
use crate::util::{ct_eq, u16_prefixed};
use crate::Error;

/// ServerHello selected TLS 1.3: derive handshake keys.
pub(super) fn server_hello<H: Handler>(
    client: &mut TlsClient<H>,
    hello: &ServerHello,
) -> Result<State, Error> {
    let config = client.config.clone();
    let provider = config.crypto_provider();
    let suite = hello.cipher_suite;

    let share = hello
        .extensions
        .key_share
        .as_ref()
        .ok_or(Error::MissingKeyShare)?;
    if !config.named_groups().contains(&share.group) {
        return Err(Error::UnsupportedCurve(share.group.as_u16()));
    }

    let psk = match hello.extensions.pre_shared_key {
        None => None,
        Some(0) => {
            let psk = client.conn.psk.as_ref().ok_or_else(|| {
                Error::UnexpectedMessage("Server selected a PSK we did not offer".to_string())
            })?;
            if psk.cipher_suite != suite {
                return Err(Error::UnsupportedCipherSuite(suite.as_u16()));
            }
            Some(secret(psk.secret()))
        }
        Some(i) => {
            return Err(Error::UnexpectedMessage(format!(
                "Server selected PSK identity {}",
                i
            )))
        }
    };

    let mut shared = Buf::new();
    client
        .conn
        .key_pair(provider, share.group)?
        .shared_secret(&share.key_exchange, &mut shared)
        .map_err(Error::CryptoError)?;

    let psk_secret = psk.as_ref().map(|p| p.as_slice());
    let mut key_schedule = Tls13KeySchedule::new(provider, suite.hash(), psk_secret)?;
    let transcript_hash = client.conn.transcript_hash(provider)?;
    let keys = key_schedule.handshake(suite, &shared, &transcript_hash)?;
    shared.wipe();

    client.ensure_record_boundary()?;
    client.conn.recv = Some(keys.server_cipher(provider, suite)?);
    client.conn.send = Some(keys.client_cipher(provider, suite)?);
    client.conn.keys = Some(keys);
    client.conn.key_schedule = Some(key_schedule);
    client.conn.group = Some(share.group);
    client.conn.resumed = psk.is_some();

    debug!(
        "TLS 1.3 key exchange with {:?}{}",
        share.group,
        if psk.is_some() { ", PSK accepted" } else { "" }
    );
    Ok(State::ServerHelloRecv)
}

impl State {
    pub(super) fn tls13_message<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let resumed = client.conn.resumed;
        match (self, msg.msg_type()) {
            (State::ServerHelloRecv, HandshakeType::EncryptedExtensions) => {
                self.encrypted_extensions(client, msg)
            }
            (State::EncryptedExtensionsRecv, HandshakeType::CertificateRequest) if !resumed => {
                self.certificate_request13(client, msg)
            }
            (
                State::EncryptedExtensionsRecv | State::CertificateRequestRecv,
                HandshakeType::Certificate,
            ) if !resumed => self.certificate13(client, msg),
            (State::CertificateRecv, HandshakeType::CertificateVerify) => {
                self.certificate_verify(client, msg)
            }
            (State::EncryptedExtensionsRecv, HandshakeType::Finished) if resumed => {
                self.server_finished(client, msg)
            }
            (State::CertificateVerifyRecv, HandshakeType::Finished) => {
                self.server_finished(client, msg)
            }
            (s, t) => Err(Error::UnexpectedMessage(format!("{:?} in {:?}", t, s))),
        }
    }

    fn encrypted_extensions<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let (rest, data) = u16_prefixed(msg.body())?;
        if !rest.is_empty() {
            return Err(Error::Malformed(
                "Trailing bytes after EncryptedExtensions".to_string(),
            ));
        }
        let extensions = ServerExtensions::parse(data, &client.conn.offered_alpn, false)?;
        if extensions.alpn.is_some() {
            debug!("ALPN selected: {:?}", extensions.alpn);
            client.conn.selected_alpn = extensions.alpn;
        }
        client.conn.transcript.push(msg.raw());
        Ok(State::EncryptedExtensionsRecv)
    }

    fn certificate_request13<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let request = CertificateRequest::parse_tls13(msg.body())?;
        debug!("Server requested a client certificate");
        client.conn.client_certificate_requested = true;
        client.conn.certificate_request_context = request.context;
        client.conn.transcript.push(msg.raw());
        Ok(State::CertificateRequestRecv)
    }

    fn certificate13<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let certificate = CertificateMessage::parse_tls13(msg.body())?;
        if !certificate.context.is_empty() {
            return Err(Error::Malformed(
                "Server Certificate with request context".to_string(),
            ));
        }
        client.receive_certificates(&certificate.certificates)?;
        client.conn.transcript.push(msg.raw());
        Ok(State::CertificateRecv)
    }

    fn certificate_verify<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let verify = CertificateVerify::parse(msg.body())?;
        if verify.scheme.is_pkcs1() {
            return Err(Error::SignatureVerificationFailed(format!(
                "{:?} is not allowed in TLS 1.3",
                verify.scheme
            )));
        }
        let transcript_hash = client
            .conn
            .transcript_hash(client.config.crypto_provider())?;
        let content = CertificateVerify::tls13_signed_content(&transcript_hash);
        client.verify_server_identity(&content, verify.scheme, &verify.signature)?;
        client.conn.transcript.push(msg.raw());
        Ok(State::CertificateVerifyRecv)
    }

    fn server_finished<H: Handler>(
        self,
        client: &mut TlsClient<H>,
        msg: &HandshakeMessage,
    ) -> Result<State, Error> {
        let config = client.config.clone();
        let provider = config.crypto_provider();
        let hash = client.conn.suite()?.hash();

        let transcript_hash = client.conn.transcript_hash(provider)?;
        let expected = finished_verify_data(
            provider.hkdf_provider,
            provider.hmac_provider,
            hash,
            &client.conn.keys()?.server_secret,
            &transcript_hash,
        )?;
        if !ct_eq(&expected, msg.body()) {
            return Err(Error::FinishVerificationFailed);
        }
        client.ensure_record_boundary()?;
        client.conn.transcript.push(msg.raw());
        Ok(State::ServerFinishRecv)
    }

    /// Derive application keys and send our Finished.
    pub(super) fn send_client_finished<H: Handler>(
        self,
        client: &mut TlsClient<H>,
    ) -> Result<State, Error> {
        let config = client.config.clone();
        let provider = config.crypto_provider();
        let suite = client.conn.suite()?;
        let hash = suite.hash();

        let transcript_hash = client.conn.transcript_hash(provider)?;
        let application = client
            .conn
            .key_schedule
            .as_mut()
            .ok_or_else(|| Error::UnexpectedMessage("No key schedule".to_string()))?
            .application(suite, &transcript_hash)?;

        if client.conn.client_certificate_requested {
            let mut message = Buf::new();
            let context = client.conn.certificate_request_context.clone();
            CertificateMessage::write_empty(&mut message, Some(&context));
            client.send_handshake(&message)?;
        }

        let transcript_hash = client.conn.transcript_hash(provider)?;
        let verify_data = finished_verify_data(
            provider.hkdf_provider,
            provider.hmac_provider,
            hash,
            &client.conn.keys()?.client_secret,
            &transcript_hash,
        )?;
        let finished = handshake_message(HandshakeType::Finished, &verify_data);
        client.send_handshake(&finished)?;

        let transcript_hash = client.conn.transcript_hash(provider)?;
        let resumption_master_secret = client
            .conn
            .key_schedule
            .as_ref()
            .ok_or_else(|| Error::UnexpectedMessage("No key schedule".to_string()))?
            .resumption_master_secret(&transcript_hash)?;

        client.conn.send = Some(application.client_cipher(provider, suite)?);
        client.conn.recv = Some(application.server_cipher(provider, suite)?);
        client.conn.keys = Some(application);
        client.conn.resumption_master_secret = Some(resumption_master_secret);

        Ok(State::ClientFinishSent)
    }
}

pub(super) fn new_session_ticket<H: Handler>(
    client: &mut TlsClient<H>,
    msg: &HandshakeMessage,
) -> Result<(), Error> {
    let message = NewSessionTicket::parse_tls13(msg.body())?;
    let suite = client.conn.suite()?;
    let resumption_master_secret = client
        .conn
        .resumption_master_secret
        .as_ref()
        .ok_or_else(|| Error::UnexpectedMessage("Ticket before Finished".to_string()))?;

    debug!(
        "Session ticket of {} bytes, lifetime {}s",
        message.ticket.len(),
        message.lifetime
    );
    let ticket = SessionTicket::new(
        message,
        suite,
        resumption_master_secret,
        SystemTime::now(),
    );
    client.handler.on_session_ticket(ticket);
    Ok(())
}

pub(super) fn receive_key_update<H: Handler>(
    client: &mut TlsClient<H>,
    msg: &HandshakeMessage,
) -> Result<(), Error> {
    let update = KeyUpdate::parse(msg.body())?;
    client.ensure_record_boundary()?;
    rotate_keys(client, Direction::Receive)?;
    debug!(
        "Server updated its keys{}",
        if update.update_requested { ", updating ours" } else { "" }
    );
    if update.update_requested {
        send_key_update(client, false)?;
    }
    Ok(())
}

/// Send a KeyUpdate under the current key, then switch to the next one.
pub(super) fn send_key_update<H: Handler>(
    client: &mut TlsClient<H>,
    request_peer_update: bool,
) -> Result<(), Error> {
    let message = KeyUpdate {
        update_requested: request_peer_update,
    }
    .to_message();
    client.send_record(ContentType::Handshake, &message)?;
    rotate_keys(client, Direction::Send)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Send,
    Receive,
}

/// Move one direction to the next application traffic secret.
///
/// The new cipher starts counting records at 0.
fn rotate_keys<H: Handler>(client: &mut TlsClient<H>, direction: Direction) -> Result<(), Error> {
    let config = client.config.clone();
    let provider = config.crypto_provider();
    let hkdf = provider.hkdf_provider;
    let suite = client.conn.suite()?;
    let current = client.conn.keys()?;

    let keys = match direction {
        Direction::Send => {
            let next = next_traffic_secret(hkdf, suite.hash(), &current.client_secret)?;
            let (key, iv) = traffic_key_iv(hkdf, suite, &next)?;
            KeyScheduleResult {
                client_secret: next,
                client_enc_key: key,
                client_iv: iv,
                ..current.clone()
            }
        }
        Direction::Receive => {
            let next = next_traffic_secret(hkdf, suite.hash(), &current.server_secret)?;
            let (key, iv) = traffic_key_iv(hkdf, suite, &next)?;
            KeyScheduleResult {
                server_secret: next,
                server_enc_key: key,
                server_iv: iv,
                ..current.clone()
            }
        }
    };

    match direction {
        Direction::Send => client.conn.send = Some(keys.client_cipher(provider, suite)?),
        Direction::Receive => client.conn.recv = Some(keys.server_cipher(provider, suite)?),
    }
    trace!("Rotated {:?} keys", direction);
    client.conn.keys = Some(keys);
    Ok(())
}
