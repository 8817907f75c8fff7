//! Handshake message framing and the individual message codecs.

mod alert;
mod certificate;
mod client_hello;
mod extension;
mod key_update;
mod new_session_ticket;
mod server_hello;
mod server_key_exchange;

pub use alert::Alert;
pub use certificate::{CertificateMessage, CertificateRequest, CertificateVerify};
pub use client_hello::{ClientHello, ClientHelloBuilder, PendingClientHello, PskOffer};
pub use extension::{Extension, ExtensionType, KeyShareEntry, ServerExtensions};
pub use key_update::KeyUpdate;
pub use new_session_ticket::NewSessionTicket;
pub use server_hello::{ServerHello, HRR_RANDOM};
pub use server_key_exchange::{write_client_key_exchange, ServerKeyExchange};

use nom::number::complete::{be_u24, be_u8};

use crate::buffer::Buf;
use crate::types::HandshakeType;
use crate::util::with_u24_len;
use crate::Error;

/// Handshake header: `type(1) || length(3)`.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

/// Largest handshake message we are willing to buffer.
pub const MAX_HANDSHAKE_LEN: usize = 1 << 18;

/// A complete handshake message including its header.
#[derive(Clone, PartialEq, Eq)]
pub struct HandshakeMessage {
    raw: Buf,
}

impl HandshakeMessage {
    pub fn msg_type(&self) -> HandshakeType {
        HandshakeType::from_u8(self.raw[0])
    }

    /// Message body without the 4 byte header.
    pub fn body(&self) -> &[u8] {
        &self.raw[HANDSHAKE_HEADER_LEN..]
    }

    /// Header and body, as hashed into the transcript.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl std::fmt::Debug for HandshakeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeMessage")
            .field("msg_type", &self.msg_type())
            .field("len", &self.body().len())
            .finish()
    }
}

/// Reassembles handshake messages from handshake record fragments.
///
/// A message may span several records and one record may carry several
/// messages.
#[derive(Debug, Default)]
pub struct HandshakeBuffer {
    pending: Buf,
}

impl HandshakeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &[u8]) {
        self.pending.extend_from_slice(fragment);
    }

    /// Take the next complete message, if any.
    pub fn next_message(&mut self) -> Result<Option<HandshakeMessage>, Error> {
        if self.pending.len() < HANDSHAKE_HEADER_LEN {
            return Ok(None);
        }
        let (rest, _) = be_u8(&self.pending[..])?;
        let (_, len) = be_u24(rest)?;
        let len = len as usize;
        if len > MAX_HANDSHAKE_LEN {
            return Err(Error::Malformed(format!("Handshake message too large: {}", len)));
        }

        let total = HANDSHAKE_HEADER_LEN + len;
        if self.pending.len() < total {
            return Ok(None);
        }

        let raw = Buf::from_slice(&self.pending[..total]);
        self.pending.drain_front(total);
        Ok(Some(HandshakeMessage { raw }))
    }

    /// Whether a partial message is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Write a handshake message, the closure writes the body.
pub fn write_handshake(out: &mut Buf, msg_type: HandshakeType, f: impl FnOnce(&mut Buf)) {
    out.push(msg_type.as_u8());
    with_u24_len(out, f);
}

/// A complete handshake message as a new buffer.
pub fn handshake_message(msg_type: HandshakeType, body: &[u8]) -> Buf {
    let mut out = Buf::with_capacity(HANDSHAKE_HEADER_LEN + body.len());
    write_handshake(&mut out, msg_type, |out| out.extend_from_slice(body));
    out
}
