use crate::certificate::ParsedCertificate;
use crate::client::Metadata;
use crate::record::{PacketContext, TlsRecord};
use crate::session::SessionTicket;
use crate::Error;

/// Callbacks from a [`TlsClient`](crate::TlsClient).
///
/// The client does no I/O itself. Every byte it wants on the wire goes to
/// [`on_write`](Handler::on_write), everything else is a notification with a
/// default that does nothing.
///
/// Callbacks run synchronously inside the client call that caused them, in
/// the order the records arrived.
pub trait Handler {
    /// Bytes to send to the server, one or more complete records.
    fn on_write(&mut self, data: &[u8]);

    /// The handshake completed.
    fn on_handshake(&mut self, metadata: &Metadata) {
        let _ = metadata;
    }

    /// Decrypted application data.
    fn on_application_data(&mut self, data: &[u8]) {
        let _ = data;
    }

    /// The server's certificates, leaf first, as soon as they are parsed and
    /// before they are verified.
    ///
    /// Returning an error ends the connection with that error.
    fn on_recv_certificates(&mut self, certificates: &[ParsedCertificate]) -> Result<(), Error> {
        let _ = certificates;
        Ok(())
    }

    /// A TLS 1.3 session ticket usable with
    /// [`TlsClient::psk_from_ticket`](crate::TlsClient::psk_from_ticket).
    fn on_session_ticket(&mut self, ticket: SessionTicket) {
        let _ = ticket;
    }

    /// The connection ended. Called exactly once per client.
    ///
    /// `None` is a clean close.
    fn on_tls_end(&mut self, error: Option<&Error>) {
        let _ = error;
    }

    /// Every record received, with the key material it was opened with.
    fn on_read(&mut self, record: &TlsRecord, ctx: &PacketContext<'_>) {
        let _ = (record, ctx);
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn on_write(&mut self, data: &[u8]) {
        (**self).on_write(data)
    }

    fn on_handshake(&mut self, metadata: &Metadata) {
        (**self).on_handshake(metadata)
    }

    fn on_application_data(&mut self, data: &[u8]) {
        (**self).on_application_data(data)
    }

    fn on_recv_certificates(&mut self, certificates: &[ParsedCertificate]) -> Result<(), Error> {
        (**self).on_recv_certificates(certificates)
    }

    fn on_session_ticket(&mut self, ticket: SessionTicket) {
        (**self).on_session_ticket(ticket)
    }

    fn on_tls_end(&mut self, error: Option<&Error>) {
        (**self).on_tls_end(error)
    }

    fn on_read(&mut self, record: &TlsRecord, ctx: &PacketContext<'_>) {
        (**self).on_read(record, ctx)
    }
}
