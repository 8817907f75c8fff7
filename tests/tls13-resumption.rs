//! TLS 1.3 session tickets and PSK resumption.

mod common;

use std::time::{Duration, SystemTime};

use common::*;
use tlsclient::{Error, HandshakeOptions, ProtocolVersion};

#[test]
fn resume_with_ticket() {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls13_only);
    let config = client_config(&pki, |b| b);

    let mut server = Server::new(&ctx);
    let mut first = client(config.clone());
    connect(&mut first, &mut server, HandshakeOptions::new("server.test")).unwrap();
    assert!(!first.metadata().resumed);

    let tickets = &first.handler().tickets;
    assert!(!tickets.is_empty());
    let ticket = tickets[0].clone();
    assert!(!ticket.ticket().is_empty());
    assert!(ticket.lifetime() <= Duration::from_secs(7 * 24 * 3600));
    let psk = first.psk_from_ticket(&ticket).unwrap();
    first.end(None);

    let mut server = Server::new(&ctx);
    let mut second = client(config);
    connect(
        &mut second,
        &mut server,
        HandshakeOptions::new("server.test").with_psk(psk),
    )
    .unwrap();

    assert!(server.session_reused());
    let meta = second.metadata();
    assert!(meta.resumed);
    assert_eq!(meta.version, Some(ProtocolVersion::TLS1_3));
    // No certificate flight on resumption.
    assert!(second.certificates().is_none());
    assert!(second.handler().certificates.is_empty());

    second.write(b"again").unwrap();
    pump(&mut second, &mut server).unwrap();
    assert_eq!(server.read(), b"again");
}

#[test]
fn unknown_ticket_falls_back_to_full_handshake() {
    let pki = pki(&["server.test"]);
    let config = client_config(&pki, |b| b);

    // Ticket from a server whose ticket keys the second one does not have.
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    let mut first = client(config.clone());
    connect(&mut first, &mut server, HandshakeOptions::new("server.test")).unwrap();
    let psk = first.psk_from_ticket(&first.handler().tickets[0]).unwrap();

    let other = server_context(&pki, tls13_only);
    let mut server = Server::new(&other);
    let mut second = client(config);
    connect(
        &mut second,
        &mut server,
        HandshakeOptions::new("server.test").with_psk(psk),
    )
    .unwrap();

    assert!(!server.session_reused());
    assert!(!second.metadata().resumed);
    assert!(second.certificates_verified());
}

#[test]
fn expired_ticket() {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));
    connect(&mut client, &mut server, HandshakeOptions::new("server.test")).unwrap();

    let ticket = client.handler().tickets[0].clone();
    assert!(!ticket.is_expired(SystemTime::now()));
    let later = SystemTime::now() + ticket.lifetime() + Duration::from_secs(1);
    assert!(ticket.is_expired(later));
    let provider = client.config().crypto_provider();
    assert!(matches!(
        tlsclient::Psk::from_ticket(provider, &ticket, later),
        Err(Error::TicketExpired)
    ));
}

#[test]
fn no_tickets_over_tls12() {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls12_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));
    connect(&mut client, &mut server, HandshakeOptions::new("server.test")).unwrap();

    assert_eq!(client.metadata().version, Some(ProtocolVersion::TLS1_2));
    assert!(client.handler().tickets.is_empty());
}
