//! Server certificate checks during the handshake.

mod common;

use std::sync::Arc;

use common::*;
use tlsclient::{Config, Error, HandshakeOptions};

#[test]
fn hostname_mismatch() {
    for only in [tls13_only, tls12_only] {
        let pki = pki(&["server.test"]);
        let ctx = server_context(&pki, only);
        let mut server = Server::new(&ctx);
        let mut client = client(client_config(&pki, |b| b));

        let res = connect(&mut client, &mut server, HandshakeOptions::new("other.test"));
        assert!(matches!(res, Err(Error::HostnameMismatch(_))));
        assert!(!client.certificates_verified());
        assert!(!client.is_handshake_done());
        assert!(client.handler().handshakes.is_empty());
        assert_eq!(client.handler().ended.len(), 1);
        // bad_certificate reached the server
        assert!(server.failed.is_some());
    }
}

#[test]
fn wildcard_name() {
    let pki = pki(&["*.example.test"]);
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));

    connect(&mut client, &mut server, HandshakeOptions::new("www.example.test")).unwrap();
    assert!(client.certificates_verified());
}

#[test]
fn ip_address_host() {
    let pki = pki(&["127.0.0.1"]);
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));

    connect(&mut client, &mut server, HandshakeOptions::new("127.0.0.1")).unwrap();
    assert!(client.is_handshake_done());
}

#[test]
fn untrusted_root() {
    let pki = pki(&["server.test"]);
    let other = common::pki(&["server.test"]);
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    // Trusts a different root.
    let mut client = client(client_config(&other, |b| b));

    let res = connect(&mut client, &mut server, HandshakeOptions::new("server.test"));
    assert!(matches!(res, Err(Error::UntrustedRoot(_))));
    assert!(!client.certificates_verified());
}

#[test]
fn verification_disabled() {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls12_only);
    let mut server = Server::new(&ctx);
    let config = Config::builder()
        .use_system_roots(false)
        .verify_certificates(false)
        .build()
        .unwrap();
    let mut client = client(Arc::new(config));

    connect(&mut client, &mut server, HandshakeOptions::new("anything.test")).unwrap();
    assert!(client.is_handshake_done());
    // The handshake signature was still checked.
    assert!(client.certificates_verified());
}

#[test]
fn handler_rejects_certificates() {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));
    client.handler_mut().reject_certificates = true;

    let res = connect(&mut client, &mut server, HandshakeOptions::new("server.test"));
    assert!(matches!(res, Err(Error::CertificateError(_))));
    assert_eq!(client.handler().certificates.len(), 2);
    assert!(client.certificates().is_none());
}

#[test]
fn client_certificate_requested() {
    use openssl::ssl::SslVerifyMode;

    for only in [tls13_only, tls12_only] {
        let pki = pki(&["server.test"]);
        let ctx = server_context(&pki, |b| {
            only(b);
            // Ask, but accept an empty answer.
            b.set_verify(SslVerifyMode::PEER);
        });
        let mut server = Server::new(&ctx);
        let mut client = client(client_config(&pki, |b| b));

        connect(&mut client, &mut server, HandshakeOptions::new("server.test")).unwrap();
        assert!(server.connected);
        assert!(client.is_handshake_done());
    }
}
