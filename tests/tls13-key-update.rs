//! TLS 1.3 KeyUpdate.

mod common;

use common::*;
use tlsclient::{Error, HandshakeOptions};

fn connected() -> (tlsclient::TlsClient<Recorder>, Server) {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls13_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));
    connect(&mut client, &mut server, HandshakeOptions::new("server.test")).unwrap();
    (client, server)
}

#[test]
fn key_update_with_peer_update() {
    let (mut client, mut server) = connected();

    client.write(b"before").unwrap();
    server.write(b"before");
    pump(&mut client, &mut server).unwrap();
    assert_eq!(server.read(), b"before");
    assert_eq!(client.record_counts().0, 1);

    let before = client.keys().cloned().unwrap();
    let received = client.record_counts().1;
    client.update_traffic_keys(true).unwrap();

    // KeyUpdate went out under the old key, the send counter restarts and
    // the receive side waits for the server.
    let after_send = client.keys().cloned().unwrap();
    assert_eq!(client.record_counts(), (0, received));
    assert_ne!(after_send.client_secret, before.client_secret);
    assert_ne!(after_send.client_enc_key, before.client_enc_key);
    assert_eq!(after_send.server_secret, before.server_secret);

    client.write(b"ping").unwrap();
    pump(&mut client, &mut server).unwrap();
    assert_eq!(server.read(), b"ping");

    // The server answers the request before its next record.
    server.write(b"pong");
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.handler().data, b"beforepong");

    let after = client.keys().cloned().unwrap();
    assert_ne!(after.server_secret, before.server_secret);
    assert_ne!(after.server_enc_key, before.server_enc_key);
    assert_eq!(after.client_secret, after_send.client_secret);

    // pong was the first record under the new server key.
    assert_eq!(client.handler().record_numbers.last(), Some(&0));
    assert_eq!(client.record_counts(), (1, 1));
}

#[test]
fn key_update_without_request() {
    let (mut client, mut server) = connected();
    let before = client.keys().cloned().unwrap();

    client.update_traffic_keys(false).unwrap();
    client.write(b"one").unwrap();
    client.write(b"two").unwrap();
    pump(&mut client, &mut server).unwrap();
    assert_eq!(server.read(), b"onetwo");
    assert_eq!(client.record_counts().0, 2);

    server.write(b"three");
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.handler().data, b"three");
    assert_eq!(client.keys().unwrap().server_secret, before.server_secret);
}

#[test]
fn repeated_key_updates() {
    let (mut client, mut server) = connected();
    for i in 0..5u8 {
        client.update_traffic_keys(i % 2 == 0).unwrap();
        client.write(&[i]).unwrap();
    }
    pump(&mut client, &mut server).unwrap();
    assert_eq!(server.read(), vec![0, 1, 2, 3, 4]);

    server.write(b"ok");
    pump(&mut client, &mut server).unwrap();
    assert_eq!(client.handler().data, b"ok");
}

#[test]
fn key_update_needs_tls13() {
    let pki = pki(&["server.test"]);
    let ctx = server_context(&pki, tls12_only);
    let mut server = Server::new(&ctx);
    let mut client = client(client_config(&pki, |b| b));
    connect(&mut client, &mut server, HandshakeOptions::new("server.test")).unwrap();

    assert!(matches!(
        client.update_traffic_keys(true),
        Err(Error::UnexpectedMessage(_))
    ));
}

#[test]
fn key_update_before_handshake() {
    let pki = pki(&["server.test"]);
    let mut client = client(client_config(&pki, |b| b));
    client
        .start_handshake(HandshakeOptions::new("server.test"))
        .unwrap();
    assert_eq!(client.update_traffic_keys(false), Err(Error::HandshakeNotDone));
}
