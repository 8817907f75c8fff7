//! tlsclient
//!
//! A sans-IO TLS 1.2 and TLS 1.3 client.
//!
//! The client never touches a socket. Bytes read from the transport go into
//! [`TlsClient::handle_received_bytes`], and everything the client wants to
//! send comes out of [`Handler::on_write`]. Other [`Handler`] callbacks report
//! handshake completion, application data, server certificates, session
//! tickets and the end of the connection.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tlsclient::{Config, Handler, HandshakeOptions, TlsClient};
//!
//! struct Transport(Vec<u8>);
//!
//! impl Handler for Transport {
//!     fn on_write(&mut self, data: &[u8]) {
//!         self.0.extend_from_slice(data);
//!     }
//! }
//!
//! let config = Arc::new(Config::default());
//! let mut client = TlsClient::new(config, Transport(Vec::new()));
//! client.start_handshake(HandshakeOptions::new("example.com")).unwrap();
//! // Send client.handler().0 to the server and feed the reply:
//! // client.handle_received_bytes(&reply)?;
//! ```
//!
//! To drive a connection from several threads, move the client into a
//! [`ConnectionWorker`].
//!
//! # Cryptography
//!
//! All primitives go through a [`CryptoProvider`]. With the default
//! `rust-crypto` feature one is built from the RustCrypto crates.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod buffer;
mod certificate;
mod cipher_suite;
mod client;
mod config;
pub mod crypto;
mod error;
mod handler;
mod key_schedule;
mod message;
mod queue;
mod record;
mod session;
mod types;
mod util;

pub use buffer::Buf;
pub use certificate::{ParsedCertificate, RootStore};
pub use cipher_suite::CipherSuite;
pub use client::{HandshakeOptions, Metadata, TlsClient};
pub use config::{Config, ConfigBuilder};
pub use crypto::CryptoProvider;
pub use error::Error;
pub use handler::Handler;
pub use key_schedule::KeyScheduleResult;
pub use queue::ConnectionWorker;
pub use record::{PacketContext, TlsRecord};
pub use session::{Psk, SessionTicket};
pub use types::{AlertDescription, AlertLevel, ContentType, HandshakeType};
pub use types::{HashAlgorithm, NamedGroup, ProtocolVersion, SignatureScheme};
