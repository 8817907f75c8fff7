#![allow(dead_code)]

//! OpenSSL loopback server and a recording handler.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::IpAddr;
use std::sync::Arc;

use openssl::pkey::PKey;
use openssl::ssl::{select_next_proto, AlpnError, ErrorCode, Ssl, SslContext};
use openssl::ssl::{SslContextBuilder, SslMethod, SslStream, SslVersion};
use openssl::x509::X509;
use rcgen::{BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa};
use rcgen::SanType;

use tlsclient::{Config, ConfigBuilder, Error, Handler, HandshakeOptions, Metadata};
use tlsclient::{PacketContext, ParsedCertificate, SessionTicket, TlsClient, TlsRecord};

/// Root, intermediate and leaf, all ECDSA P-256.
pub struct Pki {
    pub root: Vec<u8>,
    pub intermediate: Vec<u8>,
    pub leaf: Vec<u8>,
    pub leaf_key_pem: String,
}

fn params(cn: &str, names: &[&str], ca: bool) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::new());
    params.subject_alt_names = names
        .iter()
        .map(|n| match n.parse::<IpAddr>() {
            Ok(ip) => SanType::IpAddress(ip),
            Err(_) => SanType::DnsName(n.to_string()),
        })
        .collect();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    }
    params
}

pub fn pki(names: &[&str]) -> Pki {
    let root = Certificate::from_params(params("Test Root", &[], true)).unwrap();
    let intermediate = Certificate::from_params(params("Test Intermediate", &[], true)).unwrap();
    let leaf = Certificate::from_params(params(names[0], names, false)).unwrap();
    Pki {
        root: root.serialize_der().unwrap(),
        intermediate: intermediate.serialize_der_with_signer(&root).unwrap(),
        leaf: leaf.serialize_der_with_signer(&intermediate).unwrap(),
        leaf_key_pem: leaf.serialize_private_key_pem(),
    }
}

/// In-memory transport for the OpenSSL side.
#[derive(Default)]
pub struct Pipe {
    incoming: VecDeque<u8>,
    outgoing: Vec<u8>,
}

impl Read for Pipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.incoming.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(self.incoming.len());
        for (b, v) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *b = v;
        }
        Ok(n)
    }
}

impl Write for Pipe {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn server_context(pki: &Pki, f: impl FnOnce(&mut SslContextBuilder)) -> SslContext {
    let mut b = SslContextBuilder::new(SslMethod::tls_server()).unwrap();
    let key = PKey::private_key_from_pem(pki.leaf_key_pem.as_bytes()).unwrap();
    b.set_private_key(&key).unwrap();
    b.set_certificate(&X509::from_der(&pki.leaf).unwrap())
        .unwrap();
    b.add_extra_chain_cert(X509::from_der(&pki.intermediate).unwrap())
        .unwrap();
    f(&mut b);
    b.build()
}

pub fn tls13_only(b: &mut SslContextBuilder) {
    b.set_min_proto_version(Some(SslVersion::TLS1_3)).unwrap();
}

pub fn tls12_only(b: &mut SslContextBuilder) {
    b.set_max_proto_version(Some(SslVersion::TLS1_2)).unwrap();
}

/// Server selects `http/1.1` if offered.
pub fn alpn_http11(b: &mut SslContextBuilder) {
    b.set_alpn_select_callback(|_, client| {
        select_next_proto(b"\x08http/1.1", client).ok_or(AlpnError::NOACK)
    });
}

pub struct Server {
    stream: SslStream<Pipe>,
    pub connected: bool,
    pub failed: Option<String>,
    pub closed: bool,
}

impl Server {
    pub fn new(ctx: &SslContext) -> Server {
        let ssl = Ssl::new(ctx).unwrap();
        Server {
            stream: SslStream::new(ssl, Pipe::default()).unwrap(),
            connected: false,
            failed: None,
            closed: false,
        }
    }

    /// Queue bytes from the client and advance the handshake.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.stream.get_mut().incoming.extend(bytes);
        if self.connected || self.failed.is_some() {
            return;
        }
        match self.stream.accept() {
            Ok(()) => self.connected = true,
            Err(e) if e.code() == ErrorCode::WANT_READ => {}
            Err(e) => self.failed = Some(e.to_string()),
        }
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stream.get_mut().outgoing)
    }

    /// Everything decrypted so far.
    pub fn read(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match self.stream.ssl_read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.code() == ErrorCode::WANT_READ => break,
                Err(e) if e.code() == ErrorCode::ZERO_RETURN => {
                    self.closed = true;
                    break;
                }
                Err(e) => panic!("server read: {}", e),
            }
        }
        out
    }

    pub fn write(&mut self, data: &[u8]) {
        self.stream.ssl_write(data).unwrap();
    }

    pub fn session_reused(&self) -> bool {
        self.stream.ssl().session_reused()
    }
}

#[derive(Default)]
pub struct Recorder {
    pub outgoing: Vec<u8>,
    pub data: Vec<u8>,
    pub handshakes: Vec<Metadata>,
    pub tickets: Vec<SessionTicket>,
    pub ended: Vec<Option<Error>>,
    pub certificates: Vec<String>,
    /// Record numbers of decrypted records, in arrival order.
    pub record_numbers: Vec<u64>,
    pub saw_mac_key: bool,
    pub reject_certificates: bool,
}

impl Handler for Recorder {
    fn on_write(&mut self, data: &[u8]) {
        self.outgoing.extend_from_slice(data);
    }

    fn on_handshake(&mut self, metadata: &Metadata) {
        self.handshakes.push(metadata.clone());
    }

    fn on_application_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    fn on_recv_certificates(&mut self, certificates: &[ParsedCertificate]) -> Result<(), Error> {
        self.certificates = certificates.iter().map(|c| c.subject().to_string()).collect();
        if self.reject_certificates {
            return Err(Error::CertificateError("rejected by handler".to_string()));
        }
        Ok(())
    }

    fn on_session_ticket(&mut self, ticket: SessionTicket) {
        self.tickets.push(ticket);
    }

    fn on_tls_end(&mut self, error: Option<&Error>) {
        self.ended.push(error.cloned());
    }

    fn on_read(&mut self, _record: &TlsRecord, ctx: &PacketContext<'_>) {
        if let PacketContext::Ciphertext {
            record_number,
            mac_key,
            ..
        } = ctx
        {
            self.record_numbers.push(*record_number);
            self.saw_mac_key |= mac_key.is_some();
        }
    }
}

pub fn client_config(pki: &Pki, f: impl FnOnce(ConfigBuilder) -> ConfigBuilder) -> Arc<Config> {
    let builder = Config::builder()
        .use_system_roots(false)
        .with_root_certificates([&pki.root]);
    Arc::new(f(builder).build().unwrap())
}

pub fn client(config: Arc<Config>) -> TlsClient<Recorder> {
    let _ = env_logger::try_init();
    TlsClient::new(config, Recorder::default())
}

/// Shuttle bytes both ways until neither side has anything to send.
pub fn pump(client: &mut TlsClient<Recorder>, server: &mut Server) -> Result<(), Error> {
    for _ in 0..32 {
        let out = std::mem::take(&mut client.handler_mut().outgoing);
        if !out.is_empty() {
            server.feed(&out);
        }
        let back = server.take_output();
        if !back.is_empty() {
            client.handle_received_bytes(&back)?;
        }
        if out.is_empty() && back.is_empty() {
            break;
        }
    }
    Ok(())
}

/// Start a handshake with `host` and run it to completion.
pub fn connect(
    client: &mut TlsClient<Recorder>,
    server: &mut Server,
    options: HandshakeOptions,
) -> Result<(), Error> {
    client.start_handshake(options)?;
    pump(client, server)
}

/// Split a stream of records into (content type, length) pairs.
pub fn record_headers(mut bytes: &[u8]) -> Vec<(u8, usize)> {
    let mut out = Vec::new();
    while bytes.len() >= 5 {
        let len = u16::from_be_bytes([bytes[3], bytes[4]]) as usize;
        out.push((bytes[0], len));
        bytes = &bytes[(5 + len).min(bytes.len())..];
    }
    out
}
