use std::fs;

use once_cell::sync::Lazy;

use super::ParsedCertificate;
use crate::Error;

/// Places distributions keep their CA bundle.
const SYSTEM_BUNDLES: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/pki/tls/certs/ca-bundle.crt",
    "/etc/ssl/ca-bundle.pem",
    "/etc/ssl/cert.pem",
    "/usr/local/etc/openssl/cert.pem",
];

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

static SYSTEM_ROOTS: Lazy<RootStore> = Lazy::new(|| {
    let mut store = RootStore::new();
    for path in SYSTEM_BUNDLES {
        let Ok(pem) = fs::read(path) else {
            continue;
        };
        match store.add_pem(&pem) {
            Ok(n) => {
                debug!("Loaded {} system roots from {}", n, path);
                break;
            }
            Err(e) => warn!("Failed to read roots from {}: {}", path, e),
        }
    }
    if store.is_empty() {
        debug!("No system root bundle found");
    }
    store
});

/// Trusted root certificates.
#[derive(Debug, Clone, Default)]
pub struct RootStore {
    roots: Vec<ParsedCertificate>,
}

impl RootStore {
    pub fn new() -> Self {
        RootStore::default()
    }

    /// The platform CA bundle, read once per process.
    pub fn system() -> &'static RootStore {
        &SYSTEM_ROOTS
    }

    pub fn add_der(&mut self, der: &[u8]) -> Result<(), Error> {
        let cert = ParsedCertificate::parse(der)?;
        if !self.roots.contains(&cert) {
            self.roots.push(cert);
        }
        Ok(())
    }

    /// Add every certificate in a PEM bundle. Entries that fail to parse are
    /// skipped. Returns how many were added.
    pub fn add_pem(&mut self, pem: &[u8]) -> Result<usize, Error> {
        let text = std::str::from_utf8(pem)
            .map_err(|_| Error::ConfigError("PEM bundle is not UTF-8".to_string()))?;

        let mut added = 0;
        let mut rest = text;
        while let Some(start) = rest.find(PEM_BEGIN) {
            let Some(len) = rest[start..].find(PEM_END) else {
                return Err(Error::ConfigError("Unterminated PEM certificate".to_string()));
            };
            let end = start + len + PEM_END.len();
            let block = &rest[start..end];
            rest = &rest[end..];

            let der = match der::pem::decode_vec(block.as_bytes()) {
                Ok((_, der)) => der,
                Err(e) => {
                    debug!("Skipping bad PEM block: {}", e);
                    continue;
                }
            };
            match self.add_der(&der) {
                Ok(()) => added += 1,
                Err(e) => debug!("Skipping root: {}", e),
            }
        }
        Ok(added)
    }

    pub fn extend(&mut self, other: &RootStore) {
        for cert in &other.roots {
            if !self.roots.contains(cert) {
                self.roots.push(cert.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParsedCertificate> {
        self.roots.iter()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
