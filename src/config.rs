use std::sync::Arc;

use crate::certificate::RootStore;
use crate::cipher_suite::CipherSuite;
use crate::crypto::CryptoProvider;
use crate::record::MAX_PLAINTEXT_LEN;
use crate::types::{NamedGroup, ProtocolVersion, SignatureScheme};
use crate::Error;

#[cfg(feature = "rust-crypto")]
use crate::crypto::rust_crypto;

/// TLS client configuration
#[derive(Clone)]
pub struct Config {
    crypto_provider: CryptoProvider,
    cipher_suites: Vec<CipherSuite>,
    named_groups: Vec<NamedGroup>,
    signature_schemes: Vec<SignatureScheme>,
    versions: Vec<ProtocolVersion>,
    alpn_protocols: Vec<String>,
    roots: Arc<RootStore>,
    verify_certificates: bool,
    max_record_plaintext: usize,
    queue_capacity: usize,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            crypto_provider: None,
            cipher_suites: None,
            named_groups: None,
            signature_schemes: SignatureScheme::supported().to_vec(),
            versions: vec![ProtocolVersion::TLS1_3, ProtocolVersion::TLS1_2],
            alpn_protocols: Vec::new(),
            root_certificates: Vec::new(),
            root_pem: Vec::new(),
            use_system_roots: true,
            verify_certificates: true,
            max_record_plaintext: MAX_PLAINTEXT_LEN,
            queue_capacity: 32,
        }
    }

    /// Cryptographic provider.
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Offered cipher suites in preference order.
    ///
    /// Only suites of offered versions are sent.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Groups offered in supported_groups and key shares.
    #[inline(always)]
    pub fn named_groups(&self) -> &[NamedGroup] {
        &self.named_groups
    }

    #[inline(always)]
    pub fn signature_schemes(&self) -> &[SignatureScheme] {
        &self.signature_schemes
    }

    /// Offered protocol versions, highest first.
    #[inline(always)]
    pub fn versions(&self) -> &[ProtocolVersion] {
        &self.versions
    }

    #[inline(always)]
    pub fn alpn_protocols(&self) -> &[String] {
        &self.alpn_protocols
    }

    /// Trusted roots: caller supplied plus, if enabled, the system bundle.
    #[inline(always)]
    pub fn roots(&self) -> &RootStore {
        &self.roots
    }

    /// Whether the server chain and hostname are checked.
    ///
    /// Signatures over handshake data are always checked.
    #[inline(always)]
    pub fn verify_certificates(&self) -> bool {
        self.verify_certificates
    }

    /// Largest plaintext put in one outgoing record.
    #[inline(always)]
    pub fn max_record_plaintext(&self) -> usize {
        self.max_record_plaintext
    }

    /// Bound of the per-connection worker queue.
    #[inline(always)]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub(crate) fn offers(&self, version: ProtocolVersion) -> bool {
        self.versions.contains(&version)
    }

    /// Offered suites belonging to an offered version.
    pub(crate) fn offered_suites(&self) -> Vec<CipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .filter(|s| self.offers(s.version()))
            .collect()
    }
}

/// Builder for TLS client configuration.
pub struct ConfigBuilder {
    crypto_provider: Option<CryptoProvider>,
    cipher_suites: Option<Vec<CipherSuite>>,
    named_groups: Option<Vec<NamedGroup>>,
    signature_schemes: Vec<SignatureScheme>,
    versions: Vec<ProtocolVersion>,
    alpn_protocols: Vec<String>,
    root_certificates: Vec<Vec<u8>>,
    root_pem: Vec<Vec<u8>>,
    use_system_roots: bool,
    verify_certificates: bool,
    max_record_plaintext: usize,
    queue_capacity: usize,
}

impl ConfigBuilder {
    /// Set a custom crypto provider.
    ///
    /// If not set, the process default is used, else the RustCrypto provider
    /// if the feature flag `rust-crypto` is enabled.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Set the offered cipher suites in preference order.
    ///
    /// Defaults to every suite the provider supports, TLS 1.3 first.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Set the offered key exchange groups.
    ///
    /// Defaults to X25519, P-256 and P-384.
    pub fn named_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.named_groups = Some(groups.to_vec());
        self
    }

    /// Set the offered signature schemes.
    ///
    /// Defaults to ECDSA, RSA-PSS and RSA PKCS#1 with SHA-2.
    pub fn signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_schemes = schemes.to_vec();
        self
    }

    /// Set the offered protocol versions.
    ///
    /// Defaults to TLS 1.3 and TLS 1.2.
    pub fn versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.versions = versions.to_vec();
        self
    }

    /// Set the ALPN protocols to offer.
    ///
    /// Defaults to none, which omits the extension.
    pub fn alpn_protocols<S: Into<String>>(mut self, protocols: impl IntoIterator<Item = S>) -> Self {
        self.alpn_protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Trust additional DER root certificates.
    pub fn with_root_certificates<I, D>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: AsRef<[u8]>,
    {
        self.root_certificates
            .extend(roots.into_iter().map(|d| d.as_ref().to_vec()));
        self
    }

    /// Trust every certificate of a PEM bundle.
    pub fn with_root_certificates_pem(mut self, pem: impl AsRef<[u8]>) -> Self {
        self.root_pem.push(pem.as_ref().to_vec());
        self
    }

    /// Set whether the platform CA bundle is trusted.
    ///
    /// Defaults to true.
    pub fn use_system_roots(mut self, enabled: bool) -> Self {
        self.use_system_roots = enabled;
        self
    }

    /// Set whether the server chain and hostname are verified.
    ///
    /// Defaults to true.
    pub fn verify_certificates(mut self, enabled: bool) -> Self {
        self.verify_certificates = enabled;
        self
    }

    /// Set the largest plaintext per outgoing record, 1 to 16384.
    ///
    /// Defaults to 16384.
    pub fn max_record_plaintext(mut self, len: usize) -> Self {
        self.max_record_plaintext = len;
        self
    }

    /// Set the bound of the connection worker queue.
    ///
    /// Defaults to 32.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Build the configuration.
    ///
    /// This validates the crypto provider before returning the configuration.
    /// Returns `Error::ConfigError` if the provider or a setting is invalid.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. RustCrypto provider (if `rust-crypto` feature is enabled)
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .or_else(|| {
                #[cfg(feature = "rust-crypto")]
                {
                    Some(rust_crypto::default_provider())
                }
                #[cfg(not(feature = "rust-crypto"))]
                {
                    None
                }
            })
            .ok_or_else(|| {
                Error::ConfigError(
                    "No crypto provider available. Either set one explicitly, install \
                     a default via CryptoProvider::install_default(), \
                     or enable the 'rust-crypto' feature."
                        .to_string(),
                )
            })?;

        // Always validate the crypto provider
        crypto_provider.validate()?;

        if self.versions.is_empty() {
            return Err(Error::ConfigError("No protocol versions".to_string()));
        }
        let mut versions = Vec::new();
        for v in self.versions {
            match v {
                ProtocolVersion::TLS1_2 | ProtocolVersion::TLS1_3 => {
                    if !versions.contains(&v) {
                        versions.push(v);
                    }
                }
                _ => return Err(Error::ConfigError(format!("Unsupported version {}", v))),
            }
        }
        // Highest first.
        versions.sort_by_key(|v| std::cmp::Reverse(v.as_u16()));

        let cipher_suites = match self.cipher_suites {
            Some(suites) => {
                if let Some(s) = suites.iter().find(|s| !crypto_provider.supports_suite(**s)) {
                    return Err(Error::ConfigError(format!(
                        "Cipher suite {} not supported by provider",
                        s
                    )));
                }
                suites
            }
            None => crypto_provider.supported_cipher_suites().collect(),
        };
        if !cipher_suites.iter().any(|s| versions.contains(&s.version())) {
            return Err(Error::ConfigError(
                "No cipher suite for the offered versions".to_string(),
            ));
        }

        let named_groups = match self.named_groups {
            Some(groups) => {
                if let Some(g) = groups
                    .iter()
                    .find(|g| crypto_provider.find_kx_group(**g).is_none())
                {
                    return Err(Error::ConfigError(format!(
                        "Group {:?} not supported by provider",
                        g
                    )));
                }
                groups
            }
            None => crypto_provider.supported_kx_groups().collect(),
        };
        if named_groups.is_empty() {
            return Err(Error::ConfigError("No key exchange groups".to_string()));
        }

        if self.signature_schemes.is_empty() {
            return Err(Error::ConfigError("No signature schemes".to_string()));
        }

        for p in &self.alpn_protocols {
            if p.is_empty() || p.len() > 255 {
                return Err(Error::ConfigError(format!("Bad ALPN protocol {:?}", p)));
            }
        }

        if !(1..=MAX_PLAINTEXT_LEN).contains(&self.max_record_plaintext) {
            return Err(Error::ConfigError(format!(
                "max_record_plaintext {} out of range",
                self.max_record_plaintext
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::ConfigError("queue_capacity must be > 0".to_string()));
        }

        let mut roots = RootStore::new();
        for der in &self.root_certificates {
            roots.add_der(der)?;
        }
        for pem in &self.root_pem {
            roots.add_pem(pem)?;
        }
        if self.use_system_roots {
            roots.extend(RootStore::system());
        }

        Ok(Config {
            crypto_provider,
            cipher_suites,
            named_groups,
            signature_schemes: self.signature_schemes,
            versions,
            alpn_protocols: self.alpn_protocols,
            roots: Arc::new(roots),
            verify_certificates: self.verify_certificates,
            max_record_plaintext: self.max_record_plaintext,
            queue_capacity: self.queue_capacity,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
