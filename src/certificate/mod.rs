//! X.509 certificates: parsing, hostname matching and chain verification.

mod roots;
mod verify;

pub use roots::RootStore;
pub use verify::{host_matches, verify_certificate_chain};

use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use der::asn1::Any;
use der::{Decode, Encode, Reader, TagMode, TagNumber};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, SubjectAltName};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::crypto::SignatureVerifier;
use crate::types::SignatureScheme;
use crate::Error;

const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
const OID_BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const OID_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");

const OID_ECDSA_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_ECDSA_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const OID_RSA_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_RSA_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const OID_RSA_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const OID_RSA_PSS: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");

const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const OID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
const OID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

/// A parsed DER certificate.
///
/// Immutable once parsed. The fields the handshake needs are extracted up
/// front so verification does not go back to ASN.1.
#[derive(Clone)]
pub struct ParsedCertificate {
    der: Vec<u8>,
    tbs_der: Vec<u8>,
    spki_der: Vec<u8>,
    subject: Name,
    issuer: Name,
    common_name: Option<String>,
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
    not_before: SystemTime,
    not_after: SystemTime,
    is_ca: Option<bool>,
    /// keyCertSign bit, `None` without a keyUsage extension.
    key_cert_sign: Option<bool>,
    signature_oid: ObjectIdentifier,
    signature_params: Option<Any>,
    signature: Vec<u8>,
}

impl ParsedCertificate {
    pub fn parse(der: &[u8]) -> Result<Self, Error> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::CertificateError(format!("Bad certificate DER: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let tbs_der = tbs
            .to_der()
            .map_err(|e| Error::CertificateError(format!("Bad TBSCertificate: {e}")))?;
        let spki_der = tbs
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::CertificateError(format!("Bad public key: {e}")))?;
        let signature = cert
            .signature
            .as_bytes()
            .ok_or_else(|| Error::CertificateError("Unaligned signature".to_string()))?
            .to_vec();

        let mut dns_names = Vec::new();
        let mut ip_addresses = Vec::new();
        let mut is_ca = None;
        let mut key_cert_sign = None;
        for ext in tbs.extensions.iter().flatten() {
            if ext.extn_id == OID_SUBJECT_ALT_NAME {
                let san = SubjectAltName::from_der(ext.extn_value.as_bytes())
                    .map_err(|e| Error::CertificateError(format!("Bad subjectAltName: {e}")))?;
                for name in san.0 {
                    match name {
                        GeneralName::DnsName(n) => dns_names.push(n.to_string()),
                        GeneralName::IpAddress(ip) => {
                            if let Some(ip) = ip_from_bytes(ip.as_bytes()) {
                                ip_addresses.push(ip);
                            }
                        }
                        _ => {}
                    }
                }
            } else if ext.extn_id == OID_BASIC_CONSTRAINTS {
                let bc = BasicConstraints::from_der(ext.extn_value.as_bytes())
                    .map_err(|e| Error::CertificateError(format!("Bad basicConstraints: {e}")))?;
                is_ca = Some(bc.ca);
            } else if ext.extn_id == OID_KEY_USAGE {
                let ku = KeyUsage::from_der(ext.extn_value.as_bytes())
                    .map_err(|e| Error::CertificateError(format!("Bad keyUsage: {e}")))?;
                key_cert_sign = Some(ku.key_cert_sign());
            }
        }

        Ok(ParsedCertificate {
            der: der.to_vec(),
            tbs_der,
            spki_der,
            common_name: common_name(&tbs.subject),
            subject: tbs.subject.clone(),
            issuer: tbs.issuer.clone(),
            dns_names,
            ip_addresses,
            not_before: to_system_time(tbs.validity.not_before.to_unix_duration()),
            not_after: to_system_time(tbs.validity.not_after.to_unix_duration()),
            is_ca,
            key_cert_sign,
            signature_oid: cert.signature_algorithm.oid,
            signature_params: cert.signature_algorithm.parameters.clone(),
            signature,
        })
    }

    /// The DER encoding as received.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// DER SubjectPublicKeyInfo.
    pub fn public_key_der(&self) -> &[u8] {
        &self.spki_der
    }

    pub fn subject(&self) -> String {
        self.subject.to_string()
    }

    pub fn issuer(&self) -> String {
        self.issuer.to_string()
    }

    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    pub fn ip_addresses(&self) -> &[IpAddr] {
        &self.ip_addresses
    }

    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Whether we may have issued `cert` as an intermediate.
    ///
    /// Requires basicConstraints with cA set, and keyCertSign when keyUsage
    /// is present.
    pub fn is_issuer(&self, cert: &ParsedCertificate) -> bool {
        self.is_ca == Some(true)
            && self.key_cert_sign != Some(false)
            && self.subject == cert.issuer
    }

    /// Like [`is_issuer`](Self::is_issuer) for a trusted root, which may be
    /// a v1 certificate without basicConstraints.
    pub fn is_anchor_for(&self, cert: &ParsedCertificate) -> bool {
        self.is_ca != Some(false)
            && self.key_cert_sign != Some(false)
            && self.subject == cert.issuer
    }

    /// Verify our key signed `cert`.
    pub fn verify_issued(
        &self,
        cert: &ParsedCertificate,
        verifier: &dyn SignatureVerifier,
    ) -> Result<(), Error> {
        let scheme = cert.signature_scheme()?;
        verifier
            .verify_signature(&self.spki_der, &cert.tbs_der, &cert.signature, scheme)
            .map_err(Error::SignatureVerificationFailed)
    }

    /// Check `now` lies within the validity window.
    pub fn check_validity(&self, now: SystemTime) -> Result<(), Error> {
        if now < self.not_before {
            return Err(Error::CertificateNotYetValid(format!(
                "{} valid from {}",
                self.subject,
                format_time(self.not_before)
            )));
        }
        if now > self.not_after {
            return Err(Error::CertificateExpired(format!(
                "{} expired {}",
                self.subject,
                format_time(self.not_after)
            )));
        }
        Ok(())
    }

    fn signature_scheme(&self) -> Result<SignatureScheme, Error> {
        Ok(match self.signature_oid {
            OID_ECDSA_SHA256 => SignatureScheme::ECDSA_SECP256R1_SHA256,
            OID_ECDSA_SHA384 => SignatureScheme::ECDSA_SECP384R1_SHA384,
            OID_RSA_SHA256 => SignatureScheme::RSA_PKCS1_SHA256,
            OID_RSA_SHA384 => SignatureScheme::RSA_PKCS1_SHA384,
            OID_RSA_SHA512 => SignatureScheme::RSA_PKCS1_SHA512,
            OID_RSA_PSS => {
                let hash = self
                    .signature_params
                    .as_ref()
                    .map(pss_hash)
                    .transpose()?
                    .flatten();
                match hash {
                    Some(OID_SHA256) => SignatureScheme::RSA_PSS_RSAE_SHA256,
                    Some(OID_SHA384) => SignatureScheme::RSA_PSS_RSAE_SHA384,
                    Some(OID_SHA512) => SignatureScheme::RSA_PSS_RSAE_SHA512,
                    // Absent means SHA-1.
                    _ => {
                        return Err(Error::CertificateError(
                            "Unsupported RSASSA-PSS hash in certificate signature".to_string(),
                        ))
                    }
                }
            }
            oid => {
                return Err(Error::CertificateError(format!(
                    "Unsupported certificate signature algorithm: {}",
                    oid
                )))
            }
        })
    }
}

impl PartialEq for ParsedCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for ParsedCertificate {}

impl fmt::Debug for ParsedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedCertificate")
            .field("subject", &self.subject.to_string())
            .field("issuer", &self.issuer.to_string())
            .field("dns_names", &self.dns_names)
            .finish()
    }
}

/// Hash algorithm named in RSASSA-PSS-params, `None` for the SHA-1 default.
fn pss_hash(params: &Any) -> Result<Option<ObjectIdentifier>, Error> {
    params
        .sequence(|reader| {
            let hash: Option<AlgorithmIdentifierOwned> =
                reader.context_specific(TagNumber::N0, TagMode::Explicit)?;
            // maskGenAlgorithm, saltLength and trailerField are not needed
            reader.read_slice(reader.remaining_len())?;
            Ok(hash.map(|h| h.oid))
        })
        .map_err(|e| Error::CertificateError(format!("Bad RSASSA-PSS parameters: {e}")))
}

fn common_name(name: &Name) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == OID_COMMON_NAME)
        .and_then(|atv| std::str::from_utf8(atv.value.value()).ok())
        .map(|s| s.to_string())
}

fn ip_from_bytes(b: &[u8]) -> Option<IpAddr> {
    match b.len() {
        4 => <[u8; 4]>::try_from(b).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(b).ok().map(IpAddr::from),
        _ => None,
    }
}

fn to_system_time(d: Duration) -> SystemTime {
    UNIX_EPOCH + d
}

fn format_time(t: SystemTime) -> String {
    let dt = OffsetDateTime::from(t);
    dt.format(&Rfc3339).unwrap_or_else(|_| format!("{:?}", t))
}

#[cfg(test)]
pub(crate) mod test_util {
    use rcgen::{
        BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa,
    };

    /// One generated certificate and its key.
    pub struct Generated {
        pub cert: Certificate,
        pub der: Vec<u8>,
    }

    fn params(cn: &str, names: &[&str], ca: bool) -> CertificateParams {
        let mut params = CertificateParams::new(names.iter().map(|s| s.to_string()).collect::<Vec<String>>());
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        if ca {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        }
        params
    }

    pub fn root(cn: &str) -> Generated {
        let cert = Certificate::from_params(params(cn, &[], true)).unwrap();
        let der = cert.serialize_der().unwrap();
        Generated { cert, der }
    }

    pub fn intermediate(cn: &str, issuer: &Generated) -> Generated {
        let cert = Certificate::from_params(params(cn, &[], true)).unwrap();
        let der = cert.serialize_der_with_signer(&issuer.cert).unwrap();
        Generated { cert, der }
    }

    pub fn leaf(cn: &str, names: &[&str], issuer: &Generated) -> Generated {
        let cert = Certificate::from_params(params(cn, names, false)).unwrap();
        let der = cert.serialize_der_with_signer(&issuer.cert).unwrap();
        Generated { cert, der }
    }

    pub fn leaf_with(params: CertificateParams, issuer: &Generated) -> Generated {
        let cert = Certificate::from_params(params).unwrap();
        let der = cert.serialize_der_with_signer(&issuer.cert).unwrap();
        Generated { cert, der }
    }

    pub fn leaf_params(cn: &str, names: &[&str]) -> CertificateParams {
        params(cn, names, false)
    }
}

#[cfg(all(test, feature = "rust-crypto"))]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::crypto::rust_crypto::default_provider;

    #[test]
    fn parse_extracts_names() {
        let ca = root("Test Root");
        let mut params = leaf_params("www.example.com", &["www.example.com"]);
        params
            .subject_alt_names
            .push(rcgen::SanType::IpAddress("10.0.0.1".parse().unwrap()));
        let cert = ParsedCertificate::parse(&leaf_with(params, &ca).der).unwrap();

        assert_eq!(cert.common_name(), Some("www.example.com"));
        assert_eq!(cert.dns_names(), &["www.example.com".to_string()]);
        assert_eq!(cert.ip_addresses(), &["10.0.0.1".parse::<IpAddr>().unwrap()]);
        assert!(cert.subject().contains("www.example.com"));
        assert!(cert.issuer().contains("Test Root"));
        assert!(!cert.is_self_issued());
    }

    #[test]
    fn issuer_signature() {
        let provider = default_provider();
        let ca = root("Test Root");
        let other = root("Other Root");
        let leaf = ParsedCertificate::parse(&leaf("a", &["a.test"], &ca).der).unwrap();
        let ca = ParsedCertificate::parse(&ca.der).unwrap();
        let other = ParsedCertificate::parse(&other.der).unwrap();

        assert!(ca.is_issuer(&leaf));
        assert!(ca.is_self_issued());
        ca.verify_issued(&leaf, provider.signature_verification)
            .unwrap();
        ca.verify_issued(&ca, provider.signature_verification)
            .unwrap();

        assert!(!other.is_issuer(&leaf));
        assert!(matches!(
            other.verify_issued(&leaf, provider.signature_verification),
            Err(Error::SignatureVerificationFailed(_))
        ));
    }

    #[test]
    fn only_cas_issue() {
        let ca = root("Test Root");
        let plain = leaf("plain", &["plain.test"], &ca);
        let below = ParsedCertificate::parse(&leaf("below", &["below.test"], &plain).der).unwrap();
        let plain = ParsedCertificate::parse(&plain.der).unwrap();

        assert!(!plain.is_issuer(&below));
        // As a configured root it is still usable.
        assert!(plain.is_anchor_for(&below));
    }

    #[test]
    fn pss_parameters() {
        // hashAlgorithm [0] sha256, saltLength [2] 32
        let der = [
            0x30, 0x16, 0xa0, 0x0f, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03,
            0x04, 0x02, 0x01, 0x05, 0x00, 0xa2, 0x03, 0x02, 0x01, 0x20,
        ];
        let params = Any::from_der(&der).unwrap();
        assert_eq!(pss_hash(&params).unwrap(), Some(OID_SHA256));

        let defaults = Any::from_der(&[0x30, 0x00]).unwrap();
        assert_eq!(pss_hash(&defaults).unwrap(), None);
    }

    #[test]
    fn validity_window() {
        let ca = root("Test Root");
        let mut params = leaf_params("old", &["old.test"]);
        params.not_before = rcgen::date_time_ymd(2000, 1, 1);
        params.not_after = rcgen::date_time_ymd(2001, 1, 1);
        let cert = ParsedCertificate::parse(&leaf_with(params, &ca).der).unwrap();

        assert!(matches!(
            cert.check_validity(SystemTime::now()),
            Err(Error::CertificateExpired(_))
        ));
        assert!(matches!(
            cert.check_validity(UNIX_EPOCH),
            Err(Error::CertificateNotYetValid(_))
        ));
        let mid = UNIX_EPOCH + Duration::from_secs(963_000_000); // mid 2000
        cert.check_validity(mid).unwrap();
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            ParsedCertificate::parse(&[0x30, 0x03, 1, 2, 3]),
            Err(Error::CertificateError(_))
        ));
    }
}
