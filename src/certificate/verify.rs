use std::net::IpAddr;
use std::time::SystemTime;

use super::{ParsedCertificate, RootStore};
use crate::crypto::SignatureVerifier;
use crate::Error;

/// Match a certificate name against `host`.
///
/// A leading `*` label matches exactly one host label and the label
/// counts must otherwise be equal. Comparison ignores ASCII case and a
/// trailing dot.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let p: Vec<&str> = pattern.split('.').collect();
    let h: Vec<&str> = host.split('.').collect();
    if p.len() != h.len() {
        return false;
    }

    p.iter().zip(h.iter()).enumerate().all(|(i, (p, h))| {
        if i == 0 && *p == "*" {
            !h.is_empty()
        } else {
            p == h
        }
    })
}

fn check_host(leaf: &ParsedCertificate, host: &str) -> Result<(), Error> {
    let matched = match host.parse::<IpAddr>() {
        Ok(ip) => leaf.ip_addresses().contains(&ip),
        Err(_) => leaf
            .common_name()
            .into_iter()
            .chain(leaf.dns_names().iter().map(|s| s.as_str()))
            .any(|name| host_matches(name, host)),
    };
    if matched {
        Ok(())
    } else {
        Err(Error::HostnameMismatch(host.to_string()))
    }
}

/// Verify `chain` (leaf first) for `host` against `roots`.
///
/// Intermediates may arrive in any order and extra certificates are
/// ignored. The walk repeatedly looks, among the certificates not used
/// yet, for one that issued the current top of the chain. When none is
/// left, the top must be issued by a trusted root.
pub fn verify_certificate_chain(
    chain: &[ParsedCertificate],
    host: &str,
    roots: &RootStore,
    verifier: &dyn SignatureVerifier,
    now: SystemTime,
) -> Result<(), Error> {
    let (leaf, rest) = chain
        .split_first()
        .ok_or_else(|| Error::CertificateError("Empty certificate chain".to_string()))?;

    check_host(leaf, host)?;

    let mut remaining: Vec<&ParsedCertificate> = rest.iter().collect();
    let mut walked = vec![leaf];
    let mut current = leaf;

    loop {
        let mut found = None;
        let mut last_err = None;
        for (i, cand) in remaining.iter().enumerate() {
            if !cand.is_issuer(current) {
                continue;
            }
            match cand.verify_issued(current, verifier) {
                Ok(()) => {
                    found = Some(i);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }

        match (found, last_err) {
            (Some(i), _) => {
                current = remaining.remove(i);
                trace!("Chain: {} issued by {}", walked.len(), current.subject());
                walked.push(current);
            }
            (None, Some(e)) => return Err(e),
            (None, None) => break,
        }
    }

    if !remaining.is_empty() {
        debug!("Ignoring {} unused certificate(s) in chain", remaining.len());
    }

    let mut unsupported = None;
    let anchor = roots.iter().find(|root| {
        if !root.is_anchor_for(current) {
            return false;
        }
        match root.verify_issued(current, verifier) {
            Ok(()) => true,
            Err(e @ Error::CertificateError(_)) => {
                unsupported = Some(e);
                false
            }
            Err(_) => false,
        }
    });
    let anchor = match (anchor, unsupported) {
        (Some(anchor), _) => anchor,
        (None, Some(e)) => return Err(e),
        (None, None) => return Err(Error::UntrustedRoot(current.issuer())),
    };

    for cert in &walked {
        // A root the server sent along is trusted as is.
        if *cert == anchor {
            continue;
        }
        cert.check_validity(now)?;
    }

    debug!("Chain verified to root {}", anchor.subject());
    Ok(())
}
