use crate::buffer::Buf;
use crate::crypto::HmacProvider;
use crate::types::HashAlgorithm;

/// PRF for TLS 1.2
/// as specified in RFC 5246 Section 5.
///
/// PRF(secret, label, seed) = P_<hash>(secret, label + seed)
///
/// The seed parameter is the seed data WITHOUT the label.
pub fn prf_tls12(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    debug_assert!(label.is_ascii());
    let mut full_seed = Vec::with_capacity(label.len() + seed.len());
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    p_hash(hmac, hash, secret, &full_seed, out, output_len)
}

fn p_hash(
    hmac: &dyn HmacProvider,
    hash: HashAlgorithm,
    secret: &[u8],
    full_seed: &[u8],
    out: &mut Buf,
    output_len: usize,
) -> Result<(), String> {
    out.clear();

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = Buf::new();
    hmac.hmac(hash, secret, full_seed, &mut a)?;

    let mut input = Buf::new();
    let mut block = Buf::new();
    while out.len() < output_len {
        // HMAC_hash(secret, A(i) + seed)
        input.clear();
        input.extend_from_slice(&a);
        input.extend_from_slice(full_seed);
        hmac.hmac(hash, secret, &input, &mut block)?;

        let remaining = output_len - out.len();
        let to_copy = remaining.min(block.len());
        out.extend_from_slice(&block[..to_copy]);

        if out.len() < output_len {
            // A(i+1) = HMAC_hash(secret, A(i))
            let prev = std::mem::take(&mut a);
            hmac.hmac(hash, secret, &prev, &mut a)?;
        }
    }

    block.wipe();
    a.wipe();
    Ok(())
}
