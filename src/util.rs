//! Length-prefixed encode/decode and small byte helpers shared by the codec,
//! the record layer and the key schedule.

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::IResult;
use subtle::ConstantTimeEq;

use crate::buffer::Buf;

/// Parse `len(1) || data`.
pub fn u8_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u8(input)?;
    take(len as usize)(input)
}

/// Parse `len(2) || data`.
pub fn u16_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u16(input)?;
    take(len as usize)(input)
}

/// Parse `len(3) || data`.
pub fn u24_prefixed(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, len) = be_u24(input)?;
    take(len as usize)(input)
}

/// Apply `f` repeatedly until `input` is exhausted.
///
/// Fails if `f` fails on any element or does not make progress.
pub fn all_of<'a, O, F>(mut input: &'a [u8], mut f: F) -> IResult<&'a [u8], Vec<O>>
where
    F: FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
{
    let mut out = Vec::new();
    while !input.is_empty() {
        let before = input.len();
        let (rest, o) = f(input)?;
        if rest.len() == before {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Many0,
            )));
        }
        out.push(o);
        input = rest;
    }
    Ok((input, out))
}

pub fn put_u8_prefixed(out: &mut Buf, data: &[u8]) {
    debug_assert!(data.len() <= u8::MAX as usize);
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}

pub fn put_u16_prefixed(out: &mut Buf, data: &[u8]) {
    debug_assert!(data.len() <= u16::MAX as usize);
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

#[cfg(test)]
pub fn put_u24_prefixed(out: &mut Buf, data: &[u8]) {
    debug_assert!(data.len() <= 0xff_ffff);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(data);
}

/// Write a u8 length placeholder, run `f`, then patch in the length it wrote.
pub fn with_u8_len(out: &mut Buf, f: impl FnOnce(&mut Buf)) {
    let at = out.len();
    out.push(0);
    f(out);
    let len = out.len() - at - 1;
    debug_assert!(len <= u8::MAX as usize);
    out[at] = len as u8;
}

/// Write a u16 length placeholder, run `f`, then patch in the length it wrote.
pub fn with_u16_len(out: &mut Buf, f: impl FnOnce(&mut Buf)) {
    let at = out.len();
    out.extend_from_slice(&[0, 0]);
    f(out);
    let len = out.len() - at - 2;
    debug_assert!(len <= u16::MAX as usize);
    out[at..at + 2].copy_from_slice(&(len as u16).to_be_bytes());
}

/// Write a u24 length placeholder, run `f`, then patch in the length it wrote.
pub fn with_u24_len(out: &mut Buf, f: impl FnOnce(&mut Buf)) {
    let at = out.len();
    out.extend_from_slice(&[0, 0, 0]);
    f(out);
    let len = out.len() - at - 3;
    debug_assert!(len <= 0xff_ffff);
    out[at..at + 3].copy_from_slice(&(len as u32).to_be_bytes()[1..]);
}

/// XOR the 64-bit sequence number, big-endian and right-aligned, into `iv`.
pub fn xor_sequence(iv: &mut [u8], seq: u64) {
    let seq = seq.to_be_bytes();
    let off = iv.len().saturating_sub(8);
    for (b, s) in iv[off..].iter_mut().zip(seq.iter()) {
        *b ^= s;
    }
}

/// Pad to a multiple of `block_size` with TLS padding.
///
/// Adds between 1 and `block_size` bytes, each equal to the number of
/// padding bytes minus one.
pub fn add_tls_padding(out: &mut Buf, block_size: usize) {
    let n = block_size - (out.len() % block_size);
    let v = (n - 1) as u8;
    for _ in 0..n {
        out.push(v);
    }
}

/// Length of `data` once TLS padding is removed.
///
/// Returns `None` if the padding is malformed. Every padding byte is
/// inspected regardless of where a mismatch occurs.
pub fn strip_tls_padding(data: &[u8]) -> Option<usize> {
    let last = *data.last()?;
    let n = last as usize + 1;
    if n > data.len() {
        return None;
    }
    let mut bad = 0u8;
    for b in &data[data.len() - n..] {
        bad |= b ^ last;
    }
    if bad != 0 {
        return None;
    }
    Some(data.len() - n)
}

/// Equality that does not exit early on the first differing byte.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Lower-case hex rendering of expected values in tests.
#[cfg(test)]
pub(crate) fn hex(data: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Decode a hex fixture.
#[cfg(test)]
pub(crate) fn unhex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}
