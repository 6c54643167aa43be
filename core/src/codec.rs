//! Variable-length integer/blob framing used by blocks and transactions,
//! plus the URL-safe, unpadded base64 helpers used at every JSON boundary.
//!
//! Every multi-byte count in this module is big-endian, mirroring the
//! `arintenc`/`arbinenc`/`arintdec`/`arbindec` helpers in pyarweave's
//! `ar/utils/__init__.py`: a fixed-width big-endian length prefix, followed
//! by exactly that many bytes.

use std::io::Read;

use arweave_core_types::U256;

use crate::error::{Error, Result};

fn read_length<R: Read>(stream: &mut R, size_bytes: usize) -> Result<usize> {
    let mut buf = vec![0u8; size_bytes];
    stream.read_exact(&mut buf)?;
    let mut len: u128 = 0;
    for b in &buf {
        len = (len << 8) | (*b as u128);
    }
    Ok(len as usize)
}

fn encode_length(len: usize, size_bytes: usize) -> Vec<u8> {
    let full = (len as u128).to_be_bytes();
    full[full.len() - size_bytes..].to_vec()
}

/// Trims leading zero bytes from a big-endian integer representation,
/// except it always leaves at least a zero-length slice for the value `0`.
fn trim_be(bytes: &[u8]) -> &[u8] {
    let first_nonzero = bytes.iter().position(|&b| b != 0);
    match first_nonzero {
        Some(idx) => &bytes[idx..],
        None => &bytes[bytes.len()..],
    }
}

/// `arintenc(n, size_bytes)`: a byte-length-prefixed big-endian integer.
pub fn arintenc_u64(n: u64, size_bytes: usize) -> Vec<u8> {
    let be = n.to_be_bytes();
    let trimmed = trim_be(&be);
    let mut out = encode_length(trimmed.len(), size_bytes);
    out.extend_from_slice(trimmed);
    out
}

/// Inverse of [`arintenc_u64`].
pub fn arintdec_u64<R: Read>(stream: &mut R, size_bytes: usize) -> Result<u64> {
    let len = read_length(stream, size_bytes)?;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    if buf.len() > 8 {
        return Err(Error::MalformedBlock(format!(
            "integer field too wide for u64: {len} bytes"
        )));
    }
    let mut padded = [0u8; 8];
    padded[8 - buf.len()..].copy_from_slice(&buf);
    Ok(u64::from_be_bytes(padded))
}

/// `arintenc` for values that may exceed 64 bits (difficulty, cumulative
/// difficulty): these are the two fields the teacher's `types` crate already
/// models as [`U256`].
pub fn arintenc_u256(n: U256, size_bytes: usize) -> Vec<u8> {
    let mut be = [0u8; 32];
    n.to_big_endian(&mut be);
    let trimmed = trim_be(&be);
    let mut out = encode_length(trimmed.len(), size_bytes);
    out.extend_from_slice(trimmed);
    out
}

/// Inverse of [`arintenc_u256`].
pub fn arintdec_u256<R: Read>(stream: &mut R, size_bytes: usize) -> Result<U256> {
    let len = read_length(stream, size_bytes)?;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    if buf.len() > 32 {
        return Err(Error::MalformedBlock(format!(
            "integer field too wide for U256: {len} bytes"
        )));
    }
    Ok(U256::from_big_endian(&buf))
}

/// `arbinenc(b, size_bytes)`: a byte-length-prefixed opaque blob.
pub fn arbinenc(b: &[u8], size_bytes: usize) -> Vec<u8> {
    let mut out = encode_length(b.len(), size_bytes);
    out.extend_from_slice(b);
    out
}

/// Inverse of [`arbinenc`].
pub fn arbindec<R: Read>(stream: &mut R, size_bytes: usize) -> Result<Vec<u8>> {
    let len = read_length(stream, size_bytes)?;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

/// URL-safe, unpadded base64 encode.
pub fn b64enc(bytes: &[u8]) -> String {
    base64_url::encode(bytes)
}

/// URL-safe, unpadded base64 decode. Tolerates the absence of `=` padding,
/// since `base64_url` never expects it in the first place.
pub fn b64dec(s: &str) -> Result<Vec<u8>> {
    Ok(base64_url::decode(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn arintenc_round_trips_zero() {
        let bytes = arintenc_u64(0, 8);
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 0]);
        let mut cur = Cursor::new(bytes);
        assert_eq!(arintdec_u64(&mut cur, 8).unwrap(), 0);
    }

    #[test]
    fn arintenc_round_trips_arbitrary_values() {
        for n in [1u64, 255, 256, 65535, 1_000_000_007, u64::MAX] {
            let bytes = arintenc_u64(n, 8);
            let mut cur = Cursor::new(bytes);
            assert_eq!(arintdec_u64(&mut cur, 8).unwrap(), n);
        }
    }

    #[test]
    fn arbinenc_round_trips() {
        let blob = b"hello arweave".to_vec();
        let bytes = arbinenc(&blob, 8);
        assert_eq!(&bytes[..8], &8u64.to_be_bytes()[..]);
        let mut cur = Cursor::new(bytes);
        assert_eq!(arbindec(&mut cur, 8).unwrap(), blob);
    }

    #[test]
    fn arbinenc_round_trips_empty_blob() {
        let bytes = arbinenc(&[], 16);
        let mut cur = Cursor::new(bytes);
        assert_eq!(arbindec(&mut cur, 16).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn b64_round_trips_without_padding() {
        let data = b"\x00\x01\x02arbitrary bytes\xff";
        let encoded = b64enc(data);
        assert!(!encoded.contains('='));
        assert_eq!(b64dec(&encoded).unwrap(), data.to_vec());
    }
}
