//! Stable, deterministic, self-describing binary serialization.
//!
//! Supports big integers (sign + big-endian magnitude), fixed-width hashes
//! and addresses, length-prefixed byte strings, and length-prefixed
//! homogeneous sequences. Builder and reconstructor must use this module
//! exclusively so both sides agree byte-for-byte on the wire format.

use crate::errors::CodecError;
use alloy_primitives::{Address, B256};

/// A length prefix is a fixed 4-byte big-endian `u32`.
const LEN_PREFIX_BYTES: usize = 4;

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if buf.len() < n {
        return Err(CodecError::Truncated { expected: n, found: buf.len() });
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}

/// Appends `data` to `out` as a 4-byte-big-endian-length-prefixed byte string.
pub fn encode_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

/// Reads a length-prefixed byte string written by [`encode_bytes`].
///
/// Distinguishes two failure modes: [`CodecError::Truncated`] if the 4-byte
/// length prefix itself cannot be read, [`CodecError::BadLengthPrefix`] if
/// the prefix was read fine but declares more bytes than remain in `buf`.
pub fn decode_bytes(buf: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    let len_bytes = take(buf, LEN_PREFIX_BYTES)?;
    let len = u32::from_be_bytes(len_bytes.try_into().expect("4 bytes")) as usize;
    if buf.len() < len {
        return Err(CodecError::BadLengthPrefix { declared: len, read: buf.len() });
    }
    let (data, tail) = buf.split_at(len);
    *buf = tail;
    Ok(data.to_vec())
}

/// Appends a homogeneous sequence, each element written with [`encode_bytes`].
pub fn encode_seq(out: &mut Vec<u8>, items: &[Vec<u8>]) {
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        encode_bytes(out, item);
    }
}

/// Reads a homogeneous sequence written by [`encode_seq`].
pub fn decode_seq(buf: &mut &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
    let len_bytes = take(buf, LEN_PREFIX_BYTES)?;
    let count = u32::from_be_bytes(len_bytes.try_into().expect("4 bytes")) as usize;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(decode_bytes(buf)?);
    }
    Ok(items)
}

/// Encodes a fixed-width 32-byte hash.
pub fn encode_hash(out: &mut Vec<u8>, hash: B256) {
    out.extend_from_slice(hash.as_slice());
}

/// Decodes a fixed-width 32-byte hash.
pub fn decode_hash(buf: &mut &[u8]) -> Result<B256, CodecError> {
    let bytes = take(buf, 32)?;
    Ok(B256::from_slice(bytes))
}

/// Encodes a fixed-width 20-byte address.
pub fn encode_address(out: &mut Vec<u8>, addr: Address) {
    out.extend_from_slice(addr.as_slice());
}

/// Decodes a fixed-width 20-byte address.
pub fn decode_address(buf: &mut &[u8]) -> Result<Address, CodecError> {
    let bytes = take(buf, 20)?;
    Ok(Address::from_slice(bytes))
}

/// Encodes a fixed-width `u64`, big-endian.
pub fn encode_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Decodes a fixed-width `u64`, big-endian.
pub fn decode_u64(buf: &mut &[u8]) -> Result<u64, CodecError> {
    let bytes = take(buf, 8)?;
    Ok(u64::from_be_bytes(bytes.try_into().expect("8 bytes")))
}

/// A canonical big integer: a sign flag plus a big-endian magnitude with no
/// leading zero byte. Zero is always non-negative with an empty magnitude.
///
/// Two equal values always produce byte-identical [`BigInt::to_field_bytes`]
/// output, and `decode(encode(x)) == x` for every representable `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl BigInt {
    /// The canonical zero value.
    pub const ZERO: BigInt = BigInt { negative: false, magnitude: Vec::new() };

    fn canonical(negative: bool, magnitude: &[u8]) -> Self {
        let trimmed = match magnitude.iter().position(|b| *b != 0) {
            Some(idx) => &magnitude[idx..],
            None => &[][..],
        };
        if trimmed.is_empty() {
            Self::ZERO
        } else {
            Self { negative, magnitude: trimmed.to_vec() }
        }
    }

    /// Builds a [`BigInt`] from a signed 128-bit value.
    pub fn from_i128(v: i128) -> Self {
        let negative = v < 0;
        let magnitude = v.unsigned_abs().to_be_bytes();
        Self::canonical(negative, &magnitude)
    }

    /// Builds a non-negative [`BigInt`] from a `u64`.
    pub fn from_u64(v: u64) -> Self {
        Self::canonical(false, &v.to_be_bytes())
    }

    /// Returns this value as an `i64`, or [`CodecError::Overflow`] if it does not fit.
    pub fn try_into_i64(&self) -> Result<i64, CodecError> {
        if self.magnitude.len() > 8 {
            return Err(CodecError::Overflow { width: 64 });
        }
        let mut buf = [0u8; 8];
        buf[8 - self.magnitude.len()..].copy_from_slice(&self.magnitude);
        let unsigned = u64::from_be_bytes(buf);
        if self.negative {
            let v = unsigned as i128 * -1;
            i64::try_from(v).map_err(|_| CodecError::Overflow { width: 64 })
        } else {
            i64::try_from(unsigned).map_err(|_| CodecError::Overflow { width: 64 })
        }
    }

    /// Returns this value as a `u64`. Errors if negative or too large.
    pub fn try_into_u64(&self) -> Result<u64, CodecError> {
        if self.negative && !self.magnitude.is_empty() {
            return Err(CodecError::Overflow { width: 64 });
        }
        if self.magnitude.len() > 8 {
            return Err(CodecError::Overflow { width: 64 });
        }
        let mut buf = [0u8; 8];
        buf[8 - self.magnitude.len()..].copy_from_slice(&self.magnitude);
        Ok(u64::from_be_bytes(buf))
    }

    /// `true` if this value is strictly negative.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Encodes as `[sign byte][magnitude]`: `0x00` non-negative, `0x01` negative.
    pub fn to_field_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.magnitude.len());
        out.push(self.negative as u8);
        out.extend_from_slice(&self.magnitude);
        out
    }

    /// Inverse of [`BigInt::to_field_bytes`].
    pub fn from_field_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let (sign, magnitude) =
            bytes.split_first().ok_or(CodecError::Truncated { expected: 1, found: 0 })?;
        let negative = match sign {
            0 => false,
            1 => true,
            _ => return Err(CodecError::Overflow { width: 8 }),
        };
        Ok(Self::canonical(negative, magnitude))
    }
}

/// Encodes a [`BigInt`] as a length-prefixed field, per `spec.md` §6.
pub fn encode_bigint(out: &mut Vec<u8>, v: &BigInt) {
    encode_bytes(out, &v.to_field_bytes());
}

/// Decodes a [`BigInt`] written by [`encode_bigint`].
pub fn decode_bigint(buf: &mut &[u8]) -> Result<BigInt, CodecError> {
    let raw = decode_bytes(buf)?;
    BigInt::from_field_bytes(&raw)
}

/// Encodes a sequence of [`BigInt`]s, per `spec.md` §6 fields 5 and 7.
pub fn encode_bigint_seq(out: &mut Vec<u8>, items: &[BigInt]) {
    let encoded: Vec<Vec<u8>> = items.iter().map(BigInt::to_field_bytes).collect();
    encode_seq(out, &encoded);
}

/// Decodes a sequence of [`BigInt`]s written by [`encode_bigint_seq`].
pub fn decode_bigint_seq(buf: &mut &[u8]) -> Result<Vec<BigInt>, CodecError> {
    decode_seq(buf)?.iter().map(|raw| BigInt::from_field_bytes(raw)).collect()
}

/// Encodes the `reorgs` field: `None` as a single absence byte, `Some` as a
/// presence byte followed by the sequence. See `DESIGN.md` Open Question 1.
pub fn encode_reorgs(out: &mut Vec<u8>, reorgs: Option<&[Vec<u8>]>) {
    match reorgs {
        None => out.push(0),
        Some(items) => {
            out.push(1);
            encode_seq(out, items);
        }
    }
}

/// Decodes the `reorgs` field written by [`encode_reorgs`].
///
/// A present sequence whose entries are all empty is rejected: `encode`
/// never produces that shape, so `decode` treats it as malformed rather
/// than silently accepting a second encoding of "no reorgs".
pub fn decode_reorgs(buf: &mut &[u8]) -> Result<Option<Vec<Vec<u8>>>, CodecError> {
    let tag = take(buf, 1)?[0];
    match tag {
        0 => Ok(None),
        1 => {
            let items = decode_seq(buf)?;
            if !items.is_empty() && items.iter().all(Vec::is_empty) {
                return Err(CodecError::EmptyReorgsSequence);
            }
            Ok(Some(items))
        }
        _ => Err(CodecError::Overflow { width: 8 }),
    }
}
