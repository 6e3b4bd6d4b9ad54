//! Integer byte encoding
//!
//! Integers are stored as minimal little-endian two's-complement bytes.
//! Zero encodes as the empty sequence, so `decode(encode(v)) == v` holds for
//! every value and the encoding of `0` matches the encoding of `false`.

use num_bigint::BigInt;
use num_traits::Zero;

/// Encode an integer as minimal little-endian two's complement
pub fn encode(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Decode little-endian two's complement bytes (empty = 0)
pub fn decode(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_le(bytes)
}
