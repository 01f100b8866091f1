//! Blake3 content digests used for transaction ids, block ids and account ids.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit digest.
pub type H256 = [u8; 32];

/// A 256-bit digest.
///
/// Ordering is numeric: the bytes are read as a big-endian integer, which is
/// exactly the lexicographic order of the array. Proof of work relies on this
/// (`id <= target`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero digest, used as the genesis predecessor sentinel.
    pub const ZERO: Self = Self([0u8; 32]);

    /// The largest possible digest. Every id satisfies this target.
    pub const MAX: Self = Self([0xffu8; 32]);

    /// Create a new Hash from raw bytes.
    pub fn from_bytes(bytes: H256) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Build a target whose first `bits` bits are zero and the rest are one.
    ///
    /// `bits` is clamped to 256.
    pub fn with_leading_zero_bits(bits: u32) -> Self {
        let bits = bits.min(256) as usize;
        let mut out = [0xffu8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            let start = i * 8;
            if start + 8 <= bits {
                *byte = 0;
            } else if start < bits {
                *byte = 0xff >> (bits - start);
            }
        }
        Self(out)
    }

    /// Number of leading zero bits.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }

    /// Whether this digest is numerically at or below `target`.
    pub fn meets_target(&self, target: &Hash) -> bool {
        self <= target
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash arbitrary data using Blake3.
pub fn hash(data: &[u8]) -> Hash {
    Hash(blake3::hash(data).into())
}

/// Hash multiple pieces of data by concatenating them.
pub fn hash_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

/// Hash the bincode encoding of a value.
///
/// Used wherever a ledger structure is content-addressed.
pub fn hash_encoded<T: Serialize + ?Sized>(value: &T) -> Hash {
    let encoded = bincode::serialize(value).expect("serialization should not fail");
    hash(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        assert_eq!(hash(data), hash(data));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(hash(b"hello"), hash(b"world"));
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = hash(b"test data");
        let parsed = Hash::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_hash_display() {
        let display = format!("{}", hash(b"test"));
        assert!(display.starts_with("0x"));
        assert_eq!(display.len(), 66); // "0x" + 64 hex chars
    }

    #[test]
    fn test_hash_concat() {
        assert_eq!(hash_concat(&[b"hello", b"world"]), hash(b"helloworld"));
    }

    #[test]
    fn test_ordering_is_big_endian() {
        let mut low = [0u8; 32];
        low[31] = 0xff;
        let mut high = [0u8; 32];
        high[0] = 0x01;
        assert!(Hash(low) < Hash(high));
        assert!(Hash::ZERO < Hash(low));
        assert!(Hash(high) < Hash::MAX);
    }

    #[test]
    fn test_leading_zero_target() {
        let t = Hash::with_leading_zero_bits(8);
        assert_eq!(t.0[0], 0x00);
        assert_eq!(t.0[1], 0xff);
        assert_eq!(t.leading_zero_bits(), 8);

        let t = Hash::with_leading_zero_bits(12);
        assert_eq!(t.0[0], 0x00);
        assert_eq!(t.0[1], 0x0f);
        assert_eq!(t.leading_zero_bits(), 12);

        assert_eq!(Hash::with_leading_zero_bits(0), Hash::MAX);
        assert_eq!(Hash::with_leading_zero_bits(300), Hash::ZERO);
    }

    #[test]
    fn test_meets_target() {
        let target = Hash::with_leading_zero_bits(8);
        let mut below = [0xffu8; 32];
        below[0] = 0x00;
        let mut above = [0u8; 32];
        above[0] = 0x01;

        assert!(Hash(below).meets_target(&target));
        assert!(!Hash(above).meets_target(&target));
        assert!(Hash::ZERO.meets_target(&Hash::ZERO));
    }
}
