use core::fmt;

// DIGEST
// ================================================================================================

/// Number of bytes in a digest. All hash families supported by this crate produce digests of
/// this width; the masked families zero a suffix or prefix but keep the full width.
pub const DIGEST_BYTES: usize = 32;

/// A fixed-width hash digest.
///
/// The digest is an inert byte array: it carries no memory of which hash family produced it.
/// This is what allows commitment layers built over different hash families to exchange
/// digests freely.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_BYTES]);

impl Digest {
    /// Wraps the provided bytes into a digest without hashing them.
    ///
    /// # Panics
    /// Panics if `bytes` is not exactly [DIGEST_BYTES] long.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert_eq!(
            bytes.len(),
            DIGEST_BYTES,
            "expected {DIGEST_BYTES} bytes, but got {}",
            bytes.len()
        );
        let mut buffer = [0_u8; DIGEST_BYTES];
        buffer.copy_from_slice(bytes);
        Digest(buffer)
    }

    /// Returns the underlying bytes of this digest.
    pub fn as_bytes(&self) -> &[u8; DIGEST_BYTES] {
        &self.0
    }

    /// Returns a hex representation of this digest, prefixed with `0x`.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses a digest from a hex string; an optional `0x` prefix is accepted.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).ok()?;
        (bytes.len() == DIGEST_BYTES).then(|| Self::from_bytes(&bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_BYTES]> for Digest {
    fn from(bytes: [u8; DIGEST_BYTES]) -> Self {
        Digest(bytes)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::Digest;

    #[test]
    fn hex_round_trip() {
        let digest = Digest::from_bytes(&[7_u8; 32]);
        let hex = digest.to_hex();
        assert_eq!(Digest::from_hex(&hex), Some(digest));
        assert_eq!(Digest::from_hex(hex.strip_prefix("0x").unwrap()), Some(digest));
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert_eq!(Digest::from_hex("0xabcd"), None);
    }
}
