use math::{fields::f128, fields::f64, FieldElement, StarkField};

// WIRE-FORMAT VIEW OF FIELD ELEMENTS
// ================================================================================================

/// Byte-level view of a prime-field element as it appears on the wire and in the transcript.
///
/// Elements are serialized as fixed-width big-endian integers in standard (reduced) form;
/// decoding rejects any value at or above the modulus. Sampling maps `ELEMENT_BYTES` uniform
/// bytes onto the field by modular reduction, which is the scheme both transcript channels use
/// when they draw field elements.
pub trait FieldElementBytes: StarkField {
    /// Writes the big-endian standard form of this element into `out`.
    ///
    /// # Panics
    /// Panics if `out` is not exactly `ELEMENT_BYTES` long.
    fn to_bytes_be(&self, out: &mut [u8]);

    /// Parses an element from its big-endian standard form; returns `None` for values at or
    /// above the modulus.
    fn from_bytes_be(bytes: &[u8]) -> Option<Self>;

    /// Maps `ELEMENT_BYTES` uniform bytes onto the field.
    fn from_uniform_bytes(bytes: &[u8]) -> Self;

    /// Returns the big-endian standard form of this element as a hex string.
    fn to_hex(&self) -> String {
        let mut bytes = vec![0_u8; Self::ELEMENT_BYTES];
        self.to_bytes_be(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }

    /// Parses an element from a hex string; an optional `0x` prefix is accepted.
    fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).ok()?;
        (bytes.len() == Self::ELEMENT_BYTES)
            .then(|| Self::from_bytes_be(&bytes))
            .flatten()
    }
}

impl FieldElementBytes for f128::BaseElement {
    fn to_bytes_be(&self, out: &mut [u8]) {
        assert_eq!(out.len(), Self::ELEMENT_BYTES, "unexpected output width");
        out.copy_from_slice(&self.as_int().to_be_bytes());
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        let value = u128::from_be_bytes(bytes.try_into().ok()?);
        (value < Self::MODULUS).then(|| Self::new(value))
    }

    fn from_uniform_bytes(bytes: &[u8]) -> Self {
        let value = u128::from_be_bytes(bytes.try_into().expect("unexpected input width"));
        Self::new(value % Self::MODULUS)
    }
}

impl FieldElementBytes for f64::BaseElement {
    fn to_bytes_be(&self, out: &mut [u8]) {
        assert_eq!(out.len(), Self::ELEMENT_BYTES, "unexpected output width");
        out.copy_from_slice(&self.as_int().to_be_bytes());
    }

    fn from_bytes_be(bytes: &[u8]) -> Option<Self> {
        let value = u64::from_be_bytes(bytes.try_into().ok()?);
        (value < Self::MODULUS).then(|| Self::new(value))
    }

    fn from_uniform_bytes(bytes: &[u8]) -> Self {
        let value = u64::from_be_bytes(bytes.try_into().expect("unexpected input width"));
        Self::new(value % Self::MODULUS)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    type BaseElement = f128::BaseElement;

    #[test]
    fn bytes_round_trip() {
        let value = BaseElement::new(0x1234_5678_9abc_def0);
        let mut bytes = vec![0_u8; BaseElement::ELEMENT_BYTES];
        value.to_bytes_be(&mut bytes);
        assert_eq!(BaseElement::from_bytes_be(&bytes), Some(value));
    }

    #[test]
    fn non_canonical_values_are_rejected() {
        let bytes = [0xff_u8; 16];
        assert_eq!(BaseElement::from_bytes_be(&bytes), None);
    }

    #[test]
    fn hex_round_trip() {
        let value = f64::BaseElement::new(42);
        assert_eq!(f64::BaseElement::from_hex(&value.to_hex()), Some(value));
    }

    #[test]
    fn uniform_bytes_reduce_modulo() {
        let bytes = [0xff_u8; 8];
        let value = f64::BaseElement::from_uniform_bytes(&bytes);
        assert_eq!(value.as_int(), u64::from_be_bytes(bytes) % f64::BaseElement::MODULUS);
    }
}
