use math::{FieldElement, StarkField};

// BIT-REVERSAL HELPERS
// ================================================================================================

/// Reverses the lowest `bits` bits of `index`.
pub(crate) fn bit_reverse(index: u64, bits: usize) -> u64 {
    if bits == 0 {
        return 0;
    }
    index.reverse_bits() >> (64 - bits)
}

/// Permutes `values` in place so that entry `i` moves to position `bit_reverse(i)`.
pub(crate) fn permute_bit_reversed<T>(values: &mut [T]) {
    let n = values.len();
    if n <= 2 {
        return;
    }
    assert!(n.is_power_of_two(), "length must be a power of two");
    let bits = n.trailing_zeros() as usize;
    for i in 0..n as u64 {
        let rev = bit_reverse(i, bits);
        if rev > i {
            values.swap(i as usize, rev as usize);
        }
    }
}

/// Raises `base` to a 64-bit power by square-and-multiply.
pub(crate) fn exp_u64<E: FieldElement>(base: E, mut power: u64) -> E {
    let mut result = E::ONE;
    let mut acc = base;
    while power != 0 {
        if power & 1 == 1 {
            result *= acc;
        }
        acc = acc.square();
        power >>= 1;
    }
    result
}

// FFT BASES
// ================================================================================================

/// A tower of bit-reversed multiplicative coset domains.
///
/// Layer 0 is a coset `offset * <w>` of size `2^log_n`, enumerated in bit-reversed order:
/// `element_at(0, i) = offset * w^bitrev(i)`. Layer `k + 1` is obtained by squaring layer `k`,
/// so its size halves and its offset squares. Bit-reversed enumeration puts `f(x)` and `f(-x)`
/// in adjacent positions, which is what lets the FRI fold operate on neighboring pairs, and a
/// run of consecutive indices is itself a smaller bit-reversed coset, which is what
/// [Self::split_to_cosets] relies on.
#[derive(Clone, Debug)]
pub struct FftBases<B: StarkField> {
    log_n: usize,
    offsets: Vec<B>,
    generators: Vec<B>,
}

impl<B: StarkField> FftBases<B> {
    /// Returns the bases of the size-`2^log_n` coset with the given offset, generated by the
    /// field's canonical `2^log_n`-th root of unity.
    pub fn new(log_n: usize, offset: B) -> Self {
        Self::from_generator(log_n, B::get_root_of_unity(log_n as u32), offset)
    }

    /// Returns the bases generated by an explicit generator of order `2^log_n`.
    pub fn from_generator(log_n: usize, generator: B, offset: B) -> Self {
        let mut offsets = Vec::with_capacity(log_n + 1);
        let mut generators = Vec::with_capacity(log_n + 1);
        let mut g = generator;
        let mut h = offset;
        for _ in 0..=log_n {
            generators.push(g);
            offsets.push(h);
            g = g.square();
            h = h.square();
        }
        FftBases { log_n, offsets, generators }
    }

    /// Returns the number of layers, including the size-1 last one.
    pub fn num_layers(&self) -> usize {
        self.log_n + 1
    }

    pub fn log_n(&self) -> usize {
        self.log_n
    }

    pub fn layer_log_size(&self, layer: usize) -> usize {
        assert!(layer <= self.log_n, "layer {layer} out of range");
        self.log_n - layer
    }

    pub fn layer_size(&self, layer: usize) -> u64 {
        1_u64 << self.layer_log_size(layer)
    }

    pub fn offset(&self, layer: usize) -> B {
        self.offsets[layer]
    }

    pub fn generator(&self, layer: usize) -> B {
        self.generators[layer]
    }

    /// Returns the `index`-th element of the given layer.
    pub fn element_at(&self, layer: usize, index: u64) -> B {
        let bits = self.layer_log_size(layer);
        assert!(index < (1_u64 << bits), "index {index} out of range at layer {layer}");
        self.offsets[layer] * exp_u64(self.generators[layer], bit_reverse(index, bits))
    }

    /// Returns the tower that starts at the given layer.
    pub fn from_layer(&self, layer: usize) -> Self {
        assert!(layer <= self.log_n, "layer {layer} out of range");
        FftBases {
            log_n: self.log_n - layer,
            offsets: self.offsets[layer..].to_vec(),
            generators: self.generators[layer..].to_vec(),
        }
    }

    /// Returns the same tower with a different layer-0 offset.
    pub fn with_offset(&self, offset: B) -> Self {
        Self::from_generator(self.log_n, self.generators[0], offset)
    }

    /// Splits the given layer into cosets of `chunk_size` consecutive indices. Returns the
    /// chunk-sized sub-bases (with a unit offset) and the per-coset offsets; coset `j` is the
    /// sub-domain shifted by offset `j`.
    pub fn split_to_cosets(&self, layer: usize, chunk_size: u64) -> (Self, Vec<B>) {
        let layer_bits = self.layer_log_size(layer);
        assert!(chunk_size.is_power_of_two(), "chunk size must be a power of two");
        let chunk_bits = chunk_size.trailing_zeros() as usize;
        assert!(chunk_bits <= layer_bits, "chunk size exceeds the layer size");
        let log_cosets = layer_bits - chunk_bits;

        let w = self.generators[layer];
        let sub_generator = exp_u64(w, 1_u64 << log_cosets);
        let coset_bases = Self::from_generator(chunk_bits, sub_generator, B::ONE);
        let coset_offsets = (0..1_u64 << log_cosets)
            .map(|j| self.offsets[layer] * exp_u64(w, bit_reverse(j, log_cosets)))
            .collect();
        (coset_bases, coset_offsets)
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use math::fields::f128::BaseElement;

    #[test]
    fn adjacent_elements_are_negations() {
        let bases = FftBases::new(6, BaseElement::GENERATOR);
        for i in 0..bases.layer_size(0) / 2 {
            assert_eq!(bases.element_at(0, 2 * i), -bases.element_at(0, 2 * i + 1));
        }
    }

    #[test]
    fn next_layer_is_squares_of_even_elements() {
        let bases = FftBases::new(6, BaseElement::GENERATOR);
        for layer in 0..bases.num_layers() - 1 {
            for i in 0..bases.layer_size(layer + 1) {
                assert_eq!(
                    bases.element_at(layer + 1, i),
                    bases.element_at(layer, 2 * i).square()
                );
            }
        }
    }

    #[test]
    fn split_to_cosets_preserves_enumeration() {
        let bases = FftBases::new(6, BaseElement::GENERATOR);
        let chunk_size = 8_u64;
        let (coset_bases, coset_offsets) = bases.split_to_cosets(0, chunk_size);
        assert_eq!(coset_offsets.len() as u64, bases.layer_size(0) / chunk_size);

        for (j, &offset) in coset_offsets.iter().enumerate() {
            let shifted = coset_bases.with_offset(offset);
            for r in 0..chunk_size {
                assert_eq!(
                    shifted.element_at(0, r),
                    bases.element_at(0, j as u64 * chunk_size + r)
                );
            }
        }
    }

    #[test]
    fn from_layer_matches_parent() {
        let bases = FftBases::new(7, BaseElement::GENERATOR);
        let sub = bases.from_layer(3);
        assert_eq!(sub.layer_size(0), bases.layer_size(3));
        for i in 0..sub.layer_size(0) {
            assert_eq!(sub.element_at(0, i), bases.element_at(3, i));
        }
    }

    #[test]
    fn bit_reverse_is_an_involution() {
        for bits in 0..12_usize {
            for index in 0..(1_u64 << bits.min(8)) {
                assert_eq!(bit_reverse(bit_reverse(index, bits), bits), index);
            }
        }
    }
}
