use math::{fft, polynom, StarkField};

use crate::bases::{permute_bit_reversed, FftBases};

// FFT PRECOMPUTE
// ================================================================================================

/// Twiddle-factor table reused across coset evaluations of the same polynomial.
///
/// The twiddles depend only on the domain size, not on the coset offset, so a single table
/// serves every coset of a layer.
pub struct FftPrecompute<B: StarkField> {
    twiddles: Vec<B>,
}

// LDE MANAGER
// ================================================================================================

/// Holder of a low-degree polynomial that can re-evaluate it on any coset of its domain tower.
///
/// Coefficients are kept in natural (monomial) order, the dual of the bit-reversed order the
/// evaluations live in; the permutation happens at the FFT boundary in both directions.
pub struct LdeManager<B: StarkField> {
    bases: FftBases<B>,
    coefficients: Vec<B>,
}

impl<B: StarkField> LdeManager<B> {
    /// Interpolates the polynomial from its evaluation over the layer-0 domain of `bases`.
    pub fn from_evaluation(bases: FftBases<B>, mut evaluation: Vec<B>) -> Self {
        assert!(
            evaluation.len() as u64 == bases.layer_size(0),
            "evaluation size does not match the domain size"
        );
        permute_bit_reversed(&mut evaluation);
        let inv_twiddles = fft::get_inv_twiddles::<B>(evaluation.len());
        fft::interpolate_poly_with_offset(&mut evaluation, &inv_twiddles, bases.offset(0));
        LdeManager { bases, coefficients: evaluation }
    }

    /// Wraps an already-known coefficient vector (natural order, padded to the domain size).
    pub fn from_coefficients(bases: FftBases<B>, coefficients: Vec<B>) -> Self {
        assert!(
            coefficients.len() as u64 == bases.layer_size(0),
            "coefficient count does not match the domain size"
        );
        LdeManager { bases, coefficients }
    }

    /// Builds the twiddle table for this polynomial's domain size.
    pub fn fft_precompute(&self) -> FftPrecompute<B> {
        FftPrecompute { twiddles: fft::get_twiddles::<B>(self.coefficients.len()) }
    }

    /// Evaluates the polynomial over `coset_offset * <w>` and writes the result in bit-reversed
    /// order into `output`.
    pub fn eval_on_coset(
        &self,
        coset_offset: B,
        output: &mut [B],
        precompute: &FftPrecompute<B>,
    ) {
        assert!(output.len() == self.coefficients.len(), "wrong output size");
        let mut evaluations = fft::evaluate_poly_with_offset(
            &self.coefficients,
            &precompute.twiddles,
            coset_offset,
            1,
        );
        permute_bit_reversed(&mut evaluations);
        output.copy_from_slice(&evaluations);
    }

    /// Evaluates the polynomial at arbitrary points.
    pub fn eval_at_points(&self, points: &[B]) -> Vec<B> {
        points.iter().map(|&x| polynom::eval(&self.coefficients, x)).collect()
    }

    /// Returns the degree of the held polynomial (0 for the zero polynomial).
    pub fn degree(&self) -> usize {
        polynom::degree_of(&self.coefficients)
    }

    pub fn coefficients(&self) -> &[B] {
        &self.coefficients
    }

    pub fn bases(&self) -> &FftBases<B> {
        &self.bases
    }
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use math::fields::f128::BaseElement;
    use math::{FieldElement, StarkField};
    use rand_utils::rand_vector;

    fn evaluate_directly(coefficients: &[BaseElement], bases: &FftBases<BaseElement>) -> Vec<BaseElement> {
        (0..bases.layer_size(0))
            .map(|i| polynom::eval(coefficients, bases.element_at(0, i)))
            .collect()
    }

    #[test]
    fn interpolation_round_trip() {
        let bases = FftBases::new(6, BaseElement::GENERATOR);
        let mut coefficients: Vec<BaseElement> = rand_vector(20);
        coefficients.resize(bases.layer_size(0) as usize, BaseElement::ZERO);

        let evaluation = evaluate_directly(&coefficients, &bases);
        let lde = LdeManager::from_evaluation(bases, evaluation);
        assert_eq!(lde.coefficients(), &coefficients[..]);
        assert_eq!(lde.degree(), 19);
    }

    #[test]
    fn coset_evaluation_matches_direct_evaluation() {
        let bases = FftBases::new(5, BaseElement::GENERATOR);
        let mut coefficients: Vec<BaseElement> = rand_vector(7);
        coefficients.resize(bases.layer_size(0) as usize, BaseElement::ZERO);
        let lde = LdeManager::from_coefficients(bases.clone(), coefficients.clone());

        let precompute = lde.fft_precompute();
        let shift = BaseElement::new(11);
        let shifted = bases.with_offset(bases.offset(0) * shift);
        let mut output = vec![BaseElement::ZERO; bases.layer_size(0) as usize];
        lde.eval_on_coset(shifted.offset(0), &mut output, &precompute);

        assert_eq!(output, evaluate_directly(&coefficients, &shifted));
    }

    #[test]
    fn point_evaluation_matches_horner() {
        let bases = FftBases::new(4, BaseElement::GENERATOR);
        let mut coefficients: Vec<BaseElement> = rand_vector(5);
        coefficients.resize(bases.layer_size(0) as usize, BaseElement::ZERO);
        let lde = LdeManager::from_coefficients(bases, coefficients.clone());

        let points: Vec<BaseElement> = rand_vector(3);
        let values = lde.eval_at_points(&points);
        for (point, value) in points.iter().zip(values) {
            assert_eq!(value, polynom::eval(&coefficients, *point));
        }
    }
}
