use math::{FieldElement, StarkField};
use rand_utils::rand_vector;

use crate::bases::FftBases;
use crate::lde::LdeManager;

// TEST POLYNOMIALS
// ================================================================================================

/// Evaluates a (padded) coefficient vector over the layer-0 domain of `bases`, in the domain's
/// bit-reversed order.
pub fn evaluate_coefficients<B: StarkField>(coefficients: &[B], bases: &FftBases<B>) -> Vec<B> {
    let mut padded = coefficients.to_vec();
    padded.resize(bases.layer_size(0) as usize, B::ZERO);
    let lde = LdeManager::from_coefficients(bases.from_layer(0), padded);
    let mut evaluation = vec![B::ZERO; bases.layer_size(0) as usize];
    lde.eval_on_coset(bases.offset(0), &mut evaluation, &lde.fft_precompute());
    evaluation
}

/// Returns the evaluation of a random polynomial of degree less than `degree_bound` over the
/// layer-0 domain of `bases`.
pub fn random_polynomial_evaluation<B: StarkField + utils::Randomizable>(
    degree_bound: usize,
    bases: &FftBases<B>,
) -> Vec<B> {
    let coefficients: Vec<B> = rand_vector(degree_bound);
    evaluate_coefficients(&coefficients, bases)
}
