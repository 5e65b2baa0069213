use math::{get_power_series, FieldElement, StarkField};

#[cfg(feature = "concurrent")]
use rayon::prelude::*;

use crate::bases::{permute_bit_reversed, FftBases};

// FRI FOLDER
// ================================================================================================
//
// Multiplicative folding formula:
//   f(x)  = g(x^2) + x*h(x^2)
//   f(-x) = g(x^2) - x*h(x^2)
//   =>
//   2g(x^2) = f(x) + f(-x)
//   2h(x^2) = (f(x) - f(-x))/x
//   =>
//   2g(x^2) + 2a*h(x^2) = f(x) + f(-x) + a*(f(x) - f(-x))/x.

/// Folds below this many elements (log2) stay on a single task.
#[cfg(feature = "concurrent")]
const MIN_LOG_N_FRI_TASK_SIZE: usize = 12;

#[inline]
fn fold<B: FieldElement>(f_x: B, f_minus_x: B, eval_point: B, x_inv: B) -> B {
    f_x + f_minus_x + eval_point * (f_x - f_minus_x) * x_inv
}

/// Computes one element of the next FRI layer from two co-located elements of the current one.
/// `x` is the domain element at the position of `f_x`; it is inverted internally.
pub fn next_layer_element_from_two_previous<B: FieldElement>(
    f_x: B,
    f_minus_x: B,
    eval_point: B,
    x: B,
) -> B {
    fold(f_x, f_minus_x, eval_point, x.inv())
}

/// Folds a whole layer: `values` is the evaluation over the layer-0 domain of `domain`, in
/// bit-reversed order, so that `values[2j]` and `values[2j + 1]` are `f(x)` and `f(-x)`.
/// Writes the half-size folded evaluation into `output`.
pub fn compute_next_fri_layer<B: StarkField>(
    domain: &FftBases<B>,
    values: &[B],
    eval_point: B,
    output: &mut [B],
) {
    assert!(values.len() as u64 == domain.layer_size(0), "vector size does not match domain size");
    assert!(
        output.len() == values.len() / 2,
        "output layer size must be half of the original"
    );
    let n_pairs = output.len();
    if n_pairs == 0 {
        return;
    }

    // The even-position elements are offset * w^bitrev(j) over half the exponent range, so
    // their inverses come from one power series of the inverse generator, bit-reverse permuted.
    let offset_inv = domain.offset(0).inv();
    let mut x_invs = get_power_series(domain.generator(0).inv(), n_pairs);
    for x_inv in x_invs.iter_mut() {
        *x_inv *= offset_inv;
    }
    permute_bit_reversed(&mut x_invs);

    fold_chunk(values, &x_invs, eval_point, output);
}

#[cfg(not(feature = "concurrent"))]
fn fold_chunk<B: FieldElement>(values: &[B], x_invs: &[B], eval_point: B, output: &mut [B]) {
    for (j, out) in output.iter_mut().enumerate() {
        *out = fold(values[2 * j], values[2 * j + 1], eval_point, x_invs[j]);
    }
}

#[cfg(feature = "concurrent")]
fn fold_chunk<B: FieldElement>(values: &[B], x_invs: &[B], eval_point: B, output: &mut [B]) {
    let task_size = output.len().max(1).min(1 << MIN_LOG_N_FRI_TASK_SIZE);
    output
        .par_chunks_mut(task_size)
        .zip(values.par_chunks(2 * task_size))
        .zip(x_invs.par_chunks(task_size))
        .for_each(|((out, vals), xs)| {
            for (j, out) in out.iter_mut().enumerate() {
                *out = fold(vals[2 * j], vals[2 * j + 1], eval_point, xs[j]);
            }
        });
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use math::fields::f128::BaseElement;
    use math::polynom;
    use rand_utils::{rand_value, rand_vector};

    use crate::test_utils::evaluate_coefficients;

    #[test]
    fn fold_of_split_polynomial_recovers_components() {
        // f(z) = g(z^2) + z*h(z^2) with deg g, deg h < 8; folding with alpha must produce the
        // evaluation of 2*(g + alpha*h) over the squared domain.
        let bases = FftBases::<BaseElement>::new(5, BaseElement::GENERATOR);
        let g: Vec<BaseElement> = rand_vector(8);
        let h: Vec<BaseElement> = rand_vector(8);
        let mut f = vec![BaseElement::ZERO; 16];
        for i in 0..8 {
            f[2 * i] = g[i];
            f[2 * i + 1] = h[i];
        }

        let values = evaluate_coefficients(&f, &bases);
        let alpha: BaseElement = rand_value();
        let mut output = vec![BaseElement::ZERO; values.len() / 2];
        compute_next_fri_layer(&bases, &values, alpha, &mut output);

        for j in 0..output.len() as u64 {
            let x_squared = bases.element_at(1, j);
            let expected =
                (polynom::eval(&g, x_squared) + alpha * polynom::eval(&h, x_squared)).double();
            assert_eq!(output[j as usize], expected);
        }
    }

    #[test]
    fn pairwise_fold_matches_bulk_fold() {
        let bases = FftBases::<BaseElement>::new(4, BaseElement::GENERATOR);
        let values: Vec<BaseElement> = rand_vector(16);
        let alpha: BaseElement = rand_value();

        let mut output = vec![BaseElement::ZERO; 8];
        compute_next_fri_layer(&bases, &values, alpha, &mut output);

        for j in 0..8_u64 {
            let x = bases.element_at(0, 2 * j);
            let expected = next_layer_element_from_two_previous(
                values[2 * j as usize],
                values[2 * j as usize + 1],
                alpha,
                x,
            );
            assert_eq!(output[j as usize], expected);
        }
    }
}
