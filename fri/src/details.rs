use std::collections::BTreeSet;

use channel::{NoninteractiveProverChannel, NoninteractiveVerifierChannel, VerifierError};
use commitment::RowCol;
use math::FieldElement;

use crate::folder::next_layer_element_from_two_previous;
use crate::parameters::FriParameters;
use crate::FriField;

// QUERY TRANSLATION
// ================================================================================================

/// Expands second-layer query indices into the first-layer indices that cover their cosets.
pub fn second_layer_queries_to_first_layer_queries(
    queries: &[u64],
    first_fri_step: usize,
) -> Vec<u64> {
    let coset_size = 1_u64 << first_fri_step;
    queries.iter().flat_map(|&query| query * coset_size..(query + 1) * coset_size).collect()
}

/// Returns the table row holding the given layer index.
pub fn table_prover_row(query_index: u64, fri_step: usize) -> u64 {
    query_index >> fri_step
}

/// Returns the table cell holding the given layer index.
pub fn table_prover_row_col(query_index: u64, fri_step: usize) -> RowCol {
    RowCol::new(table_prover_row(query_index, fri_step), query_index & ((1 << fri_step) - 1))
}

/// Computes the data and integrity query sets of committed layer `layer_num` for the given
/// second-layer queries. The cell a query folds into is an integrity query (the verifier
/// recomputes it from the previous layer); the other cells of its row are data queries.
pub fn next_layer_data_and_integrity_queries(
    queries: &[u64],
    fri_step_list: &[usize],
    layer_num: usize,
) -> (BTreeSet<RowCol>, BTreeSet<RowCol>) {
    let first_fri_step = fri_step_list[0];
    let cumulative_fri_step: usize = fri_step_list[..layer_num].iter().sum::<usize>() - first_fri_step;
    let fri_step = fri_step_list[layer_num];

    let mut integrity_queries = BTreeSet::new();
    for &query in queries {
        integrity_queries.insert(table_prover_row_col(query >> cumulative_fri_step, fri_step));
    }
    let mut data_queries = BTreeSet::new();
    for &query in queries {
        let row = table_prover_row(query >> cumulative_fri_step, fri_step);
        for col in 0..1_u64 << fri_step {
            let query_loc = RowCol::new(row, col);
            if !integrity_queries.contains(&query_loc) {
                data_queries.insert(query_loc);
            }
        }
    }
    (data_queries, integrity_queries)
}

// LOCAL FOLDING
// ================================================================================================

/// Folds a full coset of committed layer `layer_num` down to a single element of the next
/// layer. `first_element_index` is the layer index of the coset's first element; the evaluation
/// point is squared between sub-steps.
pub fn apply_fri_layers<F: FriField>(
    elements: &[F],
    eval_point: Option<F>,
    params: &FriParameters<F>,
    layer_num: usize,
    first_element_index: u64,
) -> F {
    let mut curr_eval_point = eval_point;
    let cumulative_fri_step: usize = params.fri_step_list[..layer_num].iter().sum();
    let layer_fri_step = params.fri_step_list[layer_num];
    assert!(
        elements.len() == 1 << layer_fri_step,
        "number of elements is not consistent with the fri_step parameter"
    );

    let mut cur_layer = elements.to_vec();
    for basis_index in cumulative_fri_step..cumulative_fri_step + layer_fri_step {
        let alpha = curr_eval_point.expect("evaluation point doesn't have a value");
        let mut next_layer = Vec::with_capacity(cur_layer.len() / 2);
        for j in (0..cur_layer.len()).step_by(2) {
            let x = params.fft_bases.element_at(
                basis_index,
                (first_element_index >> (basis_index - cumulative_fri_step)) + j as u64,
            );
            next_layer.push(next_layer_element_from_two_previous(
                cur_layer[j],
                cur_layer[j + 1],
                alpha,
                x,
            ));
        }
        cur_layer = next_layer;
        curr_eval_point = Some(alpha.square());
    }

    assert!(cur_layer.len() == 1, "expected the number of elements to be one");
    cur_layer[0]
}

// QUERY SELECTION
// ================================================================================================

/// Prover side of the query draw: grind the proof-of-work gate, then draw `n_queries` sorted
/// indices below `domain_size` (duplicates are kept).
pub fn choose_query_indices_prover<F: FriField>(
    channel: &mut NoninteractiveProverChannel<F>,
    domain_size: u64,
    n_queries: usize,
    proof_of_work_bits: usize,
) -> Vec<u64> {
    channel.apply_proof_of_work(proof_of_work_bits);
    let mut query_indices: Vec<u64> = (0..n_queries)
        .map(|i| channel.receive_number(domain_size, &format!("Index {i}")))
        .collect();
    query_indices.sort_unstable();
    query_indices
}

/// Verifier mirror of [choose_query_indices_prover].
pub fn choose_query_indices_verifier<F: FriField>(
    channel: &mut NoninteractiveVerifierChannel<F>,
    domain_size: u64,
    n_queries: usize,
    proof_of_work_bits: usize,
) -> Result<Vec<u64>, VerifierError> {
    channel.apply_proof_of_work(proof_of_work_bits)?;
    let mut query_indices: Vec<u64> = (0..n_queries)
        .map(|i| channel.get_and_send_random_number(domain_size, &format!("Index {i}")))
        .collect();
    query_indices.sort_unstable();
    Ok(query_indices)
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_expansion_covers_cosets() {
        let queries = [2_u64, 4, 6];
        assert_eq!(
            second_layer_queries_to_first_layer_queries(&queries, 1),
            vec![4, 5, 8, 9, 12, 13]
        );
        assert_eq!(second_layer_queries_to_first_layer_queries(&queries, 0), vec![2, 4, 6]);
    }

    #[test]
    fn data_and_integrity_queries_partition_the_rows() {
        // Steps [2, 3, 1]; layer 1 folds by 8, so a query lands in an 8-wide row.
        let fri_step_list = [2_usize, 3, 1];
        let queries = [11_u64, 17];
        let (data, integrity) = next_layer_data_and_integrity_queries(&queries, &fri_step_list, 1);

        assert_eq!(
            integrity,
            BTreeSet::from([RowCol::new(1, 3), RowCol::new(2, 1)])
        );
        for row in [1_u64, 2] {
            for col in 0..8_u64 {
                let loc = RowCol::new(row, col);
                assert_eq!(data.contains(&loc), !integrity.contains(&loc));
            }
        }
        assert_eq!(data.len() + integrity.len(), 16);
    }

    #[test]
    fn layer_two_queries_shift_by_previous_steps() {
        let fri_step_list = [2_usize, 3, 1];
        let queries = [11_u64];
        // Cumulative shift for layer 2 is (2 + 3) - 2 = 3, so query 11 folds to index 1.
        let (_, integrity) = next_layer_data_and_integrity_queries(&queries, &fri_step_list, 2);
        assert_eq!(integrity, BTreeSet::from([RowCol::new(0, 1)]));
    }
}
