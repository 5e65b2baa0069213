use channel::{Channel, NoninteractiveVerifierChannel};
use commitment::{RowCol, TableVerifier, TableVerifierFactory};
use math::FieldElement;

use crate::details::{
    apply_fri_layers, choose_query_indices_verifier, next_layer_data_and_integrity_queries,
    second_layer_queries_to_first_layer_queries, table_prover_row, table_prover_row_col,
};
use crate::errors::FriVerifierError;
use crate::lde::LdeManager;
use crate::parameters::FriParameters;
use crate::FriField;

/// Reveals the first-layer evaluations at the requested indices, typically by querying the
/// externally committed oracle through the channel.
pub type FirstLayerQueriesCallback<'a, F> = dyn FnMut(
        &[u64],
        &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<Vec<F>, FriVerifierError>
    + 'a;

// FRI VERIFIER
// ================================================================================================

/// Verifier of the FRI low-degree test; the exact mirror of [crate::FriProver].
///
/// All queries are resolved in parallel, one layer at a time: `query_results` starts as the
/// locally folded first-layer responses and is re-folded through every decommitted layer until
/// it must agree with the last-layer polynomial.
pub struct FriVerifier<F: FriField> {
    params: FriParameters<F>,
    table_verifier_factory: TableVerifierFactory<F>,
    n_layers: usize,
    first_eval_point: Option<F>,
    eval_points: Vec<F>,
    table_verifiers: Vec<TableVerifier<F>>,
    query_indices: Vec<u64>,
    query_results: Vec<F>,
    expected_last_layer: Vec<F>,
}

impl<F: FriField> FriVerifier<F> {
    pub fn new(params: FriParameters<F>, table_verifier_factory: TableVerifierFactory<F>) -> Self {
        let n_layers = params.fri_step_list.len();
        FriVerifier {
            params,
            table_verifier_factory,
            n_layers,
            first_eval_point: None,
            eval_points: vec![],
            table_verifiers: vec![],
            query_indices: vec![],
            query_results: vec![],
            expected_last_layer: vec![],
        }
    }

    /// Runs the full verification protocol over the proof held by `channel`.
    pub fn verify_fri(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
        first_layer_queries_callback: &mut FirstLayerQueriesCallback<'_, F>,
    ) -> Result<(), FriVerifierError> {
        // Commitment phase.
        channel.enter_annotation_scope("Commitment");
        self.commitment_phase(channel)?;
        self.read_last_layer_coefficients(channel)?;
        channel.exit_annotation_scope();

        // Query phase. No randomness may be drawn once the queries are fixed.
        let second_layer_size = self.params.fft_bases.layer_size(self.params.fri_step_list[0]);
        self.query_indices = choose_query_indices_verifier(
            channel,
            second_layer_size,
            self.params.n_queries,
            self.params.proof_of_work_bits,
        )?;
        channel.begin_query_phase();

        // Decommitment phase.
        channel.enter_annotation_scope("Decommitment");
        self.verify_first_layer(channel, first_layer_queries_callback)?;
        self.verify_inner_layers(channel)?;
        self.verify_last_layer(channel)?;
        channel.exit_annotation_scope();
        Ok(())
    }

    /// Draws the evaluation points and reads the layer commitments, in the prover's order.
    fn commitment_phase(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), FriVerifierError> {
        let mut basis_index = 0;
        for i in 0..self.n_layers {
            let cur_fri_step = self.params.fri_step_list[i];
            channel.enter_annotation_scope(&format!("Layer {}", i + 1));
            basis_index += cur_fri_step;

            if i == 0 {
                if cur_fri_step != 0 {
                    self.first_eval_point =
                        Some(channel.get_and_send_random_field_element("Evaluation point"));
                }
            } else {
                self.eval_points.push(channel.get_and_send_random_field_element("Evaluation point"));
            }

            if i < self.n_layers - 1 {
                let coset_size = 1_u64 << self.params.fri_step_list[i + 1];
                let n_rows = self.params.fft_bases.layer_size(basis_index) / coset_size;
                let mut table_verifier =
                    (self.table_verifier_factory)(n_rows, coset_size as usize);
                table_verifier.read_commitment(channel)?;
                self.table_verifiers.push(table_verifier);
            }
            channel.exit_annotation_scope();
        }
        Ok(())
    }

    /// Reads the last-layer coefficients and materializes the expected last-layer evaluation.
    fn read_last_layer_coefficients(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), FriVerifierError> {
        channel.enter_annotation_scope("Last Layer");
        let fri_step_sum = self.params.fri_step_sum();
        let last_layer_size = self.params.fft_bases.layer_size(fri_step_sum);

        let mut coefficients = channel.receive_field_element_span(
            self.params.last_layer_degree_bound as usize,
            "Coefficients",
        )?;
        coefficients.resize(last_layer_size as usize, F::ZERO);

        let last_bases = self.params.fft_bases.from_layer(fri_step_sum);
        let coset_offset = last_bases.offset(0);
        let lde = LdeManager::from_coefficients(last_bases, coefficients);
        let mut expected_last_layer = vec![F::ZERO; last_layer_size as usize];
        lde.eval_on_coset(coset_offset, &mut expected_last_layer, &lde.fft_precompute());
        self.expected_last_layer = expected_last_layer;

        channel.exit_annotation_scope();
        Ok(())
    }

    /// Obtains the first-layer evaluations at the query cosets and applies the first fold
    /// locally, seeding `query_results` with the second-layer expectations.
    fn verify_first_layer(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
        first_layer_queries_callback: &mut FirstLayerQueriesCallback<'_, F>,
    ) -> Result<(), FriVerifierError> {
        channel.enter_annotation_scope("Layer 0");
        let first_fri_step = self.params.fri_step_list[0];
        let first_layer_queries =
            second_layer_queries_to_first_layer_queries(&self.query_indices, first_fri_step);
        let first_layer_results = first_layer_queries_callback(&first_layer_queries, channel)?;
        assert!(
            first_layer_results.len() == first_layer_queries.len(),
            "returned number of queries does not match the number sent"
        );

        let first_layer_coset_size = 1_usize << first_fri_step;
        self.query_results = Vec::with_capacity(self.query_indices.len());
        for i in (0..first_layer_queries.len()).step_by(first_layer_coset_size) {
            self.query_results.push(apply_fri_layers(
                &first_layer_results[i..i + first_layer_coset_size],
                self.first_eval_point,
                &self.params,
                0,
                first_layer_queries[i],
            ));
        }
        channel.exit_annotation_scope();
        Ok(())
    }

    /// Receives the data cells of every inner layer, merges in the integrity expectations,
    /// folds each row and checks the decommitment.
    fn verify_inner_layers(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), FriVerifierError> {
        let first_fri_step = self.params.fri_step_list[0];
        let mut basis_index = 0;
        for i in 0..self.n_layers - 1 {
            channel.enter_annotation_scope(&format!("Layer {}", i + 1));
            let cur_fri_step = self.params.fri_step_list[i + 1];
            basis_index += self.params.fri_step_list[i];

            let (layer_data_queries, layer_integrity_queries) =
                next_layer_data_and_integrity_queries(
                    &self.query_indices,
                    &self.params.fri_step_list,
                    i + 1,
                );
            let mut to_verify = self.table_verifiers[i].query(
                &layer_data_queries,
                &layer_integrity_queries,
                channel,
            )?;

            let mut prev_query_index = u64::MAX;
            for j in 0..self.query_results.len() {
                let query_index = self.query_indices[j] >> (basis_index - first_fri_step);
                let query_loc = table_prover_row_col(query_index, cur_fri_step);
                to_verify.insert(query_loc, self.query_results[j]);
                // Annotate each merged query path once, for fri-proof-splitting.
                if query_index == prev_query_index || channel.extra_annotations_disabled() {
                    continue;
                }
                prev_query_index = query_index;
                channel.annotate_extra_field_element(
                    &self.query_results[j],
                    &format!("Row {}, Column {}", query_loc.row(), query_loc.col()),
                );
                let x_inv = self.params.fft_bases.element_at(basis_index, query_index).inv();
                channel
                    .annotate_extra_field_element(&x_inv, &format!("xInv for index {query_index}"));
            }

            // Compute the next layer's expectations.
            let eval_point = self.eval_points[i];
            let coset_size = 1_u64 << cur_fri_step;
            for j in 0..self.query_results.len() {
                let coset_start = table_prover_row(
                    self.query_indices[j] >> (basis_index - first_fri_step),
                    cur_fri_step,
                );
                let coset_elements: Vec<F> = (0..coset_size)
                    .map(|k| to_verify[&RowCol::new(coset_start, k)])
                    .collect();
                self.query_results[j] = apply_fri_layers(
                    &coset_elements,
                    Some(eval_point),
                    &self.params,
                    i + 1,
                    coset_start * coset_size,
                );
            }

            if !self.table_verifiers[i].verify_decommitment(&to_verify, channel)? {
                return Err(FriVerifierError::LayerDecommitmentFailed { layer: i });
            }
            channel.exit_annotation_scope();
        }
        Ok(())
    }

    /// Compares every surviving expectation against the last-layer evaluation.
    fn verify_last_layer(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), FriVerifierError> {
        let first_fri_step = self.params.fri_step_list[0];
        let fri_step_sum = self.params.fri_step_sum();
        assert!(
            !self.expected_last_layer.is_empty(),
            "read_last_layer_coefficients() must be called before verify_last_layer()"
        );

        channel.enter_annotation_scope("Last Layer");
        let mut prev_query_index = u64::MAX;
        for j in 0..self.query_results.len() {
            let query_index = self.query_indices[j] >> (fri_step_sum - first_fri_step);
            let expected_value = self.expected_last_layer[query_index as usize];
            if self.query_results[j] != expected_value {
                return Err(FriVerifierError::LastLayerInconsistent { query: j });
            }
            if query_index == prev_query_index || channel.extra_annotations_disabled() {
                continue;
            }
            prev_query_index = query_index;
            channel.annotate_extra_field_element(
                &self.query_results[j],
                &format!("Row {query_index}, Column 0"),
            );
            let x_inv = self.params.fft_bases.element_at(fri_step_sum, query_index).inv();
            channel.annotate_extra_field_element(&x_inv, &format!("xInv for index {query_index}"));
        }
        channel.exit_annotation_scope();
        Ok(())
    }
}
