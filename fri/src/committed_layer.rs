use channel::NoninteractiveProverChannel;
use commitment::{TableProver, TableProverFactory};
use math::FieldElement;

use crate::details::{next_layer_data_and_integrity_queries, second_layer_queries_to_first_layer_queries};
use crate::layer::SharedFriLayer;
use crate::parameters::FriParameters;
use crate::FriField;

// COMMITTED LAYER INTERFACE
// ================================================================================================

/// A FRI layer that has been committed at construction and is ready to decommit.
pub trait FriCommittedLayer<F: FriField> {
    /// Decommits the layer for the given second-layer query indices.
    fn decommit(&mut self, queries: &[u64], channel: &mut NoninteractiveProverChannel<F>);
}

// CALLBACK LAYER
// ================================================================================================

/// First-layer committed layer: the evaluation was committed outside the FRI protocol (e.g. as
/// the composition polynomial oracle), so decommitment is delegated to a callback that reveals
/// the first-layer values at the requested indices.
pub struct FriCommittedLayerByCallback<'a, F: FriField> {
    fri_step: usize,
    layer_queries_callback: &'a mut dyn FnMut(&[u64], &mut NoninteractiveProverChannel<F>),
}

impl<'a, F: FriField> FriCommittedLayerByCallback<'a, F> {
    pub fn new(
        fri_step: usize,
        layer_queries_callback: &'a mut dyn FnMut(&[u64], &mut NoninteractiveProverChannel<F>),
    ) -> Self {
        FriCommittedLayerByCallback { fri_step, layer_queries_callback }
    }
}

impl<F: FriField> FriCommittedLayer<F> for FriCommittedLayerByCallback<'_, F> {
    fn decommit(&mut self, queries: &[u64], channel: &mut NoninteractiveProverChannel<F>) {
        let first_layer_queries =
            second_layer_queries_to_first_layer_queries(queries, self.fri_step);
        (self.layer_queries_callback)(&first_layer_queries, channel);
    }
}

// TABLE-PROVER LAYER
// ================================================================================================

/// A materialized FRI layer bound to a table prover.
///
/// Construction walks every chunk of the layer, submits it as a commitment segment of
/// `2^fri_step` columns, and commits. Decommitment evaluates exactly the rows the next fold
/// needs and forwards them to the table prover.
pub struct FriCommittedLayerByTableProver<F: FriField> {
    fri_step: usize,
    fri_layer: SharedFriLayer<F>,
    fri_step_list: Vec<usize>,
    layer_num: usize,
    table_prover: TableProver<F>,
}

impl<F: FriField> FriCommittedLayerByTableProver<F> {
    pub fn new(
        fri_step: usize,
        fri_layer: SharedFriLayer<F>,
        table_prover_factory: &TableProverFactory<F>,
        params: &FriParameters<F>,
        layer_num: usize,
        channel: &mut NoninteractiveProverChannel<F>,
    ) -> Self {
        assert!(fri_step == params.fri_step_list[layer_num], "mismatched layer folding width");
        let (chunk_size, layer_size) = {
            let layer = fri_layer.borrow();
            (layer.chunk_size(), layer.layer_size())
        };
        let n_chunks = layer_size / chunk_size;
        let coset_size = 1_u64 << fri_step;
        let table_prover =
            table_prover_factory(n_chunks as usize, chunk_size / coset_size, coset_size as usize);

        let mut this = FriCommittedLayerByTableProver {
            fri_step,
            fri_layer,
            fri_step_list: params.fri_step_list.clone(),
            layer_num,
            table_prover,
        };
        this.commit(channel);
        this
    }

    fn commit(&mut self, channel: &mut NoninteractiveProverChannel<F>) {
        let (chunk_size, layer_size) = {
            let layer = self.fri_layer.borrow();
            (layer.chunk_size(), layer.layer_size())
        };
        let coset_size = 1_usize << self.fri_step;
        let mut storage = self.fri_layer.borrow().make_storage();
        let mut chunk = vec![F::ZERO; chunk_size as usize];
        for chunk_index in 0..layer_size / chunk_size {
            self.fri_layer.borrow_mut().get_chunk(
                &mut storage,
                &mut chunk,
                chunk_size,
                chunk_index,
            );
            self.table_prover.add_segment_for_commitment(
                &[&chunk],
                chunk_index as usize,
                coset_size,
            );
        }
        self.table_prover.commit(channel);
    }

    /// Evaluates the layer at every cell of the required rows, column by column.
    fn eval_at_rows(&mut self, required_row_indices: &[u64]) -> Vec<Vec<F>> {
        let coset_size = 1_u64 << self.fri_step;
        let mut columns = Vec::with_capacity(coset_size as usize);
        for col in 0..coset_size {
            let required_indices: Vec<u64> =
                required_row_indices.iter().map(|&row| row * coset_size + col).collect();
            columns.push(self.fri_layer.borrow_mut().eval_at_points(&required_indices));
        }
        columns
    }
}

impl<F: FriField> FriCommittedLayer<F> for FriCommittedLayerByTableProver<F> {
    fn decommit(&mut self, queries: &[u64], channel: &mut NoninteractiveProverChannel<F>) {
        let (layer_data_queries, layer_integrity_queries) =
            next_layer_data_and_integrity_queries(queries, &self.fri_step_list, self.layer_num);
        let required_row_indices = self
            .table_prover
            .start_decommitment_phase(layer_data_queries, layer_integrity_queries);
        let elements_data = self.eval_at_rows(&required_row_indices);
        self.table_prover.decommit(&elements_data, channel);
    }
}
