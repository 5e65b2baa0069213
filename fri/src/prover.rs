use std::cell::RefCell;
use std::rc::Rc;

use channel::{Channel, NoninteractiveProverChannel};
use commitment::TableProverFactory;
use math::FieldElement;

use crate::committed_layer::{
    FriCommittedLayer, FriCommittedLayerByCallback, FriCommittedLayerByTableProver,
};
use crate::details::choose_query_indices_prover;
use crate::layer::{FriLayerInMemory, FriLayerOutOfMemory, FriLayerProxy, SharedFriLayer};
use crate::lde::LdeManager;
use crate::parameters::{FriParameters, FriProverConfig};
use crate::FriField;

// FRI PROVER
// ================================================================================================

/// Prover of the FRI low-degree test.
///
/// Layer by layer, the prover draws an evaluation point from the channel, folds the current
/// evaluation with it (one proxy per halving), materializes the folded layer per the
/// [FriProverConfig] policy and commits it through a table prover. After the last fold the
/// remaining polynomial's coefficients are sent in the clear; the query phase is gated by
/// proof of work, and every committed layer is then decommitted for the drawn queries.
pub struct FriProver<F: FriField> {
    params: FriParameters<F>,
    fri_prover_config: FriProverConfig,
    table_prover_factory: TableProverFactory<F>,
}

impl<F: FriField + 'static> FriProver<F> {
    pub fn new(
        params: FriParameters<F>,
        fri_prover_config: FriProverConfig,
        table_prover_factory: TableProverFactory<F>,
    ) -> Self {
        FriProver { params, fri_prover_config, table_prover_factory }
    }

    /// Runs the full protocol over `witness`, the first-layer evaluation on the layer-0 domain
    /// of the configured bases. `first_layer_queries_callback` must decommit the externally
    /// committed first layer at the given indices.
    pub fn prove_fri(
        &mut self,
        channel: &mut NoninteractiveProverChannel<F>,
        witness: Vec<F>,
        first_layer_queries_callback: &mut dyn FnMut(&[u64], &mut NoninteractiveProverChannel<F>),
    ) {
        let n_layers = self.params.fri_step_list.len();
        let mut committed_layers: Vec<Box<dyn FriCommittedLayer<F> + '_>> =
            Vec::with_capacity(n_layers);
        committed_layers.push(Box::new(FriCommittedLayerByCallback::new(
            self.params.fri_step_list[0],
            first_layer_queries_callback,
        )));

        // Commitment phase.
        channel.enter_annotation_scope("Commitment");
        let mut current_layer: SharedFriLayer<F> = Rc::new(RefCell::new(FriLayerInMemory::new(
            witness,
            self.params.fft_bases.clone(),
        )));
        for layer_num in 0..n_layers {
            let fri_step = self.params.fri_step_list[layer_num];
            channel.enter_annotation_scope(&format!("Layer {}", layer_num + 1));

            if layer_num != 0 || fri_step != 0 {
                let mut eval_point = channel.receive_field_element("Evaluation point");
                for _ in 0..fri_step {
                    current_layer = Rc::new(RefCell::new(FriLayerProxy::new(
                        current_layer.clone(),
                        eval_point,
                        &self.fri_prover_config,
                    )));
                    eval_point = eval_point.square();
                }
                current_layer = self.materialize_layer(current_layer, layer_num);
            }

            if layer_num < n_layers - 1 {
                tracing::debug!(layer = layer_num + 1, "committing FRI layer");
                committed_layers.push(Box::new(FriCommittedLayerByTableProver::new(
                    self.params.fri_step_list[layer_num + 1],
                    current_layer.clone(),
                    &self.table_prover_factory,
                    &self.params,
                    layer_num + 1,
                    channel,
                )));
            }
            channel.exit_annotation_scope();
        }
        self.send_last_layer(channel, current_layer);
        channel.exit_annotation_scope();

        // Query phase. Grinding happens right before the indices are drawn.
        let second_layer_size = self.params.fft_bases.layer_size(self.params.fri_step_list[0]);
        let queries = choose_query_indices_prover(
            channel,
            second_layer_size,
            self.params.n_queries,
            self.params.proof_of_work_bits,
        );
        channel.begin_query_phase();

        // Decommitment phase.
        channel.enter_annotation_scope("Decommitment");
        for (layer_num, layer) in committed_layers.iter_mut().enumerate() {
            channel.enter_annotation_scope(&format!("Layer {layer_num}"));
            layer.decommit(&queries, channel);
            channel.exit_annotation_scope();
        }
        channel.exit_annotation_scope();
    }

    /// Materializes a folded layer chain: fully in memory for the first
    /// `n_all_in_memory_layers` layers, as a single coset plus an LDE beyond that.
    fn materialize_layer(
        &self,
        layer: SharedFriLayer<F>,
        layer_num: usize,
    ) -> SharedFriLayer<F> {
        if layer_num < self.fri_prover_config.n_all_in_memory_layers {
            Rc::new(RefCell::new(FriLayerInMemory::from_layer(&mut *layer.borrow_mut())))
        } else {
            let coset_size = layer.borrow().chunk_size();
            Rc::new(RefCell::new(FriLayerOutOfMemory::from_layer(
                &mut *layer.borrow_mut(),
                coset_size,
            )))
        }
    }

    /// Interpolates the final evaluation, checks the degree bound and sends the coefficients.
    fn send_last_layer(
        &mut self,
        channel: &mut NoninteractiveProverChannel<F>,
        last_layer: SharedFriLayer<F>,
    ) {
        channel.enter_annotation_scope("Last Layer");
        let evaluation = last_layer.borrow_mut().get_all_evaluation();
        let last_bases = self.params.fft_bases.from_layer(self.params.fri_step_sum());
        let lde = LdeManager::from_evaluation(last_bases, evaluation);

        let degree = lde.degree() as u64;
        assert!(
            degree < self.params.last_layer_degree_bound,
            "last layer degree is {degree}, but the bound is {}",
            self.params.last_layer_degree_bound
        );
        channel.send_field_element_span(
            &lde.coefficients()[..self.params.last_layer_degree_bound as usize],
            "Coefficients",
        );
        channel.exit_annotation_scope();
    }
}
