use std::collections::BTreeSet;

use channel::{FieldElementBytes, NoninteractiveProverChannel};

use crate::scheme::CommitmentSchemeProver;

// CACHING COMMITMENT SCHEME
// ================================================================================================

/// Prover-only layer that keeps every byte committed through it in memory.
///
/// The layer is transparent on the wire: it forwards segments and commitments unchanged, and at
/// decommitment time it serves all of the inner layer's element requests from its own store, so
/// nothing has to be recomputed or provided by the caller.
pub struct CachingCommitmentSchemeProver<F: FieldElementBytes> {
    size_of_element: usize,
    n_elements_in_segment: u64,
    n_segments: usize,
    inner_commitment_scheme: Box<dyn CommitmentSchemeProver<F>>,
    layer_data: Vec<u8>,
    missing_element_queries_inner_layer: Vec<u64>,
}

impl<F: FieldElementBytes> CachingCommitmentSchemeProver<F> {
    pub fn new(
        size_of_element: usize,
        n_elements_in_segment: u64,
        n_segments: usize,
        inner_commitment_scheme: Box<dyn CommitmentSchemeProver<F>>,
    ) -> Self {
        let layer_data =
            vec![0_u8; size_of_element * n_elements_in_segment as usize * n_segments];
        CachingCommitmentSchemeProver {
            size_of_element,
            n_elements_in_segment,
            n_segments,
            inner_commitment_scheme,
            layer_data,
            missing_element_queries_inner_layer: vec![],
        }
    }

    fn segment_length_in_bytes(&self) -> usize {
        self.size_of_element * self.n_elements_in_segment as usize
    }

    fn segment_offset_in_data(&self, segment_index: usize) -> usize {
        assert!(
            segment_index < self.n_segments,
            "segment index {segment_index} is out of bound; there are only {} segments",
            self.n_segments
        );
        segment_index * self.segment_length_in_bytes()
    }
}

impl<F: FieldElementBytes> CommitmentSchemeProver<F> for CachingCommitmentSchemeProver<F> {
    fn num_segments(&self) -> usize {
        self.n_segments
    }

    fn segment_length_in_elements(&self) -> u64 {
        self.n_elements_in_segment
    }

    fn element_length_in_bytes(&self) -> usize {
        self.size_of_element
    }

    fn add_segment_for_commitment(&mut self, segment_data: &[u8], segment_index: usize) {
        assert!(
            segment_data.len() == self.segment_length_in_bytes(),
            "segment data size {} bytes is wrong; it should be {} bytes",
            segment_data.len(),
            self.segment_length_in_bytes()
        );
        let segment_offset = self.segment_offset_in_data(segment_index);
        self.layer_data[segment_offset..segment_offset + segment_data.len()]
            .copy_from_slice(segment_data);
        self.inner_commitment_scheme.add_segment_for_commitment(segment_data, segment_index);
    }

    fn commit(&mut self, channel: &mut NoninteractiveProverChannel<F>) {
        self.inner_commitment_scheme.commit(channel);
    }

    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Vec<u64> {
        self.missing_element_queries_inner_layer =
            self.inner_commitment_scheme.start_decommitment_phase(queries);
        // Everything the inner layer needs is served from the store, so nothing is requested
        // from the caller.
        vec![]
    }

    fn decommit(&mut self, elements_data: &[u8], channel: &mut NoninteractiveProverChannel<F>) {
        assert!(
            elements_data.is_empty(),
            "a caching layer needs no information for its decommitment phase"
        );

        let mut data_for_inner_layer = Vec::with_capacity(
            self.missing_element_queries_inner_layer.len() * self.size_of_element,
        );
        for &element_index in &self.missing_element_queries_inner_layer {
            let start = element_index as usize * self.size_of_element;
            assert!(
                self.layer_data.len() >= start + self.size_of_element,
                "layer data does not contain element #{element_index}"
            );
            data_for_inner_layer.extend_from_slice(&self.layer_data[start..start + self.size_of_element]);
        }

        self.inner_commitment_scheme.decommit(&data_for_inner_layer, channel);
    }
}
