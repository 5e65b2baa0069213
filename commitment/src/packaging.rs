use std::collections::{BTreeMap, BTreeSet};

use channel::{
    FieldElementBytes, NoninteractiveProverChannel, NoninteractiveVerifierChannel, VerifierError,
};
use crypto::{Digest, Hasher, DIGEST_BYTES};

use crate::packer::PackerHasher;
use crate::scheme::{CommitmentSchemeProver, CommitmentSchemeVerifier};

// PACKAGING COMMITMENT SCHEME PROVER
// ================================================================================================

/// Streaming commitment layer that packs adjacent elements into packages, hashes each package
/// and forwards the resulting digests to an inner scheme.
///
/// In merkle mode the layer is one level of the digest tree itself: every package is exactly
/// two digests, hashed two-to-one, and missing elements travel as decommitment nodes annotated
/// with their index in the virtual full tree. Outside merkle mode the layer packs raw data
/// elements and missing elements travel as plain data.
pub struct PackagingCommitmentSchemeProver<F: FieldElementBytes, H: Hasher> {
    size_of_element: usize,
    n_elements_in_segment: u64,
    n_segments: usize,
    packer: PackerHasher<H>,
    inner_commitment_scheme: Box<dyn CommitmentSchemeProver<F>>,
    is_merkle_layer: bool,
    queries: BTreeSet<u64>,
    missing_element_queries: Vec<u64>,
    n_missing_elements_for_inner_layer: usize,
}

impl<F: FieldElementBytes, H: Hasher> PackagingCommitmentSchemeProver<F, H> {
    /// Returns a new packaging layer in front of `inner_commitment_scheme`.
    pub fn new(
        size_of_element: usize,
        n_elements_in_segment: u64,
        n_segments: usize,
        is_merkle_layer: bool,
        inner_commitment_scheme: Box<dyn CommitmentSchemeProver<F>>,
    ) -> Self {
        let packer =
            PackerHasher::<H>::new(size_of_element, n_segments as u64 * n_elements_in_segment);
        if is_merkle_layer {
            assert!(
                packer.n_elements_in_package == 2,
                "wrong number of elements in a merkle-mode package: {}",
                packer.n_elements_in_package
            );
            assert!(
                2 * inner_commitment_scheme.segment_length_in_elements() == n_elements_in_segment,
                "expected a ratio of 2 between the number of elements per segment in the current \
                 layer and the next one; current: {n_elements_in_segment}, next: {}",
                inner_commitment_scheme.segment_length_in_elements()
            );
        }
        PackagingCommitmentSchemeProver {
            size_of_element,
            n_elements_in_segment,
            n_segments,
            packer,
            inner_commitment_scheme,
            is_merkle_layer,
            queries: BTreeSet::new(),
            missing_element_queries: vec![],
            n_missing_elements_for_inner_layer: 0,
        }
    }

    /// Returns the number of packages this layer hashes its elements into.
    pub fn num_packages(&self) -> u64 {
        self.packer.n_packages
    }
}

impl<F: FieldElementBytes, H: Hasher> CommitmentSchemeProver<F>
    for PackagingCommitmentSchemeProver<F, H>
{
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
            segment_data.len() as u64 == self.n_elements_in_segment * self.size_of_element as u64,
            "segment size is {} instead of the expected {}",
            segment_data.len(),
            self.n_elements_in_segment * self.size_of_element as u64
        );
        assert!(
            segment_index < self.n_segments,
            "segment index {segment_index} is out of range; there are {} segments",
            self.n_segments
        );
        let hashed = self.packer.pack_and_hash(segment_data, self.is_merkle_layer);
        self.inner_commitment_scheme.add_segment_for_commitment(&hashed, segment_index);
    }

    fn commit(&mut self, channel: &mut NoninteractiveProverChannel<F>) {
        self.inner_commitment_scheme.commit(channel);
    }

    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Vec<u64> {
        self.queries = queries.clone();
        // Elements missing within the queried packages must be provided by the caller so this
        // layer can recompute the package hashes.
        self.missing_element_queries =
            self.packer.elements_required_to_compute_hashes(&self.queries);

        let package_queries_to_inner_layer: BTreeSet<u64> = self
            .queries
            .iter()
            .map(|q| q / self.packer.n_elements_in_package as u64)
            .collect();
        let missing_package_queries_inner_layer = self
            .inner_commitment_scheme
            .start_decommitment_phase(&package_queries_to_inner_layer);
        let missing_element_queries_to_inner_layer =
            self.packer.get_elements_in_packages(&missing_package_queries_inner_layer);

        self.n_missing_elements_for_inner_layer = missing_element_queries_to_inner_layer.len();
        let mut all_missing_elements = Vec::with_capacity(
            self.missing_element_queries.len() + self.n_missing_elements_for_inner_layer,
        );
        // The two sets are disjoint: the inner layer only asks for packages that contain no
        // queried element.
        all_missing_elements.extend_from_slice(&self.missing_element_queries);
        all_missing_elements.extend_from_slice(&missing_element_queries_to_inner_layer);
        all_missing_elements
    }

    fn decommit(&mut self, elements_data: &[u8], channel: &mut NoninteractiveProverChannel<F>) {
        assert!(
            elements_data.len()
                == self.size_of_element
                    * (self.missing_element_queries.len() + self.n_missing_elements_for_inner_layer),
            "data given to decommit does not fit the request in start_decommitment_phase"
        );

        // Send the caller-provided elements this layer asked for in start_decommitment_phase.
        for (i, &missing_element) in self.missing_element_queries.iter().enumerate() {
            let bytes_to_send = &elements_data[i * self.size_of_element..(i + 1) * self.size_of_element];
            if self.is_merkle_layer {
                let digest = Digest::from_bytes(bytes_to_send);
                channel.send_decommitment_node(
                    &digest,
                    &format!("For node {}", 2 * self.num_packages() + missing_element),
                );
            } else {
                channel.send_data(
                    bytes_to_send,
                    &format!("To complete packages, element #{missing_element}"),
                );
            }
        }

        // Pack and hash the elements the inner layer requested and hand them down.
        let data_for_inner_layer = self.packer.pack_and_hash(
            &elements_data[self.missing_element_queries.len() * self.size_of_element..],
            self.is_merkle_layer,
        );
        self.inner_commitment_scheme.decommit(&data_for_inner_layer, channel);
    }
}

// PACKAGING COMMITMENT SCHEME VERIFIER
// ================================================================================================

/// Verifier mirror of [PackagingCommitmentSchemeProver].
pub struct PackagingCommitmentSchemeVerifier<F: FieldElementBytes, H: Hasher> {
    size_of_element: usize,
    n_elements: u64,
    packer: PackerHasher<H>,
    inner_commitment_scheme: Box<dyn CommitmentSchemeVerifier<F>>,
    is_merkle_layer: bool,
}

impl<F: FieldElementBytes, H: Hasher> PackagingCommitmentSchemeVerifier<F, H> {
    pub fn new(
        size_of_element: usize,
        n_elements: u64,
        is_merkle_layer: bool,
        inner_commitment_scheme: Box<dyn CommitmentSchemeVerifier<F>>,
    ) -> Self {
        let packer = PackerHasher::<H>::new(size_of_element, n_elements);
        if is_merkle_layer {
            assert!(
                packer.n_elements_in_package == 2,
                "wrong number of elements in a merkle-mode package: {}",
                packer.n_elements_in_package
            );
            assert!(
                2 * inner_commitment_scheme.num_of_elements() == n_elements,
                "expected a ratio of 2 between the number of elements in the current layer and \
                 the next one; current: {n_elements}, next: {}",
                inner_commitment_scheme.num_of_elements()
            );
        }
        PackagingCommitmentSchemeVerifier {
            size_of_element,
            n_elements,
            packer,
            inner_commitment_scheme,
            is_merkle_layer,
        }
    }

    pub fn num_packages(&self) -> u64 {
        self.packer.n_packages
    }
}

impl<F: FieldElementBytes, H: Hasher> CommitmentSchemeVerifier<F>
    for PackagingCommitmentSchemeVerifier<F, H>
{
    fn read_commitment(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), VerifierError> {
        self.inner_commitment_scheme.read_commitment(channel)
    }

    fn verify_integrity(
        &mut self,
        elements_to_verify: &BTreeMap<u64, Vec<u8>>,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<bool, VerifierError> {
        // Read the elements that share a package with a queried element but were not queried
        // themselves; they are needed to recompute the package hashes.
        let queried: BTreeSet<u64> = elements_to_verify.keys().copied().collect();
        let missing_elements_idxs = self.packer.elements_required_to_compute_hashes(&queried);

        let mut full_data_to_verify = elements_to_verify.clone();
        for missing_element_idx in missing_elements_idxs {
            if self.is_merkle_layer {
                let digest = channel.receive_decommitment_node(&format!(
                    "For node {}",
                    2 * self.num_packages() + missing_element_idx
                ))?;
                full_data_to_verify.insert(missing_element_idx, digest.as_bytes().to_vec());
            } else {
                let data = channel.receive_data(
                    self.size_of_element,
                    &format!("To complete packages, element #{missing_element_idx}"),
                )?;
                full_data_to_verify.insert(missing_element_idx, data);
            }
        }

        let bytes_to_verify = self.packer.pack_and_hash_map(&full_data_to_verify, self.is_merkle_layer);

        if !self.is_merkle_layer {
            for (package, bytes) in &bytes_to_verify {
                assert!(bytes.len() == DIGEST_BYTES, "unexpected package hash size");
                channel.annotate_extra_decommitment_node(
                    &Digest::from_bytes(bytes),
                    &format!("For node {}", package + self.inner_commitment_scheme.num_of_elements()),
                );
            }
        }

        self.inner_commitment_scheme.verify_integrity(&bytes_to_verify, channel)
    }

    fn num_of_elements(&self) -> u64 {
        self.n_elements
    }
}
