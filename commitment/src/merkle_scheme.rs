use std::collections::{BTreeMap, BTreeSet};

use channel::{
    FieldElementBytes, NoninteractiveProverChannel, NoninteractiveVerifierChannel, VerifierError,
};
use crypto::{Digest, Hasher, DIGEST_BYTES};

use crate::merkle::MerkleTree;
use crate::safe_log2;
use crate::scheme::{CommitmentSchemeProver, CommitmentSchemeVerifier};

// MERKLE COMMITMENT SCHEME
// ================================================================================================

/// Terminal commitment layer: an in-memory Merkle tree whose elements are digests.
pub struct MerkleCommitmentSchemeProver<H: Hasher> {
    n_elements: u64,
    n_segments: usize,
    tree: MerkleTree<H>,
    queries: BTreeSet<u64>,
}

impl<H: Hasher> MerkleCommitmentSchemeProver<H> {
    /// Returns a prover over `n_elements` digest leaves arriving in `n_segments` segments.
    pub fn new(n_elements: u64, n_segments: usize) -> Self {
        assert!(
            n_elements % n_segments as u64 == 0,
            "number of elements does not divide into segments"
        );
        MerkleCommitmentSchemeProver {
            n_elements,
            n_segments,
            tree: MerkleTree::new(n_elements),
            queries: BTreeSet::new(),
        }
    }

    fn segment_length(&self) -> u64 {
        self.n_elements / self.n_segments as u64
    }
}

impl<F: FieldElementBytes, H: Hasher> CommitmentSchemeProver<F>
    for MerkleCommitmentSchemeProver<H>
{
    fn num_segments(&self) -> usize {
        self.n_segments
    }

    fn segment_length_in_elements(&self) -> u64 {
        self.n_elements / self.n_segments as u64
    }

    fn element_length_in_bytes(&self) -> usize {
        DIGEST_BYTES
    }

    fn add_segment_for_commitment(&mut self, segment_data: &[u8], segment_index: usize) {
        let segment_length = self.segment_length();
        assert!(
            segment_data.len() as u64 == segment_length * DIGEST_BYTES as u64,
            "segment size is {} instead of the expected {}",
            segment_data.len(),
            segment_length * DIGEST_BYTES as u64
        );
        let digests: Vec<Digest> =
            segment_data.chunks(DIGEST_BYTES).map(Digest::from_bytes).collect();
        self.tree.add_data(&digests, segment_index as u64 * segment_length);
    }

    fn commit(&mut self, channel: &mut NoninteractiveProverChannel<F>) {
        // All internal nodes up to log2(segment length) levels above the leaves were computed
        // while segments were added.
        let tree_height = safe_log2(self.n_elements);
        let commitment = self.tree.get_root(tree_height - safe_log2(self.segment_length()));
        channel.send_commitment_hash(&commitment, "Commitment");
    }

    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Vec<u64> {
        self.queries = queries.clone();
        vec![]
    }

    fn decommit(&mut self, elements_data: &[u8], channel: &mut NoninteractiveProverChannel<F>) {
        assert!(elements_data.is_empty(), "elements_data is expected to be empty");
        self.tree.generate_decommitment(&self.queries, channel);
    }
}

// VERIFIER
// ================================================================================================

/// Verifier mirror of [MerkleCommitmentSchemeProver].
pub struct MerkleCommitmentSchemeVerifier<H: Hasher> {
    n_elements: u64,
    commitment: Option<Digest>,
    _hasher: core::marker::PhantomData<H>,
}

impl<H: Hasher> MerkleCommitmentSchemeVerifier<H> {
    pub fn new(n_elements: u64) -> Self {
        MerkleCommitmentSchemeVerifier {
            n_elements,
            commitment: None,
            _hasher: core::marker::PhantomData,
        }
    }
}

impl<F: FieldElementBytes, H: Hasher> CommitmentSchemeVerifier<F>
    for MerkleCommitmentSchemeVerifier<H>
{
    fn read_commitment(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), VerifierError> {
        self.commitment = Some(channel.receive_commitment_hash("Commitment")?);
        Ok(())
    }

    fn verify_integrity(
        &mut self,
        elements_to_verify: &BTreeMap<u64, Vec<u8>>,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<bool, VerifierError> {
        let mut hashes_to_verify = BTreeMap::new();
        for (&index, element) in elements_to_verify {
            assert!(index < self.n_elements, "query out of range");
            assert!(element.len() == DIGEST_BYTES, "Element size mismatches");
            hashes_to_verify.insert(index, Digest::from_bytes(element));
        }
        let commitment = self.commitment.as_ref().expect("commitment has not been read yet");
        MerkleTree::<H>::verify_decommitment(
            &hashes_to_verify,
            self.n_elements,
            commitment,
            channel,
        )
    }

    fn num_of_elements(&self) -> u64 {
        self.n_elements
    }
}
