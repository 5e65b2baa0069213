use std::collections::{BTreeMap, BTreeSet};

use channel::{
    FieldElementBytes, NoninteractiveProverChannel, NoninteractiveVerifierChannel, VerifierError,
};

// COMMITMENT SCHEME INTERFACES
// ================================================================================================
//
// The committed data is a long byte vector thought of as a sequence of equal-size elements;
// elements are the finest granularity the verifier can check, and queries are element indices.
// For scalability the data is fed in as equal consecutive segments, e.g. one coset of an
// evaluation domain per segment, so commitment works even when the whole evaluation does not
// fit in memory at once.
//
// A decommitment contains only the information needed to check integrity of the queried
// elements against the commitment, never the elements themselves; when the queried data must
// travel too, the caller sends it over the channel directly. This allows the verifier to
// recompute parts of the committed data itself and only check consistency.

/// Prover side of a commitment scheme layer.
pub trait CommitmentSchemeProver<F: FieldElementBytes> {
    /// Returns the number of segments the committed data arrives in.
    fn num_segments(&self) -> usize;

    /// Returns the segment length, measured in elements.
    fn segment_length_in_elements(&self) -> u64;

    /// Returns the size of one element in bytes.
    fn element_length_in_bytes(&self) -> usize;

    /// Feeds one segment of data into the scheme.
    fn add_segment_for_commitment(&mut self, segment_data: &[u8], segment_index: usize);

    /// Commits to the data by sending the commitment over the channel. All segments must have
    /// been added; otherwise the behavior is undefined.
    fn commit(&mut self, channel: &mut NoninteractiveProverChannel<F>);

    /// Starts the decommitment phase for the given element queries and returns the (distinct)
    /// indices of elements whose bytes must be passed to [Self::decommit].
    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Vec<u64>;

    /// Sends the decommitment over the channel. `elements_data` is the concatenation of the
    /// elements requested by [Self::start_decommitment_phase].
    fn decommit(&mut self, elements_data: &[u8], channel: &mut NoninteractiveProverChannel<F>);
}

/// Verifier side of a commitment scheme layer.
pub trait CommitmentSchemeVerifier<F: FieldElementBytes> {
    /// Reads the commitment from the channel.
    fn read_commitment(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), VerifierError>;

    /// Checks integrity of the given elements against the commitment, reading the decommitment
    /// from the channel. The queried indices must be exactly those the decommitment was
    /// generated for.
    fn verify_integrity(
        &mut self,
        elements_to_verify: &BTreeMap<u64, Vec<u8>>,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<bool, VerifierError>;

    /// Returns the total number of elements in this layer.
    fn num_of_elements(&self) -> u64;
}
