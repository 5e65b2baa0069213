use channel::FieldElementBytes;
use crypto::{with_hash, HashName, DIGEST_BYTES};

use crate::caching::CachingCommitmentSchemeProver;
use crate::merkle_scheme::{MerkleCommitmentSchemeProver, MerkleCommitmentSchemeVerifier};
use crate::packaging::{PackagingCommitmentSchemeProver, PackagingCommitmentSchemeVerifier};
use crate::packer::compute_n_elements_in_package;
use crate::safe_log2;
use crate::scheme::{CommitmentSchemeProver, CommitmentSchemeVerifier};

// COMMITMENT HASHES
// ================================================================================================

/// The pair of hash families used along the digest tree: a verifier-friendly `top` family for
/// the layers closest to the root and a fast `bottom` family for the bulk of the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitmentHashes {
    top: HashName,
    bottom: HashName,
}

impl CommitmentHashes {
    pub fn new(top: HashName, bottom: HashName) -> Self {
        CommitmentHashes { top, bottom }
    }

    /// Uses the same hash family for the entire tree.
    pub fn from_single_hash(hash: HashName) -> Self {
        CommitmentHashes { top: hash, bottom: hash }
    }

    pub fn top(&self) -> HashName {
        self.top
    }

    pub fn bottom(&self) -> HashName {
        self.bottom
    }
}

// LAYER-TO-HASH ASSIGNMENT
// ================================================================================================
//
// A fold that produces a level of 2^k digest-tree nodes uses the top hash iff
// k < n_verifier_friendly_commitment_layers. The assignment depends only on the level and the
// friendly-layer count, never on how much of the tree is streamed, which is what keeps the
// proof bytes independent of the out-of-memory layer count.

fn hash_for_produced_level(
    produced_level_height: usize,
    n_verifier_friendly_commitment_layers: usize,
    hashes: &CommitmentHashes,
) -> HashName {
    if produced_level_height < n_verifier_friendly_commitment_layers {
        hashes.top()
    } else {
        hashes.bottom()
    }
}

// PROVER BUILDER
// ================================================================================================

/// Composes the prover-side commitment stack for `n_segments * n_elements_in_segment` elements
/// of `size_of_element` bytes each.
///
/// The outermost layer packs raw elements into packages; below it sit
/// `n_out_of_memory_merkle_layers` streamed two-to-one levels, each kept warm by a caching
/// layer; the rest of the digest tree is a single in-memory Merkle tree. When
/// `n_verifier_friendly_commitment_layers` is positive, the terminal tree is forced to lie
/// entirely within the verifier-friendly region so that it can use the top hash uniformly.
pub fn make_commitment_scheme_prover<F: FieldElementBytes + 'static>(
    size_of_element: usize,
    n_elements_in_segment: u64,
    n_segments: usize,
    n_verifier_friendly_commitment_layers: usize,
    commitment_hashes: CommitmentHashes,
    n_out_of_memory_merkle_layers: usize,
) -> Box<dyn CommitmentSchemeProver<F>> {
    assert!(n_segments.is_power_of_two(), "number of segments must be a power of two");
    assert!(
        n_elements_in_segment.is_power_of_two(),
        "number of elements in a segment must be a power of two"
    );
    let n_elements = n_elements_in_segment * n_segments as u64;
    let n_elements_in_package =
        compute_n_elements_in_package(size_of_element, 2 * DIGEST_BYTES, n_elements) as u64;
    assert!(
        n_elements_in_segment >= n_elements_in_package,
        "a segment must contain at least one whole package"
    );

    let n_digests = n_elements / n_elements_in_package;
    let height = safe_log2(n_digests);
    let digests_per_segment = n_digests / n_segments as u64;
    let max_streamed_levels = safe_log2(digests_per_segment);

    let n_vf = n_verifier_friendly_commitment_layers;
    let mut n_streamed_levels = n_out_of_memory_merkle_layers.min(max_streamed_levels);
    if n_vf > 0 {
        assert!(
            n_vf + max_streamed_levels >= height,
            "verifier-friendly layers must cover the whole terminal tree"
        );
        // The terminal tree is single-hash, so it must not straddle the friendly boundary.
        if height - n_streamed_levels > n_vf {
            n_streamed_levels = height - n_vf;
        }
    }

    let merkle_height = height - n_streamed_levels;
    tracing::debug!(
        n_elements,
        height,
        n_streamed_levels,
        merkle_height,
        "composing commitment scheme"
    );
    let merkle_hash = if n_vf > 0 { commitment_hashes.top() } else { commitment_hashes.bottom() };
    let mut inner: Box<dyn CommitmentSchemeProver<F>> = with_hash!(merkle_hash, HashT => {
        Box::new(MerkleCommitmentSchemeProver::<HashT>::new(1 << merkle_height, n_segments))
    });

    // Streamed two-to-one levels, innermost first. Level 0 sits right under the outer packer.
    for level in (0..n_streamed_levels).rev() {
        let level_elements_in_segment = digests_per_segment >> level;
        let produced_level_height = height - level - 1;
        let hash = hash_for_produced_level(produced_level_height, n_vf, &commitment_hashes);
        let packaging: Box<dyn CommitmentSchemeProver<F>> = with_hash!(hash, HashT => {
            Box::new(PackagingCommitmentSchemeProver::<F, HashT>::new(
                DIGEST_BYTES,
                level_elements_in_segment,
                n_segments,
                true,
                inner,
            ))
        });
        inner = Box::new(CachingCommitmentSchemeProver::new(
            DIGEST_BYTES,
            level_elements_in_segment,
            n_segments,
            packaging,
        ));
    }

    let outer_hash = hash_for_produced_level(height, n_vf, &commitment_hashes);
    with_hash!(outer_hash, HashT => {
        Box::new(PackagingCommitmentSchemeProver::<F, HashT>::new(
            size_of_element,
            n_elements_in_segment,
            n_segments,
            false,
            inner,
        ))
    })
}

// VERIFIER BUILDER
// ================================================================================================

/// Composes the verifier-side commitment stack. The verifier needs no caching and no streaming,
/// so two-to-one levels exist only where the hash family differs from the terminal tree's.
pub fn make_commitment_scheme_verifier<F: FieldElementBytes + 'static>(
    size_of_element: usize,
    n_elements: u64,
    n_verifier_friendly_commitment_layers: usize,
    commitment_hashes: CommitmentHashes,
) -> Box<dyn CommitmentSchemeVerifier<F>> {
    let n_elements_in_package =
        compute_n_elements_in_package(size_of_element, 2 * DIGEST_BYTES, n_elements) as u64;
    let n_digests = n_elements / n_elements_in_package;
    let height = safe_log2(n_digests);

    let n_vf = n_verifier_friendly_commitment_layers;
    let merkle_height = if n_vf == 0 { height } else { height.min(n_vf) };
    let merkle_hash = if n_vf > 0 { commitment_hashes.top() } else { commitment_hashes.bottom() };
    let mut inner: Box<dyn CommitmentSchemeVerifier<F>> = with_hash!(merkle_hash, HashT => {
        Box::new(MerkleCommitmentSchemeVerifier::<HashT>::new(1 << merkle_height))
    });

    for level in (0..height - merkle_height).rev() {
        let level_n_elements = n_digests >> level;
        let produced_level_height = height - level - 1;
        let hash = hash_for_produced_level(produced_level_height, n_vf, &commitment_hashes);
        inner = with_hash!(hash, HashT => {
            Box::new(PackagingCommitmentSchemeVerifier::<F, HashT>::new(
                DIGEST_BYTES,
                level_n_elements,
                true,
                inner,
            ))
        });
    }

    let outer_hash = hash_for_produced_level(height, n_vf, &commitment_hashes);
    with_hash!(outer_hash, HashT => {
        Box::new(PackagingCommitmentSchemeVerifier::<F, HashT>::new(
            size_of_element,
            n_elements,
            false,
            inner,
        ))
    })
}

// TESTS
// ================================================================================================
