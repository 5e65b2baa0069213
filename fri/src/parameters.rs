use math::StarkField;

use crate::bases::FftBases;

// FRI PARAMETERS
// ================================================================================================

/// The agreed-upon shape of one FRI session.
#[derive(Clone, Debug)]
pub struct FriParameters<B: StarkField> {
    /// Log2 folding widths of the successive layers; layer `i`'s domain shrinks by
    /// `2^fri_step_list[i]`.
    pub fri_step_list: Vec<usize>,
    /// Bound on the degree of the polynomial sent in the clear after the last fold. Also the
    /// number of coefficients on the wire; padding beyond it is implied to be zero.
    pub last_layer_degree_bound: u64,
    pub n_queries: usize,
    /// Domain tower of the first layer's evaluation.
    pub fft_bases: FftBases<B>,
    /// Difficulty of the proof-of-work gate in front of the query phase.
    pub proof_of_work_bits: usize,
}

impl<B: StarkField> FriParameters<B> {
    pub fn new(
        fri_step_list: Vec<usize>,
        last_layer_degree_bound: u64,
        n_queries: usize,
        fft_bases: FftBases<B>,
        proof_of_work_bits: usize,
    ) -> Self {
        assert!(!fri_step_list.is_empty(), "fri_step_list must not be empty");
        assert!(
            fri_step_list.iter().skip(1).all(|&step| step > 0),
            "only the first FRI step may be zero"
        );
        let fri_step_sum: usize = fri_step_list.iter().sum();
        assert!(
            fri_step_sum <= fft_bases.log_n(),
            "the FRI steps fold past a one-element domain"
        );
        assert!(
            last_layer_degree_bound <= fft_bases.layer_size(fri_step_sum),
            "last layer degree bound exceeds the last layer size"
        );
        assert!(n_queries > 0, "there must be at least one query");
        FriParameters {
            fri_step_list,
            last_layer_degree_bound,
            n_queries,
            fft_bases,
            proof_of_work_bits,
        }
    }

    /// Sum of all folding widths; the last layer lives at this index of the domain tower.
    pub fn fri_step_sum(&self) -> usize {
        self.fri_step_list.iter().sum()
    }
}

// FRI PROVER CONFIG
// ================================================================================================

/// Knobs controlling how the prover materializes folded layers; none of them affect the proof
/// bytes.
#[derive(Clone, Copy, Debug)]
pub struct FriProverConfig {
    /// A larger unchunked layer gets divided into chunks when a proxy folds it.
    pub max_non_chunked_layer_size: u64,
    /// Number of chunks a large unchunked layer is divided into.
    pub n_chunks_between_layers: u64,
    /// The first layers up to this count materialize fully in memory; the rest regenerate
    /// their evaluation coset by coset from a low-degree extension.
    pub n_all_in_memory_layers: usize,
}

impl FriProverConfig {
    pub const DEFAULT_MAX_NON_CHUNKED_LAYER_SIZE: u64 = 32768;
    pub const DEFAULT_NUMBER_OF_CHUNKS_BETWEEN_LAYERS: u64 = 32;
    pub const ALL_IN_MEMORY_LAYERS: usize = usize::MAX;
}

impl Default for FriProverConfig {
    fn default() -> Self {
        FriProverConfig {
            max_non_chunked_layer_size: Self::DEFAULT_MAX_NON_CHUNKED_LAYER_SIZE,
            n_chunks_between_layers: Self::DEFAULT_NUMBER_OF_CHUNKS_BETWEEN_LAYERS,
            n_all_in_memory_layers: Self::ALL_IN_MEMORY_LAYERS,
        }
    }
}
